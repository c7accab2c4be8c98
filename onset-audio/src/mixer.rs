use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use onset_core::PcmBuffer;
use onset_core::sound::BYTES_PER_SAMPLE;

/// Polyphony limit: sounds beyond this many concurrent voices are dropped.
pub const MAX_ACTIVE_SOUNDS: usize = 16;
/// Size of the callback's mixing buffer.
pub const SCRATCH_BYTES: usize = 4096;
pub const SCRATCH_SAMPLES: usize = SCRATCH_BYTES / BYTES_PER_SAMPLE;

/// One playback voice. The scheduler arms inactive slots; the audio
/// callback advances the cursor and retires the slot when the sound ends.
#[derive(Debug, Default)]
pub struct MixerSlot {
    asset: Weak<PcmBuffer>,
    cursor: u32,
    active: bool,
}

impl MixerSlot {
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Play position in samples.
    pub fn cursor(&self) -> u32 {
        self.cursor
    }
}

type Slots = [MixerSlot; MAX_ACTIVE_SOUNDS];

/// Handle to the shared slot array. Cloning shares the same slots; one
/// clone lives in the audio callback, one with the scheduler.
#[derive(Debug, Clone)]
pub struct Mixer {
    slots: Arc<Mutex<Slots>>,
}

impl Mixer {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(std::array::from_fn(|_| MixerSlot::default()))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims the first free slot for `sound`. Returns the slot index, or
    /// `None` when every slot is busy and the sound is dropped.
    pub fn play(&self, sound: &Arc<PcmBuffer>) -> Option<usize> {
        let mut slots = self.lock();
        let (index, slot) = slots.iter_mut().enumerate().find(|(_, s)| !s.active)?;
        slot.asset = Arc::downgrade(sound);
        slot.cursor = 0;
        slot.active = true;
        Some(index)
    }

    pub fn active_count(&self) -> usize {
        self.lock().iter().filter(|s| s.active).count()
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.lock().get(index).is_some_and(MixerSlot::is_active)
    }

    pub fn cursor(&self, index: usize) -> Option<u32> {
        self.lock().get(index).map(MixerSlot::cursor)
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}

/// The audio-thread half of the mixer. Owns a fixed scratch buffer so the
/// callback never allocates.
pub struct MixEngine {
    mixer: Mixer,
    scratch: Box<[i16; SCRATCH_SAMPLES]>,
}

impl MixEngine {
    pub fn new(mixer: Mixer) -> Self {
        Self {
            mixer,
            scratch: Box::new([0; SCRATCH_SAMPLES]),
        }
    }

    /// Mixes the next `len` samples (at most [`SCRATCH_SAMPLES`]) into the
    /// scratch buffer and returns them.
    fn mix_chunk(&mut self, len: usize) -> &[i16] {
        let scratch = &mut self.scratch[..len];
        scratch.fill(0);

        let mut slots = self.mixer.lock();
        for slot in slots.iter_mut().filter(|s| s.active) {
            let Some(sound) = slot.asset.upgrade() else {
                slot.active = false;
                continue;
            };
            let samples = sound.samples();
            let start = (slot.cursor as usize).min(samples.len());
            let to_mix = (samples.len() - start).min(len);

            for (dst, src) in scratch.iter_mut().zip(&samples[start..start + to_mix]) {
                *dst = dst.saturating_add(*src);
            }

            slot.cursor += to_mix as u32;
            if slot.cursor as usize >= samples.len() {
                slot.active = false;
            }
        }
        drop(slots);

        &self.scratch[..len]
    }

    /// Fills an i16 output buffer, chunk by chunk.
    pub fn fill(&mut self, out: &mut [i16]) {
        for chunk in out.chunks_mut(SCRATCH_SAMPLES) {
            let mixed = self.mix_chunk(chunk.len());
            chunk.copy_from_slice(mixed);
        }
    }

    /// Same as [`MixEngine::fill`] for devices that only take f32 samples.
    pub fn fill_f32(&mut self, out: &mut [f32]) {
        for chunk in out.chunks_mut(SCRATCH_SAMPLES) {
            let mixed = self.mix_chunk(chunk.len());
            for (dst, src) in chunk.iter_mut().zip(mixed) {
                *dst = *src as f32 / 32768.0;
            }
        }
    }
}
