/// Canonical PCM format every sound is converted to at load time.
pub const SAMPLE_RATE: u32 = 44_100;
pub const CHANNELS: u16 = 2;
pub const BYTES_PER_SAMPLE: usize = std::mem::size_of::<i16>();

/// Decoded sound in the canonical format: interleaved stereo i16 at 44.1 kHz.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PcmBuffer {
    samples: Vec<i16>,
}

impl PcmBuffer {
    /// `samples` must already be interleaved stereo at [`SAMPLE_RATE`].
    pub fn from_interleaved(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn byte_len(&self) -> usize {
        self.samples.len() * BYTES_PER_SAMPLE
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / CHANNELS as usize
    }

    pub fn duration_ms(&self) -> u64 {
        self.frames() as u64 * 1000 / SAMPLE_RATE as u64
    }
}
