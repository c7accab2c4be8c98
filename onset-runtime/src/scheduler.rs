use std::time::Duration;

use onset_audio::Mixer;
use onset_cache::ResolvedResource;
use onset_core::{EventKind, EventLog, StimulusKind, Timeline};
use onset_timing::Timer;
use onset_trigger::{LineTrigger, TriggerLines};

use crate::config::{RunConfig, frame_timing};
use crate::input::{InputEvent, InputSource, Key};
use crate::sink::{FrameSink, Scene};
use crate::state::{ActiveVisual, RunState, StopReason};

/// How long the sound trigger line stays high.
pub const SOUND_PULSE: Duration = Duration::from_millis(5);
/// Pause per iteration when presentation does not block on vsync.
pub const IDLE_SLEEP: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub log: EventLog,
    /// False when the subject quit or pressed Escape.
    pub completed: bool,
    pub elapsed_ms: u64,
    pub frames_presented: u64,
    pub present_failures: u64,
}

/// Walks a timeline in real time, one iteration per presented frame.
pub struct Scheduler<'t, T: Timer, I: InputSource, F: FrameSink> {
    config: RunConfig,
    timer: T,
    input: I,
    sink: F,
    mixer: Mixer,
    trigger: Option<&'t mut dyn LineTrigger>,
    pending: Vec<InputEvent>,
}

impl<'t, T: Timer, I: InputSource, F: FrameSink> Scheduler<'t, T, I, F> {
    pub fn new(config: RunConfig, timer: T, input: I, sink: F, mixer: Mixer) -> Self {
        Self {
            config,
            timer,
            input,
            sink,
            mixer,
            trigger: None,
            pending: Vec::with_capacity(16),
        }
    }

    pub fn with_trigger(mut self, trigger: &'t mut dyn LineTrigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn sink(&self) -> &F {
        &self.sink
    }

    /// Runs until the timeline is exhausted or the subject aborts.
    /// `resources` holds one entry per timeline entry; absent entries are
    /// treated as missing.
    pub fn run(&mut self, timeline: &Timeline, resources: &[ResolvedResource]) -> RunOutcome {
        let (frame_ms, look_ahead_ms) = frame_timing(self.sink.refresh_rate_hz());
        let total_ms = self.config.total_duration_ms(timeline);
        tracing::info!(
            stimuli = timeline.len(),
            frame_ms,
            look_ahead_ms,
            total_ms,
            vsync = self.config.vsync,
            "run started"
        );

        let mut log = EventLog::with_capacity(timeline.len() * 2 + 64);
        let mut state = RunState::new();
        let mut frames_presented = 0u64;
        let mut present_failures = 0u64;
        let start_ns = self.timer.now();

        loop {
            state.elapsed_ms = self.elapsed_ms(start_ns);

            if let Some(reason) = self.poll_input(&mut log, state.elapsed_ms) {
                state.stop = Some(reason);
                break;
            }

            let triggered = self.trigger_next(&mut state, timeline, resources, look_ahead_ms, &mut log);
            self.check_offset(&mut state, timeline, &mut log);

            if state.is_terminal(timeline.len(), total_ms) {
                state.stop = Some(StopReason::Completed);
                break;
            }

            let scene = match state.active {
                Some(active) => resources
                    .get(active.index)
                    .and_then(ResolvedResource::texture)
                    .map_or(Scene::Blank, Scene::Visual),
                None if self.config.fixation_enabled => Scene::Fixation,
                None => Scene::Blank,
            };
            match self.sink.present(&scene) {
                Ok(()) => frames_presented += 1,
                Err(err) => {
                    present_failures += 1;
                    tracing::warn!(%err, elapsed_ms = state.elapsed_ms, "present failed");
                }
            }

            // Confirm the onset now that the frame is on screen.
            if let Some(index) = triggered {
                let now_ms = self.elapsed_ms(start_ns);
                if let Some(event) = timeline.get(index) {
                    if let Some(kind) = EventKind::onset_of(event.kind) {
                        log.append(event.onset_ms, now_ms, kind, event.payload.as_str());
                    }
                    if let Some(active) = state.active.as_mut().filter(|a| a.index == index) {
                        active.end_ms = now_ms.saturating_add(event.duration_ms);
                    }
                }
            }

            if !self.config.vsync {
                self.timer.sleep(IDLE_SLEEP);
            }
        }

        let completed = state.stop.is_some_and(|r| r.is_completed());
        let elapsed_ms = self.elapsed_ms(start_ns);
        tracing::info!(
            completed,
            elapsed_ms,
            events = log.len(),
            frames_presented,
            present_failures,
            "run finished"
        );
        // Visual still on screen after an abort.
        let held = state
            .active
            .and_then(|a| timeline.get(a.index))
            .and_then(|e| e.kind.trigger_line());
        if let Some(line) = held {
            self.unset_line(line);
        }

        RunOutcome {
            log,
            completed,
            elapsed_ms,
            frames_presented,
            present_failures,
        }
    }

    fn elapsed_ms(&self, start_ns: u64) -> u64 {
        self.timer.now().saturating_sub(start_ns) / 1_000_000
    }

    /// Handles everything queued since the last iteration. Events after a
    /// stop request are discarded.
    fn poll_input(&mut self, log: &mut EventLog, elapsed_ms: u64) -> Option<StopReason> {
        self.pending.clear();
        self.input.drain(&mut self.pending);
        for event in self.pending.drain(..) {
            match event {
                InputEvent::Quit => return Some(StopReason::Quit),
                InputEvent::KeyDown(Key::Escape) => return Some(StopReason::Escape),
                InputEvent::KeyDown(Key::Named(name)) => {
                    tracing::debug!(key = %name, elapsed_ms, "response");
                    log.append(elapsed_ms, elapsed_ms, EventKind::Response, name);
                }
            }
        }
        None
    }

    /// Triggers the next entry if it is due within the look-ahead window.
    /// Returns the index of a visual that must be confirmed after present.
    fn trigger_next(
        &mut self,
        state: &mut RunState,
        timeline: &Timeline,
        resources: &[ResolvedResource],
        look_ahead_ms: u64,
        log: &mut EventLog,
    ) -> Option<usize> {
        let index = state.cursor;
        let event = timeline.get(index)?;
        if state.elapsed_ms + look_ahead_ms < event.onset_ms {
            return None;
        }
        state.cursor += 1;
        tracing::debug!(stimulus = state.cursor, total = timeline.len(), kind = event.kind.as_str(), "stimulus");

        let resource = resources.get(index);
        match event.kind {
            StimulusKind::Image | StimulusKind::Text => {
                resource.and_then(ResolvedResource::texture)?;
                // A new visual replaces whatever is still on screen.
                if let Some(previous) = state.active.take() {
                    self.close_visual(previous, state.elapsed_ms, timeline, log);
                }
                state.active = Some(ActiveVisual {
                    index,
                    end_ms: state.elapsed_ms.saturating_add(event.duration_ms),
                });
                if let Some(line) = event.kind.trigger_line() {
                    self.set_line(line);
                }
                Some(index)
            }
            StimulusKind::Sound => {
                let sound = resource.and_then(ResolvedResource::sound)?;
                match self.mixer.play(sound) {
                    Some(slot) => {
                        log.append(
                            event.onset_ms,
                            state.elapsed_ms,
                            EventKind::SoundOnset,
                            event.payload.as_str(),
                        );
                        tracing::debug!(slot, payload = %event.payload, "sound started");
                        if let Some(line) = event.kind.trigger_line() {
                            self.pulse_line(line);
                        }
                    }
                    None => {
                        tracing::debug!(payload = %event.payload, "all mixer slots busy, sound dropped");
                    }
                }
                None
            }
            StimulusKind::End => None,
        }
    }

    fn check_offset(&mut self, state: &mut RunState, timeline: &Timeline, log: &mut EventLog) {
        let Some(active) = state.active else {
            return;
        };
        if state.elapsed_ms < active.end_ms {
            return;
        }
        state.active = None;
        self.close_visual(active, state.elapsed_ms, timeline, log);
    }

    fn close_visual(
        &mut self,
        visual: ActiveVisual,
        elapsed_ms: u64,
        timeline: &Timeline,
        log: &mut EventLog,
    ) {
        let Some(event) = timeline.get(visual.index) else {
            return;
        };
        if let Some(kind) = EventKind::offset_of(event.kind) {
            log.append(event.offset_ms(), elapsed_ms, kind, event.payload.as_str());
        }
        if let Some(line) = event.kind.trigger_line() {
            self.unset_line(line);
        }
    }

    fn set_line(&mut self, line: u8) {
        if let (Some(trigger), Ok(lines)) = (self.trigger.as_deref_mut(), TriggerLines::single(line)) {
            trigger.set(lines);
        }
    }

    fn unset_line(&mut self, line: u8) {
        if let (Some(trigger), Ok(lines)) = (self.trigger.as_deref_mut(), TriggerLines::single(line)) {
            trigger.unset(lines);
        }
    }

    fn pulse_line(&mut self, line: u8) {
        if self.trigger.is_none() {
            return;
        }
        self.set_line(line);
        self.timer.sleep(SOUND_PULSE);
        self.unset_line(line);
    }
}
