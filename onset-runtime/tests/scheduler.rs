use std::convert::Infallible;
use std::sync::Arc;

use onset_audio::{MAX_ACTIVE_SOUNDS, Mixer};
use onset_cache::{AssetDecoder, ResolvedResource, ResourceCache};
use onset_core::{EventKind, EventLogEntry, PcmBuffer, StimulusEvent, StimulusKind, Timeline};
use onset_runtime::{
    FrameSink, InputEvent, InputSource, Key, RunConfig, RunOutcome, Scene, Scheduler,
};
use onset_timing::{ManualTimer, Timer};
use onset_trigger::{LineTrigger, TriggerLines};
use tiny_skia::Pixmap;

/// 60 Hz in whole nanoseconds.
const FRAME_NS: u64 = 16_666_667;
const FRAME_MS: u64 = 17;

/// Blocks "until vblank" by jumping the manual clock to the next frame
/// boundary.
struct VsyncSink {
    timer: ManualTimer,
    presented: Vec<&'static str>,
    fail_every: Option<usize>,
    calls: usize,
}

impl VsyncSink {
    fn new(timer: &ManualTimer) -> Self {
        Self {
            timer: timer.clone(),
            presented: Vec::new(),
            fail_every: None,
            calls: 0,
        }
    }
}

impl FrameSink for VsyncSink {
    type Error = String;

    fn refresh_rate_hz(&self) -> f64 {
        60.0
    }

    fn present(&mut self, scene: &Scene<'_>) -> Result<(), String> {
        self.calls += 1;
        let now = self.timer.now();
        let next = (now / FRAME_NS + 1) * FRAME_NS;
        self.timer.advance(std::time::Duration::from_nanos(next - now));
        self.presented.push(match scene {
            Scene::Blank => "blank",
            Scene::Fixation => "fixation",
            Scene::Visual(_) => "visual",
        });
        match self.fail_every {
            Some(n) if self.calls % n == 0 => Err("device lost".to_string()),
            _ => Ok(()),
        }
    }
}

/// Sink for runs without vsync: presents return immediately.
struct ImmediateSink;

impl FrameSink for ImmediateSink {
    type Error = Infallible;

    fn refresh_rate_hz(&self) -> f64 {
        0.0
    }

    fn present(&mut self, _scene: &Scene<'_>) -> Result<(), Infallible> {
        Ok(())
    }
}

/// Delivers each event once the clock reaches its timestamp.
struct ScriptedInput {
    timer: ManualTimer,
    script: Vec<(u64, InputEvent)>,
}

impl ScriptedInput {
    fn new(timer: &ManualTimer, script: Vec<(u64, InputEvent)>) -> Self {
        Self {
            timer: timer.clone(),
            script,
        }
    }

    fn none(timer: &ManualTimer) -> Self {
        Self::new(timer, Vec::new())
    }
}

impl InputSource for ScriptedInput {
    fn drain(&mut self, out: &mut Vec<InputEvent>) {
        let now = self.timer.now_ms();
        let due = self.script.iter().take_while(|(at, _)| *at <= now).count();
        out.extend(self.script.drain(..due).map(|(_, e)| e));
    }
}

#[derive(Default)]
struct RecordingTrigger {
    calls: Vec<String>,
}

impl LineTrigger for RecordingTrigger {
    fn set(&mut self, lines: TriggerLines) {
        self.calls.push(format!("set {lines}"));
    }

    fn unset(&mut self, lines: TriggerLines) {
        self.calls.push(format!("unset {lines}"));
    }
}

struct StubDecoder;

impl AssetDecoder for StubDecoder {
    type Error = String;

    fn decode_image(&mut self, source: &str) -> Result<Pixmap, String> {
        if source.starts_with("missing") {
            return Err("no such file".to_string());
        }
        Pixmap::new(8, 8).ok_or_else(|| "pixmap".to_string())
    }

    fn decode_sound(&mut self, _source: &str) -> Result<PcmBuffer, String> {
        Ok(PcmBuffer::from_interleaved(vec![100; 44_100 * 2]))
    }

    fn render_text(&mut self, _text: &str) -> Result<Pixmap, String> {
        Pixmap::new(20, 6).ok_or_else(|| "pixmap".to_string())
    }
}

fn timeline(events: &[(u64, u64, StimulusKind, &str)]) -> Timeline {
    Timeline::new(
        events
            .iter()
            .map(|(t, d, k, p)| StimulusEvent::new(*t, *d, *k, *p))
            .collect(),
    )
    .unwrap()
}

fn resolve(t: &Timeline) -> Vec<ResolvedResource> {
    ResourceCache::new(StubDecoder).resolve(t)
}

fn run_vsync(
    t: &Timeline,
    config: RunConfig,
    script: Vec<(u64, InputEvent)>,
    trigger: Option<&mut RecordingTrigger>,
) -> (RunOutcome, Vec<&'static str>) {
    let timer = ManualTimer::new();
    let resources = resolve(t);
    let scheduler = Scheduler::new(
        config,
        timer.clone(),
        ScriptedInput::new(&timer, script),
        VsyncSink::new(&timer),
        Mixer::new(),
    );
    let mut scheduler = match trigger {
        Some(trigger) => scheduler.with_trigger(trigger),
        None => scheduler,
    };
    let outcome = scheduler.run(t, &resources);
    let presented = scheduler.sink().presented.clone();
    (outcome, presented)
}

fn entries_of(outcome: &RunOutcome, kind: EventKind) -> Vec<&EventLogEntry> {
    outcome.log.iter().filter(|e| e.kind == kind).collect()
}

fn three_stimuli() -> Timeline {
    timeline(&[
        (0, 500, StimulusKind::Image, "a.png"),
        (500, 300, StimulusKind::Sound, "b.wav"),
        (800, 1000, StimulusKind::Text, "hello"),
    ])
}

#[test]
fn image_sound_text_timeline_is_logged_within_a_frame() {
    let (outcome, _) = run_vsync(&three_stimuli(), RunConfig::default(), Vec::new(), None);
    assert!(outcome.completed);

    // The image ends one frame after its confirmed onset, so the sound
    // that starts at 500 ms is logged before the image offset.
    let log: Vec<_> = outcome
        .log
        .iter()
        .map(|e| (e.kind, e.intended_ms, e.actual_ms))
        .collect();
    assert_eq!(
        log,
        vec![
            (EventKind::ImageOnset, 0, 16),
            (EventKind::SoundOnset, 500, 500),
            (EventKind::ImageOffset, 500, 516),
            (EventKind::TextOnset, 800, 816),
            (EventKind::TextOffset, 1800, 1816),
        ]
    );

    for entry in &outcome.log {
        assert!(entry.actual_ms >= entry.intended_ms.saturating_sub(FRAME_MS), "{entry:?}");
        assert!(entry.actual_ms <= entry.intended_ms + FRAME_MS, "{entry:?}");
    }

    let labels: Vec<_> = entries_of(&outcome, EventKind::TextOnset)
        .iter()
        .map(|e| e.label.as_str())
        .collect();
    assert_eq!(labels, vec!["hello"]);
}

#[test]
fn onsets_precede_their_offsets() {
    let (outcome, _) = run_vsync(&three_stimuli(), RunConfig::default(), Vec::new(), None);
    let position = |kind| outcome.log.iter().position(|e| e.kind == kind).unwrap();
    assert!(position(EventKind::ImageOnset) < position(EventKind::ImageOffset));
    assert!(position(EventKind::TextOnset) < position(EventKind::TextOffset));

    let image_on = entries_of(&outcome, EventKind::ImageOnset)[0].actual_ms;
    let image_off = entries_of(&outcome, EventKind::ImageOffset)[0].actual_ms;
    assert!(image_off - image_on >= 500);
}

#[test]
fn actual_times_never_decrease() {
    let t = timeline(&[
        (0, 100, StimulusKind::Image, "a.png"),
        (50, 10, StimulusKind::Sound, "b.wav"),
        (120, 200, StimulusKind::Text, "x"),
        (130, 10, StimulusKind::Sound, "b.wav"),
        (400, 50, StimulusKind::Image, "c.png"),
    ]);
    let script = vec![
        (60, InputEvent::KeyDown(Key::named("A"))),
        (250, InputEvent::KeyDown(Key::named("B"))),
    ];
    let (outcome, _) = run_vsync(&t, RunConfig::default(), script, None);
    assert!(outcome.completed);
    let actual: Vec<_> = outcome.log.iter().map(|e| e.actual_ms).collect();
    assert!(actual.windows(2).all(|w| w[0] <= w[1]), "{actual:?}");
}

#[test]
fn missing_image_is_skipped_and_run_completes() {
    let t = timeline(&[(0, 500, StimulusKind::Image, "missing.png")]);
    let config = RunConfig {
        min_total_duration_ms: Some(1000),
        ..RunConfig::default()
    };
    let (outcome, presented) = run_vsync(&t, config, Vec::new(), None);

    assert!(outcome.completed);
    assert!(outcome.log.is_empty());
    assert!(outcome.elapsed_ms >= 1000);
    assert!(presented.iter().all(|s| *s == "fixation"));
}

#[test]
fn response_then_escape() {
    let t = timeline(&[(0, 3000, StimulusKind::Image, "a.png")]);
    let script = vec![
        (1200, InputEvent::KeyDown(Key::named("Space"))),
        (1500, InputEvent::KeyDown(Key::Escape)),
        (1500, InputEvent::KeyDown(Key::named("B"))),
        (1600, InputEvent::KeyDown(Key::named("C"))),
    ];
    let (outcome, _) = run_vsync(&t, RunConfig::default(), script, None);

    assert!(!outcome.completed);
    let responses = entries_of(&outcome, EventKind::Response);
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].label, "Space");
    assert_eq!(responses[0].intended_ms, responses[0].actual_ms);
    assert!((1200..=1200 + FRAME_MS).contains(&responses[0].actual_ms));

    let last = outcome.log.entries().last().unwrap();
    assert_eq!(last.kind, EventKind::Response);
    assert!(outcome.elapsed_ms < 1500 + FRAME_MS);
    assert_eq!(outcome.log.count(EventKind::ImageOffset), 0);
}

#[test]
fn quit_aborts_the_run() {
    let script = vec![(100, InputEvent::Quit)];
    let (outcome, _) = run_vsync(&three_stimuli(), RunConfig::default(), script, None);
    assert!(!outcome.completed);
    assert_eq!(outcome.log.len(), 1);
    assert_eq!(outcome.log.entries()[0].kind, EventKind::ImageOnset);
}

#[test]
fn seventeenth_simultaneous_sound_is_dropped() {
    let events: Vec<_> = (0..=MAX_ACTIVE_SOUNDS)
        .map(|_| (0, 1000, StimulusKind::Sound, "b.wav"))
        .collect();
    let t = timeline(&events);
    let (outcome, _) = run_vsync(&t, RunConfig::default(), Vec::new(), None);

    assert!(outcome.completed);
    assert_eq!(outcome.log.count(EventKind::SoundOnset), MAX_ACTIVE_SOUNDS);
}

#[test]
fn trigger_lines_follow_stimuli() {
    let mut trigger = RecordingTrigger::default();
    let (outcome, _) = run_vsync(
        &three_stimuli(),
        RunConfig::default(),
        Vec::new(),
        Some(&mut trigger),
    );
    assert!(outcome.completed);
    assert_eq!(
        trigger.calls,
        vec!["set 1", "set 2", "unset 2", "unset 1", "set 3", "unset 3"]
    );
}

#[test]
fn end_entries_and_fixation_toggle() {
    let t = timeline(&[
        (0, 100, StimulusKind::Text, "go"),
        (200, 0, StimulusKind::End, ""),
    ]);
    let config = RunConfig {
        fixation_enabled: false,
        ..RunConfig::default()
    };
    let (outcome, presented) = run_vsync(&t, config, Vec::new(), None);
    assert!(outcome.completed);
    assert_eq!(outcome.log.len(), 2);
    assert!(presented.contains(&"visual"));
    assert!(presented.contains(&"blank"));
    assert!(!presented.contains(&"fixation"));
}

#[test]
fn present_errors_do_not_stop_the_run() {
    let timer = ManualTimer::new();
    let t = three_stimuli();
    let resources = resolve(&t);
    let mut sink = VsyncSink::new(&timer);
    sink.fail_every = Some(3);
    let mut scheduler = Scheduler::new(
        RunConfig::default(),
        timer.clone(),
        ScriptedInput::none(&timer),
        sink,
        Mixer::new(),
    );
    let outcome = scheduler.run(&t, &resources);
    assert!(outcome.completed);
    assert!(outcome.present_failures > 0);
    assert_eq!(outcome.log.len(), 5);
}

#[test]
fn without_vsync_the_loop_sleeps_between_iterations() {
    let timer = ManualTimer::new();
    let t = three_stimuli();
    let resources = resolve(&t);
    let config = RunConfig {
        vsync: false,
        ..RunConfig::default()
    };
    let mut scheduler = Scheduler::new(
        config,
        timer.clone(),
        ScriptedInput::none(&timer),
        ImmediateSink,
        Mixer::new(),
    );
    let outcome = scheduler.run(&t, &resources);

    assert!(outcome.completed);
    // Fallback 60 Hz: 8 ms look-ahead, 1 ms iterations.
    for entry in &outcome.log {
        assert!(entry.actual_ms + 8 >= entry.intended_ms, "{entry:?}");
        assert!(entry.actual_ms <= entry.intended_ms + 1, "{entry:?}");
    }
    assert_eq!(outcome.elapsed_ms, 2300);
}

#[test]
fn sounds_reach_the_mixer() {
    let timer = ManualTimer::new();
    let t = timeline(&[(0, 100, StimulusKind::Sound, "b.wav")]);
    let resources = resolve(&t);
    let mixer = Mixer::new();
    let mut scheduler = Scheduler::new(
        RunConfig::default(),
        timer.clone(),
        ScriptedInput::none(&timer),
        VsyncSink::new(&timer),
        mixer.clone(),
    );
    let outcome = scheduler.run(&t, &resources);
    assert_eq!(outcome.log.count(EventKind::SoundOnset), 1);
    assert_eq!(mixer.active_count(), 1);
    assert!(mixer.is_active(0));
    assert_eq!(Arc::strong_count(resources[0].sound().unwrap()), 1);
}

#[test]
fn new_visual_closes_the_previous_one() {
    let t = timeline(&[
        (0, 1000, StimulusKind::Image, "a.png"),
        (300, 100, StimulusKind::Text, "next"),
    ]);
    let mut trigger = RecordingTrigger::default();
    let (outcome, _) = run_vsync(&t, RunConfig::default(), Vec::new(), Some(&mut trigger));

    let offsets = entries_of(&outcome, EventKind::ImageOffset);
    assert_eq!(offsets.len(), 1);
    assert_eq!(offsets[0].intended_ms, 1000);
    assert_eq!(offsets[0].actual_ms, 300);
    assert_eq!(outcome.log.count(EventKind::TextOffset), 1);
    assert_eq!(trigger.calls, vec!["set 1", "unset 1", "set 3", "unset 3"]);
}
