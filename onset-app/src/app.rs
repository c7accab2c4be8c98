use anyhow::{Context, Result};
use chrono::Local;
use onset_audio::{AudioOutput, Mixer};
use onset_cache::ResourceCache;
use onset_render::RenderStyle;
use onset_runtime::{FrameSink, RunOutcome, Scheduler};
use onset_timing::HighPrecisionTimer;
use onset_trigger::{SerialTrigger, TriggerLines};

use crate::cli::Settings;
use crate::decoder::FileDecoder;
use crate::display::{Display, SharedInput, WindowOptions};
use crate::results::{self, RunMetadata};
use crate::{fonts, splash, timeline_csv};

pub struct App {
    settings: Settings,
    command_line: String,
}

impl App {
    pub fn new(settings: Settings, command_line: String) -> Self {
        Self {
            settings,
            command_line,
        }
    }

    pub fn run(self) -> Result<()> {
        let settings = &self.settings;
        let timeline = timeline_csv::load_timeline(&settings.timeline)?;
        tracing::info!(
            path = %settings.timeline.display(),
            stimuli = timeline.len(),
            "timeline loaded"
        );

        let mut trigger = open_trigger(settings.trigger_device.as_deref());

        let mixer = Mixer::new();
        let _audio = AudioOutput::start(&mixer).context("failed to start audio output")?;

        let font = fonts::load(settings.font.as_deref()).map(|(_, font)| font);
        let decoder = FileDecoder::new(
            settings.stimuli_base(),
            font,
            settings.font_size,
            settings.text_color,
        );
        let mut cache = ResourceCache::new(decoder);
        let resources = cache.resolve(&timeline);
        let summary = cache.summary();
        tracing::info!(
            images = summary.images,
            sounds = summary.sounds,
            texts = summary.texts,
            missing = summary.missing,
            memory_mb = summary.bytes as f64 / (1024.0 * 1024.0),
            "stimuli loaded"
        );
        for (kind, source) in cache.missing() {
            tracing::warn!(kind = kind.as_str(), source, "stimulus unavailable, it will be skipped");
        }

        let run = &settings.run;
        let timer = HighPrecisionTimer::new();
        let input = SharedInput::new();
        let mut display = Display::open(
            WindowOptions {
                width: run.screen_width,
                height: run.screen_height,
                fullscreen: settings.fullscreen,
                display_index: settings.display,
                vsync: run.vsync,
            },
            RenderStyle {
                background: run.background,
                fixation: run.fixation_color,
                scale_factor: run.scale_factor,
            },
            input.clone(),
            timer.clone(),
        )?;

        if !splash::show(&mut display, settings.start_splash.as_deref())? {
            tracing::info!("quit before the run started");
            return Ok(());
        }
        input.clear();
        display.reset_statistics();

        let outcome = {
            let mut scheduler = Scheduler::new(run.clone(), timer, input.clone(), &mut display, mixer.clone());
            if let Some(trigger) = trigger.as_mut() {
                scheduler = scheduler.with_trigger(trigger);
            }
            scheduler.run(&timeline, &resources)
        };

        if let Some(trigger) = trigger.as_mut() {
            if let Err(err) = trigger.unset_lines(TriggerLines::ALL) {
                tracing::warn!(%err, "failed to reset trigger lines");
            }
        }

        let stats = display.frame_statistics();
        tracing::info!(
            completed = outcome.completed,
            events = outcome.log.len(),
            elapsed_ms = outcome.elapsed_ms,
            frames = outcome.frames_presented,
            present_failures = outcome.present_failures,
            mean_frame_ms = stats.average_frame_time_ns / 1e6,
            jitter_ms = stats.jitter_ns / 1e6,
            effective_fps = stats.effective_fps,
            "run finished"
        );

        self.write_results(&display, &outcome)?;

        if outcome.completed {
            splash::show(&mut display, settings.end_splash.as_deref())?;
        }
        Ok(())
    }

    fn write_results(&self, display: &Display, outcome: &RunOutcome) -> Result<()> {
        let now = Local::now();
        let monitor = display.monitor();
        let run = &self.settings.run;
        let metadata = RunMetadata {
            vsync: run.vsync,
            display_width: monitor.width,
            display_height: monitor.height,
            refresh_hz: display.refresh_rate_hz(),
            logical_width: run.screen_width,
            logical_height: run.screen_height,
            scale_factor: run.scale_factor,
            completed: outcome.completed,
            frames_presented: outcome.frames_presented,
            present_failures: outcome.present_failures,
            ..RunMetadata::capture(now, &self.command_line)
        }
        .with_frame_stats(&display.frame_statistics());

        let path = results::timestamped_path(&self.settings.output, now);
        results::write(&path, &metadata, &outcome.log)?;
        tracing::info!(path = %path.display(), events = outcome.log.len(), "results written");
        Ok(())
    }
}

/// Trigger problems never stop a run; the run just goes without triggers.
fn open_trigger(device: Option<&str>) -> Option<SerialTrigger> {
    let device = device?;
    let mut channel = match SerialTrigger::open(device) {
        Ok(channel) => channel,
        Err(err) => {
            tracing::warn!(device, %err, "trigger device unavailable, running without triggers");
            return None;
        }
    };
    if !channel.ping() {
        tracing::warn!(device, "trigger device did not answer the second ping");
    }
    match channel.read() {
        Ok(states) => tracing::debug!(device, ?states, "trigger line states"),
        Err(err) => tracing::warn!(device, %err, "failed to read trigger lines"),
    }
    Some(channel)
}
