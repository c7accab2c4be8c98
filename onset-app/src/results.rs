use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use onset_core::{EventLog, EventLogEntry};
use onset_timing::CalibrationStats;
use serde::Serialize;

/// Inserts `_YYYYMMDD-HHMMSS` before the extension so runs never overwrite
/// each other.
pub fn timestamped_path(path: &Path, at: DateTime<Local>) -> PathBuf {
    let stamp = at.format("%Y%m%d-%H%M%S");
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "results".to_string());
    let name = match path.extension() {
        Some(ext) => format!("{stem}_{stamp}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{stamp}"),
    };
    path.with_file_name(name)
}

/// Describes the machine and display a run was recorded on.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunMetadata {
    pub date: String,
    pub user: String,
    pub host: String,
    pub command_line: String,
    pub platform: String,
    pub vsync: bool,
    pub display_width: u32,
    pub display_height: u32,
    pub refresh_hz: f64,
    pub logical_width: u32,
    pub logical_height: u32,
    pub scale_factor: f32,
    pub completed: bool,
    pub frames_presented: u64,
    pub present_failures: u64,
    pub mean_frame_ms: f64,
    pub frame_jitter_ms: f64,
    pub effective_fps: f64,
}

impl RunMetadata {
    /// Fills in date, user, host, platform and command line from the
    /// environment.
    pub fn capture(at: DateTime<Local>, command_line: &str) -> Self {
        Self {
            date: at.format("%Y-%m-%d %H:%M:%S").to_string(),
            user: env_or_unknown(&["USER", "USERNAME"]),
            host: hostname(),
            command_line: command_line.to_string(),
            platform: format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
            ..Self::default()
        }
    }

    pub fn with_frame_stats(mut self, stats: &CalibrationStats) -> Self {
        self.mean_frame_ms = stats.average_frame_time_ns / 1e6;
        self.frame_jitter_ms = stats.jitter_ns / 1e6;
        self.effective_fps = stats.effective_fps;
        self
    }
}

fn env_or_unknown(keys: &[&str]) -> String {
    keys.iter()
        .find_map(|k| std::env::var(k).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::env::var("COMPUTERNAME").ok())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|s| s.trim().to_string())
        })
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[derive(Serialize)]
struct JsonResults<'a> {
    metadata: &'a RunMetadata,
    events: &'a [EventLogEntry],
}

/// Writes the log to `path`, as JSON when the extension is `.json` and as
/// commented CSV otherwise.
pub fn write(path: &Path, metadata: &RunMetadata, log: &EventLog) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);

    let is_json = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        let doc = JsonResults {
            metadata,
            events: log.entries(),
        };
        serde_json::to_writer_pretty(&mut out, &doc)?;
        out.write_all(b"\n")?;
    } else {
        write_csv(&mut out, metadata, log)?;
    }
    out.flush()
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub fn write_csv<W: Write>(out: &mut W, metadata: &RunMetadata, log: &EventLog) -> std::io::Result<()> {
    let m = metadata;
    writeln!(out, "# onset results")?;
    writeln!(out, "# Date/Time: {}", m.date)?;
    writeln!(out, "# User/Host: {}@{}", m.user, m.host)?;
    writeln!(out, "# Command Line: {}", m.command_line)?;
    writeln!(out, "# Platform: {}", m.platform)?;
    writeln!(out, "# VSync: {}", if m.vsync { "ON" } else { "OFF" })?;
    writeln!(
        out,
        "# Display Resolution: {}x{} @ {:.2}Hz",
        m.display_width, m.display_height, m.refresh_hz
    )?;
    writeln!(out, "# Logical Resolution: {}x{}", m.logical_width, m.logical_height)?;
    writeln!(out, "# Scale Factor: {:.2}", m.scale_factor)?;
    writeln!(out, "# Completed: {}", if m.completed { "yes" } else { "no" })?;
    writeln!(
        out,
        "# Frames: {} presented, {} failed, mean {:.3} ms, jitter {:.3} ms, {:.2} fps",
        m.frames_presented, m.present_failures, m.mean_frame_ms, m.frame_jitter_ms, m.effective_fps
    )?;
    writeln!(out, "intended_ms,actual_ms,type,label")?;
    for entry in log {
        writeln!(
            out,
            "{},{},{},{}",
            entry.intended_ms,
            entry.actual_ms,
            entry.kind,
            csv_field(&entry.label)
        )?;
    }
    Ok(())
}

fn csv_field(value: &str) -> std::borrow::Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\"")).into()
    } else {
        value.into()
    }
}
