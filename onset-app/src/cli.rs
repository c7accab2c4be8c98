use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use clap::Parser;
use onset_core::Rgba;
use onset_runtime::RunConfig;
use serde::Deserialize;

pub const DEFAULT_OUTPUT: &str = "results.csv";
pub const DEFAULT_FONT_SIZE: f32 = 24.0;
/// Looked up in the working directory when no timeline is given.
pub const DEFAULT_TIMELINE: &str = "experiment.csv";
pub const DEFAULT_STIMULI_DIR: &str = "assets";

#[derive(Parser, Debug, Default)]
#[command(name = "onset", author, version, about = "Frame-accurate stimulus presentation", long_about = None)]
pub struct Cli {
    /// Timeline CSV with `onset_ms,duration_ms,kind,payload` rows.
    pub timeline: Option<PathBuf>,

    /// TOML file supplying defaults; flags given here override it.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Results file; a `_YYYYMMDD-HHMMSS` suffix is added. `.json` writes JSON.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory of stimulus files, relative to the timeline's directory.
    #[arg(long)]
    pub stimuli_dir: Option<PathBuf>,

    /// Image shown before the run until a key is pressed.
    #[arg(long)]
    pub start_splash: Option<PathBuf>,

    /// Image shown after the run until a key is pressed.
    #[arg(long)]
    pub end_splash: Option<PathBuf>,

    #[arg(short, long)]
    pub font: Option<PathBuf>,

    #[arg(short = 'z', long)]
    pub font_size: Option<f32>,

    /// Serial device of a DLP-IO8-G trigger box.
    #[arg(long = "dlp", alias = "trigger-device", value_name = "DEVICE")]
    pub trigger_device: Option<String>,

    /// Logical resolution stimuli are laid out at.
    #[arg(short = 'r', long = "res", value_name = "WxH")]
    pub resolution: Option<Resolution>,

    #[arg(short, long)]
    pub scale: Option<f32>,

    /// Monitor index for fullscreen mode.
    #[arg(short, long)]
    pub display: Option<usize>,

    #[arg(short = 'F', long)]
    pub fullscreen: bool,

    #[arg(short = 'x', long)]
    pub no_fixation: bool,

    #[arg(long)]
    pub no_vsync: bool,

    /// Background colour as `r,g,b[,a]`.
    #[arg(long, value_name = "RGBA")]
    pub background: Option<Rgba>,

    #[arg(long, value_name = "RGBA")]
    pub fixation_color: Option<Rgba>,

    #[arg(long, value_name = "RGBA")]
    pub text_color: Option<Rgba>,

    /// Minimum run length in milliseconds.
    #[arg(short = 'D', long, value_name = "MS")]
    pub total_duration: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WxH, got `{s}`"))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| format!("invalid dimension `{v}` in `{s}`"))
        };
        Ok(Self {
            width: parse(w)?,
            height: parse(h)?,
        })
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Contents of the optional `--config` TOML file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub timeline: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub stimuli_dir: Option<PathBuf>,
    pub start_splash: Option<PathBuf>,
    pub end_splash: Option<PathBuf>,
    pub font: Option<PathBuf>,
    pub font_size: Option<f32>,
    pub trigger_device: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub scale: Option<f32>,
    pub display: Option<usize>,
    pub fullscreen: Option<bool>,
    pub fixation: Option<bool>,
    pub vsync: Option<bool>,
    pub background: Option<Rgba>,
    pub fixation_color: Option<Rgba>,
    pub text_color: Option<Rgba>,
    pub total_duration_ms: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub timeline: PathBuf,
    pub output: PathBuf,
    pub stimuli_dir: Option<PathBuf>,
    pub start_splash: Option<PathBuf>,
    pub end_splash: Option<PathBuf>,
    pub font: Option<PathBuf>,
    pub font_size: f32,
    pub trigger_device: Option<String>,
    pub display: usize,
    pub fullscreen: bool,
    pub text_color: Rgba,
    pub run: RunConfig,
}

impl Settings {
    pub fn load(cli: Cli) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(cli, file)
    }

    /// Flags win over the file, the file over built-in defaults.
    pub fn resolve(cli: Cli, file: FileConfig) -> Result<Self> {
        Self::resolve_in(cli, file, Path::new(""))
    }

    /// Like [`Settings::resolve`], looking for the default timeline and
    /// stimuli directory in `dir` when no timeline is given.
    pub fn resolve_in(cli: Cli, file: FileConfig, dir: &Path) -> Result<Self> {
        let mut stimuli_dir = cli.stimuli_dir.or(file.stimuli_dir);
        let timeline = match cli.timeline.or(file.timeline) {
            Some(path) => path,
            None => {
                let fallback = dir.join(DEFAULT_TIMELINE);
                if !fallback.is_file() {
                    bail!(
                        "no timeline given and no {DEFAULT_TIMELINE} here; pass a CSV file or set `timeline` in the config"
                    );
                }
                if stimuli_dir.is_none() && dir.join(DEFAULT_STIMULI_DIR).is_dir() {
                    stimuli_dir = Some(PathBuf::from(DEFAULT_STIMULI_DIR));
                }
                tracing::info!(path = %fallback.display(), "using default timeline");
                fallback
            }
        };

        let defaults = RunConfig::default();
        let (screen_width, screen_height) = match cli.resolution {
            Some(r) => (r.width, r.height),
            None => (
                file.width.unwrap_or(defaults.screen_width),
                file.height.unwrap_or(defaults.screen_height),
            ),
        };
        if screen_width == 0 || screen_height == 0 {
            bail!("resolution must be non-zero, got {screen_width}x{screen_height}");
        }

        let scale_factor = cli.scale.or(file.scale).unwrap_or(defaults.scale_factor);
        if !(scale_factor.is_finite() && scale_factor > 0.0) {
            bail!("scale must be a positive number, got {scale_factor}");
        }
        let font_size = cli.font_size.or(file.font_size).unwrap_or(DEFAULT_FONT_SIZE);
        if !(font_size.is_finite() && font_size > 0.0) {
            bail!("font size must be a positive number, got {font_size}");
        }

        let run = RunConfig {
            screen_width,
            screen_height,
            scale_factor,
            background: cli.background.or(file.background).unwrap_or(defaults.background),
            fixation_color: cli
                .fixation_color
                .or(file.fixation_color)
                .unwrap_or(defaults.fixation_color),
            fixation_enabled: !cli.no_fixation && file.fixation.unwrap_or(true),
            vsync: !cli.no_vsync && file.vsync.unwrap_or(true),
            min_total_duration_ms: cli.total_duration.or(file.total_duration_ms),
        };

        Ok(Self {
            timeline,
            output: cli
                .output
                .or(file.output)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
            stimuli_dir,
            start_splash: cli.start_splash.or(file.start_splash),
            end_splash: cli.end_splash.or(file.end_splash),
            font: cli.font.or(file.font),
            font_size,
            trigger_device: cli.trigger_device.or(file.trigger_device),
            display: cli.display.or(file.display).unwrap_or(0),
            fullscreen: cli.fullscreen || file.fullscreen.unwrap_or(false),
            text_color: cli.text_color.or(file.text_color).unwrap_or(Rgba::WHITE),
            run,
        })
    }

    /// Directory stimulus payloads are resolved against: the timeline's
    /// directory joined with the stimuli directory, if any.
    pub fn stimuli_base(&self) -> PathBuf {
        let dir = self.timeline.parent().unwrap_or(Path::new(""));
        match &self.stimuli_dir {
            Some(sub) => dir.join(sub),
            None => dir.to_path_buf(),
        }
    }
}
