use onset_core::{Rgba, Timeline};

/// Trailing time after the last stimulus when no total duration is set.
pub const DEFAULT_TAIL_MS: u64 = 500;
/// Used when the display does not report a usable refresh rate.
pub const FALLBACK_REFRESH_HZ: f64 = 60.0;

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Logical resolution all drawing happens at.
    pub screen_width: u32,
    pub screen_height: u32,
    pub scale_factor: f32,
    pub background: Rgba,
    pub fixation_color: Rgba,
    pub fixation_enabled: bool,
    pub vsync: bool,
    /// The run does not end before this much time has elapsed. `None` means
    /// the last entry's offset plus [`DEFAULT_TAIL_MS`].
    pub min_total_duration_ms: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            screen_width: 1920,
            screen_height: 1080,
            scale_factor: 1.0,
            background: Rgba::BLACK,
            fixation_color: Rgba::WHITE,
            fixation_enabled: true,
            vsync: true,
            min_total_duration_ms: None,
        }
    }
}

impl RunConfig {
    pub fn total_duration_ms(&self, timeline: &Timeline) -> u64 {
        self.min_total_duration_ms
            .unwrap_or_else(|| default_total_duration_ms(timeline))
    }
}

pub fn default_total_duration_ms(timeline: &Timeline) -> u64 {
    timeline
        .events()
        .last()
        .map_or(0, |last| last.offset_ms())
        .saturating_add(DEFAULT_TAIL_MS)
}

/// Whole milliseconds per frame and the look-ahead derived from it.
pub fn frame_timing(refresh_hz: f64) -> (u64, u64) {
    let hz = if refresh_hz.is_finite() && refresh_hz > 0.0 {
        refresh_hz
    } else {
        FALLBACK_REFRESH_HZ
    };
    let frame_ms = (1000.0 / hz) as u64;
    (frame_ms, frame_ms / 2)
}
