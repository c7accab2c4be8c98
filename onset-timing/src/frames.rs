use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationStats {
    pub samples: usize,
    pub average_frame_time_ns: f64,
    pub jitter_ns: f64,
    pub min_frame_time_ns: f64,
    pub max_frame_time_ns: f64,
    pub effective_fps: f64,
}

/// Rolling window of frame-to-frame presentation intervals
#[derive(Debug, Clone)]
pub struct FrameStatistics {
    frame_times: VecDeque<Duration>,
    max_samples: usize,
    last_present_ns: Option<u64>,
}

impl FrameStatistics {
    pub fn new(max_samples: usize) -> Self {
        Self {
            frame_times: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
            last_present_ns: None,
        }
    }

    /// Records the timestamp of a presented frame; the first call only
    /// establishes the reference point.
    pub fn record_present(&mut self, now_ns: u64) {
        if let Some(prev) = self.last_present_ns {
            self.record_frame(Duration::from_nanos(now_ns.saturating_sub(prev)));
        }
        self.last_present_ns = Some(now_ns);
    }

    pub fn record_frame(&mut self, d: Duration) {
        if self.frame_times.len() >= self.max_samples {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(d);
    }

    pub fn frame_count(&self) -> usize {
        self.frame_times.len()
    }

    pub fn calibration_stats(&self) -> CalibrationStats {
        if self.frame_times.is_empty() {
            return CalibrationStats::default();
        }
        let times: Vec<f64> = self
            .frame_times
            .iter()
            .map(|d| d.as_nanos() as f64)
            .collect();
        let sum: f64 = times.iter().sum();
        let avg = sum / times.len() as f64;
        let var = times.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / times.len() as f64;
        let min = times.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = times.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        CalibrationStats {
            samples: times.len(),
            average_frame_time_ns: avg,
            jitter_ns: var.sqrt(),
            min_frame_time_ns: min,
            max_frame_time_ns: max,
            effective_fps: if avg > 0.0 { 1e9 / avg } else { 0.0 },
        }
    }
}

impl Default for FrameStatistics {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_60hz_has_no_jitter() {
        let mut stats = FrameStatistics::new(100);
        for i in 0..11u64 {
            stats.record_present(i * 16_666_667);
        }
        let s = stats.calibration_stats();
        assert_eq!(s.samples, 10);
        assert!((s.effective_fps - 60.0).abs() < 0.01);
        assert!(s.jitter_ns < 1.0);
    }

    #[test]
    fn window_is_bounded() {
        let mut stats = FrameStatistics::new(3);
        for ms in [10, 20, 30, 40] {
            stats.record_frame(Duration::from_millis(ms));
        }
        let s = stats.calibration_stats();
        assert_eq!(s.samples, 3);
        assert_eq!(s.min_frame_time_ns, 20_000_000.0);
    }

    #[test]
    fn empty_stats_are_zero() {
        assert_eq!(FrameStatistics::default().calibration_stats(), CalibrationStats::default());
    }
}
