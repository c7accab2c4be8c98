use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Trait for the monotonic run clock
pub trait Timer: Clone + Send + Sync {
    /// Nanoseconds since the timer was created.
    fn now(&self) -> u64;
    fn sleep(&self, d: Duration);

    fn now_ms(&self) -> u64 {
        self.now() / 1_000_000
    }
    fn elapsed(&self, ts: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }
}

#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    pub start: Instant,
}

impl Timer for HighPrecisionTimer {
    fn now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
    fn sleep(&self, d: Duration) {
        self.high_precision_sleep(d)
    }
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn high_precision_sleep(&self, duration: Duration) {
        #[cfg(target_os = "linux")]
        self.linux_sleep(duration);
        #[cfg(not(target_os = "linux"))]
        self.hybrid_sleep(duration);
    }

    #[cfg(target_os = "linux")]
    fn linux_sleep(&self, duration: Duration) {
        use libc::{clock_nanosleep, timespec, CLOCK_MONOTONIC};

        let req = timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        };

        unsafe {
            clock_nanosleep(CLOCK_MONOTONIC, 0, &req, std::ptr::null_mut());
        }
    }

    // Coarse OS sleep, then spin out the last stretch.
    #[cfg(not(target_os = "linux"))]
    fn hybrid_sleep(&self, duration: Duration) {
        const SPIN: Duration = Duration::from_micros(200);
        let deadline = Instant::now() + duration;
        if duration > SPIN {
            std::thread::sleep(duration - SPIN);
        }
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Timer that only moves when told to. Sleeping advances it by the
/// requested amount, so loops driven by it run without wall-clock waits.
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    now_ns: Arc<AtomicU64>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, d: Duration) {
        self.now_ns.fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Timer for ManualTimer {
    fn now(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }
    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_timer_moves_on_sleep_only() {
        let t = ManualTimer::new();
        assert_eq!(t.now_ms(), 0);
        t.sleep(Duration::from_millis(5));
        assert_eq!(t.now_ms(), 5);
        let shared = t.clone();
        shared.advance_ms(16);
        assert_eq!(t.now_ms(), 21);
        assert_eq!(t.elapsed(5_000_000), Duration::from_millis(16));
    }

    #[test]
    fn high_precision_sleep_waits_at_least_requested() {
        let t = HighPrecisionTimer::new();
        let before = t.now();
        t.sleep(Duration::from_millis(2));
        assert!(t.elapsed(before) >= Duration::from_millis(2));
    }
}
