/// The visual currently on screen and when it is due to come down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveVisual {
    pub index: usize,
    pub end_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Completed,
    Quit,
    Escape,
}

impl StopReason {
    pub fn is_completed(&self) -> bool {
        matches!(self, StopReason::Completed)
    }
}

/// Mutable bookkeeping for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    /// Index of the next timeline entry not yet triggered.
    pub cursor: usize,
    pub active: Option<ActiveVisual>,
    pub elapsed_ms: u64,
    pub stop: Option<StopReason>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry consumed, nothing on screen and the minimum duration
    /// reached.
    pub fn is_terminal(&self, timeline_len: usize, total_ms: u64) -> bool {
        self.cursor >= timeline_len && self.active.is_none() && self.elapsed_ms >= total_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_needs_all_three_conditions() {
        let mut s = RunState::new();
        s.cursor = 3;
        s.elapsed_ms = 1000;
        assert!(s.is_terminal(3, 1000));
        assert!(!s.is_terminal(4, 1000));
        assert!(!s.is_terminal(3, 1001));

        s.active = Some(ActiveVisual { index: 2, end_ms: 1200 });
        assert!(!s.is_terminal(3, 1000));
    }
}
