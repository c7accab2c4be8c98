pub mod frames;
pub mod timer;

pub use frames::{CalibrationStats, FrameStatistics};
pub use timer::{HighPrecisionTimer, ManualTimer, Timer};
