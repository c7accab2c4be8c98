pub mod config;
pub mod input;
pub mod scheduler;
pub mod sink;
pub mod state;

pub use config::{RunConfig, default_total_duration_ms, frame_timing};
pub use input::{InputEvent, InputQueue, InputSource, Key};
pub use scheduler::{RunOutcome, Scheduler};
pub use sink::{FrameSink, Scene};
pub use state::{ActiveVisual, RunState, StopReason};
