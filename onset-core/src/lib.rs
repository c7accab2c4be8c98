pub mod color;
pub mod event_log;
pub mod sound;
pub mod stimulus;

pub use color::{ColorParseError, Rgba};
pub use event_log::{EventKind, EventLog, EventLogEntry};
pub use sound::PcmBuffer;
pub use stimulus::{StimulusEvent, StimulusKind, Timeline, TimelineError};
