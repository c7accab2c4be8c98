pub mod channel;
pub mod error;
pub mod lines;

pub use channel::{LineTrigger, SerialTrigger, TriggerChannel, TriggerPort};
pub use error::TriggerError;
pub use lines::TriggerLines;
