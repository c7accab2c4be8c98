pub mod decode;
pub mod error;
pub mod mixer;
pub mod output;

pub use decode::decode_file;
pub use error::{AudioError, DecodeError};
pub use mixer::{MAX_ACTIVE_SOUNDS, MixEngine, Mixer, MixerSlot};
pub use output::AudioOutput;
