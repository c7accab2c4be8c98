use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("invalid trigger line `{0}`, expected 1-8")]
    InvalidLine(char),

    #[error("no trigger lines given")]
    NoLines,

    #[error("failed to open serial port {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: serialport::Error,
    },

    #[error("device did not answer the ping (got {0:?})")]
    Handshake(Option<u8>),

    #[error("serial io error: {0}")]
    Io(#[from] io::Error),
}
