use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to decode image: {0}")]
    Image(#[from] ::image::ImageError),

    #[error("invalid font data in {0}")]
    InvalidFont(PathBuf),

    #[error("invalid surface size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("frame buffer holds {actual} bytes, expected {expected}")]
    FrameSize { expected: usize, actual: usize },
}
