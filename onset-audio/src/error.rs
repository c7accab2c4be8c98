use std::io;

use symphonia::core::errors::Error as SymphoniaError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("missing audio track")]
    MissingTrack,

    #[error("missing sample rate in codec parameters")]
    MissingSampleRate,

    #[error("missing channel layout")]
    MissingChannels,

    #[error("decoder error: {0}")]
    Symphonia(#[from] SymphoniaError),

    #[error("failed to create resampler: {0}")]
    ResamplerSetup(#[from] rubato::ResamplerConstructionError),

    #[error("resample error: {0}")]
    Resample(#[from] rubato::ResampleError),
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no default audio output device")]
    NoDevice,

    #[error("unsupported device sample format {0}")]
    UnsupportedFormat(String),

    #[error("failed to query output configs: {0}")]
    Configs(#[from] cpal::SupportedStreamConfigsError),

    #[error("output device has no {channels}-channel config at {rate} Hz")]
    NoMatchingConfig { rate: u32, channels: u16 },

    #[error("failed to build output stream: {0}")]
    Build(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    Play(#[from] cpal::PlayStreamError),
}
