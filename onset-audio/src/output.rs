use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, SupportedStreamConfig, SupportedStreamConfigRange};
use onset_core::sound::{CHANNELS, SAMPLE_RATE};

use crate::error::AudioError;
use crate::mixer::{MixEngine, Mixer};

/// Connection to the default output device. The stream's callback owns a
/// [`MixEngine`] over the given mixer; dropping this stops playback.
pub struct AudioOutput {
    _stream: cpal::Stream,
}

impl AudioOutput {
    pub fn start(mixer: &Mixer) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let supported = select_config(device.supported_output_configs()?)?;
        let config = supported.config();

        let mut engine = MixEngine::new(mixer.clone());
        let stream = match supported.sample_format() {
            SampleFormat::I16 => device.build_output_stream(
                &config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| engine.fill(data),
                stream_error,
                None,
            )?,
            SampleFormat::F32 => device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| engine.fill_f32(data),
                stream_error,
                None,
            )?,
            other => return Err(AudioError::UnsupportedFormat(format!("{other:?}"))),
        };
        stream.play()?;

        tracing::info!(
            device = %device_name,
            rate = SAMPLE_RATE,
            channels = CHANNELS,
            format = ?supported.sample_format(),
            "audio output started"
        );
        Ok(Self { _stream: stream })
    }
}

/// Picks a stereo range covering [`SAMPLE_RATE`] in a format the mix engine
/// writes, preferring i16.
pub fn select_config<I>(ranges: I) -> Result<SupportedStreamConfig, AudioError>
where
    I: IntoIterator<Item = SupportedStreamConfigRange>,
{
    let rate = SampleRate(SAMPLE_RATE);
    let candidates: Vec<_> = ranges
        .into_iter()
        .filter(|r| r.channels() == CHANNELS)
        .filter(|r| r.min_sample_rate() <= rate && rate <= r.max_sample_rate())
        .collect();

    [SampleFormat::I16, SampleFormat::F32]
        .into_iter()
        .find_map(|format| candidates.iter().find(|r| r.sample_format() == format))
        .map(|range| range.clone().with_sample_rate(rate))
        .ok_or(AudioError::NoMatchingConfig {
            rate: SAMPLE_RATE,
            channels: CHANNELS,
        })
}

fn stream_error(err: cpal::StreamError) {
    tracing::error!(%err, "audio stream error");
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        tracing::debug!("stopping audio output stream");
    }
}
