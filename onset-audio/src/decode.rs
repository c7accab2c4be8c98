use std::fs::File;
use std::io;
use std::path::Path;

use onset_core::PcmBuffer;
use onset_core::sound::SAMPLE_RATE;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::DecodeError;

/// Decodes a sound file and converts it to the canonical mixer format.
pub fn decode_file(path: &Path) -> Result<PcmBuffer, DecodeError> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format.default_track().ok_or(DecodeError::MissingTrack)?;
    let track_id = track.id;
    let params = track.codec_params.clone();
    let sample_rate = params.sample_rate.ok_or(DecodeError::MissingSampleRate)?;
    let mut channels = params.channels.map(|c| c.count()).unwrap_or(0);

    let mut decoder =
        symphonia::default::get_codecs().make(&params, &DecoderOptions::default())?;

    let mut interleaved = Vec::<f32>::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(msg)) => {
                tracing::warn!(path = %path.display(), msg, "skipping corrupt packet");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        if channels == 0 {
            channels = spec.channels.count();
        }
        let needs_realloc = sample_buf
            .as_ref()
            .is_none_or(|buf| buf.capacity() < decoded.capacity());
        if needs_realloc {
            sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
        }
        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            interleaved.extend_from_slice(buf.samples());
        }
    }

    if channels == 0 {
        return Err(DecodeError::MissingChannels);
    }

    let pcm = to_canonical(&interleaved, channels, sample_rate)?;
    tracing::debug!(
        path = %path.display(),
        source_rate = sample_rate,
        source_channels = channels,
        duration_ms = pcm.duration_ms(),
        "decoded sound"
    );
    Ok(pcm)
}

const RESAMPLE_CHUNK_FRAMES: usize = 1024;

/// Converts interleaved f32 samples with any channel count and rate to
/// stereo i16 at [`SAMPLE_RATE`]. Mono is duplicated to both sides; extra
/// channels beyond the first two are discarded.
pub fn to_canonical(
    samples: &[f32],
    channels: usize,
    sample_rate: u32,
) -> Result<PcmBuffer, DecodeError> {
    if channels == 0 || sample_rate == 0 {
        return Ok(PcmBuffer::default());
    }

    let mut left = Vec::with_capacity(samples.len() / channels);
    let mut right = Vec::with_capacity(samples.len() / channels);
    for frame in samples.chunks_exact(channels) {
        match frame {
            [mono] => {
                left.push(*mono);
                right.push(*mono);
            }
            [l, r, ..] => {
                left.push(*l);
                right.push(*r);
            }
            [] => {}
        }
    }

    let [left, right] = if sample_rate == SAMPLE_RATE {
        [left, right]
    } else {
        resample(left, right, sample_rate, SAMPLE_RATE)?
    };

    let out = left
        .iter()
        .zip(&right)
        .flat_map(|(l, r)| [to_i16(*l), to_i16(*r)])
        .collect();
    Ok(PcmBuffer::from_interleaved(out))
}

/// Band-limited sinc conversion of a planar stereo signal. The filter delay
/// is trimmed so the output lines up with the input.
fn resample(
    left: Vec<f32>,
    right: Vec<f32>,
    src_rate: u32,
    dst_rate: u32,
) -> Result<[Vec<f32>; 2], DecodeError> {
    let frames = left.len();
    if frames == 0 {
        return Ok([left, right]);
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        oversampling_factor: 128,
        interpolation: SincInterpolationType::Linear,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = dst_rate as f64 / src_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, RESAMPLE_CHUNK_FRAMES, 2)?;

    let delay = resampler.output_delay();
    let expected = (frames as u64 * dst_rate as u64 / src_rate as u64) as usize;
    let mut out = [
        Vec::with_capacity(expected + delay),
        Vec::with_capacity(expected + delay),
    ];

    let mut pos = 0;
    while frames - pos >= RESAMPLE_CHUNK_FRAMES {
        let end = pos + RESAMPLE_CHUNK_FRAMES;
        let input: [&[f32]; 2] = [&left[pos..end], &right[pos..end]];
        let chunk = resampler.process(&input[..], None)?;
        append(&mut out, chunk);
        pos = end;
    }
    if pos < frames {
        let tail: [&[f32]; 2] = [&left[pos..], &right[pos..]];
        let chunk = resampler.process_partial(Some(&tail[..]), None)?;
        append(&mut out, chunk);
    }
    // Push silence through until the delayed tail has come out.
    while out[0].len() < expected + delay {
        let chunk = resampler.process_partial(None::<&[Vec<f32>]>, None)?;
        if chunk[0].is_empty() {
            break;
        }
        append(&mut out, chunk);
    }

    for channel in &mut out {
        channel.drain(..delay.min(channel.len()));
        channel.truncate(expected);
    }
    Ok(out)
}

fn append(out: &mut [Vec<f32>; 2], chunk: Vec<Vec<f32>>) {
    for (dst, src) in out.iter_mut().zip(chunk) {
        dst.extend_from_slice(&src);
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}
