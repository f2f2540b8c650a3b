//! WAV file reading and writing.
//!
//! Uses the hound crate. Integer PCM of any bit depth is normalized to
//! f32 in [-1, 1] on read; output is always written as 32-bit float.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::audio::Waveform;
use crate::error::{PipelineError, Result};

/// Reads a WAV file into a [`Waveform`].
///
/// Accepts any channel count, sample rate, and PCM encoding hound can
/// decode. Malformed files surface as `AUDIO_FORMAT` errors.
pub fn read_wav(path: &Path) -> Result<Waveform> {
    let mut reader = WavReader::open(path).map_err(|e| {
        PipelineError::audio_format(format!("Failed to open {}: {}", path.display(), e))
    })?;

    let spec = reader.spec();
    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| {
                PipelineError::audio_format(format!(
                    "Failed to decode {}: {}",
                    path.display(),
                    e
                ))
            })?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| {
                    PipelineError::audio_format(format!(
                        "Failed to decode {}: {}",
                        path.display(),
                        e
                    ))
                })?
        }
    };

    let channel_count = spec.channels as usize;
    if channel_count == 0 {
        return Err(PipelineError::audio_format(format!(
            "{} declares zero channels",
            path.display()
        )));
    }
    let frames = interleaved.len() / channel_count;
    let mut channels = vec![Vec::with_capacity(frames); channel_count];
    for frame in interleaved.chunks_exact(channel_count) {
        for (channel, sample) in channels.iter_mut().zip(frame) {
            channel.push(*sample);
        }
    }

    Waveform::new(channels, spec.sample_rate)
}

/// Writes a [`Waveform`] to a 32-bit float WAV file.
pub fn write_wav(waveform: &Waveform, path: &Path) -> Result<()> {
    let spec = WavSpec {
        channels: waveform.channel_count() as u16,
        sample_rate: waveform.sample_rate(),
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec).map_err(|e| {
        PipelineError::artifact_io(format!("Failed to create {}: {}", path.display(), e))
    })?;

    for frame in 0..waveform.frames() {
        for channel in waveform.channels() {
            writer.write_sample(channel[frame]).map_err(|e| {
                PipelineError::artifact_io(format!("Failed to write sample: {}", e))
            })?;
        }
    }

    writer.finalize().map_err(|e| {
        PipelineError::artifact_io(format!("Failed to finalize {}: {}", path.display(), e))
    })?;

    Ok(())
}
