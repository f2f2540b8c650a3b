//! Waveform canonicalization.
//!
//! Every stage that consumes raw audio routes it through [`normalize`]
//! first: channels are averaged down to mono and the signal is resampled
//! to the requested rate. This is the only place in the pipeline allowed
//! to change a waveform's sample rate or channel count.

use rubato::{FftFixedIn, Resampler};

use crate::audio::Waveform;
use crate::error::{PipelineError, Result};

// Resampler chunking (balanced quality/speed).
const CHUNK_SIZE: usize = 1024;
const SUB_CHUNKS: usize = 2;

/// Canonicalizes a waveform to mono at `target_sample_rate`.
///
/// Multi-channel input is reduced by a sample-wise mean. A rate mismatch
/// is resolved with FFT-based resampling; output duration matches input
/// duration scaled by the rate ratio, within one sample.
pub fn normalize(input: &Waveform, target_sample_rate: u32) -> Result<Waveform> {
    if target_sample_rate == 0 {
        return Err(PipelineError::precondition(
            "target sample rate must be positive",
        ));
    }

    let mono = mixdown(input);
    if mono.sample_rate() == target_sample_rate {
        return Ok(mono);
    }

    let resampled = resample(mono.channel(0), mono.sample_rate(), target_sample_rate)?;
    Ok(Waveform::mono(resampled, target_sample_rate))
}

/// Averages all channels into one. Mono input is returned as-is.
fn mixdown(input: &Waveform) -> Waveform {
    if input.channel_count() == 1 {
        return input.clone();
    }

    let scale = 1.0 / input.channel_count() as f32;
    let mut samples = vec![0.0f32; input.frames()];
    for channel in input.channels() {
        for (acc, sample) in samples.iter_mut().zip(channel) {
            *acc += sample;
        }
    }
    for sample in &mut samples {
        *sample *= scale;
    }

    Waveform::mono(samples, input.sample_rate())
}

/// Resamples a mono buffer from `source_rate` to `target_rate`.
///
/// Processes fixed-size chunks, zero-padding the tail, then truncates to
/// the expected frame count so the duration ratio holds exactly.
fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let mut resampler = FftFixedIn::<f32>::new(
        source_rate as usize,
        target_rate as usize,
        CHUNK_SIZE,
        SUB_CHUNKS,
        1,
    )
    .map_err(|e| PipelineError::audio_format(format!("Failed to create resampler: {}", e)))?;

    let expected_frames =
        (samples.len() as f64 * target_rate as f64 / source_rate as f64).round() as usize;

    let mut output = Vec::with_capacity(expected_frames + CHUNK_SIZE);
    let mut pos = 0;
    while pos < samples.len() || output.len() < expected_frames {
        let needed = resampler.input_frames_next();
        let mut chunk = vec![0.0f32; needed];
        if pos < samples.len() {
            let n = (samples.len() - pos).min(needed);
            chunk[..n].copy_from_slice(&samples[pos..pos + n]);
        }
        pos += needed;

        let processed = resampler
            .process(&[chunk], None)
            .map_err(|e| PipelineError::audio_format(format!("Resampling failed: {}", e)))?;
        output.extend_from_slice(&processed[0]);
    }

    output.truncate(expected_frames);
    Ok(output)
}
