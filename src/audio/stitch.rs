//! Segment assembly with crossfades.
//!
//! Concatenates generated segments into one continuous track, joining
//! adjacent segments with an equal-power crossfade so no seam is audible.
//! Segment order is the caller's responsibility; [`collect_segments`]
//! provides the deterministic lexicographic ordering used by the CLI.

use std::path::{Path, PathBuf};

use crate::audio::{read_wav, Waveform};
use crate::error::{PipelineError, Result};

/// Concatenates segments left-to-right with a crossfade between each pair.
///
/// A single segment is returned bit-identical. Each pairwise join shortens
/// the naive concatenation by the crossfade length; a crossfade longer
/// than either operand is clamped to the shorter one. All segments must
/// share one sample rate and channel count; a mismatch is a caller error.
pub fn stitch(segments: &[Waveform], crossfade_ms: u32) -> Result<Waveform> {
    let first = segments
        .first()
        .ok_or_else(|| PipelineError::precondition("stitch requires at least one segment"))?;

    for (i, segment) in segments.iter().enumerate().skip(1) {
        if segment.sample_rate() != first.sample_rate() {
            return Err(PipelineError::precondition(format!(
                "segment {} sample rate {} != {}",
                i,
                segment.sample_rate(),
                first.sample_rate()
            )));
        }
        if segment.channel_count() != first.channel_count() {
            return Err(PipelineError::precondition(format!(
                "segment {} channel count {} != {}",
                i,
                segment.channel_count(),
                first.channel_count()
            )));
        }
    }

    let crossfade_frames = (crossfade_ms as u64 * first.sample_rate() as u64 / 1000) as usize;

    let mut combined = first.clone();
    for segment in &segments[1..] {
        combined = crossfade_pair(&combined, segment, crossfade_frames);
    }
    Ok(combined)
}

/// Loads and stitches WAV files in the given order.
pub fn stitch_files(paths: &[PathBuf], crossfade_ms: u32) -> Result<Waveform> {
    let segments = paths
        .iter()
        .map(|p| read_wav(p))
        .collect::<Result<Vec<_>>>()?;
    stitch(&segments, crossfade_ms)
}

/// Lists the WAV files in a directory, sorted lexicographically by file
/// name. This ordering is deterministic and reproducible across runs.
pub fn collect_segments(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        PipelineError::artifact_io(format!("Failed to read {}: {}", dir.display(), e))
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .map(|ext| ext.eq_ignore_ascii_case("wav"))
                .unwrap_or(false)
        })
        .collect();
    paths.sort_by_key(|p| p.file_name().map(|n| n.to_os_string()));
    Ok(paths)
}

/// Joins two segments, blending `fade` overlapping frames with an
/// equal-power (sin/cos) curve so perceived loudness is conserved across
/// the seam.
fn crossfade_pair(a: &Waveform, b: &Waveform, fade: usize) -> Waveform {
    let fade = fade.min(a.frames()).min(b.frames());
    let keep = a.frames() - fade;

    let channels = a
        .channels()
        .iter()
        .zip(b.channels())
        .map(|(left, right)| {
            let mut out = Vec::with_capacity(keep + right.len());
            out.extend_from_slice(&left[..keep]);
            for i in 0..fade {
                let t = (i as f32 + 0.5) / fade as f32 * std::f32::consts::FRAC_PI_2;
                out.push(left[keep + i] * t.cos() + right[i] * t.sin());
            }
            out.extend_from_slice(&right[fade..]);
            out
        })
        .collect();

    Waveform {
        channels,
        sample_rate: a.sample_rate(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_rejected() {
        let err = stitch(&[], 2000).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::Precondition);
    }

    #[test]
    fn single_segment_is_bit_identical() {
        let a = Waveform::mono(vec![0.1, 0.2, 0.3, 0.4], 32000);
        let out = stitch(&[a.clone()], 2000).unwrap();
        assert_eq!(out, a);
    }

    #[test]
    fn pairwise_join_shortens_by_crossfade() {
        let sample_rate = 1000u32;
        let a = Waveform::mono(vec![0.5; 3000], sample_rate);
        let b = Waveform::mono(vec![0.5; 2000], sample_rate);

        // 500ms crossfade at 1kHz = 500 frames of overlap.
        let out = stitch(&[a, b], 500).unwrap();
        assert_eq!(out.frames(), 3000 + 2000 - 500);
    }

    #[test]
    fn three_segments_fold_left_to_right() {
        let sample_rate = 1000u32;
        let segments = vec![
            Waveform::mono(vec![0.1; 1000], sample_rate),
            Waveform::mono(vec![0.2; 1000], sample_rate),
            Waveform::mono(vec![0.3; 1000], sample_rate),
        ];
        let out = stitch(&segments, 100).unwrap();
        assert_eq!(out.frames(), 3000 - 2 * 100);
    }

    #[test]
    fn crossfade_conserves_steady_level() {
        // Crossfading a constant signal into itself should not dip
        // audibly: equal-power blend of equal levels stays within ~3dB.
        let sample_rate = 1000u32;
        let a = Waveform::mono(vec![0.5; 1000], sample_rate);
        let b = Waveform::mono(vec![0.5; 1000], sample_rate);
        let out = stitch(&[a, b], 500).unwrap();

        for &sample in out.channel(0) {
            assert!(sample >= 0.49, "audible dip at the seam: {}", sample);
            assert!(sample <= 0.5 * std::f32::consts::SQRT_2 + 1e-3);
        }
    }

    #[test]
    fn oversized_crossfade_is_clamped() {
        let sample_rate = 1000u32;
        let a = Waveform::mono(vec![0.5; 300], sample_rate);
        let b = Waveform::mono(vec![0.5; 400], sample_rate);
        // 1s crossfade but only 300 frames available.
        let out = stitch(&[a, b], 1000).unwrap();
        assert_eq!(out.frames(), 300 + 400 - 300);
    }

    #[test]
    fn sample_rate_mismatch_is_precondition_violation() {
        let a = Waveform::mono(vec![0.0; 100], 44100);
        let b = Waveform::mono(vec![0.0; 100], 32000);
        let err = stitch(&[a, b], 10).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::Precondition);
    }

    #[test]
    fn channel_count_mismatch_is_precondition_violation() {
        let a = Waveform::mono(vec![0.0; 100], 32000);
        let b = Waveform::new(vec![vec![0.0; 100], vec![0.0; 100]], 32000).unwrap();
        let err = stitch(&[a, b], 10).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::Precondition);
    }

    #[test]
    fn collect_segments_sorts_lexicographically() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["seg_b.wav", "seg_a.wav", "notes.txt", "seg_c.WAV"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let paths = collect_segments(dir.path()).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["seg_a.wav", "seg_b.wav", "seg_c.WAV"]);
    }
}
