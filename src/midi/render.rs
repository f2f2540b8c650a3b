//! Notes->wave rendering with a deterministic fallback.
//!
//! The renderer turns a Score into the reference waveform that conditions
//! generation. When rendering yields no audio (an empty Score, or an
//! instrument-bank mismatch) a fixed one-second tone is substituted so a
//! conditioning-sensitive engine downstream never receives zero-length
//! audio. The substitution is tagged, never silent.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use rustysynth::{SoundFont, Synthesizer, SynthesizerSettings};

use crate::audio::{write_wav, Waveform};
use crate::error::{PipelineError, Result};
use crate::midi::score::MELODIC_CHANNELS;
use crate::midi::Score;

// Fallback tone: one second of A4 at low amplitude.
const FALLBACK_FREQ_HZ: f32 = 440.0;
const FALLBACK_AMPLITUDE: f32 = 0.1;

// Synthesis block length in frames.
const RENDER_BLOCK: usize = 512;

/// The external notes->wave service: renders a Score to a mono buffer at
/// the requested sample rate. The buffer may be empty.
pub trait ScoreSynthesizer: Send {
    fn render(&self, score: &Score, sample_rate: u32) -> Result<Vec<f32>>;
}

/// SoundFont-backed synthesizer.
pub struct SoundFontSynth {
    sound_font: Arc<SoundFont>,
}

impl SoundFontSynth {
    /// Loads a SoundFont file.
    ///
    /// A missing file is a missing external asset; a file rustysynth
    /// cannot parse is a format error.
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut file = File::open(path).map_err(|e| {
            PipelineError::model_artifact_not_found(format!(
                "SoundFont not found at {}: {}",
                path.display(),
                e
            ))
        })?;
        let sound_font = SoundFont::new(&mut file).map_err(|e| {
            PipelineError::audio_format(format!(
                "Failed to parse SoundFont {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self {
            sound_font: Arc::new(sound_font),
        })
    }
}

impl ScoreSynthesizer for SoundFontSynth {
    /// Renders block-wise, scheduling note on/off events at their frame
    /// positions, and averages the stereo output down to mono.
    fn render(&self, score: &Score, sample_rate: u32) -> Result<Vec<f32>> {
        if score.is_empty() {
            return Ok(Vec::new());
        }

        let settings = SynthesizerSettings::new(sample_rate as i32);
        let mut synthesizer = Synthesizer::new(&self.sound_font, &settings).map_err(|e| {
            PipelineError::audio_format(format!("Failed to create synthesizer: {}", e))
        })?;

        // Event schedule: (frame, note-off-first order, channel, key, velocity).
        let mut events: Vec<(usize, u8, i32, i32, i32)> = Vec::new();
        for (index, track) in score.tracks.iter().enumerate() {
            let channel = MELODIC_CHANNELS[index % MELODIC_CHANNELS.len()] as i32;
            synthesizer.process_midi_message(channel, 0xC0, track.program as i32, 0);
            for note in &track.notes {
                let on = (note.start_time * sample_rate as f64).round() as usize;
                let off = (note.end_time * sample_rate as f64).round() as usize;
                events.push((on, 1, channel, note.pitch as i32, note.velocity as i32));
                events.push((off, 0, channel, note.pitch as i32, 0));
            }
        }
        events.sort_by_key(|&(frame, order, ..)| (frame, order));

        let total_frames = (score.end_time() * sample_rate as f64).ceil() as usize;
        let mut mono = Vec::with_capacity(total_frames);
        let mut left = [0.0f32; RENDER_BLOCK];
        let mut right = [0.0f32; RENDER_BLOCK];

        let mut rendered = 0;
        let mut next_event = 0;
        while rendered < total_frames {
            while next_event < events.len() && events[next_event].0 <= rendered {
                let (_, order, channel, key, velocity) = events[next_event];
                if order == 1 {
                    synthesizer.note_on(channel, key, velocity);
                } else {
                    synthesizer.note_off(channel, key);
                }
                next_event += 1;
            }

            let n = RENDER_BLOCK.min(total_frames - rendered);
            synthesizer.render(&mut left[..n], &mut right[..n]);
            for i in 0..n {
                mono.push((left[i] + right[i]) * 0.5);
            }
            rendered += n;
        }

        Ok(mono)
    }
}

/// Outcome of a render: a genuine rendering, or the deterministic
/// substitute for an empty one. Callers and tests can tell them apart.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    /// The synthesizer produced audio.
    Rendered(Waveform),
    /// The synthesizer produced nothing; the fallback tone was used.
    Fallback(Waveform),
}

impl RenderOutcome {
    /// The waveform, regardless of provenance. Always non-empty.
    pub fn waveform(&self) -> &Waveform {
        match self {
            RenderOutcome::Rendered(w) | RenderOutcome::Fallback(w) => w,
        }
    }

    /// Consumes the outcome, yielding the waveform.
    pub fn into_waveform(self) -> Waveform {
        match self {
            RenderOutcome::Rendered(w) | RenderOutcome::Fallback(w) => w,
        }
    }

    /// True when the fallback tone was substituted.
    pub fn is_fallback(&self) -> bool {
        matches!(self, RenderOutcome::Fallback(_))
    }
}

/// One second of a quiet sine at A4, used whenever rendering yields no
/// audio. Deterministic for a given sample rate.
pub fn fallback_tone(sample_rate: u32) -> Waveform {
    let samples = (0..sample_rate)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            FALLBACK_AMPLITUDE * (2.0 * std::f32::consts::PI * FALLBACK_FREQ_HZ * t).sin()
        })
        .collect();
    Waveform::mono(samples, sample_rate)
}

/// Loads a Score, renders it at `sample_rate`, and writes the result to
/// `output_wave_path`.
///
/// An empty render is absorbed here: the fallback tone is written instead
/// and the outcome is tagged [`RenderOutcome::Fallback`], so downstream
/// stages always receive non-empty audio and observability is preserved.
pub fn render_to_file(
    score_path: &Path,
    output_wave_path: &Path,
    synthesizer: &dyn ScoreSynthesizer,
    sample_rate: u32,
) -> Result<RenderOutcome> {
    let score = Score::load(score_path)?;
    let buffer = synthesizer.render(&score, sample_rate)?;

    let outcome = if buffer.is_empty() {
        eprintln!(
            "Warning: rendering {} produced no audio, substituting fallback tone",
            score_path.display()
        );
        RenderOutcome::Fallback(fallback_tone(sample_rate))
    } else {
        RenderOutcome::Rendered(Waveform::mono(buffer, sample_rate))
    };

    write_wav(outcome.waveform(), output_wave_path)?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::{InstrumentTrack, NoteEvent};
    use tempfile::tempdir;

    /// Emits a constant for the scored duration; empty for empty scores.
    struct ConstantSynth;

    impl ScoreSynthesizer for ConstantSynth {
        fn render(&self, score: &Score, sample_rate: u32) -> Result<Vec<f32>> {
            let frames = (score.end_time() * sample_rate as f64).ceil() as usize;
            Ok(vec![0.25; frames])
        }
    }

    fn save_score(dir: &Path, score: &Score) -> std::path::PathBuf {
        let path = dir.join("score.mid");
        score.save(&path).unwrap();
        path
    }

    #[test]
    fn fallback_tone_is_one_second_and_quiet() {
        let tone = fallback_tone(32000);
        assert_eq!(tone.frames(), 32000);
        assert_eq!(tone.sample_rate(), 32000);
        let peak = tone.channel(0).iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak <= FALLBACK_AMPLITUDE + 1e-6);
        assert!(peak > 0.05);
    }

    #[test]
    fn empty_score_falls_back_to_tone() {
        let dir = tempdir().unwrap();
        let score_path = save_score(dir.path(), &Score::default());
        let wave_path = dir.path().join("reference.wav");

        let outcome =
            render_to_file(&score_path, &wave_path, &ConstantSynth, 32000).unwrap();

        assert!(outcome.is_fallback());
        assert_eq!(outcome.waveform().frames(), 32000);
        assert!(wave_path.exists());
    }

    #[test]
    fn nonempty_score_renders_for_scored_duration() {
        let dir = tempdir().unwrap();
        let score = Score {
            tracks: vec![InstrumentTrack {
                program: 0,
                notes: vec![NoteEvent::new(60, 100, 0.0, 2.0).unwrap()],
            }],
        };
        let score_path = save_score(dir.path(), &score);
        let wave_path = dir.path().join("reference.wav");

        let outcome =
            render_to_file(&score_path, &wave_path, &ConstantSynth, 32000).unwrap();

        assert!(!outcome.is_fallback());
        // 2 seconds at 32kHz, within SMF tick rounding.
        let frames = outcome.waveform().frames() as i64;
        assert!((frames - 64000).abs() <= 64);
    }

    #[test]
    fn missing_soundfont_is_model_artifact_error() {
        let err = SoundFontSynth::from_file(Path::new("/nonexistent/font.sf2")).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ModelArtifactNotFound);
    }
}
