//! Symbolic notation: the Score model, transcription, and rendering.
//!
//! - [`score`]: NoteEvent/InstrumentTrack/Score plus Standard MIDI File I/O
//! - [`piano_roll`]: dense time-quantized inspection representation
//! - [`transcribe`]: adapter around the external wave->notes service
//! - [`render`]: notes->wave rendering with a deterministic fallback

pub mod piano_roll;
pub mod render;
pub mod score;
pub mod transcribe;

// Re-export commonly used items
pub use piano_roll::to_piano_roll;
pub use render::{fallback_tone, render_to_file, RenderOutcome, ScoreSynthesizer, SoundFontSynth};
pub use score::{InstrumentTrack, NoteEvent, Score};
pub use transcribe::{resolve_model_artifact, NoteTranscriber, TranscriberAdapter};
