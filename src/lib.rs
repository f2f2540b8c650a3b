//! humgen: turns a short vocal melody into a finished piece of music.
//!
//! The pipeline chains audio transformation stages (pitch transcription,
//! notes-to-audio rendering, melody-conditioned generation, mastering,
//! and multi-segment assembly) and enforces format invariants (sample
//! rate, channel count, shape) at every boundary. The neural engines are
//! external collaborators injected behind traits.
//!
//! # Modules
//!
//! - [`audio`]: the [`Waveform`](audio::Waveform) value type, WAV I/O,
//!   normalization, mastering, assembly
//! - [`midi`]: the Score model, transcription adapter, reference renderer
//! - [`generation`]: device fallback chain, engine boundary, orchestrator,
//!   end-to-end pipeline
//! - [`config`]: runtime configuration (PipelineConfig, Device)
//! - [`error`]: error codes and types (PipelineError, ErrorCode)
//!
//! # Example
//!
//! ```rust,ignore
//! use humgen::{
//!     config::PipelineConfig,
//!     generation::{GenerationParams, HummingPipeline},
//! };
//!
//! let pipeline = HummingPipeline::new(
//!     PipelineConfig::from_env(),
//!     transcriber_service, // Box<dyn NoteTranscriber>
//!     synthesizer,         // Box<dyn ScoreSynthesizer>
//!     engine_factory,      // Box<dyn EngineFactory>
//! );
//!
//! let out = pipeline.run(
//!     "humming.wav".as_ref(),
//!     "melody_generated.wav",
//!     "gentle pop, calm, piano and light drums",
//!     GenerationParams::default(),
//! )?;
//! ```

pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod generation;
pub mod midi;

// Re-export commonly used types at crate root for convenience
pub use audio::Waveform;
pub use config::{Device, PipelineConfig};
pub use error::{ErrorCode, PipelineError, Result};
pub use generation::{
    EngineFactory, GenerationParams, GenerationRequest, HummingPipeline, MelodyEngine,
    ENGINE_SAMPLE_RATE,
};
pub use midi::{NoteTranscriber, RenderOutcome, Score, ScoreSynthesizer};
