//! Error types for the humming-to-music pipeline.
//!
//! Defines all error codes and types used throughout the pipeline for
//! consistent error handling and reporting. Recoverable conditions (an
//! empty render) are never represented here; they are absorbed at the
//! component boundary as tagged results instead.

use std::fmt;

/// Error codes surfaced by pipeline operations.
///
/// These codes allow callers to programmatically distinguish failure
/// classes when deciding how to present them to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Malformed or unsupported audio/MIDI input.
    /// Trigger: unreadable WAV, unparseable Standard MIDI File.
    AudioFormat,

    /// Required external model asset missing.
    /// Trigger: no transcription model artifact or SoundFont at any
    /// known location.
    ModelArtifactNotFound,

    /// Generation engine failed to initialize on both the preferred
    /// and the fallback device.
    EngineInit,

    /// Engine inference failed during conditioned generation.
    /// Trigger: runtime failure inside the engine, or an engine
    /// returning output that violates its contract.
    Generation,

    /// Caller handed incompatible inputs to a combining stage.
    /// Trigger: mismatched sample rates or channel counts, empty
    /// segment list, non-positive duration.
    Precondition,

    /// Filesystem failure writing or relocating a pipeline artifact.
    ArtifactIo,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AudioFormat => "AUDIO_FORMAT",
            ErrorCode::ModelArtifactNotFound => "MODEL_ARTIFACT_NOT_FOUND",
            ErrorCode::EngineInit => "ENGINE_INIT_FAILED",
            ErrorCode::Generation => "GENERATION_FAILED",
            ErrorCode::Precondition => "PRECONDITION_VIOLATED",
            ErrorCode::ArtifactIo => "ARTIFACT_IO",
        }
    }

    /// Returns a human-readable description of the error.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::AudioFormat => "Malformed or unsupported audio/MIDI input",
            ErrorCode::ModelArtifactNotFound => "Required external model asset not found",
            ErrorCode::EngineInit => {
                "Generation engine failed to initialize on preferred and fallback device"
            }
            ErrorCode::Generation => "Engine inference failed during generation",
            ErrorCode::Precondition => "Incompatible inputs passed to a pipeline stage",
            ErrorCode::ArtifactIo => "Failed to write or relocate a pipeline artifact",
        }
    }

    /// Returns a recovery hint suggesting how to resolve this error.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCode::AudioFormat => {
                "Re-export the input as a PCM WAV file (any sample rate, mono or stereo) \
                 and check that MIDI files are well-formed"
            }
            ErrorCode::ModelArtifactNotFound => {
                "Install the transcription model bundle (or point HUMGEN_MODEL_PATH at it) \
                 and place a General MIDI SoundFont such as FluidR3_GM.sf2 where \
                 HUMGEN_SOUNDFONT points"
            }
            ErrorCode::EngineInit => {
                "Check accelerator drivers and available memory, or force CPU execution \
                 with HUMGEN_DEVICE=cpu"
            }
            ErrorCode::Generation => {
                "Try a shorter duration or a simpler prompt, and check system memory. \
                 If the issue persists, retry with HUMGEN_DEVICE=cpu"
            }
            ErrorCode::Precondition => {
                "Normalize all inputs to a common sample rate and channel count before \
                 combining them; this indicates a caller bug, not an environment problem"
            }
            ErrorCode::ArtifactIo => {
                "Check free disk space and write permissions on the output directory"
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for pipeline operations.
#[derive(Debug)]
pub struct PipelineError {
    /// The error code identifying the type of error.
    pub code: ErrorCode,
    /// Human-readable error message with context.
    pub message: String,
    /// Optional underlying cause of the error.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl PipelineError {
    /// Creates a new PipelineError with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new PipelineError with an underlying cause.
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an AUDIO_FORMAT error.
    pub fn audio_format(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::AudioFormat, reason)
    }

    /// Creates a MODEL_ARTIFACT_NOT_FOUND error.
    pub fn model_artifact_not_found(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::ModelArtifactNotFound, reason)
    }

    /// Creates an ENGINE_INIT_FAILED error.
    pub fn engine_init(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::EngineInit, reason)
    }

    /// Creates a GENERATION_FAILED error.
    pub fn generation(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::Generation, reason)
    }

    /// Creates a PRECONDITION_VIOLATED error.
    pub fn precondition(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::Precondition, reason)
    }

    /// Creates an ARTIFACT_IO error.
    pub fn artifact_io(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::ArtifactIo, reason)
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}. Recovery: {}",
            self.code,
            self.message,
            self.code.recovery_hint()
        )
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Result type alias using PipelineError.
pub type Result<T> = std::result::Result<T, PipelineError>;
