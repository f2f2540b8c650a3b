//! The conditioned-generation engine boundary.
//!
//! The engine itself (sampling, tokenization, attention) is an external
//! collaborator; this module defines the contract the orchestrator holds
//! it to, and the request types that cross the boundary.

use ndarray::ArrayD;
use ort::execution_providers::ExecutionProviderDispatch;

use crate::audio::Waveform;
use crate::config::Device;
use crate::error::Result;

/// Native output sample rate of the generation engine (32 kHz).
pub const ENGINE_SAMPLE_RATE: u32 = 32_000;

/// Call-scoped sampling parameters.
///
/// Configured on the engine per call and never persisted across calls,
/// so concurrent requests cannot interfere with each other's settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    /// Target duration of the generated audio in seconds.
    pub duration_secs: f32,
    /// Top-k sampling cutoff.
    pub top_k: usize,
    /// Sampling temperature.
    pub temperature: f32,
    /// Two-pass classifier-free guidance.
    pub two_step_cfg: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            duration_secs: 15.0,
            top_k: 250,
            temperature: 1.0,
            two_step_cfg: true,
        }
    }
}

/// One conditioned generation call: a style description plus the melody
/// reference that steers it. Constructed fresh per call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Reference audio steering melodic content.
    pub conditioning: Waveform,
    /// Style description handed to the engine.
    pub style_prompt: String,
    /// Sampling parameters for this call only.
    pub params: GenerationParams,
}

/// The external melody-conditioned generation engine.
///
/// Implementations load the model onto a device at construction and are
/// then driven by the orchestrator. The conditioning waveform handed to
/// [`generate_with_melody`](MelodyEngine::generate_with_melody) is always
/// mono at [`sample_rate`](MelodyEngine::sample_rate).
pub trait MelodyEngine: Send {
    /// The engine's native sample rate for both conditioning input and
    /// generated output.
    fn sample_rate(&self) -> u32 {
        ENGINE_SAMPLE_RATE
    }

    /// Applies call-scoped generation parameters.
    fn set_generation_params(&mut self, params: &GenerationParams) -> Result<()>;

    /// Generates one waveform per description, conditioned on the melody.
    ///
    /// Returned tensors are either flat `[samples]` or channeled
    /// `[channels, samples]`; the orchestrator normalizes the shape.
    fn generate_with_melody(
        &mut self,
        descriptions: &[String],
        melody: &Waveform,
    ) -> Result<Vec<ArrayD<f32>>>;
}

/// Constructs engines on a chosen device.
///
/// Injected into the orchestrator so the expensive engine is built
/// exactly once and ambient global state is avoided.
pub trait EngineFactory: Send + Sync {
    fn build(
        &self,
        device: Device,
        providers: &[ExecutionProviderDispatch],
    ) -> Result<Box<dyn MelodyEngine>>;
}
