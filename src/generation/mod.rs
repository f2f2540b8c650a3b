//! Conditioned music generation.
//!
//! - [`device`]: accelerator probe chain and execution providers
//! - [`engine`]: the external engine boundary and request types
//! - [`orchestrator`]: lazy engine construction and format discipline
//! - [`pipeline`]: the end-to-end humming-to-music run

pub mod device;
pub mod engine;
pub mod orchestrator;
pub mod pipeline;

// Re-export commonly used items
pub use engine::{
    EngineFactory, GenerationParams, GenerationRequest, MelodyEngine, ENGINE_SAMPLE_RATE,
};
pub use orchestrator::GenerationOrchestrator;
pub use pipeline::HummingPipeline;
