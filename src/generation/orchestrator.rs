//! Generation orchestration: device binding, lazy engine construction,
//! and format discipline around the engine call.
//!
//! The engine is process-wide shared state. Construction happens under a
//! mutex on first use (the first caller wins and later callers wait)
//! and the handle is reused for the remainder of the process. There is
//! no public reset; construction is idempotent and cached.

use std::path::Path;
use std::sync::Mutex;

use ndarray::{ArrayD, Ix1, Ix2};

use crate::audio::{normalize, write_wav, Waveform};
use crate::config::Device;
use crate::error::{PipelineError, Result};
use crate::generation::device;
use crate::generation::engine::{EngineFactory, GenerationRequest, MelodyEngine};

/// Owns the engine handle and drives conditioned generation.
pub struct GenerationOrchestrator {
    factory: Box<dyn EngineFactory>,
    requested_device: Device,
    engine: Mutex<Option<Box<dyn MelodyEngine>>>,
}

impl GenerationOrchestrator {
    /// Creates an orchestrator that will build its engine on first use.
    pub fn new(factory: Box<dyn EngineFactory>, requested_device: Device) -> Self {
        Self {
            factory,
            requested_device,
            engine: Mutex::new(None),
        }
    }

    /// Builds the engine on the resolved device, retrying exactly once on
    /// CPU when an accelerator build fails. A second failure is fatal.
    fn construct_engine(&self) -> Result<Box<dyn MelodyEngine>> {
        let device = device::resolve(self.requested_device);
        let providers = device::execution_providers(device);

        match self.factory.build(device, &providers) {
            Ok(engine) => {
                eprintln!("Generation engine bound to {}", device);
                Ok(engine)
            }
            Err(err) if device != Device::Cpu => {
                eprintln!(
                    "Warning: engine construction failed on {} ({}), retrying on cpu",
                    device, err
                );
                self.factory.build(Device::Cpu, &[]).map_err(|fallback_err| {
                    PipelineError::engine_init(format!(
                        "engine construction failed on {} and on cpu: {}",
                        device, fallback_err
                    ))
                })
            }
            Err(err) => Err(PipelineError::engine_init(format!(
                "engine construction failed on cpu: {}",
                err
            ))),
        }
    }

    /// Runs one conditioned generation call and persists the result.
    ///
    /// The conditioning waveform is normalized to the engine's native
    /// rate and mono; parameters are applied for this call only; the
    /// engine's output tensor is normalized to an explicit
    /// `(channel=1, samples)` shape and written to `output_path` at the
    /// engine's native rate.
    pub fn generate(&self, request: &GenerationRequest, output_path: &Path) -> Result<Waveform> {
        if !(request.params.duration_secs > 0.0) {
            return Err(PipelineError::precondition(format!(
                "duration must be positive, got {}",
                request.params.duration_secs
            )));
        }

        let mut guard = self
            .engine
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if guard.is_none() {
            *guard = Some(self.construct_engine()?);
        }
        let engine = guard.as_mut().expect("engine constructed above");

        let melody = normalize(&request.conditioning, engine.sample_rate())?;

        engine.set_generation_params(&request.params)?;

        eprintln!(
            "Generating {:.1}s for \"{}\" ({:.1}s conditioning)",
            request.params.duration_secs,
            request.style_prompt,
            melody.duration_secs()
        );

        let mut pieces =
            engine.generate_with_melody(std::slice::from_ref(&request.style_prompt), &melody)?;
        if pieces.is_empty() {
            return Err(PipelineError::generation(
                "engine returned no audio for the requested description",
            ));
        }
        let piece = pieces.swap_remove(0);

        let generated = tensor_to_mono(piece, engine.sample_rate())?;
        write_wav(&generated, output_path)?;

        eprintln!(
            "Generated {:.2}s, saved to {}",
            generated.duration_secs(),
            output_path.display()
        );
        Ok(generated)
    }
}

/// Normalizes an engine output tensor to a mono waveform.
///
/// Accepts a flat `[samples]` sequence or a channeled
/// `[channels, samples]` one; multi-channel output is reduced through the
/// Normalizer, the only component permitted to do so.
fn tensor_to_mono(tensor: ArrayD<f32>, sample_rate: u32) -> Result<Waveform> {
    match tensor.ndim() {
        1 => {
            let flat = tensor
                .into_dimensionality::<Ix1>()
                .map_err(|e| PipelineError::generation(format!("bad engine output: {}", e)))?;
            Ok(Waveform::mono(flat.to_vec(), sample_rate))
        }
        2 => {
            let channeled = tensor
                .into_dimensionality::<Ix2>()
                .map_err(|e| PipelineError::generation(format!("bad engine output: {}", e)))?;
            let channels: Vec<Vec<f32>> =
                channeled.outer_iter().map(|row| row.to_vec()).collect();
            let waveform = Waveform::new(channels, sample_rate)?;
            if waveform.channel_count() == 1 {
                Ok(waveform)
            } else {
                normalize(&waveform, sample_rate)
            }
        }
        n => Err(PipelineError::generation(format!(
            "engine returned a {}-dimensional tensor, expected 1 or 2",
            n
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::engine::{GenerationParams, ENGINE_SAMPLE_RATE};
    use ndarray::{Array1, Array2};
    use ort::execution_providers::ExecutionProviderDispatch;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    /// Produces silence of the requested duration.
    struct SilentEngine {
        duration_secs: f32,
    }

    impl MelodyEngine for SilentEngine {
        fn set_generation_params(&mut self, params: &GenerationParams) -> Result<()> {
            self.duration_secs = params.duration_secs;
            Ok(())
        }

        fn generate_with_melody(
            &mut self,
            descriptions: &[String],
            melody: &Waveform,
        ) -> Result<Vec<ArrayD<f32>>> {
            assert_eq!(melody.channel_count(), 1);
            assert_eq!(melody.sample_rate(), ENGINE_SAMPLE_RATE);
            let frames = (self.duration_secs * ENGINE_SAMPLE_RATE as f32) as usize;
            Ok(descriptions
                .iter()
                .map(|_| Array1::<f32>::zeros(frames).into_dyn())
                .collect())
        }
    }

    struct CountingFactory {
        builds: Arc<AtomicUsize>,
        fail_on_accelerator: bool,
    }

    impl EngineFactory for CountingFactory {
        fn build(
            &self,
            device: Device,
            _providers: &[ExecutionProviderDispatch],
        ) -> Result<Box<dyn MelodyEngine>> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            if self.fail_on_accelerator && device != Device::Cpu {
                return Err(PipelineError::generation("no accelerator"));
            }
            Ok(Box::new(SilentEngine { duration_secs: 0.0 }))
        }
    }

    struct FailingFactory;

    impl EngineFactory for FailingFactory {
        fn build(
            &self,
            _device: Device,
            _providers: &[ExecutionProviderDispatch],
        ) -> Result<Box<dyn MelodyEngine>> {
            Err(PipelineError::generation("driver exploded"))
        }
    }

    fn request(duration_secs: f32) -> GenerationRequest {
        GenerationRequest {
            conditioning: Waveform::mono(vec![0.1; 44100], 44100),
            style_prompt: "calm piano".to_string(),
            params: GenerationParams {
                duration_secs,
                ..GenerationParams::default()
            },
        }
    }

    #[test]
    fn engine_is_constructed_exactly_once() {
        let builds = Arc::new(AtomicUsize::new(0));
        let orchestrator = GenerationOrchestrator::new(
            Box::new(CountingFactory {
                builds: Arc::clone(&builds),
                fail_on_accelerator: false,
            }),
            Device::Cpu,
        );

        let dir = tempdir().unwrap();
        let out_a = dir.path().join("a.wav");
        let out_b = dir.path().join("b.wav");

        let first = orchestrator.generate(&request(15.0), &out_a).unwrap();
        let second = orchestrator.generate(&request(15.0), &out_b).unwrap();

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        // Requested duration within one frame.
        assert!((first.duration_secs() - 15.0).abs() < 1.0 / 32000.0 + 1e-9);
        assert!((second.duration_secs() - 15.0).abs() < 1.0 / 32000.0 + 1e-9);
    }

    #[test]
    fn accelerator_failure_retries_once_on_cpu() {
        let builds = Arc::new(AtomicUsize::new(0));
        let orchestrator = GenerationOrchestrator::new(
            Box::new(CountingFactory {
                builds: Arc::clone(&builds),
                fail_on_accelerator: true,
            }),
            Device::Cuda,
        );

        let dir = tempdir().unwrap();
        let out = dir.path().join("out.wav");
        orchestrator.generate(&request(1.0), &out).unwrap();

        // One failed accelerator build plus one successful CPU build.
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn double_failure_is_engine_init_error() {
        let orchestrator =
            GenerationOrchestrator::new(Box::new(FailingFactory), Device::Cuda);

        let dir = tempdir().unwrap();
        let err = orchestrator
            .generate(&request(1.0), &dir.path().join("out.wav"))
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::EngineInit);
    }

    #[test]
    fn nonpositive_duration_is_rejected() {
        let builds = Arc::new(AtomicUsize::new(0));
        let orchestrator = GenerationOrchestrator::new(
            Box::new(CountingFactory {
                builds,
                fail_on_accelerator: false,
            }),
            Device::Cpu,
        );

        let dir = tempdir().unwrap();
        let err = orchestrator
            .generate(&request(0.0), &dir.path().join("out.wav"))
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::Precondition);
    }

    #[test]
    fn flat_tensor_becomes_mono_waveform() {
        let tensor = Array1::from(vec![0.1f32, 0.2, 0.3]).into_dyn();
        let wave = tensor_to_mono(tensor, 32000).unwrap();
        assert_eq!(wave.channel_count(), 1);
        assert_eq!(wave.frames(), 3);
    }

    #[test]
    fn channeled_tensor_is_reduced_to_mono() {
        let tensor =
            Array2::from_shape_vec((2, 3), vec![0.2f32, 0.4, 0.6, 0.0, 0.0, 0.0])
                .unwrap()
                .into_dyn();
        let wave = tensor_to_mono(tensor, 32000).unwrap();
        assert_eq!(wave.channel_count(), 1);
        assert_eq!(wave.frames(), 3);
        assert!((wave.channel(0)[0] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn higher_rank_tensor_is_rejected() {
        let tensor = ArrayD::<f32>::zeros(ndarray::IxDyn(&[1, 2, 3]));
        assert!(tensor_to_mono(tensor, 32000).is_err());
    }
}
