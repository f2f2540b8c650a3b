//! The end-to-end humming-to-music pipeline.
//!
//! Chains the stages in order: transcription, reference rendering,
//! conditioned generation. Each stage's output is fully materialized
//! before the next begins, and all artifacts for a run land in one
//! output directory.

use std::path::{Path, PathBuf};

use crate::audio::{collect_segments, read_wav, stitch_files, write_wav, MasteringChain};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::generation::engine::{EngineFactory, GenerationParams, GenerationRequest};
use crate::generation::orchestrator::GenerationOrchestrator;
use crate::generation::ENGINE_SAMPLE_RATE;
use crate::midi::{fallback_tone, render_to_file, NoteTranscriber, ScoreSynthesizer, TranscriberAdapter};

/// The assembled pipeline with its injected external collaborators.
pub struct HummingPipeline {
    config: PipelineConfig,
    transcriber: TranscriberAdapter,
    synthesizer: Box<dyn ScoreSynthesizer>,
    orchestrator: GenerationOrchestrator,
}

impl HummingPipeline {
    /// Wires the pipeline together. The engine is not built here; the
    /// orchestrator constructs it lazily on the first generation call.
    pub fn new(
        config: PipelineConfig,
        transcriber_service: Box<dyn NoteTranscriber>,
        synthesizer: Box<dyn ScoreSynthesizer>,
        engine_factory: Box<dyn EngineFactory>,
    ) -> Self {
        let transcriber =
            TranscriberAdapter::new(transcriber_service, config.effective_model_path());
        let orchestrator = GenerationOrchestrator::new(engine_factory, config.device);
        Self {
            config,
            transcriber,
            synthesizer,
            orchestrator,
        }
    }

    /// Generates music from a humming recording via symbolic notation:
    /// humming -> Score -> rendered reference -> conditioned generation.
    ///
    /// Returns the path of the generated waveform inside the configured
    /// output directory.
    pub fn run(
        &self,
        humming_wav: &Path,
        out_name: &str,
        style_prompt: &str,
        params: GenerationParams,
    ) -> Result<PathBuf> {
        let out_dir = self.ensure_output_dir()?;
        let stem = Path::new(out_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("generated")
            .to_string();

        let midi_path = self
            .transcriber
            .transcribe(humming_wav, &out_dir.join(format!("{}.mid", stem)))?;

        let reference_path = out_dir.join(format!("{}_reference.wav", stem));
        let conditioning = if midi_path.exists() {
            render_to_file(
                &midi_path,
                &reference_path,
                self.synthesizer.as_ref(),
                ENGINE_SAMPLE_RATE,
            )?
            .into_waveform()
        } else {
            // The transcriber found no notes and created no file; keep
            // the pipeline moving on the deterministic tone instead.
            eprintln!(
                "Warning: no notation for {}, conditioning on fallback tone",
                humming_wav.display()
            );
            let tone = fallback_tone(ENGINE_SAMPLE_RATE);
            write_wav(&tone, &reference_path)?;
            tone
        };

        let request = GenerationRequest {
            conditioning,
            style_prompt: style_prompt.to_string(),
            params,
        };
        let output_path = out_dir.join(out_name);
        self.orchestrator.generate(&request, &output_path)?;
        Ok(output_path)
    }

    /// Generates music conditioning directly on the humming recording,
    /// skipping transcription and rendering.
    pub fn run_direct(
        &self,
        humming_wav: &Path,
        out_name: &str,
        style_prompt: &str,
        params: GenerationParams,
    ) -> Result<PathBuf> {
        let out_dir = self.ensure_output_dir()?;
        let conditioning = read_wav(humming_wav)?;

        let request = GenerationRequest {
            conditioning,
            style_prompt: style_prompt.to_string(),
            params,
        };
        let output_path = out_dir.join(out_name);
        self.orchestrator.generate(&request, &output_path)?;
        Ok(output_path)
    }

    /// Assembles every generated segment in `segment_dir` (lexicographic
    /// order) into one continuous track and masters it.
    pub fn finalize(&self, segment_dir: &Path, out_name: &str) -> Result<PathBuf> {
        let paths = collect_segments(segment_dir)?;
        if paths.is_empty() {
            return Err(PipelineError::precondition(format!(
                "no segments found in {}",
                segment_dir.display()
            )));
        }

        let stitched = stitch_files(&paths, self.config.crossfade_ms)?;
        let mastered = MasteringChain::default().process(&stitched);

        let out_dir = self.ensure_output_dir()?;
        let output_path = out_dir.join(out_name);
        write_wav(&mastered, &output_path)?;
        eprintln!(
            "Assembled {} segments into {}",
            paths.len(),
            output_path.display()
        );
        Ok(output_path)
    }

    fn ensure_output_dir(&self) -> Result<PathBuf> {
        let out_dir = self.config.effective_output_dir();
        std::fs::create_dir_all(&out_dir).map_err(|e| {
            PipelineError::artifact_io(format!("Failed to create {}: {}", out_dir.display(), e))
        })?;
        Ok(out_dir)
    }
}
