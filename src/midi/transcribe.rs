//! Adapter around the external wave->notes transcription service.
//!
//! The service is batch-oriented: it writes its output into a directory
//! under a name of its own choosing. The adapter gives each call a
//! dedicated scratch directory, then relocates the produced artifact to
//! the caller's target path. It also resolves which bundled model
//! artifact to use, since the bundle layout has shifted across service
//! versions.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{PipelineError, Result};

/// Known locations of the transcription model artifact, relative to the
/// bundle root, across service versions. Probed in order.
pub const MODEL_ARTIFACT_CANDIDATES: &[&str] = &[
    "saved_models/icassp_2022/nmp.onnx",
    "models/icassp_2022/model.onnx",
    "assets/icassp_2022/model.onnx",
    "nmp.onnx",
];

/// The external wave->notes service.
///
/// Given a waveform file and a model artifact, writes one or more `.mid`
/// files into `output_dir`; the output filenames are implementation
/// defined.
pub trait NoteTranscriber: Send + Sync {
    fn transcribe(
        &self,
        waveform_path: &Path,
        output_dir: &Path,
        model_artifact: &Path,
    ) -> Result<()>;
}

/// Resolves the model artifact inside a bundle root.
///
/// Probes the known candidate locations in order; the first existing file
/// wins. A missing artifact is fatal: transcription is impossible
/// without it, so there is no retry.
pub fn resolve_model_artifact(bundle_root: &Path) -> Result<PathBuf> {
    for candidate in MODEL_ARTIFACT_CANDIDATES {
        let path = bundle_root.join(candidate);
        if path.exists() {
            return Ok(path);
        }
    }

    Err(PipelineError::model_artifact_not_found(format!(
        "No transcription model artifact under {} (tried: {})",
        bundle_root.display(),
        MODEL_ARTIFACT_CANDIDATES.join(", ")
    )))
}

/// Adapts the directory-oriented transcription service to a
/// single-artifact contract.
pub struct TranscriberAdapter {
    service: Box<dyn NoteTranscriber>,
    bundle_root: PathBuf,
}

impl TranscriberAdapter {
    /// Creates an adapter over a transcription service and the model
    /// bundle it should load.
    pub fn new(service: Box<dyn NoteTranscriber>, bundle_root: impl Into<PathBuf>) -> Self {
        Self {
            service,
            bundle_root: bundle_root.into(),
        }
    }

    /// Transcribes a waveform file to a MIDI file at `output_midi_path`.
    ///
    /// The service runs against a scratch directory created next to the
    /// output, so concurrent runs never see each other's artifacts and
    /// the final rename stays on one filesystem. Re-running overwrites
    /// any previous artifact at the target path.
    ///
    /// If the service produced nothing (it found no notes), the requested
    /// path is returned unchanged without creating a file; callers must
    /// check for existence before using it downstream.
    pub fn transcribe(&self, waveform_path: &Path, output_midi_path: &Path) -> Result<PathBuf> {
        let model_artifact = resolve_model_artifact(&self.bundle_root)?;

        let parent = output_midi_path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(|e| {
            PipelineError::artifact_io(format!("Failed to create {}: {}", parent.display(), e))
        })?;

        let scratch = tempfile::Builder::new()
            .prefix(".transcribe-")
            .tempdir_in(parent)
            .map_err(|e| {
                PipelineError::artifact_io(format!("Failed to create scratch directory: {}", e))
            })?;

        self.service
            .transcribe(waveform_path, scratch.path(), &model_artifact)?;

        match newest_midi(scratch.path())? {
            Some(artifact) => {
                std::fs::rename(&artifact, output_midi_path).map_err(|e| {
                    PipelineError::artifact_io(format!(
                        "Failed to move {} to {}: {}",
                        artifact.display(),
                        output_midi_path.display(),
                        e
                    ))
                })?;
                Ok(output_midi_path.to_path_buf())
            }
            None => {
                eprintln!(
                    "Warning: transcription of {} produced no notation artifact",
                    waveform_path.display()
                );
                Ok(output_midi_path.to_path_buf())
            }
        }
    }
}

/// Returns the most recently modified `.mid` file in a directory.
fn newest_midi(dir: &Path) -> Result<Option<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        PipelineError::artifact_io(format!("Failed to read {}: {}", dir.display(), e))
    })?;

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let is_midi = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("mid"))
            .unwrap_or(false);
        if !is_midi {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        if newest.as_ref().map(|(t, _)| modified >= *t).unwrap_or(true) {
            newest = Some((modified, path));
        }
    }

    Ok(newest.map(|(_, path)| path))
}
