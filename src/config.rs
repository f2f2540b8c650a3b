//! Pipeline configuration module.
//!
//! Contains the runtime configuration for the humming-to-music pipeline,
//! including execution device selection and artifact path configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};

/// Default crossfade between assembled segments, in milliseconds.
pub const DEFAULT_CROSSFADE_MS: u32 = 2000;

/// Execution device for the generation engine.
///
/// Determines which hardware the engine is constructed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Automatically detect and use the best available device.
    /// Priority: CUDA > CoreML > CPU.
    #[default]
    Auto,

    /// Force CPU execution.
    /// Slowest but universally available; also the fallback target when
    /// engine construction fails on an accelerator.
    Cpu,

    /// Use CUDA for NVIDIA GPU acceleration.
    Cuda,

    /// Use CoreML for Apple Silicon acceleration.
    /// Only available on macOS.
    CoreML,
}

impl Device {
    /// Returns the string representation of the device.
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Auto => "auto",
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
            Device::CoreML => "coreml",
        }
    }

    /// Parses a device from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Some(Device::Auto),
            "cpu" => Some(Device::Cpu),
            "cuda" => Some(Device::Cuda),
            "coreml" | "metal" => Some(Device::CoreML),
            _ => None,
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Runtime configuration for the pipeline.
///
/// Typically loaded from environment variables or a JSON file at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Root directory of the bundled transcription model artifacts.
    /// If None, uses the platform-specific default cache location.
    pub model_path: Option<PathBuf>,

    /// Path to the General MIDI SoundFont used for reference rendering.
    /// If None, uses the platform-specific default data location.
    pub soundfont_path: Option<PathBuf>,

    /// Directory for generated artifacts (MIDI, reference and generated
    /// waveforms). If None, uses the platform-specific default.
    pub output_dir: Option<PathBuf>,

    /// Execution device for the generation engine.
    pub device: Device,

    /// Crossfade applied between assembled segments, in milliseconds.
    pub crossfade_ms: u32,
}

impl PipelineConfig {
    /// Creates a new PipelineConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a PipelineConfig from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `HUMGEN_MODEL_PATH` - Transcription model artifact root
    /// - `HUMGEN_SOUNDFONT` - SoundFont file path
    /// - `HUMGEN_OUTPUT_DIR` - Output directory for artifacts
    /// - `HUMGEN_DEVICE` - Device selection (auto, cpu, cuda, coreml)
    /// - `HUMGEN_CROSSFADE_MS` - Crossfade between stitched segments
    ///
    /// Falls back to defaults for unset variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("HUMGEN_MODEL_PATH") {
            config.model_path = Some(PathBuf::from(path));
        }

        if let Ok(path) = std::env::var("HUMGEN_SOUNDFONT") {
            config.soundfont_path = Some(PathBuf::from(path));
        }

        if let Ok(path) = std::env::var("HUMGEN_OUTPUT_DIR") {
            config.output_dir = Some(PathBuf::from(path));
        }

        if let Ok(device_str) = std::env::var("HUMGEN_DEVICE") {
            if let Some(device) = Device::parse(&device_str) {
                config.device = device;
            }
        }

        if let Ok(ms_str) = std::env::var("HUMGEN_CROSSFADE_MS") {
            if let Ok(ms) = ms_str.parse::<u32>() {
                config.crossfade_ms = ms;
            }
        }

        config
    }

    /// Loads a PipelineConfig from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::artifact_io(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            PipelineError::audio_format(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Returns the effective model artifact root, using platform defaults
    /// if not specified.
    pub fn effective_model_path(&self) -> PathBuf {
        if let Some(ref path) = self.model_path {
            path.clone()
        } else {
            default_model_path()
        }
    }

    /// Returns the effective SoundFont path, using platform defaults if
    /// not specified.
    pub fn effective_soundfont_path(&self) -> PathBuf {
        if let Some(ref path) = self.soundfont_path {
            path.clone()
        } else {
            default_soundfont_path()
        }
    }

    /// Returns the effective output directory, using platform defaults if
    /// not specified.
    pub fn effective_output_dir(&self) -> PathBuf {
        if let Some(ref path) = self.output_dir {
            path.clone()
        } else {
            default_output_dir()
        }
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        // A crossfade of zero is a plain concatenation; anything above
        // a minute is almost certainly a unit mistake.
        if self.crossfade_ms > 60_000 {
            return Some(format!(
                "crossfade_ms too high: {} (max 60000)",
                self.crossfade_ms
            ));
        }

        None
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            soundfont_path: None,
            output_dir: None,
            device: Device::Auto,
            crossfade_ms: DEFAULT_CROSSFADE_MS,
        }
    }
}

/// Returns the platform-specific default transcription model root.
///
/// Uses the `directories` crate to find appropriate locations:
/// - macOS: ~/Library/Caches/humgen/transcriber
/// - Linux: ~/.cache/humgen/transcriber
/// - Windows: C:\Users\<user>\AppData\Local\humgen\cache\transcriber
fn default_model_path() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "humgen") {
        proj_dirs.cache_dir().join("transcriber")
    } else {
        // Fallback to current directory
        PathBuf::from("./models")
    }
}

/// Returns the platform-specific default SoundFont path.
fn default_soundfont_path() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "humgen") {
        proj_dirs.data_dir().join("soundfonts").join("FluidR3_GM.sf2")
    } else {
        PathBuf::from("./soundfonts/FluidR3_GM.sf2")
    }
}

/// Returns the platform-specific default output directory.
fn default_output_dir() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "humgen") {
        proj_dirs.cache_dir().join("generated")
    } else {
        PathBuf::from("./generated")
    }
}
