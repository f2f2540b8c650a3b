//! humgen: humming-to-music pipeline utilities.
//!
//! The binary drives the pipeline stages that require no neural engine:
//! MIDI rendering, segment assembly, and mastering. The full
//! humming-to-music run is a library API ([`humgen::HummingPipeline`])
//! over injected transcription and generation services.

use std::path::Path;

use humgen::audio::{read_wav, stitch_files, write_wav, CompressorParams, MasteringChain, ReverbParams};
use humgen::cli::{Cli, Command};
use humgen::config::PipelineConfig;
use humgen::error::Result;
use humgen::midi::{render_to_file, SoundFontSynth};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse_args();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::new(),
    };
    apply_env(&mut config);

    if let Some(problem) = config.validate() {
        return Err(humgen::error::PipelineError::precondition(problem));
    }

    match cli.command {
        Command::RenderMidi {
            midi,
            out,
            soundfont,
            sample_rate,
        } => run_render_midi(&config, &midi, &out, soundfont.as_deref(), sample_rate),
        Command::Stitch {
            input_dir,
            out,
            crossfade_ms,
        } => run_stitch(&input_dir, &out, crossfade_ms),
        Command::Master {
            input,
            out,
            gain_db,
            threshold_db,
            ratio,
            room_size,
            wet_level,
        } => run_master(&input, &out, gain_db, threshold_db, ratio, room_size, wet_level),
    }
}

/// Overlays set environment variables onto the loaded configuration.
fn apply_env(config: &mut PipelineConfig) {
    let env = PipelineConfig::from_env();
    if env.soundfont_path.is_some() {
        config.soundfont_path = env.soundfont_path;
    }
    if env.model_path.is_some() {
        config.model_path = env.model_path;
    }
    if env.output_dir.is_some() {
        config.output_dir = env.output_dir;
    }
    if std::env::var("HUMGEN_DEVICE").is_ok() {
        config.device = env.device;
    }
    if std::env::var("HUMGEN_CROSSFADE_MS").is_ok() {
        config.crossfade_ms = env.crossfade_ms;
    }
}

fn run_render_midi(
    config: &PipelineConfig,
    midi: &Path,
    out: &Path,
    soundfont: Option<&Path>,
    sample_rate: u32,
) -> Result<()> {
    let soundfont_path = soundfont
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.effective_soundfont_path());

    eprintln!("Rendering {} at {}Hz", midi.display(), sample_rate);
    let synth = SoundFontSynth::from_file(&soundfont_path)?;
    let outcome = render_to_file(midi, out, &synth, sample_rate)?;

    if outcome.is_fallback() {
        eprintln!("Rendered fallback tone (score was empty)");
    }
    eprintln!(
        "Saved {:.2}s to {}",
        outcome.waveform().duration_secs(),
        out.display()
    );
    Ok(())
}

fn run_stitch(input_dir: &Path, out: &Path, crossfade_ms: u32) -> Result<()> {
    let paths = humgen::audio::collect_segments(input_dir)?;
    eprintln!(
        "Stitching {} segments with {}ms crossfade",
        paths.len(),
        crossfade_ms
    );

    let combined = stitch_files(&paths, crossfade_ms)?;
    write_wav(&combined, out)?;
    eprintln!("Saved {:.2}s to {}", combined.duration_secs(), out.display());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_master(
    input: &Path,
    out: &Path,
    gain_db: f32,
    threshold_db: f32,
    ratio: f32,
    room_size: f32,
    wet_level: f32,
) -> Result<()> {
    let chain = MasteringChain {
        gain_db,
        compressor: CompressorParams {
            threshold_db,
            ratio,
            ..CompressorParams::default()
        },
        reverb: ReverbParams {
            room_size,
            wet_level,
        },
    };

    eprintln!("Mastering {}", input.display());
    let mix = read_wav(input)?;
    let mastered = chain.process(&mix);
    write_wav(&mastered, out)?;
    eprintln!("Saved {:.2}s to {}", mastered.duration_secs(), out.display());
    Ok(())
}
