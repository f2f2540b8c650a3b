//! CLI argument parser.
//!
//! Exposes the pipeline stages that need no neural engine: rendering
//! symbolic notation to audio, assembling segments, and mastering a mix.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::DEFAULT_CROSSFADE_MS;
use crate::generation::ENGINE_SAMPLE_RATE;

/// humgen: humming-to-music pipeline utilities
#[derive(Parser, Debug)]
#[command(name = "humgen")]
#[command(about = "Humming-to-music pipeline: render, stitch, and master audio artifacts")]
#[command(version)]
pub struct Cli {
    /// Optional JSON configuration file; environment variables win over it
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render a MIDI file to WAV through the SoundFont synthesizer
    RenderMidi {
        /// Input MIDI file path
        #[arg(long)]
        midi: PathBuf,

        /// Output WAV file path
        #[arg(long)]
        out: PathBuf,

        /// SoundFont file (defaults to the configured General MIDI bank)
        #[arg(long)]
        soundfont: Option<PathBuf>,

        /// Output sample rate in Hz
        #[arg(long, default_value_t = ENGINE_SAMPLE_RATE)]
        sample_rate: u32,
    },

    /// Concatenate generated segments with a crossfade
    Stitch {
        /// Directory of WAV segments, assembled in filename order
        #[arg(long)]
        input_dir: PathBuf,

        /// Output WAV file path
        #[arg(long)]
        out: PathBuf,

        /// Crossfade between adjacent segments in milliseconds
        #[arg(long, default_value_t = DEFAULT_CROSSFADE_MS)]
        crossfade_ms: u32,
    },

    /// Apply the mastering chain (gain, compression, reverb) to a mix
    Master {
        /// Input WAV file path
        #[arg(long)]
        input: PathBuf,

        /// Output WAV file path
        #[arg(long)]
        out: PathBuf,

        /// Additive gain in dB
        #[arg(long, default_value_t = 3.0)]
        gain_db: f32,

        /// Compressor threshold in dBFS
        #[arg(long, default_value_t = -16.0)]
        threshold_db: f32,

        /// Compressor ratio
        #[arg(long, default_value_t = 2.5)]
        ratio: f32,

        /// Reverb room size in 0..=1
        #[arg(long, default_value_t = 0.5)]
        room_size: f32,

        /// Reverb wet level in 0..=1
        #[arg(long, default_value_t = 0.3)]
        wet_level: f32,
    },
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
