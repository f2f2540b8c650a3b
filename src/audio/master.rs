//! Mastering chain for finished mixes.
//!
//! A fixed, ordered sequence of effects: gain, then dynamics compression,
//! then reverb. Gain before compression sets the operating point the
//! compressor reacts to; reverb decorates the fully leveled signal last.

use crate::audio::Waveform;

// Freeverb tuning constants (in samples at 44.1kHz).
const COMB_TUNINGS: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];
const ALLPASS_TUNINGS: [usize; 4] = [556, 441, 341, 225];

const FIXED_GAIN: f32 = 0.015;
const SCALE_WET: f32 = 3.0;
const SCALE_DAMPING: f32 = 0.4;
const SCALE_ROOM: f32 = 0.28;
const OFFSET_ROOM: f32 = 0.7;
const DAMPING: f32 = 0.5;

/// Dynamics compressor parameters.
#[derive(Debug, Clone, Copy)]
pub struct CompressorParams {
    /// Level above which gain reduction starts, in dBFS.
    pub threshold_db: f32,
    /// Compression ratio (>= 1.0).
    pub ratio: f32,
    /// Attack time in seconds.
    pub attack_secs: f32,
    /// Release time in seconds.
    pub release_secs: f32,
}

impl Default for CompressorParams {
    fn default() -> Self {
        Self {
            threshold_db: -16.0,
            ratio: 2.5,
            attack_secs: 0.005,
            release_secs: 0.1,
        }
    }
}

/// Reverb parameters.
#[derive(Debug, Clone, Copy)]
pub struct ReverbParams {
    /// Simulated room size in 0.0..=1.0.
    pub room_size: f32,
    /// Wet mix level in 0.0..=1.0.
    pub wet_level: f32,
}

impl Default for ReverbParams {
    fn default() -> Self {
        Self {
            room_size: 0.5,
            wet_level: 0.3,
        }
    }
}

/// The mastering chain: gain -> compressor -> reverb, in that order.
#[derive(Debug, Clone, Copy)]
pub struct MasteringChain {
    /// Additive gain in dB, applied first.
    pub gain_db: f32,
    pub compressor: CompressorParams,
    pub reverb: ReverbParams,
}

impl Default for MasteringChain {
    fn default() -> Self {
        Self {
            gain_db: 3.0,
            compressor: CompressorParams::default(),
            reverb: ReverbParams::default(),
        }
    }
}

impl MasteringChain {
    /// Applies the chain to a waveform, producing a new one.
    ///
    /// Each channel is processed independently. The chain is not
    /// idempotent: applying it twice compounds every stage.
    pub fn process(&self, input: &Waveform) -> Waveform {
        let sample_rate = input.sample_rate();
        let channels = input
            .channels()
            .iter()
            .map(|samples| {
                let gained = apply_gain(samples, self.gain_db);
                let compressed = compress(&gained, &self.compressor, sample_rate);
                apply_reverb(&compressed, &self.reverb, sample_rate)
            })
            .collect();

        Waveform {
            channels,
            sample_rate,
        }
    }
}

fn db_to_amplitude(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

fn amplitude_to_db(amplitude: f32) -> f32 {
    20.0 * amplitude.max(1e-10).log10()
}

/// One-pole smoothing coefficient for a time constant in seconds.
fn time_to_coeff(seconds: f32, sample_rate: u32) -> f32 {
    if seconds <= 0.0 {
        return 0.0;
    }
    (-1.0 / (seconds * sample_rate as f32)).exp()
}

fn apply_gain(samples: &[f32], gain_db: f32) -> Vec<f32> {
    let gain = db_to_amplitude(gain_db);
    samples.iter().map(|s| s * gain).collect()
}

/// Feed-forward compressor with a smoothed gain-reduction envelope.
fn compress(samples: &[f32], params: &CompressorParams, sample_rate: u32) -> Vec<f32> {
    let ratio = params.ratio.max(1.0);
    let attack_coeff = time_to_coeff(params.attack_secs, sample_rate);
    let release_coeff = time_to_coeff(params.release_secs, sample_rate);

    let mut gain_reduction = 0.0f32;
    samples
        .iter()
        .map(|&sample| {
            let input_db = amplitude_to_db(sample.abs());
            let over_db = (input_db - params.threshold_db).max(0.0);
            let target_reduction = over_db * (1.0 - 1.0 / ratio);

            if target_reduction > gain_reduction {
                gain_reduction =
                    attack_coeff * gain_reduction + (1.0 - attack_coeff) * target_reduction;
            } else {
                gain_reduction =
                    release_coeff * gain_reduction + (1.0 - release_coeff) * target_reduction;
            }

            sample * db_to_amplitude(-gain_reduction)
        })
        .collect()
}

/// Comb filter with damped feedback.
struct CombFilter {
    buffer: Vec<f32>,
    index: usize,
    filter_store: f32,
    damp1: f32,
    damp2: f32,
    feedback: f32,
}

impl CombFilter {
    fn new(size: usize, feedback: f32, damping: f32) -> Self {
        Self {
            buffer: vec![0.0; size.max(1)],
            index: 0,
            filter_store: 0.0,
            damp1: damping,
            damp2: 1.0 - damping,
            feedback,
        }
    }

    fn process(&mut self, input: f32) -> f32 {
        let output = self.buffer[self.index];
        self.filter_store = output * self.damp2 + self.filter_store * self.damp1;
        self.buffer[self.index] = input + self.filter_store * self.feedback;
        self.index = (self.index + 1) % self.buffer.len();
        output
    }
}

/// Allpass diffusion filter.
struct AllpassFilter {
    buffer: Vec<f32>,
    index: usize,
}

impl AllpassFilter {
    fn new(size: usize) -> Self {
        Self {
            buffer: vec![0.0; size.max(1)],
            index: 0,
        }
    }

    fn process(&mut self, input: f32) -> f32 {
        let buffered = self.buffer[self.index];
        let output = buffered - input;
        self.buffer[self.index] = input + buffered * 0.5;
        self.index = (self.index + 1) % self.buffer.len();
        output
    }
}

/// Freeverb-style mono reverb: 8 parallel combs into 4 serial allpasses,
/// mixed with the dry signal.
fn apply_reverb(samples: &[f32], params: &ReverbParams, sample_rate: u32) -> Vec<f32> {
    let scale = sample_rate as f32 / 44100.0;
    let feedback = params.room_size.clamp(0.0, 1.0) * SCALE_ROOM + OFFSET_ROOM;
    let damping = DAMPING * SCALE_DAMPING;

    let mut combs: Vec<CombFilter> = COMB_TUNINGS
        .iter()
        .map(|&size| CombFilter::new((size as f32 * scale) as usize, feedback, damping))
        .collect();
    let mut allpasses: Vec<AllpassFilter> = ALLPASS_TUNINGS
        .iter()
        .map(|&size| AllpassFilter::new((size as f32 * scale) as usize))
        .collect();

    let wet = params.wet_level.clamp(0.0, 1.0) * SCALE_WET;
    let dry = 1.0 - params.wet_level.clamp(0.0, 1.0);

    samples
        .iter()
        .map(|&sample| {
            let input = sample * FIXED_GAIN;
            let mut out = 0.0;
            for comb in &mut combs {
                out += comb.process(input);
            }
            for allpass in &mut allpasses {
                out = allpass.process(out);
            }
            out * wet + sample * dry
        })
        .collect()
}
