//! Dense piano-roll view of a Score.
//!
//! Inspection and testing aid; the main pipeline never consumes it.

use ndarray::Array2;

use crate::midi::Score;

/// Quantizes a Score onto a `[128 pitches x frames]` grid at `frame_rate`
/// frames per second. A cell holds `velocity / 127` while its note is
/// active, 0 otherwise.
pub fn to_piano_roll(score: &Score, frame_rate: u32) -> Array2<f32> {
    let frames = (score.end_time() * frame_rate as f64) as usize + 1;
    let mut roll = Array2::<f32>::zeros((128, frames));

    for track in &score.tracks {
        for note in &track.notes {
            let start = (note.start_time * frame_rate as f64) as usize;
            let end = ((note.end_time * frame_rate as f64) as usize).min(frames);
            let level = note.velocity as f32 / 127.0;
            for frame in start..end {
                roll[[note.pitch as usize, frame]] = level;
            }
        }
    }

    roll
}
