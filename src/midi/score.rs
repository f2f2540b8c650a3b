//! The Score model: pitch/velocity/timing independent of audio rendering.
//!
//! A Score is produced once by the transcriber, consumed once by the
//! renderer, and never mutated. Standard MIDI Files are the interchange
//! format with the external transcription service.

use std::collections::HashMap;
use std::path::Path;

use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

use crate::error::{PipelineError, Result};

// Fixed timing used when writing: 480 ticks per quarter at 120 BPM.
const WRITE_PPQ: u16 = 480;
const WRITE_USPQ: u32 = 500_000;

// General MIDI reserves channel 9 for percussion; melodic tracks cycle
// over the remaining channels.
pub(crate) const MELODIC_CHANNELS: [u8; 15] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 10, 11, 12, 13, 14, 15];

/// A single note: bounded pitch and velocity, timed in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    /// MIDI pitch, 0..=127.
    pub pitch: u8,
    /// MIDI velocity, 0..=127.
    pub velocity: u8,
    /// Onset in seconds.
    pub start_time: f64,
    /// Release in seconds; always after the onset.
    pub end_time: f64,
}

impl NoteEvent {
    /// Creates a note, validating its invariants.
    pub fn new(pitch: u8, velocity: u8, start_time: f64, end_time: f64) -> Result<Self> {
        if pitch > 127 {
            return Err(PipelineError::precondition(format!(
                "pitch out of range: {}",
                pitch
            )));
        }
        if velocity > 127 {
            return Err(PipelineError::precondition(format!(
                "velocity out of range: {}",
                velocity
            )));
        }
        if !(start_time >= 0.0 && start_time < end_time) {
            return Err(PipelineError::precondition(format!(
                "note must start before it ends: {}..{}",
                start_time, end_time
            )));
        }
        Ok(Self {
            pitch,
            velocity,
            start_time,
            end_time,
        })
    }

    /// Note duration in seconds.
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// An ordered set of notes played by one instrument.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstrumentTrack {
    /// General MIDI program number.
    pub program: u8,
    /// Notes ordered by onset.
    pub notes: Vec<NoteEvent>,
}

/// An ordered sequence of instrument tracks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Score {
    pub tracks: Vec<InstrumentTrack>,
}

impl Score {
    /// Time of the last release across all tracks, in seconds.
    pub fn end_time(&self) -> f64 {
        self.tracks
            .iter()
            .flat_map(|t| &t.notes)
            .map(|n| n.end_time)
            .fold(0.0, f64::max)
    }

    /// Total number of notes.
    pub fn note_count(&self) -> usize {
        self.tracks.iter().map(|t| t.notes.len()).sum()
    }

    /// True when no track holds any note.
    pub fn is_empty(&self) -> bool {
        self.note_count() == 0
    }

    /// Parses a Standard MIDI File into a Score.
    ///
    /// Tempo changes from all tracks are honored when mapping ticks to
    /// seconds. Note-ons without a matching note-off are dropped, as are
    /// zero-length notes.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            PipelineError::audio_format(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let smf = Smf::parse(&bytes).map_err(|e| {
            PipelineError::audio_format(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        let timebase = Timebase::from_smf(&smf);

        let mut tracks = Vec::new();
        for track in &smf.tracks {
            let mut tick = 0u64;
            let mut program = 0u8;
            let mut notes = Vec::new();
            let mut active: HashMap<(u8, u8), (u64, u8)> = HashMap::new();

            for event in track {
                tick += u64::from(event.delta.as_int());
                if let TrackEventKind::Midi { channel, message } = event.kind {
                    match message {
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            active.insert((channel.as_int(), key.as_int()), (tick, vel.as_int()));
                        }
                        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                            if let Some((start_tick, velocity)) =
                                active.remove(&(channel.as_int(), key.as_int()))
                            {
                                let start_time = timebase.seconds_at(start_tick);
                                let end_time = timebase.seconds_at(tick);
                                if end_time > start_time {
                                    notes.push(NoteEvent {
                                        pitch: key.as_int(),
                                        velocity,
                                        start_time,
                                        end_time,
                                    });
                                }
                            }
                        }
                        MidiMessage::ProgramChange { program: p } => program = p.as_int(),
                        _ => {}
                    }
                }
            }

            if !notes.is_empty() {
                notes.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
                tracks.push(InstrumentTrack { program, notes });
            }
        }

        Ok(Score { tracks })
    }

    /// Writes the Score as a Standard MIDI File (format 1, 120 BPM).
    pub fn save(&self, path: &Path) -> Result<()> {
        let ticks_per_sec = WRITE_PPQ as f64 * 1e6 / WRITE_USPQ as f64;

        // Conductor track carrying the fixed tempo.
        let mut smf_tracks = vec![vec![
            TrackEvent {
                delta: u28::from(0),
                kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::from(WRITE_USPQ))),
            },
            TrackEvent {
                delta: u28::from(0),
                kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
            },
        ]];

        for (index, track) in self.tracks.iter().enumerate() {
            let channel = MELODIC_CHANNELS[index % MELODIC_CHANNELS.len()];

            // (tick, order) pairs; note-offs sort before note-ons at the
            // same tick so re-struck notes are unambiguous.
            let mut timed: Vec<(u64, u8, TrackEventKind)> = Vec::new();
            for note in &track.notes {
                let on_tick = (note.start_time * ticks_per_sec).round() as u64;
                let off_tick = (note.end_time * ticks_per_sec).round() as u64;
                timed.push((
                    on_tick,
                    1,
                    TrackEventKind::Midi {
                        channel: u4::from(channel),
                        message: MidiMessage::NoteOn {
                            key: u7::from(note.pitch),
                            vel: u7::from(note.velocity),
                        },
                    },
                ));
                timed.push((
                    off_tick,
                    0,
                    TrackEventKind::Midi {
                        channel: u4::from(channel),
                        message: MidiMessage::NoteOff {
                            key: u7::from(note.pitch),
                            vel: u7::from(0),
                        },
                    },
                ));
            }
            timed.sort_by_key(|(tick, order, _)| (*tick, *order));

            let mut events = vec![TrackEvent {
                delta: u28::from(0),
                kind: TrackEventKind::Midi {
                    channel: u4::from(channel),
                    message: MidiMessage::ProgramChange {
                        program: u7::from(track.program),
                    },
                },
            }];
            let mut current_tick = 0u64;
            for (tick, _, kind) in timed {
                events.push(TrackEvent {
                    delta: u28::from((tick - current_tick) as u32),
                    kind,
                });
                current_tick = tick;
            }
            events.push(TrackEvent {
                delta: u28::from(0),
                kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
            });
            smf_tracks.push(events);
        }

        let smf = Smf {
            header: Header::new(Format::Parallel, Timing::Metrical(u15::from(WRITE_PPQ))),
            tracks: smf_tracks,
        };

        smf.save(path).map_err(|e| {
            PipelineError::artifact_io(format!("Failed to write {}: {}", path.display(), e))
        })?;
        Ok(())
    }
}

/// Tick-to-seconds mapping for one file.
enum Timebase {
    /// Metrical timing: ticks per quarter plus a tempo map of
    /// (absolute tick, microseconds per quarter), sorted by tick.
    Metrical { ppq: f64, tempos: Vec<(u64, u32)> },
    /// SMPTE timing: a fixed tick length.
    Timecode { secs_per_tick: f64 },
}

impl Timebase {
    fn from_smf(smf: &Smf) -> Self {
        match smf.header.timing {
            Timing::Metrical(ppq) => {
                let mut tempos = Vec::new();
                for track in &smf.tracks {
                    let mut tick = 0u64;
                    for event in track {
                        tick += u64::from(event.delta.as_int());
                        if let TrackEventKind::Meta(MetaMessage::Tempo(uspq)) = event.kind {
                            tempos.push((tick, uspq.as_int()));
                        }
                    }
                }
                tempos.sort_by_key(|(tick, _)| *tick);
                Timebase::Metrical {
                    ppq: f64::from(ppq.as_int()),
                    tempos,
                }
            }
            Timing::Timecode(fps, subframe) => Timebase::Timecode {
                secs_per_tick: 1.0 / (f64::from(fps.as_f32()) * f64::from(subframe)),
            },
        }
    }

    fn seconds_at(&self, tick: u64) -> f64 {
        match self {
            Timebase::Timecode { secs_per_tick } => tick as f64 * secs_per_tick,
            Timebase::Metrical { ppq, tempos } => {
                let mut seconds = 0.0;
                let mut last_tick = 0u64;
                let mut uspq = WRITE_USPQ; // 120 BPM until the first tempo event
                for &(change_tick, change_uspq) in tempos {
                    if change_tick >= tick {
                        break;
                    }
                    seconds += (change_tick - last_tick) as f64 * uspq as f64 / (ppq * 1e6);
                    last_tick = change_tick;
                    uspq = change_uspq;
                }
                seconds + (tick - last_tick) as f64 * uspq as f64 / (ppq * 1e6)
            }
        }
    }
}
