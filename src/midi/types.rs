use std::fmt;

use serde::{Deserialize, Serialize};

pub type Tick = u64;
pub type Channel = u8;
pub type MidiNote = u8;

/// Errors that can occur while loading, validating or playing a MIDI file
#[derive(Debug, thiserror::Error)]
pub enum MidiError {
    /// IO errors when reading/writing files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors reported by the SMF parser
    #[error("MIDI parsing error: {0}")]
    Parse(#[from] midly::Error),

    /// Only metrical (PPQ) timing is supported
    #[error("Unsupported timing format: {0}")]
    UnsupportedTiming(String),

    /// Operation not allowed in the current playback state
    #[error("Invalid state: {0}")]
    InvalidState(&'static str),

    /// Missing listener or invalid playback configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Tempo or time signature values that would divide by zero
    #[error("Malformed tempo in track {track} at tick {tick}: {reason}")]
    MalformedTempo {
        track: usize,
        tick: Tick,
        reason: String,
    },

    /// Structurally unusable file (e.g. zero resolution)
    #[error("Malformed MIDI file: {0}")]
    MalformedFile(String),

    /// Errors while serializing exported notes
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors while parsing config.toml
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// A musical meter as carried by a time signature meta event.
///
/// `denominator` is the real note value (4 for quarter notes, 8 for eighths),
/// not the power-of-two exponent stored in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u16,
    /// MIDI clocks per metronome click
    pub metronome_pulse: u8,
    /// Notated 32nd notes per 24 MIDI clocks
    pub thirty_seconds_per_quarter: u8,
}

impl TimeSignature {
    pub fn new(numerator: u8, denominator: u16) -> Self {
        Self {
            numerator,
            denominator,
            ..Self::default()
        }
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        TimeSignature {
            numerator: 4,
            denominator: 4,
            metronome_pulse: 24,
            thirty_seconds_per_quarter: 8,
        }
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Payload of the synthetic event emitted on every beat boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetronomeTick {
    /// 1-based beat within the measure
    pub beat: u32,
    /// 0-based measure count since the signature was last set
    pub measure: u32,
    pub signature: TimeSignature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Text,
    Copyright,
    TrackName,
    InstrumentName,
    Lyric,
    Marker,
    CuePoint,
    ProgramName,
    DeviceName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    NoteOn {
        channel: Channel,
        pitch: MidiNote,
        velocity: u8,
    },
    NoteOff {
        channel: Channel,
        pitch: MidiNote,
        velocity: u8,
    },
    NoteAftertouch {
        channel: Channel,
        pitch: MidiNote,
        pressure: u8,
    },
    Controller {
        channel: Channel,
        controller: u8,
        value: u8,
    },
    ProgramChange {
        channel: Channel,
        program: u8,
    },
    ChannelAftertouch {
        channel: Channel,
        pressure: u8,
    },
    /// Raw 14-bit bend value, 8192 is centered
    PitchBend {
        channel: Channel,
        value: u16,
    },
    SystemExclusive(Vec<u8>),
    Tempo {
        mpqn: u32,
    },
    TimeSignature(TimeSignature),
    Text {
        kind: TextKind,
        text: String,
    },
    EndOfTrack,
    OtherMeta(&'static str),
    Metronome(MetronomeTick),
}

/// A single timestamped event of a track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub tick: Tick,
    pub kind: EventKind,
}

impl Event {
    pub fn new(tick: Tick, kind: EventKind) -> Self {
        Self { tick, kind }
    }

    /// Channel of a channel voice event, `None` for meta and sysex events
    pub fn channel(&self) -> Option<Channel> {
        match self.kind {
            EventKind::NoteOn { channel, .. }
            | EventKind::NoteOff { channel, .. }
            | EventKind::NoteAftertouch { channel, .. }
            | EventKind::Controller { channel, .. }
            | EventKind::ProgramChange { channel, .. }
            | EventKind::ChannelAftertouch { channel, .. }
            | EventKind::PitchBend { channel, .. } => Some(channel),
            _ => None,
        }
    }

    /// Wire representation of channel voice events, for forwarding to a port
    pub fn short_message(&self) -> Option<ShortMessage> {
        let (status, data1, data2) = match self.kind {
            EventKind::NoteOff {
                channel,
                pitch,
                velocity,
            } => (0x80 | channel, pitch, velocity),
            EventKind::NoteOn {
                channel,
                pitch,
                velocity,
            } => (0x90 | channel, pitch, velocity),
            EventKind::NoteAftertouch {
                channel,
                pitch,
                pressure,
            } => (0xA0 | channel, pitch, pressure),
            EventKind::Controller {
                channel,
                controller,
                value,
            } => (0xB0 | channel, controller, value),
            EventKind::ProgramChange { channel, program } => (0xC0 | channel, program, 0),
            EventKind::ChannelAftertouch { channel, pressure } => (0xD0 | channel, pressure, 0),
            EventKind::PitchBend { channel, value } => {
                (0xE0 | channel, (value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8)
            }
            _ => return None,
        };
        Some(ShortMessage {
            status,
            data1,
            data2,
        })
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::NoteOn {
                channel,
                pitch,
                velocity,
            } => write!(f, "NoteOn ch={} pitch={} vel={}", channel, pitch, velocity),
            EventKind::NoteOff {
                channel,
                pitch,
                velocity,
            } => write!(f, "NoteOff ch={} pitch={} vel={}", channel, pitch, velocity),
            EventKind::NoteAftertouch {
                channel,
                pitch,
                pressure,
            } => write!(
                f,
                "NoteAftertouch ch={} pitch={} pressure={}",
                channel, pitch, pressure
            ),
            EventKind::Controller {
                channel,
                controller,
                value,
            } => write!(f, "Controller ch={} cc={} value={}", channel, controller, value),
            EventKind::ProgramChange { channel, program } => {
                write!(f, "ProgramChange ch={} program={}", channel, program)
            }
            EventKind::ChannelAftertouch { channel, pressure } => {
                write!(f, "ChannelAftertouch ch={} pressure={}", channel, pressure)
            }
            EventKind::PitchBend { channel, value } => {
                write!(f, "PitchBend ch={} value={}", channel, value)
            }
            EventKind::SystemExclusive(data) => write!(f, "SysEx ({} bytes)", data.len()),
            EventKind::Tempo { mpqn } => write!(f, "Tempo mpqn={}", mpqn),
            EventKind::TimeSignature(sig) => write!(f, "TimeSignature {}", sig),
            EventKind::Text { kind, text } => write!(f, "{:?} \"{}\"", kind, text),
            EventKind::EndOfTrack => write!(f, "EndOfTrack"),
            EventKind::OtherMeta(name) => write!(f, "Meta {}", name),
            EventKind::Metronome(tick) => write!(
                f,
                "Metronome beat={} measure={} ({})",
                tick.beat, tick.measure, tick.signature
            ),
        }
    }
}

/// Status byte plus two data bytes of a channel voice message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortMessage {
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
}

impl ShortMessage {
    /// Bytes as sent on the wire; program change and channel aftertouch carry one data byte
    pub fn to_bytes(&self) -> Vec<u8> {
        match self.status & 0xF0 {
            0xC0 | 0xD0 => vec![self.status, self.data1],
            _ => vec![self.status, self.data1, self.data2],
        }
    }
}

/// An ordered sequence of events, ascending by tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Track {
    events: Vec<Event>,
}

impl Track {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// A parsed MIDI file: resolution plus tracks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiFile {
    resolution: u16,
    tracks: Vec<Track>,
}

impl MidiFile {
    pub fn new(resolution: u16, tracks: Vec<Track>) -> Self {
        Self { resolution, tracks }
    }

    /// Ticks per quarter note
    pub fn resolution(&self) -> u16 {
        self.resolution
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn event_count(&self) -> usize {
        self.tracks.iter().map(Track::len).sum()
    }

    /// Rejects values the tick/time math would divide by.
    ///
    /// # Returns
    /// * `Ok(())` if the file can be played
    /// * `Err(MidiError)` naming the first offending event otherwise
    pub fn validate(&self) -> Result<(), MidiError> {
        if self.resolution == 0 {
            return Err(MidiError::MalformedFile(
                "resolution (ticks per quarter note) must be positive".to_string(),
            ));
        }

        for (track, events) in self.tracks.iter().enumerate() {
            for event in events.events() {
                match &event.kind {
                    EventKind::Tempo { mpqn } if *mpqn == 0 => {
                        return Err(MidiError::MalformedTempo {
                            track,
                            tick: event.tick,
                            reason: "tempo of 0 microseconds per quarter note".to_string(),
                        });
                    }
                    EventKind::TimeSignature(sig) if sig.numerator == 0 || sig.denominator == 0 => {
                        return Err(MidiError::MalformedTempo {
                            track,
                            tick: event.tick,
                            reason: format!("degenerate time signature {}", sig),
                        });
                    }
                    _ => {}
                }
            }
        }

        Ok(())
    }
}

/// A note with resolved wall-clock timing
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Note {
    /// Start time in seconds
    pub start: f64,
    /// Duration in seconds
    pub duration: f64,
    pub pitch: MidiNote,
    pub channel: Channel,
}
