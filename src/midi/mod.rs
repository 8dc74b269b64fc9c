/// MIDI playback module: tick/time conversion, per-track dispatch and note
/// extraction.
///
/// This module provides functionality to:
/// - Convert SMF data into immutable tracks of absolute-tick events
/// - Play those events back in real time through a listener
/// - Extract notes with start times and durations under the file's tempo map
mod cursor;
mod export;
mod metronome;
mod notes;
mod parser;
mod processor;
mod timing;
mod types;

pub use cursor::TrackCursor;
pub use export::{export_notes, notes_to_json, notes_to_table};
pub use metronome::Metronome;
pub use notes::{extract_notes, extract_notes_with_tempo};
pub use parser::{load_midi_file, parse_midi};
pub use processor::{
    Clock, ManualClock, MidiEventListener, MidiProcessor, PlaybackState, SystemClock,
};
pub use timing::{
    mpqn_to_bpm, ms_to_ticks, ticks_to_ms, ticks_to_seconds, TempoAnchor, TempoChange,
    TempoMap, DEFAULT_MPQN,
};
pub use types::{
    Channel, Event, EventKind, MetronomeTick, MidiError, MidiFile, MidiNote, Note,
    ShortMessage, TextKind, Tick, TimeSignature, Track,
};
