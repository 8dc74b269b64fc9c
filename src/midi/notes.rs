use std::collections::{HashMap, VecDeque};

use tracing::trace;

use super::timing::{TempoAnchor, TempoMap, DEFAULT_MPQN};
use super::types::{Channel, EventKind, MidiFile, MidiNote, Note, Track};

/// Extracts every completed note of `file`, sorted by start time, channel
/// and pitch, assuming 120 BPM until the first tempo event.
///
/// Notes are read from track 1 onward; a single-track file is read as its
/// own note track instead of yielding nothing.
pub fn extract_notes(file: &MidiFile) -> Vec<Note> {
    extract_notes_with_tempo(file, DEFAULT_MPQN)
}

/// Extracts every completed note of `file` with a custom initial tempo.
///
/// Tempo is read from track 0. Notes come from the remaining tracks, or from
/// track 0 itself when the file has a single track. Overlapping notes of the
/// same channel and pitch are closed first-in first-out. Note-offs without a
/// matching note-on, and note-ons never closed, produce nothing.
pub fn extract_notes_with_tempo(file: &MidiFile, default_mpqn: u32) -> Vec<Note> {
    let ticks_per_quarter = file.resolution();
    let tempo_map = TempoMap::from_track(file.tracks().first(), ticks_per_quarter, default_mpqn);

    let note_tracks = if file.track_count() > 1 {
        &file.tracks()[1..]
    } else {
        file.tracks()
    };

    let mut notes: Vec<Note> = note_tracks
        .iter()
        .flat_map(|track| track_notes(track, &tempo_map))
        .collect();

    notes.sort_by(|a, b| {
        a.start
            .total_cmp(&b.start)
            .then(a.channel.cmp(&b.channel))
            .then(a.pitch.cmp(&b.pitch))
    });
    notes
}

fn track_notes(track: &Track, tempo_map: &TempoMap) -> Vec<Note> {
    let ticks_per_quarter = tempo_map.ticks_per_quarter;
    let mut breakpoints = tempo_map.breakpoints().iter().peekable();
    let mut anchor = match breakpoints.next() {
        Some(first) => TempoAnchor::new(first.tempo),
        None => TempoAnchor::new(DEFAULT_MPQN),
    };

    let mut open_notes: HashMap<(Channel, MidiNote), VecDeque<f64>> = HashMap::new();
    let mut notes = Vec::new();

    for event in track.events() {
        while let Some(change) = breakpoints.next_if(|change| change.tick <= event.tick) {
            anchor = anchor.repin(change.tick, change.tempo, ticks_per_quarter);
        }

        let (channel, pitch, opens) = match event.kind {
            EventKind::NoteOn {
                channel,
                pitch,
                velocity,
            } => (channel, pitch, velocity > 0),
            EventKind::NoteOff { channel, pitch, .. } => (channel, pitch, false),
            _ => continue,
        };

        let time = anchor.seconds_at(event.tick as f64, ticks_per_quarter);
        if opens {
            open_notes.entry((channel, pitch)).or_default().push_back(time);
            continue;
        }

        match open_notes.get_mut(&(channel, pitch)).and_then(VecDeque::pop_front) {
            Some(start) => notes.push(Note {
                start,
                duration: time - start,
                pitch,
                channel,
            }),
            None => trace!(tick = event.tick, channel, pitch, "Unmatched note off"),
        }
    }

    notes
}
