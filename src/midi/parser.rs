use std::fs;
use std::path::Path;

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

use super::types::{
    Event, EventKind, MidiError, MidiFile, Tick, TimeSignature, TextKind, Track,
};

/// Read and parse a standard MIDI file from disk
pub fn load_midi_file(path: impl AsRef<Path>) -> Result<MidiFile, MidiError> {
    let midi_data = fs::read(path)?;
    parse_midi(&midi_data)
}

/// Parse standard MIDI file bytes into tracks of absolute-tick events
pub fn parse_midi(midi_data: &[u8]) -> Result<MidiFile, MidiError> {
    let smf = Smf::parse(midi_data)?;

    let ticks_per_quarter = match smf.header.timing {
        Timing::Metrical(ticks) => ticks.as_int(),
        Timing::Timecode(fps, subframe) => {
            return Err(MidiError::UnsupportedTiming(format!(
                "SMPTE timecode ({} fps, {} ticks per frame)",
                fps.as_int(),
                subframe
            )))
        }
    };

    let mut tracks = Vec::with_capacity(smf.tracks.len());
    for (track_index, track) in smf.tracks.iter().enumerate() {
        let mut events = Vec::with_capacity(track.len());
        let mut track_time: Tick = 0;
        for event in track {
            track_time += u64::from(event.delta.as_int());
            let kind = convert_kind(event.kind, track_index, track_time)?;
            events.push(Event::new(track_time, kind));
        }
        tracks.push(Track::new(events));
    }

    Ok(MidiFile::new(ticks_per_quarter, tracks))
}

fn convert_kind(
    kind: TrackEventKind<'_>,
    track: usize,
    tick: Tick,
) -> Result<EventKind, MidiError> {
    let kind = match kind {
        TrackEventKind::Midi { channel, message } => {
            let channel = channel.as_int();
            match message {
                MidiMessage::NoteOn { key, vel } => EventKind::NoteOn {
                    channel,
                    pitch: key.as_int(),
                    velocity: vel.as_int(),
                },
                MidiMessage::NoteOff { key, vel } => EventKind::NoteOff {
                    channel,
                    pitch: key.as_int(),
                    velocity: vel.as_int(),
                },
                MidiMessage::Aftertouch { key, vel } => EventKind::NoteAftertouch {
                    channel,
                    pitch: key.as_int(),
                    pressure: vel.as_int(),
                },
                MidiMessage::Controller { controller, value } => EventKind::Controller {
                    channel,
                    controller: controller.as_int(),
                    value: value.as_int(),
                },
                MidiMessage::ProgramChange { program } => EventKind::ProgramChange {
                    channel,
                    program: program.as_int(),
                },
                MidiMessage::ChannelAftertouch { vel } => EventKind::ChannelAftertouch {
                    channel,
                    pressure: vel.as_int(),
                },
                MidiMessage::PitchBend { bend } => EventKind::PitchBend {
                    channel,
                    value: bend.0.as_int(),
                },
            }
        }
        TrackEventKind::SysEx(data) | TrackEventKind::Escape(data) => {
            EventKind::SystemExclusive(data.to_vec())
        }
        TrackEventKind::Meta(meta) => convert_meta(meta, track, tick)?,
    };
    Ok(kind)
}

fn convert_meta(meta: MetaMessage<'_>, track: usize, tick: Tick) -> Result<EventKind, MidiError> {
    let text = |kind: TextKind, data: &[u8]| EventKind::Text {
        kind,
        text: String::from_utf8_lossy(data).into_owned(),
    };

    let kind = match meta {
        MetaMessage::Tempo(mpqn) => EventKind::Tempo {
            mpqn: mpqn.as_int(),
        },
        MetaMessage::TimeSignature(numerator, denominator_pow, metronome_pulse, thirty_seconds) => {
            let denominator = 1u16
                .checked_shl(u32::from(denominator_pow))
                .ok_or_else(|| MidiError::MalformedTempo {
                    track,
                    tick,
                    reason: format!("time signature denominator 2^{}", denominator_pow),
                })?;
            EventKind::TimeSignature(TimeSignature {
                numerator,
                denominator,
                metronome_pulse,
                thirty_seconds_per_quarter: thirty_seconds,
            })
        }
        MetaMessage::Text(data) => text(TextKind::Text, data),
        MetaMessage::Copyright(data) => text(TextKind::Copyright, data),
        MetaMessage::TrackName(data) => text(TextKind::TrackName, data),
        MetaMessage::InstrumentName(data) => text(TextKind::InstrumentName, data),
        MetaMessage::Lyric(data) => text(TextKind::Lyric, data),
        MetaMessage::Marker(data) => text(TextKind::Marker, data),
        MetaMessage::CuePoint(data) => text(TextKind::CuePoint, data),
        MetaMessage::ProgramName(data) => text(TextKind::ProgramName, data),
        MetaMessage::DeviceName(data) => text(TextKind::DeviceName, data),
        MetaMessage::EndOfTrack => EventKind::EndOfTrack,
        MetaMessage::TrackNumber(_) => EventKind::OtherMeta("TrackNumber"),
        MetaMessage::MidiChannel(_) => EventKind::OtherMeta("MidiChannel"),
        MetaMessage::MidiPort(_) => EventKind::OtherMeta("MidiPort"),
        MetaMessage::SmpteOffset(_) => EventKind::OtherMeta("SmpteOffset"),
        MetaMessage::KeySignature(_, _) => EventKind::OtherMeta("KeySignature"),
        MetaMessage::SequencerSpecific(_) => EventKind::OtherMeta("SequencerSpecific"),
        MetaMessage::Unknown(_, _) => EventKind::OtherMeta("Unknown"),
    };
    Ok(kind)
}
