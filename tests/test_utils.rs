// Test utilities and common constants
//
// This file provides shared utilities used across multiple test files.
// It centralizes MIDI fixtures, a recording listener and engine setup to
// avoid duplication and ensure consistency across tests.
//
// The utilities include:
// - In-memory standard MIDI files written with midly, so no binary fixtures are needed
// - midly event constructors (note on/off, tempo, time signature)
// - Helpers that build `MidiFile` values directly
// - A listener that records every callback

use midi_processor::config::PlaybackConfig;
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use midi_processor::midi::{
    Event, EventKind, ManualClock, MidiEventListener, MidiFile, MidiProcessor, Tick,
    TimeSignature, Track,
};

/// Resolution used by most fixtures
pub const PPQ: u16 = 480;

/// Listener that records every callback in order
#[derive(Debug, Default)]
pub struct Recorder {
    pub events: Vec<Event>,
    pub starts: Vec<bool>,
    pub stops: Vec<bool>,
}

impl MidiEventListener for Recorder {
    fn on_event(&mut self, event: &Event) {
        self.events.push(event.clone());
    }

    fn on_start(&mut self, from_beginning: bool) {
        self.starts.push(from_beginning);
    }

    fn on_stop(&mut self, finished: bool) {
        self.stops.push(finished);
    }
}

#[allow(dead_code)]
impl Recorder {
    /// Recorded events without the synthetic metronome ticks
    pub fn file_events(&self) -> Vec<Event> {
        self.events
            .iter()
            .filter(|event| !matches!(event.kind, EventKind::Metronome(_)))
            .cloned()
            .collect()
    }

    /// Beat numbers of the recorded metronome ticks
    pub fn beats(&self) -> Vec<u32> {
        self.events
            .iter()
            .filter_map(|event| match event.kind {
                EventKind::Metronome(tick) => Some(tick.beat),
                _ => None,
            })
            .collect()
    }
}

/// Engine on a manual clock with a recorder attached and `file` loaded.
///
/// # Panics
/// * If the file is rejected by `load`
#[allow(dead_code)]
pub fn loaded_processor(file: &MidiFile) -> (MidiProcessor<'_, Recorder, ManualClock>, ManualClock) {
    let clock = ManualClock::new();
    let mut processor = MidiProcessor::with_clock(PlaybackConfig::default(), clock.clone());
    processor.set_listener(Recorder::default());
    processor.load(file).expect("Failed to load MIDI file");
    (processor, clock)
}

/// Recorder of a processor, which always has one in these tests
#[allow(dead_code)]
pub fn recorder<'p>(processor: &'p MidiProcessor<'_, Recorder, ManualClock>) -> &'p Recorder {
    processor.listener().expect("listener is set")
}

#[allow(dead_code)]
pub fn note_on(tick: Tick, channel: u8, pitch: u8, velocity: u8) -> Event {
    Event::new(
        tick,
        EventKind::NoteOn {
            channel,
            pitch,
            velocity,
        },
    )
}

#[allow(dead_code)]
pub fn note_off(tick: Tick, channel: u8, pitch: u8) -> Event {
    Event::new(
        tick,
        EventKind::NoteOff {
            channel,
            pitch,
            velocity: 0,
        },
    )
}

#[allow(dead_code)]
pub fn tempo(tick: Tick, mpqn: u32) -> Event {
    Event::new(tick, EventKind::Tempo { mpqn })
}

#[allow(dead_code)]
pub fn time_signature(tick: Tick, numerator: u8, denominator: u16) -> Event {
    Event::new(
        tick,
        EventKind::TimeSignature(TimeSignature::new(numerator, denominator)),
    )
}

/// File with the given tracks at the default resolution
#[allow(dead_code)]
pub fn midi_file(tracks: Vec<Vec<Event>>) -> MidiFile {
    MidiFile::new(PPQ, tracks.into_iter().map(Track::new).collect())
}

/// A midly event kind at an absolute tick, for `smf_bytes`
pub type RawEvent = (Tick, TrackEventKind<'static>);

fn raw_midi(tick: Tick, channel: u8, message: MidiMessage) -> RawEvent {
    (
        tick,
        TrackEventKind::Midi {
            channel: u4::new(channel),
            message,
        },
    )
}

#[allow(dead_code)]
pub fn raw_note_on(tick: Tick, channel: u8, pitch: u8, velocity: u8) -> RawEvent {
    raw_midi(
        tick,
        channel,
        MidiMessage::NoteOn {
            key: u7::new(pitch),
            vel: u7::new(velocity),
        },
    )
}

#[allow(dead_code)]
pub fn raw_note_off(tick: Tick, channel: u8, pitch: u8) -> RawEvent {
    raw_midi(
        tick,
        channel,
        MidiMessage::NoteOff {
            key: u7::new(pitch),
            vel: u7::new(0x40),
        },
    )
}

#[allow(dead_code)]
pub fn raw_tempo(tick: Tick, mpqn: u32) -> RawEvent {
    (tick, TrackEventKind::Meta(MetaMessage::Tempo(u24::new(mpqn))))
}

/// Time signature with the denominator given as a power of two, as stored on disk
#[allow(dead_code)]
pub fn raw_time_signature(tick: Tick, numerator: u8, denominator_pow: u8) -> RawEvent {
    (
        tick,
        TrackEventKind::Meta(MetaMessage::TimeSignature(numerator, denominator_pow, 24, 8)),
    )
}

#[allow(dead_code)]
pub fn raw_track_name(tick: Tick, name: &'static str) -> RawEvent {
    (tick, TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes())))
}

/// Encode a standard MIDI file with metrical timing.
///
/// Each track's events must be ascending by tick; an end-of-track event is
/// appended at the tick of the last event.
pub fn smf_bytes(resolution: u16, tracks: &[Vec<RawEvent>]) -> Vec<u8> {
    smf_bytes_with_timing(Timing::Metrical(u15::new(resolution)), tracks)
}

/// Encode a standard MIDI file with the given header timing
#[allow(dead_code)]
pub fn smf_bytes_with_timing(timing: Timing, tracks: &[Vec<RawEvent>]) -> Vec<u8> {
    let format = if tracks.len() > 1 {
        Format::Parallel
    } else {
        Format::SingleTrack
    };

    let tracks = tracks
        .iter()
        .map(|events| {
            let mut track = Vec::with_capacity(events.len() + 1);
            let mut last_tick = 0;
            for (tick, kind) in events {
                track.push(TrackEvent {
                    delta: u28::new((tick - last_tick) as u32),
                    kind: *kind,
                });
                last_tick = *tick;
            }
            track.push(TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
            });
            track
        })
        .collect();

    let smf = Smf {
        header: Header::new(format, timing),
        tracks,
    };
    let mut bytes = Vec::new();
    smf.write_std(&mut bytes)
        .expect("Failed to write MIDI fixture");
    bytes
}

/// Absolute-difference float comparison used throughout the tests
#[allow(dead_code)]
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// Test that verifies the fixture writer produces files midly reads back.
///
/// This meta-test ensures the in-memory files other tests rely on keep their
/// header timing and absolute ticks before the crate's parser sees them.
#[test]
fn test_smf_fixture_round_trip() {
    let bytes = smf_bytes(
        PPQ,
        &[vec![raw_note_on(0, 0, 60, 100), raw_note_off(240, 0, 60)]],
    );
    let smf = Smf::parse(&bytes).expect("fixture parses");

    assert_eq!(smf.header.format, Format::SingleTrack);
    assert_eq!(smf.header.timing, Timing::Metrical(u15::new(PPQ)));
    assert_eq!(smf.tracks.len(), 1);
    let deltas: Vec<u32> = smf.tracks[0].iter().map(|e| e.delta.as_int()).collect();
    assert_eq!(deltas, vec![0, 240, 0]);
    assert_eq!(
        smf.tracks[0][2].kind,
        TrackEventKind::Meta(MetaMessage::EndOfTrack)
    );
}
