use std::thread;
use std::time::Duration;

use tracing::info;

use crate::config::PlaybackConfig;
use crate::midi::{MidiError, MidiEventListener, MidiFile, MidiProcessor, TempoMap};

/// Portion of a song to play, in seconds of song time
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayRange {
    pub from: Option<f64>,
    pub until: Option<f64>,
}

/// Blocking host loop that polls a [`MidiProcessor`] on a fixed tick
pub struct SongPlayer {
    config: PlaybackConfig,
}

impl SongPlayer {
    pub fn new(config: PlaybackConfig) -> Self {
        Self { config }
    }

    /// Plays `file` through `listener` until the song ends, `range.until`
    /// is reached or `should_stop` returns true, then hands the listener back.
    pub fn play<L, F>(
        &self,
        file: &MidiFile,
        listener: L,
        range: PlayRange,
        mut should_stop: F,
    ) -> Result<L, MidiError>
    where
        L: MidiEventListener,
        F: FnMut() -> bool,
    {
        let mut processor = MidiProcessor::new(self.config.clone());
        processor.set_listener(listener);
        processor.load(file)?;
        processor.start()?;

        if let Some(from) = range.from {
            info!(from, "Seeking");
            processor.process_to(from);
        }

        let host_tick = Duration::from_millis(self.config.host_tick_ms);
        while processor.is_running() {
            if should_stop() {
                processor.stop();
                break;
            }

            thread::sleep(host_tick);
            processor.process();

            if let Some(until) = range.until {
                if processor.is_running() && processor.position_seconds() >= until {
                    processor.stop();
                }
            }
        }

        processor
            .take_listener()
            .ok_or(MidiError::InvalidState("listener was removed during playback"))
    }
}

/// Total length of `file` in milliseconds, up to its last event
pub fn song_duration_ms(file: &MidiFile, default_mpqn: u32) -> u64 {
    let tempo_map = TempoMap::from_track(file.tracks().first(), file.resolution(), default_mpqn);
    let last_tick = file
        .tracks()
        .iter()
        .filter_map(|track| track.events().last())
        .map(|event| event.tick)
        .max()
        .unwrap_or(0);
    (tempo_map.seconds_at(last_tick) * 1000.0) as u64
}

pub fn format_time(ms: u64) -> String {
    let total_seconds = ms / 1000;
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}", minutes, seconds)
}
