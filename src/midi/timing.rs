use super::types::{EventKind, Tick, Track};

/// 120 BPM
pub const DEFAULT_MPQN: u32 = 500_000;

const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Seconds covered by `ticks` at a constant tempo
pub fn ticks_to_seconds(ticks: f64, mpqn: u32, ticks_per_quarter: u16) -> f64 {
    ticks * mpqn as f64 / ticks_per_quarter as f64 / MICROS_PER_SECOND
}

/// Ticks covered by `ms` milliseconds at a constant tempo
pub fn ms_to_ticks(ms: f64, mpqn: u32, ticks_per_quarter: u16) -> f64 {
    ms * 1000.0 * ticks_per_quarter as f64 / mpqn as f64
}

pub fn mpqn_to_bpm(mpqn: u32) -> f64 {
    60.0 * MICROS_PER_SECOND / mpqn as f64
}

/// The (tick, time) pair pinned at the last tempo change, with the tempo in
/// force from that point on.
///
/// Any later tick in the same tempo regime converts to absolute time without
/// replaying earlier segments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoAnchor {
    pub tick: f64,
    pub seconds: f64,
    pub mpqn: u32,
}

impl TempoAnchor {
    /// Anchor at (0, 0s) with the given initial tempo
    pub fn new(mpqn: u32) -> Self {
        Self {
            tick: 0.0,
            seconds: 0.0,
            mpqn,
        }
    }

    pub fn seconds_at(&self, tick: f64, ticks_per_quarter: u16) -> f64 {
        self.seconds + ticks_to_seconds(tick - self.tick, self.mpqn, ticks_per_quarter)
    }

    pub fn ticks_at(&self, seconds: f64, ticks_per_quarter: u16) -> f64 {
        self.tick + ms_to_ticks((seconds - self.seconds) * 1000.0, self.mpqn, ticks_per_quarter)
    }

    /// Pins a new anchor at `tick` for a switch to `mpqn`.
    ///
    /// The anchor time is evaluated under the tempo being replaced; the new
    /// tempo only applies to ticks after the breakpoint.
    pub fn repin(&self, tick: Tick, mpqn: u32, ticks_per_quarter: u16) -> TempoAnchor {
        let tick = tick as f64;
        TempoAnchor {
            tick,
            seconds: self.seconds_at(tick, ticks_per_quarter),
            mpqn,
        }
    }
}

/// A single tempo breakpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TempoChange {
    pub tick: Tick,
    pub tempo: u32,
}

/// Piecewise-constant tempo breakpoints, strictly increasing by tick, the
/// first one always at tick 0
#[derive(Debug, Clone, PartialEq)]
pub struct TempoMap {
    pub changes: Vec<TempoChange>,
    pub ticks_per_quarter: u16,
}

impl TempoMap {
    /// Builds the map from the tempo events of `track` (track 0 by convention).
    ///
    /// # Arguments
    /// * `track` - The track carrying the tempo meta events
    /// * `ticks_per_quarter` - File resolution
    /// * `default_mpqn` - Tempo in force until the first tempo event
    pub fn from_track(track: Option<&Track>, ticks_per_quarter: u16, default_mpqn: u32) -> Self {
        let mut changes = vec![TempoChange {
            tick: 0,
            tempo: default_mpqn,
        }];

        let tempo_events = track
            .into_iter()
            .flat_map(|t| t.events())
            .filter_map(|event| match event.kind {
                EventKind::Tempo { mpqn } => Some((event.tick, mpqn)),
                _ => None,
            });

        for (tick, tempo) in tempo_events {
            match changes.last_mut() {
                Some(last) if last.tick == tick => last.tempo = tempo,
                _ => changes.push(TempoChange { tick, tempo }),
            }
        }

        Self {
            changes,
            ticks_per_quarter,
        }
    }

    /// Breakpoints in the order they apply, starting at tick 0
    pub fn breakpoints(&self) -> &[TempoChange] {
        &self.changes
    }

    /// Absolute time of `ticks`, in seconds
    pub fn seconds_at(&self, ticks: Tick) -> f64 {
        let mut anchor = TempoAnchor::new(self.changes[0].tempo);
        for change in self.changes.iter().skip(1) {
            if change.tick > ticks {
                break;
            }
            anchor = anchor.repin(change.tick, change.tempo, self.ticks_per_quarter);
        }
        anchor.seconds_at(ticks as f64, self.ticks_per_quarter)
    }
}

/// Absolute time of `ticks`, in whole milliseconds
pub fn ticks_to_ms(ticks: Tick, tempo_map: &TempoMap) -> u64 {
    (tempo_map.seconds_at(ticks) * 1000.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::types::Event;

    const PPQ: u16 = 480;

    fn tempo_track(changes: &[(Tick, u32)]) -> Track {
        Track::new(
            changes
                .iter()
                .map(|&(tick, mpqn)| Event::new(tick, EventKind::Tempo { mpqn }))
                .collect(),
        )
    }

    #[test]
    fn test_repin_uses_previous_tempo() {
        let anchor = TempoAnchor::new(DEFAULT_MPQN);
        let repinned = anchor.repin(480, 1_000_000, PPQ);

        // 480 ticks at 120 BPM is half a second, regardless of the new tempo
        assert_eq!(repinned.tick, 480.0);
        assert!((repinned.seconds - 0.5).abs() < 1e-12);
        assert_eq!(repinned.mpqn, 1_000_000);
        // the next 480 ticks run at 60 BPM, one full second
        assert!((repinned.seconds_at(960.0, PPQ) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_repin_is_continuous() {
        let mut anchor = TempoAnchor::new(DEFAULT_MPQN);
        for (tick, mpqn) in [(100, 300_000), (250, 900_000), (251, 120_000), (1000, 700_000)] {
            let before = anchor.seconds_at(tick as f64, PPQ);
            anchor = anchor.repin(tick, mpqn, PPQ);
            let after = anchor.seconds_at(tick as f64, PPQ);
            assert!((before - after).abs() < 1e-12, "jump at tick {}", tick);
        }
    }

    #[test]
    fn test_ticks_at_inverts_seconds_at() {
        let anchor = TempoAnchor::new(DEFAULT_MPQN).repin(480, 750_000, PPQ);
        let seconds = anchor.seconds_at(1234.0, PPQ);
        assert!((anchor.ticks_at(seconds, PPQ) - 1234.0).abs() < 1e-9);
    }

    #[test]
    fn test_ms_to_ticks_default_tempo() {
        // 500 ms at 120 BPM is one quarter note
        assert!((ms_to_ticks(500.0, DEFAULT_MPQN, PPQ) - 480.0).abs() < 1e-9);
        assert!((ticks_to_seconds(480.0, DEFAULT_MPQN, PPQ) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_tempo_map_defaults_and_duplicates() {
        let map = TempoMap::from_track(None, PPQ, DEFAULT_MPQN);
        assert_eq!(map.breakpoints(), &[TempoChange { tick: 0, tempo: DEFAULT_MPQN }]);

        let track = tempo_track(&[(0, 600_000), (480, 400_000), (480, 1_000_000)]);
        let map = TempoMap::from_track(Some(&track), PPQ, DEFAULT_MPQN);
        assert_eq!(
            map.breakpoints(),
            &[
                TempoChange { tick: 0, tempo: 600_000 },
                TempoChange { tick: 480, tempo: 1_000_000 },
            ]
        );
    }

    #[test]
    fn test_tempo_map_monotonic() {
        let track = tempo_track(&[(480, 1_000_000), (960, 250_000), (1440, 2_000_000)]);
        let map = TempoMap::from_track(Some(&track), PPQ, DEFAULT_MPQN);

        assert!((map.seconds_at(960) - 1.5).abs() < 1e-12);
        assert_eq!(ticks_to_ms(960, &map), 1500);
        // 480 ticks at 250000 after 1.5s
        assert!((map.seconds_at(1440) - 1.75).abs() < 1e-12);

        let mut previous = 0.0;
        for tick in (0..3000).step_by(7) {
            let seconds = map.seconds_at(tick);
            assert!(seconds >= previous);
            previous = seconds;
        }
    }
}
