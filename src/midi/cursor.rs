use super::types::{Event, Tick, Track};

/// Forward-only position in one track's events
#[derive(Debug, Clone)]
pub struct TrackCursor<'a> {
    events: &'a [Event],
    index: usize,
}

impl<'a> TrackCursor<'a> {
    pub fn new(track: &'a Track) -> Self {
        Self {
            events: track.events(),
            index: 0,
        }
    }

    /// Next undispatched event, without consuming it
    pub fn peek(&self) -> Option<&'a Event> {
        self.events.get(self.index)
    }

    /// Next event if it is due at or before `tick`
    pub fn peek_due(&self, tick: f64) -> Option<&'a Event> {
        self.peek().filter(|event| event.tick as f64 <= tick)
    }

    pub fn advance(&mut self) {
        if self.index < self.events.len() {
            self.index += 1;
        }
    }

    pub fn has_more(&self) -> bool {
        self.index < self.events.len()
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Number of events already consumed
    pub fn position(&self) -> usize {
        self.index
    }

    pub fn next_tick(&self) -> Option<Tick> {
        self.peek().map(|event| event.tick)
    }
}
