//! Real-time playback engine.
//!
//! [`MidiProcessor`] walks one [`TrackCursor`] per track and hands every due
//! event to a [`MidiEventListener`]. It is polled by the host, either from the
//! wall clock with [`MidiProcessor::process`] or by absolute song time with
//! [`MidiProcessor::process_to`].

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use super::cursor::TrackCursor;
use super::metronome::Metronome;
use super::timing::{mpqn_to_bpm, ms_to_ticks, TempoAnchor};
use super::types::{Event, EventKind, MidiError, MidiFile, Tick};
use crate::config::PlaybackConfig;

/// Receives everything the processor dispatches
pub trait MidiEventListener {
    /// Called for every dispatched event, including tempo, time signature
    /// and synthetic metronome events
    fn on_event(&mut self, event: &Event);

    /// `from_beginning` is true when nothing has been played yet
    fn on_start(&mut self, from_beginning: bool);

    /// `finished` is true only when every track ran out of events
    fn on_stop(&mut self, finished: bool);
}

/// Source of wall-clock instants for [`MidiProcessor::process`]
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so a host can keep one handle and give the
/// other to the processor.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Running,
}

pub struct MidiProcessor<'a, L, C = SystemClock> {
    config: PlaybackConfig,
    clock: C,
    listener: Option<L>,
    file: Option<&'a MidiFile>,
    cursors: Vec<TrackCursor<'a>>,
    state: PlaybackState,
    ticks_per_quarter: u16,
    anchor: TempoAnchor,
    ticks_elapsed: f64,
    ms_elapsed: f64,
    metronome: Metronome,
    last_poll: Instant,
    session_start: Instant,
    session_offset_ms: f64,
}

impl<'a, L: MidiEventListener> MidiProcessor<'a, L, SystemClock> {
    pub fn new(config: PlaybackConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<'a, L: MidiEventListener, C: Clock> MidiProcessor<'a, L, C> {
    pub fn with_clock(config: PlaybackConfig, clock: C) -> Self {
        let now = clock.now();
        let metronome = Metronome::new(config.default_time_signature, 1);
        Self {
            anchor: TempoAnchor::new(config.default_mpqn),
            config,
            clock,
            listener: None,
            file: None,
            cursors: Vec::new(),
            state: PlaybackState::Stopped,
            ticks_per_quarter: 0,
            ticks_elapsed: 0.0,
            ms_elapsed: 0.0,
            metronome,
            last_poll: now,
            session_start: now,
            session_offset_ms: 0.0,
        }
    }

    pub fn set_listener(&mut self, listener: L) {
        self.listener = Some(listener);
    }

    pub fn listener(&self) -> Option<&L> {
        self.listener.as_ref()
    }

    pub fn listener_mut(&mut self) -> Option<&mut L> {
        self.listener.as_mut()
    }

    pub fn take_listener(&mut self) -> Option<L> {
        self.listener.take()
    }

    /// Prepares `file` for playback from the beginning.
    ///
    /// # Returns
    /// * `Err(MidiError::InvalidState)` while running
    /// * `Err(MidiError::Configuration)` without a listener or with an invalid config
    /// * `Err(MidiError::MalformedTempo)` / `Err(MidiError::MalformedFile)` for
    ///   values the tick/time math cannot use
    pub fn load(&mut self, file: &'a MidiFile) -> Result<(), MidiError> {
        if self.is_running() {
            return Err(MidiError::InvalidState("cannot load while running"));
        }
        self.ensure_listener()?;
        self.config.validate()?;
        file.validate()?;

        self.file = Some(file);
        self.state = PlaybackState::Stopped;
        self.ticks_per_quarter = file.resolution();
        self.anchor = TempoAnchor::new(self.config.default_mpqn);
        self.ticks_elapsed = 0.0;
        self.ms_elapsed = 0.0;
        self.session_offset_ms = 0.0;
        self.metronome = Metronome::new(self.config.default_time_signature, self.ticks_per_quarter);
        self.cursors = file.tracks().iter().map(TrackCursor::new).collect();

        info!(
            tracks = file.track_count(),
            events = file.event_count(),
            resolution = file.resolution(),
            "Loaded MIDI file"
        );
        Ok(())
    }

    /// Starts or resumes playback from the current position
    pub fn start(&mut self) -> Result<(), MidiError> {
        if self.is_running() {
            return Ok(());
        }
        if self.file.is_none() {
            return Err(MidiError::InvalidState("no MIDI file loaded"));
        }
        self.ensure_listener()?;

        let now = self.clock.now();
        self.last_poll = now;
        self.session_start = now;
        self.session_offset_ms = self.ms_elapsed;
        self.state = PlaybackState::Running;

        let from_beginning = self.ms_elapsed == 0.0;
        info!(from_beginning, position_ms = self.ms_elapsed, "Playback started");
        if let Some(listener) = self.listener.as_mut() {
            listener.on_start(from_beginning);
        }
        Ok(())
    }

    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        info!(position_ms = self.ms_elapsed, "Playback stopped");
        if let Some(listener) = self.listener.as_mut() {
            listener.on_stop(false);
        }
    }

    /// Rewinds to the beginning and restores the default time signature
    pub fn reset(&mut self) {
        self.state = PlaybackState::Stopped;
        self.ticks_elapsed = 0.0;
        self.ms_elapsed = 0.0;
        self.session_offset_ms = 0.0;
        self.anchor = TempoAnchor::new(self.config.default_mpqn);
        self.metronome
            .set_time_signature(self.config.default_time_signature);
        for cursor in &mut self.cursors {
            cursor.reset();
        }

        info!("Playback reset");
        if let Some(listener) = self.listener.as_mut() {
            listener.on_stop(false);
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == PlaybackState::Running
    }

    /// True once playback has moved past tick 0, running or not
    pub fn is_started(&self) -> bool {
        self.ticks_elapsed > 0.0
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Advances playback by the wall-clock time since the last effective poll.
    ///
    /// A metronome event for a beat crossed during this poll is dispatched
    /// before any file event, carrying the tick reached by the previous poll.
    pub fn process(&mut self) {
        if !self.is_running() {
            return;
        }

        let now = self.clock.now();
        let since_last = now.saturating_duration_since(self.last_poll).as_millis() as u64;
        if since_last < self.config.min_poll_interval_ms {
            return;
        }

        let tick_delta = ms_to_ticks(since_last as f64, self.anchor.mpqn, self.ticks_per_quarter);
        if tick_delta < 1.0 {
            return;
        }

        if self.metronome.update(tick_delta) {
            self.dispatch_metronome(self.ticks_elapsed as Tick);
        }

        self.last_poll = now;
        let played = now.saturating_duration_since(self.session_start);
        let target_ms = self.session_offset_ms + played.as_secs_f64() * 1000.0;
        self.advance_to(target_ms / 1000.0);
    }

    /// Plays everything up to `seconds` of song time in one step.
    ///
    /// Every event between the current position and the target is
    /// dispatched; wall-clock polling continues from the new position.
    pub fn process_to(&mut self, seconds: f64) {
        if !self.is_running() {
            return;
        }

        let now = self.clock.now();
        self.last_poll = now;
        self.session_start = now;
        self.session_offset_ms = seconds * 1000.0;
        self.advance_to(seconds);
    }

    pub fn ticks_elapsed(&self) -> f64 {
        self.ticks_elapsed
    }

    pub fn ms_elapsed(&self) -> f64 {
        self.ms_elapsed
    }

    pub fn position_seconds(&self) -> f64 {
        self.ms_elapsed / 1000.0
    }

    pub fn tempo_mpqn(&self) -> u32 {
        self.anchor.mpqn
    }

    pub fn bpm(&self) -> f64 {
        mpqn_to_bpm(self.anchor.mpqn)
    }

    pub fn beat_number(&self) -> u32 {
        self.metronome.beat_number()
    }

    pub fn resolution(&self) -> u16 {
        self.ticks_per_quarter
    }

    pub fn file(&self) -> Option<&'a MidiFile> {
        self.file
    }

    fn ensure_listener(&self) -> Result<(), MidiError> {
        if self.listener.is_none() {
            return Err(MidiError::Configuration(
                "a listener must be set before loading or starting playback".to_string(),
            ));
        }
        Ok(())
    }

    /// Drains every cursor up to the tick at song time `seconds`, track by
    /// track, then reports completion if nothing is left.
    fn advance_to(&mut self, seconds: f64) {
        self.ms_elapsed = seconds * 1000.0;

        // the target tick follows tempo changes dispatched on the way, and a
        // tempo in a later track can move it past earlier tracks: repeat
        // passes until one dispatches nothing
        loop {
            let mut dispatched = false;
            for index in 0..self.cursors.len() {
                while let Some(event) = self.cursors[index]
                    .peek_due(self.anchor.ticks_at(seconds, self.ticks_per_quarter))
                {
                    self.cursors[index].advance();
                    self.dispatch(event);
                    dispatched = true;
                }
            }
            if !dispatched {
                break;
            }
        }

        let target = self.anchor.ticks_at(seconds, self.ticks_per_quarter);
        if target > self.ticks_elapsed {
            self.ticks_elapsed = target;
        }

        if self.cursors.iter().all(|cursor| !cursor.has_more()) {
            self.state = PlaybackState::Stopped;
            info!(position_ms = self.ms_elapsed, "Playback finished");
            if let Some(listener) = self.listener.as_mut() {
                listener.on_stop(true);
            }
        }
    }

    fn dispatch(&mut self, event: &Event) {
        match &event.kind {
            EventKind::Tempo { mpqn } => {
                self.anchor = self.anchor.repin(event.tick, *mpqn, self.ticks_per_quarter);
                debug!(tick = event.tick, mpqn, "Tempo changed");
            }
            EventKind::TimeSignature(signature) => {
                if self.metronome.beat_number() != 1 {
                    self.dispatch_metronome(event.tick);
                }
                self.metronome.set_time_signature(*signature);
                debug!(tick = event.tick, %signature, "Time signature changed");
            }
            _ => {}
        }

        trace!(tick = event.tick, event = %event.kind, "Dispatch");
        if let Some(listener) = self.listener.as_mut() {
            listener.on_event(event);
        }
    }

    fn dispatch_metronome(&mut self, tick: Tick) {
        let event = Event::new(tick, EventKind::Metronome(self.metronome.tick()));
        self.dispatch(&event);
    }
}
