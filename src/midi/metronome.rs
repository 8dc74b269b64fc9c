use super::types::{MetronomeTick, TimeSignature};

/// Synthetic beat generator driven by elapsed ticks.
///
/// Beats are 1-based and wrap at the signature numerator; a beat lasts
/// `PPQ * 4 / denominator` ticks.
#[derive(Debug, Clone)]
pub struct Metronome {
    signature: TimeSignature,
    ticks_per_quarter: u16,
    ticks_per_beat: f64,
    progress: f64,
    beat: u32,
    measure: u32,
}

impl Metronome {
    pub fn new(signature: TimeSignature, ticks_per_quarter: u16) -> Self {
        let mut metronome = Self {
            signature,
            ticks_per_quarter,
            ticks_per_beat: 0.0,
            progress: 0.0,
            beat: 1,
            measure: 0,
        };
        metronome.set_time_signature(signature);
        metronome
    }

    /// Replaces the meter and restarts at beat 1 with no accumulated phase
    pub fn set_time_signature(&mut self, signature: TimeSignature) {
        self.signature = signature;
        self.ticks_per_beat =
            self.ticks_per_quarter as f64 * 4.0 / signature.denominator.max(1) as f64;
        self.progress = 0.0;
        self.beat = 1;
        self.measure = 0;
    }

    /// Accumulates `tick_delta` and returns true if at least one beat
    /// boundary was crossed since the previous call
    pub fn update(&mut self, tick_delta: f64) -> bool {
        if self.ticks_per_beat <= 0.0 {
            return false;
        }

        self.progress += tick_delta;
        let crossed = (self.progress / self.ticks_per_beat).floor();
        if crossed < 1.0 {
            return false;
        }
        self.progress -= crossed * self.ticks_per_beat;

        let numerator = u64::from(self.signature.numerator.max(1));
        let zero_based = u64::from(self.beat - 1) + crossed as u64;
        self.measure += (zero_based / numerator) as u32;
        self.beat = (zero_based % numerator) as u32 + 1;
        true
    }

    pub fn beat_number(&self) -> u32 {
        self.beat
    }

    pub fn measure(&self) -> u32 {
        self.measure
    }

    pub fn signature(&self) -> TimeSignature {
        self.signature
    }

    pub fn ticks_per_beat(&self) -> f64 {
        self.ticks_per_beat
    }

    /// Payload for the synthetic metronome event
    pub fn tick(&self) -> MetronomeTick {
        MetronomeTick {
            beat: self.beat,
            measure: self.measure,
            signature: self.signature,
        }
    }
}
