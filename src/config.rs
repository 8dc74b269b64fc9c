use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::midi::{MidiError, TimeSignature, DEFAULT_MPQN};

/// Top-level configuration for the CLI and library
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub playback: PlaybackConfig,
}

/// Engine defaults and polling cadence
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Tempo in force until the file sets one (microseconds per quarter note)
    pub default_mpqn: u32,
    /// Signature the metronome starts from, and returns to on reset
    pub default_time_signature: TimeSignature,
    /// Polls closer together than this do not advance playback
    pub min_poll_interval_ms: u64,
    /// Sleep between polls in the blocking player loop
    pub host_tick_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        PlaybackConfig {
            default_mpqn: DEFAULT_MPQN,
            default_time_signature: TimeSignature::default(),
            min_poll_interval_ms: 8,
            host_tick_ms: 10,
        }
    }
}

impl PlaybackConfig {
    /// Validates the configuration before it reaches the engine
    ///
    /// # Returns
    /// * `Ok(())` if the configuration is valid
    /// * `Err(MidiError::Configuration)` otherwise
    pub fn validate(&self) -> Result<(), MidiError> {
        if self.default_mpqn == 0 {
            return Err(MidiError::Configuration(
                "default_mpqn must be positive".to_string(),
            ));
        }

        let sig = &self.default_time_signature;
        if sig.numerator == 0 || sig.denominator == 0 {
            return Err(MidiError::Configuration(format!(
                "default time signature {} is degenerate",
                sig
            )));
        }

        if self.host_tick_ms == 0 {
            return Err(MidiError::Configuration(
                "host_tick_ms must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Load configuration from config.toml in the working directory
pub fn load_config() -> Result<Config, MidiError> {
    load_config_from(Path::new("config.toml"))
}

/// Load configuration from `path`, falling back to defaults if it does not exist
pub fn load_config_from(path: &Path) -> Result<Config, MidiError> {
    match File::open(path) {
        Ok(mut file) => {
            let mut contents = String::new();
            file.read_to_string(&mut contents)?;
            let config: Config = toml::from_str(&contents)?;
            config.playback.validate()?;
            Ok(config)
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
        Err(err) => Err(err.into()),
    }
}
