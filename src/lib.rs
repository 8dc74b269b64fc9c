pub mod config;
pub mod midi;
pub mod player;
