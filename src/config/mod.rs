//! Configuration module for tactile-beacon
//!
//! A single JSON document tunes timings, annotation styles, caption fonts
//! and the headless display layout. Values are clamped on load.

pub mod settings;

pub use settings::{BeaconConfig, ConfigError};
