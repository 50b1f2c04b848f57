//! tactile-beacon: overlay annotations and region-click monitoring driven
//! by a newline-delimited JSON protocol.

pub mod app;
pub mod config;
pub mod domain;
pub mod input;
pub mod logging;
pub mod platform;
pub mod protocol;
pub mod ui;
