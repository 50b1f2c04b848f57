//! Application orchestration layer
//!
//! This module coordinates between the protocol, input, UI, and platform
//! layers. It owns the mode state machine and the UI-thread runtime.

pub mod coordinator;
pub mod error;
pub mod runtime;
pub mod scheduler;
pub mod state;

pub use coordinator::Coordinator;
pub use error::CommandError;
pub use runtime::{UiHandle, UiRuntime};
