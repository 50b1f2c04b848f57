//! Domain logic and core data structures
//!
//! This module contains pure geometry and bookkeeping that is independent
//! of any OS API. The platform layer feeds it; the app layer drives it.

pub mod core;
pub mod display;
pub mod region;
