//! NDJSON command protocol

pub mod command;
pub mod response;

pub use command::{Command, ProtocolError};
pub use response::{Event, Outbound, Response};

/// Wall-clock timestamp in epoch milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
