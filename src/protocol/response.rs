//! Outbound messages
//!
//! Everything written to the command channel: command responses, errors and
//! asynchronous click events, one JSON object per line.

use serde::Serialize;

use crate::app::state::Mode;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Drawn {
        ts: i64,
    },
    Observing {
        #[serde(rename = "rectId")]
        rect_id: String,
    },
    ModeChanged {
        mode: Mode,
    },
    Cancelled {
        #[serde(rename = "rectId")]
        rect_id: String,
        removed: bool,
    },
    Cleared,
    Report {
        mode: Mode,
        monitoring: bool,
        regions: usize,
        persistent: usize,
        temporary: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event")]
pub enum Event {
    #[serde(rename = "click-inside")]
    ClickInside {
        #[serde(rename = "rectId")]
        rect_id: String,
        ts: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReply {
    pub error: String,
}

/// Any line written to the channel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outbound {
    Response(Response),
    Error(ErrorReply),
    Event(Event),
}

impl Outbound {
    pub fn error(reason: impl std::fmt::Display) -> Self {
        Outbound::Error(ErrorReply {
            error: reason.to_string(),
        })
    }

    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<Response> for Outbound {
    fn from(response: Response) -> Self {
        Outbound::Response(response)
    }
}

impl From<Event> for Outbound {
    fn from(event: Event) -> Self {
        Outbound::Event(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn value(outbound: impl Into<Outbound>) -> Value {
        serde_json::from_str(&outbound.into().to_line().unwrap()).unwrap()
    }

    #[test]
    fn response_shapes() {
        assert_eq!(value(Response::Drawn { ts: 42 }), json!({"status": "drawn", "ts": 42}));
        assert_eq!(
            value(Response::Observing { rect_id: "r1".into() }),
            json!({"status": "observing", "rectId": "r1"})
        );
        assert_eq!(
            value(Response::ModeChanged { mode: Mode::Act }),
            json!({"status": "mode_changed", "mode": "act"})
        );
        assert_eq!(value(Response::Cleared), json!({"status": "cleared"}));
    }

    #[test]
    fn event_shape() {
        assert_eq!(
            value(Event::ClickInside {
                rect_id: "r1".into(),
                ts: 7
            }),
            json!({"event": "click-inside", "rectId": "r1", "ts": 7})
        );
    }

    #[test]
    fn error_shape() {
        let line = Outbound::error("target application x is not in focus").to_line().unwrap();
        assert_eq!(line, r#"{"error":"target application x is not in focus"}"#);
    }
}
