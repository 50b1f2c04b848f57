//! Inbound commands
//!
//! One JSON object per line: `{"command": "<name>", "params": {...}}`.
//! Coordinates may be integers or floats; floats are rounded to the nearest
//! pixel. `params` may be omitted for commands that take none.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::app::state::Mode;
use crate::domain::core::{Rect, Size};

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed command: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("invalid params for {command}: {reason}")]
    InvalidParams { command: String, reason: String },
}

/// Where an `act` box is anchored on the target window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    /// Centred on the window; `x`/`y` are ignored
    #[default]
    Center,
    /// At `x`/`y` from the window's top-left corner
    Offset,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActParams {
    #[serde(default, deserialize_with = "pixel")]
    pub x: i32,
    #[serde(default, deserialize_with = "pixel")]
    pub y: i32,
    #[serde(deserialize_with = "pixel")]
    pub width: i32,
    #[serde(deserialize_with = "pixel")]
    pub height: i32,
    #[serde(rename = "targetBundleID")]
    pub target_bundle_id: String,
    #[serde(rename = "activateApp", default)]
    pub activate_app: bool,
    #[serde(rename = "bypassFocusCheck", default)]
    pub bypass_focus_check: bool,
    #[serde(default)]
    pub anchor: Anchor,
    #[serde(default)]
    pub caption: Option<String>,
}

impl ActParams {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn relative_rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObserveParams {
    #[serde(default, deserialize_with = "pixel")]
    pub x: i32,
    #[serde(default, deserialize_with = "pixel")]
    pub y: i32,
    #[serde(deserialize_with = "pixel")]
    pub width: i32,
    #[serde(deserialize_with = "pixel")]
    pub height: i32,
    /// When set, the region is centred on this application's window
    #[serde(rename = "targetBundleID", default)]
    pub target_bundle_id: Option<String>,
    #[serde(rename = "activateApp", default)]
    pub activate_app: bool,
    #[serde(rename = "bypassFocusCheck", default)]
    pub bypass_focus_check: bool,
    #[serde(rename = "showBox", default)]
    pub show_box: Option<bool>,
}

impl ObserveParams {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModeParams {
    pub mode: Mode,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CancelParams {
    #[serde(rename = "rectId")]
    pub rect_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Act(ActParams),
    Observe(ObserveParams),
    Mode(ModeParams),
    Cancel(CancelParams),
    Clear,
    Status,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Act(_) => "act",
            Command::Observe(_) => "observe",
            Command::Mode(_) => "mode",
            Command::Cancel(_) => "cancel",
            Command::Clear => "clear",
            Command::Status => "status",
        }
    }

    /// Parses and validates one protocol line
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope = serde_json::from_str(line)?;
        let params = envelope.params.unwrap_or_else(|| Value::Object(Default::default()));
        let name = envelope.command.as_str();

        let command = match name {
            "act" => Command::Act(params_for(name, params)?),
            "observe" => Command::Observe(params_for(name, params)?),
            "mode" => Command::Mode(params_for(name, params)?),
            "cancel" => Command::Cancel(params_for(name, params)?),
            "clear" => Command::Clear,
            "status" => Command::Status,
            other => return Err(ProtocolError::UnknownCommand(other.to_string())),
        };
        command.validate()?;
        Ok(command)
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        let invalid = |reason: &str| ProtocolError::InvalidParams {
            command: self.name().to_string(),
            reason: reason.to_string(),
        };
        match self {
            Command::Act(params) => {
                if !params.size().is_positive() {
                    return Err(invalid("width and height must be positive"));
                }
                if !params.relative_rect().has_representable_edges() {
                    return Err(invalid("rectangle extends past the coordinate range"));
                }
                if params.target_bundle_id.trim().is_empty() {
                    return Err(invalid("targetBundleID must not be empty"));
                }
            }
            Command::Observe(params) => {
                if !params.size().is_positive() {
                    return Err(invalid("width and height must be positive"));
                }
                if !params.rect().has_representable_edges() {
                    return Err(invalid("rectangle extends past the coordinate range"));
                }
                if params
                    .target_bundle_id
                    .as_deref()
                    .is_some_and(|id| id.trim().is_empty())
                {
                    return Err(invalid("targetBundleID must not be empty"));
                }
            }
            Command::Cancel(params) if params.rect_id.is_empty() => {
                return Err(invalid("rectId must not be empty"));
            }
            _ => {}
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct Envelope {
    command: String,
    #[serde(default)]
    params: Option<Value>,
}

fn params_for<T: serde::de::DeserializeOwned>(command: &str, params: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(params).map_err(|e| ProtocolError::InvalidParams {
        command: command.to_string(),
        reason: e.to_string(),
    })
}

/// Accepts any JSON number and rounds it to an i32 pixel value
fn pixel<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    let value = f64::deserialize(deserializer)?;
    let rounded = value.round();
    if !rounded.is_finite() || rounded < i32::MIN as f64 || rounded > i32::MAX as f64 {
        return Err(serde::de::Error::custom(format!("coordinate {value} out of range")));
    }
    Ok(rounded as i32)
}
