//! Command failures as reported on the wire

use crate::platform::window::WindowError;
use crate::platform::{HookError, Permission};
use crate::protocol::ProtocolError;
use crate::ui::overlay::OverlayError;

/// Why a command failed; the `Display` text is the `error` field
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("{0} permission not granted")]
    PermissionDenied(Permission),

    #[error("target application {0} is not running")]
    TargetNotRunning(String),

    #[error("target application {0} has no accessible window")]
    TargetNoWindow(String),

    #[error("target application {0} is not in focus")]
    TargetNotFocused(String),

    #[error("annotation is off-screen")]
    OffScreen,

    #[error("click monitor unavailable: {0}")]
    MonitorUnavailable(String),

    #[error("failed to draw annotation: {0}")]
    DrawFailed(String),
}

impl From<ProtocolError> for CommandError {
    fn from(err: ProtocolError) -> Self {
        CommandError::InvalidCommand(err.to_string())
    }
}

impl From<HookError> for CommandError {
    fn from(err: HookError) -> Self {
        match err {
            HookError::InstallFailed(reason) => CommandError::MonitorUnavailable(reason),
        }
    }
}

impl From<OverlayError> for CommandError {
    fn from(err: OverlayError) -> Self {
        match err {
            OverlayError::Window(WindowError::NotRunning(app)) => CommandError::TargetNotRunning(app),
            OverlayError::Window(WindowError::NoWindow(app)) => CommandError::TargetNoWindow(app),
            OverlayError::NotFocused(app) => CommandError::TargetNotFocused(app),
            OverlayError::OffScreen { .. } => CommandError::OffScreen,
            OverlayError::Rendering(e) => CommandError::DrawFailed(e.to_string()),
            OverlayError::Surface(e) => CommandError::DrawFailed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::core::Rect;

    #[test]
    fn overlay_errors_map_onto_taxonomy() {
        assert_eq!(
            CommandError::from(OverlayError::NotFocused("com.example.Notes".into())).to_string(),
            "target application com.example.Notes is not in focus"
        );
        assert_eq!(
            CommandError::from(OverlayError::Window(WindowError::NotRunning("x".into()))),
            CommandError::TargetNotRunning("x".into())
        );
        assert_eq!(
            CommandError::from(OverlayError::OffScreen {
                rect: Rect::new(0, 0, 1, 1)
            }),
            CommandError::OffScreen
        );
    }

    #[test]
    fn permission_message_names_the_permission() {
        assert_eq!(
            CommandError::PermissionDenied(Permission::InputMonitoring).to_string(),
            "input monitoring permission not granted"
        );
    }

    #[test]
    fn protocol_errors_are_invalid_commands() {
        let err: CommandError = ProtocolError::UnknownCommand("jump".into()).into();
        assert_eq!(err.to_string(), "invalid command: unknown command: jump");
    }
}
