//! Window geometry resolution
//!
//! Turns an application identifier into its primary window rectangle in
//! global coordinates:
//! - locate the running process
//! - ask for the main window, falling back to the focused window
//! - read position and size as two separate attribute queries
//!
//! Requires the accessibility permission. An unpermitted query is
//! indistinguishable from a missing window and reports `NoWindow`.

use std::rc::Rc;

use crate::domain::core::Rect;
use crate::platform::{
    AppRegistry, AttributeValue, ProcessHandle, WindowAttribute, WindowInspector, WindowRef,
};

/// Error types for window geometry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("target application {0} is not running")]
    NotRunning(String),

    #[error("target application {0} has no accessible window")]
    NoWindow(String),
}

pub struct WindowGeometryProvider {
    apps: Rc<dyn AppRegistry>,
    windows: Rc<dyn WindowInspector>,
}

impl WindowGeometryProvider {
    pub fn new(apps: Rc<dyn AppRegistry>, windows: Rc<dyn WindowInspector>) -> Self {
        Self { apps, windows }
    }

    pub fn process(&self, app_id: &str) -> Result<ProcessHandle, WindowError> {
        self.apps
            .running_application(app_id)
            .ok_or_else(|| WindowError::NotRunning(app_id.to_string()))
    }

    /// Primary window rectangle of `app_id` in global coordinates
    pub fn resolve_window_frame(&self, app_id: &str) -> Result<Rect, WindowError> {
        let process = self.process(app_id)?;
        let window = self
            .primary_window(&process)
            .ok_or_else(|| WindowError::NoWindow(app_id.to_string()))?;

        let origin = match self.windows.attribute(window, WindowAttribute::Position) {
            Some(AttributeValue::Point(point)) => point,
            _ => return Err(WindowError::NoWindow(app_id.to_string())),
        };
        let size = match self.windows.attribute(window, WindowAttribute::Size) {
            Some(AttributeValue::Size(size)) => size,
            _ => return Err(WindowError::NoWindow(app_id.to_string())),
        };

        let frame = Rect::from_origin_size(origin, size);
        tracing::debug!(app_id, ?frame, "resolved window frame");
        Ok(frame)
    }

    fn primary_window(&self, process: &ProcessHandle) -> Option<WindowRef> {
        self.windows
            .main_window(process)
            .or_else(|| self.windows.focused_window(process))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::headless::HeadlessPlatform;

    fn provider(headless: &HeadlessPlatform) -> WindowGeometryProvider {
        let platform = headless.platform();
        WindowGeometryProvider::new(platform.apps, platform.windows)
    }

    #[test]
    fn resolves_main_window() {
        let headless = HeadlessPlatform::new();
        headless.add_app("com.example.Notes", Some(Rect::new(100, 80, 900, 700)));
        let frame = provider(&headless)
            .resolve_window_frame("com.example.Notes")
            .unwrap();
        assert_eq!(frame, Rect::new(100, 80, 900, 700));
    }

    #[test]
    fn missing_process_is_not_running() {
        let headless = HeadlessPlatform::new();
        assert_eq!(
            provider(&headless).resolve_window_frame("com.example.Ghost"),
            Err(WindowError::NotRunning("com.example.Ghost".into()))
        );
    }

    #[test]
    fn falls_back_to_focused_window() {
        let headless = HeadlessPlatform::new();
        headless.add_app("com.example.Palette", None);
        headless.set_focused_window("com.example.Palette", Rect::new(5, 5, 50, 50));
        assert_eq!(
            provider(&headless).resolve_window_frame("com.example.Palette"),
            Ok(Rect::new(5, 5, 50, 50))
        );
    }

    #[test]
    fn no_window_at_all() {
        let headless = HeadlessPlatform::new();
        headless.add_app("com.example.Daemon", None);
        assert_eq!(
            provider(&headless).resolve_window_frame("com.example.Daemon"),
            Err(WindowError::NoWindow("com.example.Daemon".into()))
        );
    }

    #[test]
    fn non_geometry_attribute_is_no_window() {
        let headless = HeadlessPlatform::new();
        headless.add_app("com.example.Odd", Some(Rect::new(0, 0, 10, 10)));
        headless.break_window_geometry("com.example.Odd");
        assert_eq!(
            provider(&headless).resolve_window_frame("com.example.Odd"),
            Err(WindowError::NoWindow("com.example.Odd".into()))
        );
    }
}
