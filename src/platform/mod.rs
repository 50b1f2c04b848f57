//! Platform boundary
//!
//! Every OS interaction the engine needs is expressed as a trait here:
//! permission queries, the process/window registry, accessibility-style
//! window introspection, display enumeration, native overlay surfaces, the
//! global pointer hook and the native message pump. `Platform` bundles one
//! implementation of each so the rest of the crate never touches an OS API.

pub mod headless;
pub mod window;

#[cfg(windows)]
pub mod win32;

use std::rc::Rc;
use std::sync::Weak;
use std::time::Instant;

use crate::config::BeaconConfig;
use crate::domain::core::{Point, Rect, Size};
use crate::domain::display::Display;

/// Privacy permissions the engine depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Needed for window introspection
    Accessibility,
    /// Needed for the global pointer hook
    InputMonitoring,
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Permission::Accessibility => write!(f, "accessibility"),
            Permission::InputMonitoring => write!(f, "input monitoring"),
        }
    }
}

pub trait PermissionGate {
    fn is_accessibility_granted(&self) -> bool;
    fn is_input_monitoring_granted(&self) -> bool;

    fn is_granted(&self, permission: Permission) -> bool {
        match permission {
            Permission::Accessibility => self.is_accessibility_granted(),
            Permission::InputMonitoring => self.is_input_monitoring_granted(),
        }
    }
}

/// A running application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHandle {
    pub pid: u32,
    /// Identifier the application was looked up by
    pub app_id: String,
}

/// Process registry: lookup, foreground query and activation
pub trait AppRegistry {
    fn running_application(&self, app_id: &str) -> Option<ProcessHandle>;
    fn frontmost_application(&self) -> Option<ProcessHandle>;
    /// Requests activation; the effect is asynchronous
    fn activate(&self, process: &ProcessHandle) -> bool;
}

/// Opaque reference to a native window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowRef(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowAttribute {
    Position,
    Size,
}

/// Value returned by an attribute query
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Point(Point),
    Size(Size),
    /// The attribute exists but does not hold geometry
    Other(String),
}

/// Accessibility-style window introspection
pub trait WindowInspector {
    fn main_window(&self, process: &ProcessHandle) -> Option<WindowRef>;
    fn focused_window(&self, process: &ProcessHandle) -> Option<WindowRef>;
    fn attribute(&self, window: WindowRef, attribute: WindowAttribute) -> Option<AttributeValue>;
}

pub trait DisplayEnumerator {
    fn all_displays(&self) -> Vec<Display>;
}

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("Failed to create overlay window: {0}")]
    CreationFailed(String),

    #[error("Failed to present overlay content: {0}")]
    PresentFailed(String),
}

/// Everything a backend needs to put an overlay on screen
#[derive(Debug)]
pub struct SurfaceRequest<'a> {
    /// Native surface frame in global coordinates
    pub frame: Rect,
    pub display: &'a Display,
    /// Premultiplied RGBA pixels, `frame.w * frame.h * 4` bytes
    pub pixels: &'a tiny_skia::Pixmap,
}

/// A live native overlay
///
/// Implementations are driven through `AnnotationSurface`, which calls the
/// three teardown steps exactly once and in order.
pub trait NativeSurface {
    fn remove_content(&mut self);
    fn hide(&mut self);
    fn release(&mut self);
}

pub trait SurfaceFactory {
    /// Creates a borderless, click-through, topmost surface showing `request.pixels`
    fn create_surface(&self, request: &SurfaceRequest<'_>) -> Result<Box<dyn NativeSurface>, SurfaceError>;
}

/// Receiver of raw global pointer-down events
///
/// Called on whatever thread drives the OS subscription.
pub trait PointerSink: Send + Sync {
    fn pointer_down(&self, point: Point, at: Instant);
}

#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("Failed to install global pointer hook: {0}")]
    InstallFailed(String),
}

/// Global pointer-down subscription
///
/// The hook holds only a weak back-reference to its sink.
pub trait PointerHook {
    fn install(&mut self, sink: Weak<dyn PointerSink>) -> Result<(), HookError>;
    fn uninstall(&mut self);
    fn is_installed(&self) -> bool;
}

/// Drains native window messages on the UI thread
pub trait NativeEventPump {
    fn pump(&self);
}

/// One implementation of every platform trait
pub struct Platform {
    pub name: &'static str,
    pub permissions: Rc<dyn PermissionGate>,
    pub apps: Rc<dyn AppRegistry>,
    pub windows: Rc<dyn WindowInspector>,
    pub displays: Rc<dyn DisplayEnumerator>,
    pub surfaces: Rc<dyn SurfaceFactory>,
    pub pointer: Box<dyn PointerHook>,
    pub pump: Rc<dyn NativeEventPump>,
}

/// Create the platform appropriate for the current OS.
pub fn create_platform(headless: bool, config: &BeaconConfig) -> Platform {
    if headless {
        tracing::info!("using headless platform");
        return headless::HeadlessPlatform::from_config(config).platform();
    }
    #[cfg(windows)]
    {
        tracing::info!("using win32 platform");
        win32::platform()
    }
    #[cfg(not(windows))]
    {
        tracing::warn!("no native backend for this OS, falling back to headless platform");
        headless::HeadlessPlatform::from_config(config).platform()
    }
}
