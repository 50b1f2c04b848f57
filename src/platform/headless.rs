//! In-memory platform
//!
//! Stands in for the OS on machines without a native backend and in tests.
//! Displays, applications, focus and permissions are configured by the
//! caller; overlay surfaces are tracked instead of drawn; pointer-downs are
//! injected with `click`.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Weak;
use std::time::Instant;

use crate::config::BeaconConfig;
use crate::domain::core::{Point, Rect};
use crate::domain::display::Display;
use crate::platform::{
    AppRegistry, AttributeValue, DisplayEnumerator, HookError, NativeEventPump, NativeSurface,
    PermissionGate, Platform, PointerHook, PointerSink, ProcessHandle, SurfaceError,
    SurfaceFactory, SurfaceRequest, WindowAttribute, WindowInspector, WindowRef,
};

/// A surface currently on (virtual) screen
#[derive(Debug, Clone, PartialEq)]
pub struct LiveSurface {
    pub id: u64,
    pub frame: Rect,
    pub display_id: usize,
}

#[derive(Debug)]
struct HeadlessApp {
    app_id: String,
    pid: u32,
    main_window: Option<Rect>,
    focused_window: Option<Rect>,
    broken_geometry: bool,
}

struct HeadlessState {
    displays: Vec<Display>,
    apps: Vec<HeadlessApp>,
    frontmost: Option<u32>,
    accessibility: bool,
    input_monitoring: bool,
    hook_fails: bool,
    surfaces_fail: bool,
    sink: Option<Weak<dyn PointerSink>>,
    surfaces: Vec<LiveSurface>,
    lifecycle: Vec<String>,
    activations: Vec<String>,
    next_surface: u64,
    next_pid: u32,
}

impl Default for HeadlessState {
    fn default() -> Self {
        Self {
            displays: vec![Display::new(0, Rect::new(0, 0, 1920, 1080), true)],
            apps: Vec::new(),
            frontmost: None,
            accessibility: true,
            input_monitoring: true,
            hook_fails: false,
            surfaces_fail: false,
            sink: None,
            surfaces: Vec::new(),
            lifecycle: Vec::new(),
            activations: Vec::new(),
            next_surface: 1,
            next_pid: 1000,
        }
    }
}

impl HeadlessState {
    fn app(&self, pid: u32) -> Option<&HeadlessApp> {
        self.apps.iter().find(|a| a.pid == pid)
    }

    fn app_mut(&mut self, app_id: &str) -> Option<&mut HeadlessApp> {
        self.apps.iter_mut().find(|a| a.app_id == app_id)
    }
}

/// Cloneable handle onto the shared in-memory state
#[derive(Clone, Default)]
pub struct HeadlessPlatform {
    state: Rc<RefCell<HeadlessState>>,
}

impl HeadlessPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Displays from the configuration; the first one is primary
    pub fn from_config(config: &BeaconConfig) -> Self {
        let headless = Self::new();
        if !config.headless_displays.is_empty() {
            headless.set_displays(
                config
                    .headless_displays
                    .iter()
                    .enumerate()
                    .map(|(index, frame)| Display::new(index, *frame, index == 0))
                    .collect(),
            );
        }
        headless
    }

    /// Bundles this state behind every platform trait
    pub fn platform(&self) -> Platform {
        Platform {
            name: "headless",
            permissions: Rc::new(self.clone()),
            apps: Rc::new(self.clone()),
            windows: Rc::new(self.clone()),
            displays: Rc::new(self.clone()),
            surfaces: Rc::new(self.clone()),
            pointer: Box::new(HeadlessPointerHook {
                state: Rc::clone(&self.state),
                installed: false,
            }),
            pump: Rc::new(HeadlessPump),
        }
    }

    pub fn set_displays(&self, displays: Vec<Display>) {
        self.state.borrow_mut().displays = displays;
    }

    /// Registers a running application, optionally with a main window
    pub fn add_app(&self, app_id: &str, main_window: Option<Rect>) -> u32 {
        let mut state = self.state.borrow_mut();
        let pid = state.next_pid;
        state.next_pid += 1;
        state.apps.push(HeadlessApp {
            app_id: app_id.to_string(),
            pid,
            main_window,
            focused_window: None,
            broken_geometry: false,
        });
        pid
    }

    pub fn quit_app(&self, app_id: &str) {
        let mut state = self.state.borrow_mut();
        if let Some(pid) = state.apps.iter().find(|a| a.app_id == app_id).map(|a| a.pid) {
            if state.frontmost == Some(pid) {
                state.frontmost = None;
            }
        }
        state.apps.retain(|a| a.app_id != app_id);
    }

    pub fn move_window(&self, app_id: &str, frame: Rect) {
        if let Some(app) = self.state.borrow_mut().app_mut(app_id) {
            app.main_window = Some(frame);
        }
    }

    pub fn set_focused_window(&self, app_id: &str, frame: Rect) {
        if let Some(app) = self.state.borrow_mut().app_mut(app_id) {
            app.focused_window = Some(frame);
        }
    }

    /// Makes window attribute queries return a non-geometry value
    pub fn break_window_geometry(&self, app_id: &str) {
        if let Some(app) = self.state.borrow_mut().app_mut(app_id) {
            app.broken_geometry = true;
        }
    }

    pub fn set_frontmost(&self, app_id: Option<&str>) {
        let mut state = self.state.borrow_mut();
        state.frontmost = app_id.and_then(|id| {
            state
                .apps
                .iter()
                .find(|a| a.app_id == id)
                .map(|a| a.pid)
        });
    }

    pub fn set_accessibility(&self, granted: bool) {
        self.state.borrow_mut().accessibility = granted;
    }

    pub fn set_input_monitoring(&self, granted: bool) {
        self.state.borrow_mut().input_monitoring = granted;
    }

    /// Makes the next pointer hook installations fail
    pub fn fail_pointer_hook(&self, fail: bool) {
        self.state.borrow_mut().hook_fails = fail;
    }

    /// Makes every later native surface creation fail
    pub fn fail_surfaces(&self, fail: bool) {
        self.state.borrow_mut().surfaces_fail = fail;
    }

    pub fn hook_installed(&self) -> bool {
        self.state.borrow().sink.is_some()
    }

    /// Injects a pointer-down at a global point
    ///
    /// Delivered only while a hook is installed and its sink is alive.
    pub fn click(&self, point: Point, at: Instant) {
        let sink = self.state.borrow().sink.clone();
        match sink.and_then(|weak| weak.upgrade()) {
            Some(sink) => sink.pointer_down(point, at),
            None => tracing::debug!(?point, "click dropped, no pointer hook installed"),
        }
    }

    pub fn live_surfaces(&self) -> Vec<LiveSurface> {
        self.state.borrow().surfaces.clone()
    }

    /// Create/teardown history, e.g. `create:1`, `remove_content:1`
    pub fn lifecycle(&self) -> Vec<String> {
        self.state.borrow().lifecycle.clone()
    }

    pub fn activations(&self) -> Vec<String> {
        self.state.borrow().activations.clone()
    }
}

impl PermissionGate for HeadlessPlatform {
    fn is_accessibility_granted(&self) -> bool {
        self.state.borrow().accessibility
    }

    fn is_input_monitoring_granted(&self) -> bool {
        self.state.borrow().input_monitoring
    }
}

impl AppRegistry for HeadlessPlatform {
    fn running_application(&self, app_id: &str) -> Option<ProcessHandle> {
        self.state
            .borrow()
            .apps
            .iter()
            .find(|a| a.app_id == app_id)
            .map(|a| ProcessHandle {
                pid: a.pid,
                app_id: a.app_id.clone(),
            })
    }

    fn frontmost_application(&self) -> Option<ProcessHandle> {
        let state = self.state.borrow();
        let pid = state.frontmost?;
        state.app(pid).map(|a| ProcessHandle {
            pid: a.pid,
            app_id: a.app_id.clone(),
        })
    }

    fn activate(&self, process: &ProcessHandle) -> bool {
        let mut state = self.state.borrow_mut();
        if state.app(process.pid).is_none() {
            return false;
        }
        tracing::debug!(app_id = %process.app_id, "headless activate");
        state.frontmost = Some(process.pid);
        state.activations.push(process.app_id.clone());
        true
    }
}

const FOCUSED_BIT: u64 = 1;

impl WindowInspector for HeadlessPlatform {
    fn main_window(&self, process: &ProcessHandle) -> Option<WindowRef> {
        let state = self.state.borrow();
        state
            .app(process.pid)?
            .main_window
            .map(|_| WindowRef((process.pid as u64) << 1))
    }

    fn focused_window(&self, process: &ProcessHandle) -> Option<WindowRef> {
        let state = self.state.borrow();
        state
            .app(process.pid)?
            .focused_window
            .map(|_| WindowRef(((process.pid as u64) << 1) | FOCUSED_BIT))
    }

    fn attribute(&self, window: WindowRef, attribute: WindowAttribute) -> Option<AttributeValue> {
        let state = self.state.borrow();
        let app = state.app((window.0 >> 1) as u32)?;
        if app.broken_geometry {
            return Some(AttributeValue::Other("AXUnknown".to_string()));
        }
        let frame = if window.0 & FOCUSED_BIT != 0 {
            app.focused_window?
        } else {
            app.main_window?
        };
        Some(match attribute {
            WindowAttribute::Position => AttributeValue::Point(frame.origin()),
            WindowAttribute::Size => AttributeValue::Size(frame.size()),
        })
    }
}

impl DisplayEnumerator for HeadlessPlatform {
    fn all_displays(&self) -> Vec<Display> {
        self.state.borrow().displays.clone()
    }
}

impl SurfaceFactory for HeadlessPlatform {
    fn create_surface(&self, request: &SurfaceRequest<'_>) -> Result<Box<dyn NativeSurface>, SurfaceError> {
        let mut state = self.state.borrow_mut();
        if state.surfaces_fail {
            return Err(SurfaceError::CreationFailed("window server refused the overlay".to_string()));
        }
        let id = state.next_surface;
        state.next_surface += 1;
        state.surfaces.push(LiveSurface {
            id,
            frame: request.frame,
            display_id: request.display.id,
        });
        state.lifecycle.push(format!("create:{id}"));
        tracing::debug!(id, frame = ?request.frame, "headless surface created");
        Ok(Box::new(HeadlessSurface {
            id,
            state: Rc::clone(&self.state),
        }))
    }
}

struct HeadlessSurface {
    id: u64,
    state: Rc<RefCell<HeadlessState>>,
}

impl HeadlessSurface {
    fn record(&self, step: &str) {
        self.state
            .borrow_mut()
            .lifecycle
            .push(format!("{step}:{}", self.id));
    }
}

impl NativeSurface for HeadlessSurface {
    fn remove_content(&mut self) {
        self.record("remove_content");
    }

    fn hide(&mut self) {
        self.record("hide");
    }

    fn release(&mut self) {
        self.record("release");
        let id = self.id;
        self.state.borrow_mut().surfaces.retain(|s| s.id != id);
    }
}

struct HeadlessPointerHook {
    state: Rc<RefCell<HeadlessState>>,
    installed: bool,
}

impl PointerHook for HeadlessPointerHook {
    fn install(&mut self, sink: Weak<dyn PointerSink>) -> Result<(), HookError> {
        let mut state = self.state.borrow_mut();
        if state.hook_fails || !state.input_monitoring {
            return Err(HookError::InstallFailed("event tap refused".to_string()));
        }
        state.sink = Some(sink);
        self.installed = true;
        Ok(())
    }

    fn uninstall(&mut self) {
        self.state.borrow_mut().sink = None;
        self.installed = false;
    }

    fn is_installed(&self) -> bool {
        self.installed
    }
}

struct HeadlessPump;

impl NativeEventPump for HeadlessPump {
    fn pump(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_has_one_primary_display() {
        let headless = HeadlessPlatform::new();
        let displays = headless.all_displays();
        assert_eq!(displays.len(), 1);
        assert!(displays[0].is_primary);
    }

    #[test]
    fn from_config_uses_configured_displays() {
        let config = BeaconConfig {
            headless_displays: vec![Rect::new(0, 0, 1440, 900), Rect::new(1440, 0, 1920, 1080)],
            ..BeaconConfig::default()
        };
        let displays = HeadlessPlatform::from_config(&config).all_displays();
        assert_eq!(displays.len(), 2);
        assert!(displays[0].is_primary);
        assert!(!displays[1].is_primary);
        assert_eq!(displays[1].frame, Rect::new(1440, 0, 1920, 1080));
    }

    #[test]
    fn activation_changes_frontmost() {
        let headless = HeadlessPlatform::new();
        headless.add_app("com.example.Notes", Some(Rect::new(0, 0, 100, 100)));
        let process = headless.running_application("com.example.Notes").unwrap();
        assert!(headless.frontmost_application().is_none());
        assert!(headless.activate(&process));
        assert_eq!(headless.frontmost_application(), Some(process));
        assert_eq!(headless.activations(), vec!["com.example.Notes".to_string()]);
    }

    #[test]
    fn surfaces_record_teardown_order() {
        let headless = HeadlessPlatform::new();
        let display = Display::new(0, Rect::new(0, 0, 100, 100), true);
        let pixmap = tiny_skia::Pixmap::new(10, 10).unwrap();
        let mut surface = headless
            .create_surface(&SurfaceRequest {
                frame: Rect::new(0, 0, 10, 10),
                display: &display,
                pixels: &pixmap,
            })
            .unwrap();
        assert_eq!(headless.live_surfaces().len(), 1);
        surface.remove_content();
        surface.hide();
        surface.release();
        assert!(headless.live_surfaces().is_empty());
        assert_eq!(
            headless.lifecycle(),
            vec!["create:1", "remove_content:1", "hide:1", "release:1"]
        );
    }

    #[test]
    fn hook_refuses_without_input_monitoring() {
        let headless = HeadlessPlatform::new();
        headless.set_input_monitoring(false);
        let mut platform = headless.platform();
        let sink: std::sync::Arc<dyn PointerSink> = std::sync::Arc::new(NullSink);
        assert!(platform.pointer.install(std::sync::Arc::downgrade(&sink)).is_err());
        assert!(!platform.pointer.is_installed());
    }

    struct NullSink;

    impl PointerSink for NullSink {
        fn pointer_down(&self, _point: Point, _at: Instant) {}
    }
}
