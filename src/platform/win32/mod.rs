//! Win32 backend
//!
//! Windows has no privacy prompts for window introspection or low-level
//! hooks, so the permission gate always answers yes. Application ids are
//! executable names (`notepad.exe` or `notepad`).

mod monitors;
mod pointer;
mod surface;
mod window;

use std::rc::Rc;

use windows::Win32::Foundation::RECT;
use windows::Win32::UI::HiDpi::{
    DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2, SetProcessDpiAwarenessContext,
};
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, MSG, PM_REMOVE, PeekMessageW, TranslateMessage,
};

use crate::domain::core::Rect;
use crate::platform::{NativeEventPump, PermissionGate, Platform};

pub use monitors::{Win32Displays, enumerate_displays};
pub use pointer::LowLevelMouseHook;
pub use surface::LayeredSurfaceFactory;
pub use window::{Win32Apps, Win32Windows};

/// Build the native platform.
///
/// Must run on the thread that will own the overlays.
pub fn platform() -> Platform {
    // Real pixel coordinates from every API that follows
    if let Err(e) = unsafe { SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2) } {
        tracing::warn!(error = %e, "could not enable per-monitor DPI awareness");
    }

    Platform {
        name: "win32",
        permissions: Rc::new(Win32Permissions),
        apps: Rc::new(Win32Apps),
        windows: Rc::new(Win32Windows),
        displays: Rc::new(Win32Displays),
        surfaces: Rc::new(LayeredSurfaceFactory::new()),
        pointer: Box::new(LowLevelMouseHook::new()),
        pump: Rc::new(Win32Pump),
    }
}

struct Win32Permissions;

impl PermissionGate for Win32Permissions {
    fn is_accessibility_granted(&self) -> bool {
        true
    }

    fn is_input_monitoring_granted(&self) -> bool {
        true
    }
}

/// Drains the UI thread's message queue without blocking
struct Win32Pump;

impl NativeEventPump for Win32Pump {
    fn pump(&self) {
        let mut msg = MSG::default();
        unsafe {
            while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
    }
}

pub(crate) fn rect_from_win32(rect: &RECT) -> Rect {
    Rect::new(rect.left, rect.top, rect.right - rect.left, rect.bottom - rect.top)
}
