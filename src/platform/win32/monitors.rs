//! Monitor enumeration
//!
//! Secondary monitors may sit at negative coordinates in the virtual
//! desktop; frames are reported as-is.

use windows::Win32::Foundation::{BOOL, FALSE, LPARAM, RECT, TRUE};
use windows::Win32::Graphics::Gdi::{
    EnumDisplayMonitors, GetMonitorInfoW, HDC, HMONITOR, MONITORINFO, MONITORINFOEXW,
};
use windows::Win32::UI::HiDpi::{GetDpiForMonitor, MDT_EFFECTIVE_DPI};

use super::rect_from_win32;
use crate::domain::display::Display;
use crate::platform::DisplayEnumerator;

const MONITORINFOF_PRIMARY: u32 = 1;
const BASE_DPI: f32 = 96.0;

pub struct Win32Displays;

impl DisplayEnumerator for Win32Displays {
    fn all_displays(&self) -> Vec<Display> {
        enumerate_displays()
    }
}

/// Monitors in enumeration order; empty if enumeration fails.
pub fn enumerate_displays() -> Vec<Display> {
    let mut displays: Vec<Display> = Vec::new();

    let ok = unsafe {
        EnumDisplayMonitors(
            None,
            None,
            Some(enum_monitor_proc),
            LPARAM(&mut displays as *mut Vec<Display> as isize),
        )
    };
    if ok == FALSE {
        tracing::warn!("EnumDisplayMonitors failed");
    }

    displays
}

/// A monitor whose info cannot be read is skipped; enumeration continues.
unsafe extern "system" fn enum_monitor_proc(
    hmonitor: HMONITOR,
    _hdc: HDC,
    _rect: *mut RECT,
    lparam: LPARAM,
) -> BOOL {
    unsafe {
        let displays = &mut *(lparam.0 as *mut Vec<Display>);

        let mut info = MONITORINFOEXW {
            monitorInfo: MONITORINFO {
                cbSize: std::mem::size_of::<MONITORINFOEXW>() as u32,
                ..Default::default()
            },
            ..Default::default()
        };
        if GetMonitorInfoW(hmonitor, &mut info.monitorInfo) == FALSE {
            tracing::debug!(?hmonitor, "skipping monitor without info");
            return TRUE;
        }

        let mut dpi_x: u32 = 96;
        let mut dpi_y: u32 = 96;
        if GetDpiForMonitor(hmonitor, MDT_EFFECTIVE_DPI, &mut dpi_x, &mut dpi_y).is_err() {
            dpi_x = 96;
        }

        let mut display = Display::new(
            displays.len(),
            rect_from_win32(&info.monitorInfo.rcMonitor),
            info.monitorInfo.dwFlags & MONITORINFOF_PRIMARY != 0,
        );
        display.scale = dpi_x as f32 / BASE_DPI;
        displays.push(display);

        TRUE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumerates_a_primary_display() {
        let displays = enumerate_displays();
        assert!(!displays.is_empty());
        assert!(displays.iter().any(|d| d.is_primary));
        for (i, display) in displays.iter().enumerate() {
            assert_eq!(display.id, i);
            assert!(display.frame.size().is_positive());
        }
    }
}
