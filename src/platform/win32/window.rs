//! Process lookup and top-level window introspection

use windows::Win32::Foundation::{BOOL, CloseHandle, HWND, LPARAM, RECT, TRUE};
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, PROCESSENTRY32W, Process32FirstW, Process32NextW,
    TH32CS_SNAPPROCESS,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GW_OWNER, GWL_EXSTYLE, GetForegroundWindow, GetWindow, GetWindowLongW,
    GetWindowRect, GetWindowThreadProcessId, IsIconic, IsWindow, IsWindowVisible, SW_RESTORE,
    SetForegroundWindow, ShowWindow, WS_EX_TOOLWINDOW,
};

use super::rect_from_win32;
use crate::domain::core::{Point, Size};
use crate::platform::{
    AppRegistry, AttributeValue, ProcessHandle, WindowAttribute, WindowInspector, WindowRef,
};

/// Compares an app id against an executable name, ignoring case and `.exe`
fn exe_matches(app_id: &str, exe: &str) -> bool {
    fn stem(name: &str) -> &str {
        let len = name.len();
        if len > 4 && name[len - 4..].eq_ignore_ascii_case(".exe") {
            &name[..len - 4]
        } else {
            name
        }
    }
    stem(app_id.trim()).eq_ignore_ascii_case(stem(exe))
}

fn exe_name(entry: &PROCESSENTRY32W) -> String {
    let len = entry
        .szExeFile
        .iter()
        .position(|&c| c == 0)
        .unwrap_or(entry.szExeFile.len());
    String::from_utf16_lossy(&entry.szExeFile[..len])
}

/// First process whose executable matches `app_id`
fn find_process(app_id: &str) -> Option<u32> {
    let snapshot = match unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) } {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::warn!(error = %e, "process snapshot failed");
            return None;
        }
    };

    let mut entry = PROCESSENTRY32W {
        dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
        ..Default::default()
    };
    let mut found = None;
    unsafe {
        let mut more = Process32FirstW(snapshot, &mut entry).is_ok();
        while more {
            if exe_matches(app_id, &exe_name(&entry)) {
                found = Some(entry.th32ProcessID);
                break;
            }
            more = Process32NextW(snapshot, &mut entry).is_ok();
        }
        let _ = CloseHandle(snapshot);
    }
    found
}

fn process_name(pid: u32) -> Option<String> {
    let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) }.ok()?;
    let mut entry = PROCESSENTRY32W {
        dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
        ..Default::default()
    };
    let mut found = None;
    unsafe {
        let mut more = Process32FirstW(snapshot, &mut entry).is_ok();
        while more {
            if entry.th32ProcessID == pid {
                found = Some(exe_name(&entry));
                break;
            }
            more = Process32NextW(snapshot, &mut entry).is_ok();
        }
        let _ = CloseHandle(snapshot);
    }
    found
}

fn window_pid(hwnd: HWND) -> u32 {
    let mut pid = 0u32;
    unsafe {
        GetWindowThreadProcessId(hwnd, Some(&mut pid));
    }
    pid
}

fn foreground_window() -> Option<HWND> {
    let hwnd = unsafe { GetForegroundWindow() };
    (hwnd.0 != 0).then_some(hwnd)
}

fn hwnd_of(window: WindowRef) -> HWND {
    HWND(window.0 as isize)
}

struct MainWindowSearch {
    pid: u32,
    found: Option<HWND>,
}

/// Stops at the first visible, unowned, non-tool window of the process.
unsafe extern "system" fn find_main_window_proc(hwnd: HWND, lparam: LPARAM) -> BOOL {
    unsafe {
        let search = &mut *(lparam.0 as *mut MainWindowSearch);
        if window_pid(hwnd) != search.pid || !IsWindowVisible(hwnd).as_bool() {
            return TRUE;
        }
        if GetWindow(hwnd, GW_OWNER).0 != 0 {
            return TRUE;
        }
        if GetWindowLongW(hwnd, GWL_EXSTYLE) as u32 & WS_EX_TOOLWINDOW.0 != 0 {
            return TRUE;
        }
        search.found = Some(hwnd);
        BOOL(0)
    }
}

pub struct Win32Apps;

impl AppRegistry for Win32Apps {
    fn running_application(&self, app_id: &str) -> Option<ProcessHandle> {
        find_process(app_id).map(|pid| ProcessHandle {
            pid,
            app_id: app_id.to_string(),
        })
    }

    fn frontmost_application(&self) -> Option<ProcessHandle> {
        let pid = window_pid(foreground_window()?);
        let app_id = process_name(pid)?;
        Some(ProcessHandle { pid, app_id })
    }

    fn activate(&self, process: &ProcessHandle) -> bool {
        let Some(hwnd) = Win32Windows.main_window(process).map(hwnd_of) else {
            tracing::debug!(pid = process.pid, "no window to activate");
            return false;
        };
        unsafe {
            if IsIconic(hwnd).as_bool() {
                let _ = ShowWindow(hwnd, SW_RESTORE);
            }
            SetForegroundWindow(hwnd).as_bool()
        }
    }
}

pub struct Win32Windows;

impl WindowInspector for Win32Windows {
    fn main_window(&self, process: &ProcessHandle) -> Option<WindowRef> {
        let mut search = MainWindowSearch {
            pid: process.pid,
            found: None,
        };
        // Stopping early makes EnumWindows report an error; the result is in `search`
        let _ = unsafe {
            EnumWindows(
                Some(find_main_window_proc),
                LPARAM(&mut search as *mut MainWindowSearch as isize),
            )
        };
        search.found.map(|hwnd| WindowRef(hwnd.0 as u64))
    }

    fn focused_window(&self, process: &ProcessHandle) -> Option<WindowRef> {
        let hwnd = foreground_window()?;
        (window_pid(hwnd) == process.pid).then_some(WindowRef(hwnd.0 as u64))
    }

    fn attribute(&self, window: WindowRef, attribute: WindowAttribute) -> Option<AttributeValue> {
        let hwnd = hwnd_of(window);
        if !unsafe { IsWindow(hwnd) }.as_bool() {
            return None;
        }
        let mut rect = RECT::default();
        unsafe { GetWindowRect(hwnd, &mut rect) }.ok()?;
        let frame = rect_from_win32(&rect);
        Some(match attribute {
            WindowAttribute::Position => AttributeValue::Point(Point::new(frame.x, frame.y)),
            WindowAttribute::Size => AttributeValue::Size(Size::new(frame.w, frame.h)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exe_names_match_with_or_without_extension() {
        assert!(exe_matches("notepad.exe", "notepad.exe"));
        assert!(exe_matches("Notepad", "notepad.exe"));
        assert!(exe_matches("notepad.EXE", "NOTEPAD.exe"));
        assert!(!exe_matches("note", "notepad.exe"));
        assert!(!exe_matches("", "notepad.exe"));
    }

    #[test]
    fn unknown_process_is_not_running() {
        assert!(Win32Apps.running_application("definitely-not-running-4f1c.exe").is_none());
    }
}
