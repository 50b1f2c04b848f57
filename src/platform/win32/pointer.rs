//! Global pointer-down hook
//!
//! `WH_MOUSE_LL` callbacks are delivered to the installing thread's message
//! loop, so the hook lives on its own thread and never waits on the UI
//! thread. Events are forwarded to the installed sink from there.

use std::sync::mpsc::{Receiver, RecvTimeoutError, sync_channel};
use std::sync::{Mutex, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, HC_ACTION, MSG, MSLLHOOKSTRUCT, PM_NOREMOVE,
    PeekMessageW, PostThreadMessageW, SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx,
    WH_MOUSE_LL, WM_LBUTTONDOWN, WM_MBUTTONDOWN, WM_QUIT, WM_RBUTTONDOWN,
};

use crate::domain::core::Point;
use crate::platform::{HookError, PointerHook, PointerSink};

const READY_TIMEOUT: Duration = Duration::from_secs(2);

/// Sink for the process-wide hook; only one hook is ever installed
static HOOK_SINK: Mutex<Option<Weak<dyn PointerSink>>> = Mutex::new(None);

fn set_sink(sink: Option<Weak<dyn PointerSink>>) {
    match HOOK_SINK.lock() {
        Ok(mut slot) => *slot = sink,
        Err(poisoned) => *poisoned.into_inner() = sink,
    }
}

fn dispatch(point: Point, at: Instant) {
    let sink = match HOOK_SINK.lock() {
        Ok(slot) => slot.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    };
    if let Some(sink) = sink.and_then(|weak| weak.upgrade()) {
        sink.pointer_down(point, at);
    }
}

unsafe extern "system" fn mouse_hook_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code == HC_ACTION as i32
        && matches!(wparam.0 as u32, WM_LBUTTONDOWN | WM_RBUTTONDOWN | WM_MBUTTONDOWN)
    {
        let info = unsafe { &*(lparam.0 as *const MSLLHOOKSTRUCT) };
        dispatch(Point::new(info.pt.x, info.pt.y), Instant::now());
    }
    unsafe { CallNextHookEx(None, code, wparam, lparam) }
}

struct HookThread {
    thread_id: u32,
    join: JoinHandle<()>,
}

/// Runs the hook and its message loop until `WM_QUIT`.
fn hook_thread_main(ready: std::sync::mpsc::SyncSender<Result<u32, String>>) {
    unsafe {
        let mut msg = MSG::default();
        // Forces creation of this thread's message queue before we report our id
        let _ = PeekMessageW(&mut msg, None, 0, 0, PM_NOREMOVE);
        let thread_id = GetCurrentThreadId();

        let hinstance = match GetModuleHandleW(None) {
            Ok(h) => h,
            Err(e) => {
                let _ = ready.send(Err(format!("module handle: {e}")));
                return;
            }
        };
        let hook = match SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_hook_proc), hinstance, 0) {
            Ok(hook) => hook,
            Err(e) => {
                let _ = ready.send(Err(format!("SetWindowsHookExW: {e}")));
                return;
            }
        };
        let _ = ready.send(Ok(thread_id));
        tracing::debug!(thread_id, "pointer hook installed");

        loop {
            let result = GetMessageW(&mut msg, None, 0, 0).0;
            if result == 0 || result == -1 {
                break;
            }
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }

        if let Err(e) = UnhookWindowsHookEx(hook) {
            tracing::warn!(error = %e, "UnhookWindowsHookEx failed");
        }
        tracing::debug!(thread_id, "pointer hook removed");
    }
}

/// Waits for the hook thread's handshake
///
/// A thread that only reports after `timeout` is stopped through `stop`
/// before the error is returned, so no hook outlives a failed install.
fn await_ready(
    ready: &Receiver<Result<u32, String>>,
    timeout: Duration,
    stop: impl FnOnce(u32),
) -> Result<u32, String> {
    match ready.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            tracing::warn!(?timeout, "pointer hook thread slow to start, waiting to stop it");
            if let Ok(Ok(thread_id)) = ready.recv() {
                stop(thread_id);
            }
            Err("hook thread did not report ready".into())
        }
        Err(RecvTimeoutError::Disconnected) => Err("hook thread exited".into()),
    }
}

fn post_quit(thread_id: u32) {
    if let Err(e) = unsafe { PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) } {
        tracing::warn!(thread_id, error = %e, "could not stop pointer hook thread");
    }
}

pub struct LowLevelMouseHook {
    thread: Option<HookThread>,
}

impl LowLevelMouseHook {
    pub fn new() -> Self {
        Self { thread: None }
    }
}

impl Default for LowLevelMouseHook {
    fn default() -> Self {
        Self::new()
    }
}

impl PointerHook for LowLevelMouseHook {
    fn install(&mut self, sink: Weak<dyn PointerSink>) -> Result<(), HookError> {
        set_sink(Some(sink));
        if self.thread.is_some() {
            return Ok(());
        }

        let (ready_tx, ready_rx) = sync_channel(1);
        let join = std::thread::Builder::new()
            .name("beacon-pointer-hook".into())
            .spawn(move || hook_thread_main(ready_tx))
            .map_err(|e| HookError::InstallFailed(format!("spawning hook thread: {e}")))?;

        match await_ready(&ready_rx, READY_TIMEOUT, post_quit) {
            Ok(thread_id) => {
                self.thread = Some(HookThread { thread_id, join });
                Ok(())
            }
            Err(reason) => {
                if join.join().is_err() {
                    tracing::error!("pointer hook thread panicked");
                }
                set_sink(None);
                Err(HookError::InstallFailed(reason))
            }
        }
    }

    fn uninstall(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        set_sink(None);
        let posted = unsafe { PostThreadMessageW(thread.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) };
        if let Err(e) = posted {
            tracing::warn!(error = %e, "could not stop pointer hook thread");
            return;
        }
        if thread.join.join().is_err() {
            tracing::error!("pointer hook thread panicked");
        }
    }

    fn is_installed(&self) -> bool {
        self.thread.is_some()
    }
}

impl Drop for LowLevelMouseHook {
    fn drop(&mut self) {
        self.uninstall();
    }
}
