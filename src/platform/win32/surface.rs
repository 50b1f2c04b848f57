//! Layered overlay windows
//!
//! Each annotation gets its own borderless, topmost, click-through popup
//! whose pixels are pushed with `UpdateLayeredWindow`.

use std::cell::Cell;
use std::ffi::c_void;

use windows::Win32::Foundation::{COLORREF, HWND, LPARAM, LRESULT, POINT, SIZE, WPARAM};
use windows::Win32::Graphics::Gdi::{
    AC_SRC_ALPHA, AC_SRC_OVER, BI_RGB, BITMAPINFO, BITMAPINFOHEADER, BLENDFUNCTION,
    CreateCompatibleDC, CreateDIBSection, DIB_RGB_COLORS, DeleteDC, DeleteObject, GetDC, HGDIOBJ,
    ReleaseDC, SelectObject,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, RegisterClassW, SW_HIDE, SW_SHOWNOACTIVATE,
    ShowWindow, ULW_ALPHA, UpdateLayeredWindow, WNDCLASSW, WS_EX_LAYERED, WS_EX_NOACTIVATE,
    WS_EX_TOOLWINDOW, WS_EX_TOPMOST, WS_EX_TRANSPARENT, WS_POPUP,
};
use windows::core::{PCWSTR, w};

use crate::domain::core::Rect;
use crate::platform::{NativeSurface, SurfaceError, SurfaceFactory, SurfaceRequest};

const CLASS_NAME: PCWSTR = w!("TactileBeaconAnnotation");

unsafe extern "system" fn annotation_window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) }
}

pub struct LayeredSurfaceFactory {
    class_registered: Cell<bool>,
}

impl LayeredSurfaceFactory {
    pub fn new() -> Self {
        Self {
            class_registered: Cell::new(false),
        }
    }

    fn ensure_class(&self) -> Result<(), SurfaceError> {
        if self.class_registered.get() {
            return Ok(());
        }
        let hinstance = unsafe { GetModuleHandleW(None) }
            .map_err(|e| SurfaceError::CreationFailed(format!("module handle: {e}")))?;
        let wc = WNDCLASSW {
            lpfnWndProc: Some(annotation_window_proc),
            hInstance: hinstance.into(),
            lpszClassName: CLASS_NAME,
            ..Default::default()
        };
        // Zero also means the class already exists, which CreateWindowExW will surface
        if unsafe { RegisterClassW(&wc) } == 0 {
            tracing::debug!("annotation window class registration returned 0");
        }
        self.class_registered.set(true);
        Ok(())
    }

    fn create_window(&self, frame: Rect) -> Result<HWND, SurfaceError> {
        self.ensure_class()?;
        let hinstance = unsafe { GetModuleHandleW(None) }
            .map_err(|e| SurfaceError::CreationFailed(format!("module handle: {e}")))?;

        let hwnd = unsafe {
            CreateWindowExW(
                WS_EX_LAYERED | WS_EX_TOPMOST | WS_EX_NOACTIVATE | WS_EX_TOOLWINDOW | WS_EX_TRANSPARENT,
                CLASS_NAME,
                w!("Tactile Beacon"),
                WS_POPUP,
                frame.x,
                frame.y,
                frame.w,
                frame.h,
                None,
                None,
                hinstance,
                None,
            )
        };
        if hwnd.0 == 0 {
            return Err(SurfaceError::CreationFailed(format!(
                "CreateWindowExW failed for {frame:?}"
            )));
        }
        Ok(hwnd)
    }
}

impl Default for LayeredSurfaceFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceFactory for LayeredSurfaceFactory {
    fn create_surface(&self, request: &SurfaceRequest<'_>) -> Result<Box<dyn NativeSurface>, SurfaceError> {
        let hwnd = self.create_window(request.frame)?;
        let surface = LayeredSurface { hwnd, destroyed: false };

        // On failure `surface` drops here and destroys the window
        present(hwnd, request.frame, request.pixels)?;
        unsafe {
            let _ = ShowWindow(hwnd, SW_SHOWNOACTIVATE);
        }
        tracing::debug!(hwnd = hwnd.0, frame = ?request.frame, display = request.display.id, "overlay window shown");

        Ok(Box::new(surface))
    }
}

/// tiny-skia stores premultiplied RGBA; a 32bpp DIB wants premultiplied BGRA.
fn swizzle_into(dst: &mut [u8], rgba: &[u8]) {
    for (out, px) in dst.chunks_exact_mut(4).zip(rgba.chunks_exact(4)) {
        out[0] = px[2];
        out[1] = px[1];
        out[2] = px[0];
        out[3] = px[3];
    }
}

/// Push `pixmap` to the layered window at `frame`.
fn present(hwnd: HWND, frame: Rect, pixmap: &tiny_skia::Pixmap) -> Result<(), SurfaceError> {
    let width = pixmap.width() as i32;
    let height = pixmap.height() as i32;

    unsafe {
        let screen_dc = GetDC(HWND(0));
        if screen_dc.0 == 0 {
            return Err(SurfaceError::PresentFailed("GetDC failed".into()));
        }
        let memory_dc = CreateCompatibleDC(screen_dc);
        if memory_dc.0 == 0 {
            ReleaseDC(HWND(0), screen_dc);
            return Err(SurfaceError::PresentFailed("CreateCompatibleDC failed".into()));
        }

        let mut bitmap_info = BITMAPINFO::default();
        bitmap_info.bmiHeader = BITMAPINFOHEADER {
            biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
            biWidth: width,
            biHeight: -height,
            biPlanes: 1,
            biBitCount: 32,
            biCompression: BI_RGB.0,
            ..Default::default()
        };

        let mut bits: *mut c_void = std::ptr::null_mut();
        let dib = match CreateDIBSection(memory_dc, &bitmap_info, DIB_RGB_COLORS, &mut bits, None, 0) {
            Ok(dib) if !bits.is_null() => dib,
            Ok(dib) => {
                DeleteObject(HGDIOBJ::from(dib));
                DeleteDC(memory_dc);
                ReleaseDC(HWND(0), screen_dc);
                return Err(SurfaceError::PresentFailed("DIB section has no pixels".into()));
            }
            Err(e) => {
                DeleteDC(memory_dc);
                ReleaseDC(HWND(0), screen_dc);
                return Err(SurfaceError::PresentFailed(format!("CreateDIBSection: {e}")));
            }
        };
        let dib_object: HGDIOBJ = dib.into();

        let dst = std::slice::from_raw_parts_mut(bits as *mut u8, pixmap.data().len());
        swizzle_into(dst, pixmap.data());

        let old_bitmap = SelectObject(memory_dc, dib_object);
        let size = SIZE { cx: width, cy: height };
        let dst_point = POINT { x: frame.x, y: frame.y };
        let src_point = POINT { x: 0, y: 0 };
        let blend = BLENDFUNCTION {
            BlendOp: AC_SRC_OVER as u8,
            BlendFlags: 0,
            SourceConstantAlpha: 255,
            AlphaFormat: AC_SRC_ALPHA as u8,
        };

        let result = UpdateLayeredWindow(
            hwnd,
            screen_dc,
            Some(&dst_point),
            Some(&size),
            memory_dc,
            Some(&src_point),
            COLORREF(0),
            Some(&blend),
            ULW_ALPHA,
        );

        SelectObject(memory_dc, old_bitmap);
        DeleteObject(dib_object);
        DeleteDC(memory_dc);
        ReleaseDC(HWND(0), screen_dc);

        result.map_err(|e| SurfaceError::PresentFailed(format!("UpdateLayeredWindow: {e}")))
    }
}

struct LayeredSurface {
    hwnd: HWND,
    destroyed: bool,
}

impl NativeSurface for LayeredSurface {
    fn remove_content(&mut self) {
        if self.destroyed {
            return;
        }
        // Fade the existing layer to fully transparent without a new bitmap
        let blend = BLENDFUNCTION {
            BlendOp: AC_SRC_OVER as u8,
            BlendFlags: 0,
            SourceConstantAlpha: 0,
            AlphaFormat: AC_SRC_ALPHA as u8,
        };
        let result = unsafe {
            UpdateLayeredWindow(self.hwnd, None, None, None, None, None, COLORREF(0), Some(&blend), ULW_ALPHA)
        };
        if let Err(e) = result {
            tracing::debug!(hwnd = self.hwnd.0, error = %e, "clearing overlay content failed");
        }
    }

    fn hide(&mut self) {
        if !self.destroyed {
            unsafe {
                let _ = ShowWindow(self.hwnd, SW_HIDE);
            }
        }
    }

    fn release(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        if let Err(e) = unsafe { DestroyWindow(self.hwnd) } {
            tracing::warn!(hwnd = self.hwnd.0, error = %e, "DestroyWindow failed");
        }
    }
}

impl Drop for LayeredSurface {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swizzle_swaps_red_and_blue() {
        let rgba = [10u8, 20, 30, 255, 1, 2, 3, 4];
        let mut bgra = [0u8; 8];
        swizzle_into(&mut bgra, &rgba);
        assert_eq!(bgra, [30, 20, 10, 255, 3, 2, 1, 4]);
    }
}
