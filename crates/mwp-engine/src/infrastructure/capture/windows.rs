//! Occlusion-tolerant capture via `PrintWindow`.
//!
//! `PrintWindow` asks the window to render itself into our memory DC, so the
//! result is correct even when the window is covered by other windows.  The
//! `PW_RENDERFULLCONTENT` flag (value 2, missing from older headers) makes
//! DirectComposition content render too.  Minimised windows produce black
//! frames; that is a limitation of the API, not an error.
//!
//! GDI handles are thread-affine enough that the whole sequence runs on one
//! blocking thread.

#![cfg(target_os = "windows")]

use std::ffi::c_void;

use async_trait::async_trait;
use mwp_core::{WindowHandle, WindowId};
use tracing::trace;
use windows::Win32::Graphics::Gdi::{
    CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC, GetDIBits, ReleaseDC,
    SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, HGDIOBJ,
};
use windows::Win32::Storage::Xps::{PrintWindow, PRINT_WINDOW_FLAGS, PW_CLIENTONLY};

use super::spool::FrameSpool;
use crate::application::observe::{CaptureError, CaptureService, Frame};
use crate::infrastructure::window_registry::windows::hwnd_of;

const PW_RENDERFULLCONTENT: u32 = 2;

/// [`CaptureService`] over `PrintWindow`, optionally spooling each frame.
pub struct PrintWindowCapture {
    spool: Option<FrameSpool>,
}

impl PrintWindowCapture {
    pub fn new(spool: Option<FrameSpool>) -> Self {
        Self { spool }
    }
}

#[async_trait]
impl CaptureService for PrintWindowCapture {
    async fn capture(&mut self, window: &WindowHandle) -> Result<Frame, CaptureError> {
        let (id, width, height) = (window.id, window.client_rect.width, window.client_rect.height);
        if width == 0 || height == 0 {
            return Err(CaptureError::EmptyClientArea);
        }

        let pixels = tokio::task::spawn_blocking(move || print_client_area(id, width, height))
            .await
            .map_err(|e| CaptureError::Platform(format!("capture thread failed: {e}")))??;

        let mut frame = Frame { width, height, pixels, image_ref: None };
        if let Some(spool) = &self.spool {
            let path = spool.write(id, &frame).await?;
            frame.image_ref = Some(path.display().to_string());
        }
        trace!(window = %id, width, height, "captured frame");
        Ok(frame)
    }
}

/// Renders the client area into a top-down 32-bit BGRA buffer.
fn print_client_area(id: WindowId, width: u32, height: u32) -> Result<Vec<u8>, CaptureError> {
    let hwnd = hwnd_of(id);
    let mut pixels = vec![0u8; width as usize * height as usize * 4];

    // SAFETY: every GDI object created here is selected out and deleted
    // before returning; `pixels` is sized for `height` rows of 32-bit pixels.
    unsafe {
        let screen_dc = GetDC(hwnd);
        if screen_dc.is_invalid() {
            return Err(CaptureError::Platform("GetDC failed".to_string()));
        }
        let mem_dc = CreateCompatibleDC(screen_dc);
        let bitmap = CreateCompatibleBitmap(screen_dc, width as i32, height as i32);
        let previous = SelectObject(mem_dc, HGDIOBJ(bitmap.0));

        let flags = PRINT_WINDOW_FLAGS(PW_CLIENTONLY.0 | PW_RENDERFULLCONTENT);
        let printed = PrintWindow(hwnd, mem_dc, flags).as_bool();

        let mut info = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width as i32,
                biHeight: -(height as i32),
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            ..Default::default()
        };
        // The bitmap must not be selected into a DC while GetDIBits reads it.
        SelectObject(mem_dc, previous);
        let rows = GetDIBits(
            mem_dc,
            bitmap,
            0,
            height,
            Some(pixels.as_mut_ptr() as *mut c_void),
            &mut info,
            DIB_RGB_COLORS,
        );

        let _ = DeleteObject(HGDIOBJ(bitmap.0));
        let _ = DeleteDC(mem_dc);
        ReleaseDC(hwnd, screen_dc);

        if !printed {
            return Err(CaptureError::Platform("PrintWindow failed".to_string()));
        }
        if rows != height as i32 {
            return Err(CaptureError::Platform(format!("GetDIBits copied {rows} of {height} rows")));
        }
    }
    Ok(pixels)
}
