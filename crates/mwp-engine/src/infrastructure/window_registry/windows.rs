//! Win32 window registry via `EnumWindows`.
//!
//! Every `enumerate` walks all top-level windows and keeps those that are
//! titled, visible or minimised, and match the configured criteria by
//! process image name or title keyword.  `resolve` re-checks `IsWindow` and
//! reads the current client rectangle, converted to screen coordinates.

#![cfg(target_os = "windows")]

use std::ffi::c_void;

use mwp_core::{Rect, WindowCriteria, WindowHandle, WindowId};
use tracing::trace;
use windows::core::PWSTR;
use windows::Win32::Foundation::{CloseHandle, BOOL, HWND, LPARAM, POINT, RECT};
use windows::Win32::Graphics::Gdi::ClientToScreen;
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetClientRect, GetWindowRect, GetWindowTextLengthW, GetWindowTextW,
    GetWindowThreadProcessId, IsIconic, IsWindow, IsWindowVisible,
};

use crate::application::window_registry::{RegistryError, WindowRegistry};

/// Windows implementation of [`WindowRegistry`].
pub struct WindowsWindowRegistry {
    criteria: WindowCriteria,
}

impl WindowsWindowRegistry {
    pub fn new(criteria: WindowCriteria) -> Self {
        Self { criteria }
    }
}

pub(crate) fn hwnd_of(id: WindowId) -> HWND {
    HWND(id.0 as usize as *mut c_void)
}

fn id_of(hwnd: HWND) -> WindowId {
    WindowId(hwnd.0 as usize as u64)
}

impl WindowRegistry for WindowsWindowRegistry {
    fn enumerate(&self) -> Result<Vec<WindowHandle>, RegistryError> {
        let mut hwnds: Vec<HWND> = Vec::new();

        // SAFETY: `lparam` points to `hwnds`, which outlives this call.  The
        // callback runs synchronously inside `EnumWindows`.
        unsafe {
            EnumWindows(Some(collect_hwnd), LPARAM(&mut hwnds as *mut Vec<HWND> as isize))
                .map_err(|e| RegistryError::Platform(e.to_string()))?;
        }

        let mut windows = Vec::new();
        for hwnd in hwnds {
            // SAFETY: visibility queries accept any handle value.
            let shown = unsafe { IsWindowVisible(hwnd).as_bool() || IsIconic(hwnd).as_bool() };
            if !shown {
                continue;
            }
            let title = window_title(hwnd);
            if title.trim().is_empty() {
                continue;
            }
            let Some(outer) = outer_size(hwnd) else {
                continue;
            };
            let process_name = process_name(hwnd).unwrap_or_default();
            if !self.criteria.matches(&title, &process_name, outer.0, outer.1) {
                continue;
            }
            let Ok(client_rect) = client_rect(hwnd) else {
                continue;
            };
            trace!(hwnd = ?hwnd.0, %title, %process_name, "matched window");
            windows.push(WindowHandle::new(id_of(hwnd), client_rect, title, process_name));
        }
        Ok(windows)
    }

    fn resolve(&self, id: WindowId) -> Result<Rect, RegistryError> {
        let hwnd = hwnd_of(id);
        // SAFETY: IsWindow accepts any handle value.
        if !unsafe { IsWindow(hwnd).as_bool() } {
            return Err(RegistryError::NotFound(id));
        }
        client_rect(hwnd).map_err(|_| RegistryError::NotFound(id))
    }
}

/// Win32 enumeration callback.
///
/// # Safety
///
/// `lparam` must be a valid pointer to `Vec<HWND>` for the duration of the
/// enumeration call.
unsafe extern "system" fn collect_hwnd(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let hwnds = &mut *(lparam.0 as *mut Vec<HWND>);
    hwnds.push(hwnd);
    BOOL(1) // continue enumeration
}

fn window_title(hwnd: HWND) -> String {
    // SAFETY: the buffer is sized from GetWindowTextLengthW plus the NUL.
    unsafe {
        let len = GetWindowTextLengthW(hwnd);
        if len <= 0 {
            return String::new();
        }
        let mut buf = vec![0u16; len as usize + 1];
        let copied = GetWindowTextW(hwnd, &mut buf);
        String::from_utf16_lossy(&buf[..copied.max(0) as usize])
    }
}

fn outer_size(hwnd: HWND) -> Option<(u32, u32)> {
    let mut rc = RECT::default();
    // SAFETY: rc is a valid out-parameter.
    unsafe { GetWindowRect(hwnd, &mut rc) }.ok()?;
    Some(((rc.right - rc.left).max(0) as u32, (rc.bottom - rc.top).max(0) as u32))
}

fn client_rect(hwnd: HWND) -> Result<Rect, RegistryError> {
    let mut rc = RECT::default();
    let mut origin = POINT::default();
    // SAFETY: rc and origin are valid out-parameters.
    unsafe {
        GetClientRect(hwnd, &mut rc).map_err(|e| RegistryError::Platform(e.to_string()))?;
        if !ClientToScreen(hwnd, &mut origin).as_bool() {
            return Err(RegistryError::Platform("ClientToScreen failed".to_string()));
        }
    }
    Ok(Rect::new(
        origin.x,
        origin.y,
        (rc.right - rc.left).max(0) as u32,
        (rc.bottom - rc.top).max(0) as u32,
    ))
}

/// File name of the owning process image, e.g. `"game.exe"`.
fn process_name(hwnd: HWND) -> Option<String> {
    let mut pid = 0u32;
    // SAFETY: pid is a valid out-parameter; the process handle is closed
    // before returning.
    unsafe {
        GetWindowThreadProcessId(hwnd, Some(&mut pid as *mut u32));
        if pid == 0 {
            return None;
        }
        let process = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid).ok()?;
        let mut buf = [0u16; 1024];
        let mut size = buf.len() as u32;
        let queried = QueryFullProcessImageNameW(process, PROCESS_NAME_WIN32, PWSTR(buf.as_mut_ptr()), &mut size);
        let _ = CloseHandle(process);
        queried.ok()?;
        let path = String::from_utf16_lossy(&buf[..size as usize]);
        path.rsplit(['\\', '/']).next().map(str::to_string)
    }
}
