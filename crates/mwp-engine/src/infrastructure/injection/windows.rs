//! The five Win32 injection strategies.
//!
//! | Kind                    | Mechanism                                               | Side effects          |
//! |-------------------------|---------------------------------------------------------|-----------------------|
//! | `PrivilegedLowLevel`    | `SendMessageTimeoutW` (elevated process only)           | none                  |
//! | `WindowMessage`         | `PostMessageW` to the child under the target point      | none                  |
//! | `TargetedSynthetic`     | `AttachThreadInput` + `SendInput`, arbiter for pointer  | cursor, restored      |
//! | `ExclusiveRealDevice`   | real cursor + focus under the pointer arbiter, restored | brief focus/cursor    |
//! | `ForegroundActivation`  | raise target + `SendInput`, nothing restored            | target stays in front |
//!
//! Every strategy replays the same `InputStep` sequence the intent expands
//! to.  The replay runs on a blocking thread: `AttachThreadInput` is bound
//! to the calling OS thread and pauses are real holds, so a step sequence
//! must not hop between runtime worker threads halfway through.
//!
//! `SendInput` moves and clicks the one real cursor, so every strategy that
//! replays pointer steps through it holds the [`PointerArbiter`] for the
//! whole replay.  A replay that fails partway sends the releases for any
//! key or button it already pressed before reporting the failure.

#![cfg(target_os = "windows")]

use std::ffi::c_void;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mwp_core::keymap::windows_vk::{hid_to_vk, is_extended_vk};
use mwp_core::{
    pending_releases, InjectionIntent, InputStep, MouseButton, Point, StrategyKind, WindowHandle, WindowId,
};
use tracing::{debug, warn};
use windows::Win32::Foundation::{CloseHandle, HANDLE, HWND, LPARAM, POINT, WPARAM};
use windows::Win32::Graphics::Gdi::{ClientToScreen, ScreenToClient};
use windows::Win32::Security::{GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY};
use windows::Win32::System::Threading::{
    AttachThreadInput, GetCurrentProcess, GetCurrentThreadId, OpenProcessToken,
};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP, MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_LEFTDOWN,
    MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP, MOUSEEVENTF_MOVE,
    MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP, MOUSEEVENTF_VIRTUALDESK, MOUSEINPUT,
    MOUSE_EVENT_FLAGS, VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::{
    ChildWindowFromPointEx, GetCursorPos, GetForegroundWindow, GetSystemMetrics,
    GetWindowThreadProcessId, IsIconic, PostMessageW, SendMessageTimeoutW, SetCursorPos,
    SetForegroundWindow, ShowWindow, CWP_SKIPDISABLED, CWP_SKIPINVISIBLE, SMTO_ABORTIFHUNG,
    SM_CXVIRTUALSCREEN, SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN, SM_YVIRTUALSCREEN, SW_RESTORE,
};

use super::messages::{plan_messages, release_messages, MessageStep, WindowMessage};
use crate::application::arbiter::PointerArbiter;
use crate::application::inject::{InjectionStrategy, StrategyError};
use crate::infrastructure::window_registry::windows::hwnd_of;

// ── Chain assembly ────────────────────────────────────────────────────────────

/// All five strategies, ready for `InjectionChain::new`.
pub fn native_strategies(arbiter: &PointerArbiter, message_timeout: Duration) -> Vec<Arc<dyn InjectionStrategy>> {
    vec![
        Arc::new(PrivilegedLowLevelStrategy::detect(message_timeout)),
        Arc::new(WindowMessageStrategy),
        Arc::new(TargetedSyntheticStrategy::new(arbiter.clone())),
        Arc::new(ExclusiveRealDeviceStrategy::new(arbiter.clone())),
        Arc::new(ForegroundActivationStrategy),
    ]
}

async fn blocking<F>(f: F) -> Result<(), StrategyError>
where
    F: FnOnce() -> Result<(), StrategyError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StrategyError::Platform(format!("injection thread failed: {e}")))?
}

// ── #1 Privileged low-level ───────────────────────────────────────────────────

/// Synchronous message delivery from an elevated process.
pub struct PrivilegedLowLevelStrategy {
    elevated: bool,
    timeout: Duration,
}

impl PrivilegedLowLevelStrategy {
    /// Checks the process token once; the answer cannot change at runtime.
    pub fn detect(timeout: Duration) -> Self {
        let elevated = is_process_elevated();
        debug!(elevated, "privileged injection availability");
        Self { elevated, timeout }
    }
}

#[async_trait]
impl InjectionStrategy for PrivilegedLowLevelStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PrivilegedLowLevel
    }

    async fn attempt(&self, intent: &InjectionIntent, window: &WindowHandle) -> Result<(), StrategyError> {
        if !self.elevated {
            return Err(StrategyError::Unavailable("process is not elevated".to_string()));
        }
        let id = window.id;
        let steps = intent.steps();
        let timeout_ms = self.timeout.as_millis().min(u128::from(u32::MAX)) as u32;
        blocking(move || deliver_messages(id, &steps, MessageMode::Send { timeout_ms })).await
    }
}

fn is_process_elevated() -> bool {
    // SAFETY: the token handle is closed before returning; `elevation` is a
    // correctly sized out-buffer.
    unsafe {
        let mut token = HANDLE::default();
        if OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token).is_err() {
            return false;
        }
        let mut elevation = TOKEN_ELEVATION::default();
        let mut len = 0u32;
        let queried = GetTokenInformation(
            token,
            TokenElevation,
            Some(&mut elevation as *mut TOKEN_ELEVATION as *mut c_void),
            std::mem::size_of::<TOKEN_ELEVATION>() as u32,
            &mut len,
        );
        let _ = CloseHandle(token);
        queried.is_ok() && elevation.TokenIsElevated != 0
    }
}

// ── #2 Window messages ────────────────────────────────────────────────────────

/// Posted messages addressed by handle.
pub struct WindowMessageStrategy;

#[async_trait]
impl InjectionStrategy for WindowMessageStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::WindowMessage
    }

    async fn attempt(&self, intent: &InjectionIntent, window: &WindowHandle) -> Result<(), StrategyError> {
        let id = window.id;
        let steps = intent.steps();
        blocking(move || deliver_messages(id, &steps, MessageMode::Post)).await
    }
}

#[derive(Clone, Copy)]
enum MessageMode {
    Post,
    Send { timeout_ms: u32 },
}

fn deliver_messages(id: WindowId, steps: &[InputStep], mode: MessageMode) -> Result<(), StrategyError> {
    let (target, origin) = message_target(hwnd_of(id), steps);

    let mut sent: Vec<WindowMessage> = Vec::new();
    for step in plan_messages(steps, origin) {
        match step {
            MessageStep::Pause(d) => std::thread::sleep(d),
            MessageStep::Send(m) => {
                if let Err(e) = send_message(target, m, mode) {
                    let releases = release_messages(&sent);
                    if !releases.is_empty() {
                        debug!(window = %id, count = releases.len(), "releasing keys and buttons after failed delivery");
                    }
                    for release in releases {
                        if let Err(undo) = send_message(target, release, mode) {
                            warn!(window = %id, "could not release after failed delivery: {undo}");
                        }
                    }
                    return Err(e);
                }
                sent.push(m);
            }
        }
    }
    Ok(())
}

fn send_message(target: HWND, m: WindowMessage, mode: MessageMode) -> Result<(), StrategyError> {
    let wparam = WPARAM(m.wparam);
    let lparam = LPARAM(m.lparam);
    match mode {
        MessageMode::Post => {
            // SAFETY: posting to a stale handle fails cleanly.
            unsafe { PostMessageW(target, m.msg, wparam, lparam) }
                .map_err(|e| StrategyError::Rejected(format!("PostMessageW: {e}")))
        }
        MessageMode::Send { timeout_ms } => {
            let mut result = 0usize;
            // SAFETY: `result` is a valid out-parameter.
            let sent = unsafe {
                SendMessageTimeoutW(
                    target,
                    m.msg,
                    wparam,
                    lparam,
                    SMTO_ABORTIFHUNG,
                    timeout_ms,
                    Some(&mut result as *mut usize),
                )
            };
            if sent.0 == 0 {
                Err(StrategyError::Rejected(
                    "SendMessageTimeoutW timed out or was blocked".to_string(),
                ))
            } else {
                Ok(())
            }
        }
    }
}

/// The deepest enabled, visible child under the first pointer step, plus
/// that child's client origin relative to the top-level client area.
fn message_target(hwnd: HWND, steps: &[InputStep]) -> (HWND, Point) {
    let first_point = steps.iter().find_map(|s| match *s {
        InputStep::MoveTo(p) => Some(p),
        InputStep::ButtonDown { at, .. } | InputStep::ButtonUp { at, .. } => Some(at),
        _ => None,
    });
    let Some(p) = first_point else {
        return (hwnd, Point::new(0, 0));
    };

    // SAFETY: all handles come from the OS; out-parameters are valid locals.
    unsafe {
        let child = ChildWindowFromPointEx(hwnd, POINT { x: p.x, y: p.y }, CWP_SKIPDISABLED | CWP_SKIPINVISIBLE);
        if child.0.is_null() || child == hwnd {
            return (hwnd, Point::new(0, 0));
        }
        let mut origin = POINT::default();
        if !ClientToScreen(child, &mut origin).as_bool() || !ScreenToClient(hwnd, &mut origin).as_bool() {
            return (hwnd, Point::new(0, 0));
        }
        (child, Point::new(origin.x, origin.y))
    }
}

// ── #3 Targeted synthetic input ───────────────────────────────────────────────

/// `SendInput` with this thread's input state attached to the target's.
///
/// Pointer intents drive the real cursor, so they run under the pointer
/// arbiter and the cursor is put back afterwards.  Keyboard-only intents
/// skip the arbiter.
pub struct TargetedSyntheticStrategy {
    arbiter: PointerArbiter,
}

impl TargetedSyntheticStrategy {
    pub fn new(arbiter: PointerArbiter) -> Self {
        Self { arbiter }
    }
}

#[async_trait]
impl InjectionStrategy for TargetedSyntheticStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TargetedSynthetic
    }

    async fn attempt(&self, intent: &InjectionIntent, window: &WindowHandle) -> Result<(), StrategyError> {
        let steps = intent.steps();
        let pointer = steps.iter().any(InputStep::is_pointer);
        let guard = if pointer {
            Some(self.arbiter.acquire(window.id).await?)
        } else {
            None
        };
        let window = window.clone();
        let result = blocking(move || attached_send_input(&window, &steps, pointer)).await;
        drop(guard);
        result
    }
}

fn attached_send_input(window: &WindowHandle, steps: &[InputStep], restore_cursor: bool) -> Result<(), StrategyError> {
    // SAFETY: thread ids come from the OS; the attachment and the cursor
    // position are restored before returning.
    unsafe {
        let target_thread = GetWindowThreadProcessId(hwnd_of(window.id), None);
        if target_thread == 0 {
            return Err(StrategyError::Platform("window has no owning thread".to_string()));
        }
        let mut saved = POINT::default();
        if restore_cursor {
            GetCursorPos(&mut saved).map_err(|e| StrategyError::Platform(format!("GetCursorPos: {e}")))?;
        }
        let current = GetCurrentThreadId();
        if !AttachThreadInput(current, target_thread, true).as_bool() {
            return Err(StrategyError::Rejected("AttachThreadInput refused".to_string()));
        }
        let result = replay_send_input(steps, window, CursorMode::Synthetic);
        let _ = AttachThreadInput(current, target_thread, false);
        if restore_cursor {
            let _ = SetCursorPos(saved.x, saved.y);
        }
        result
    }
}

// ── #4 Exclusive real device ──────────────────────────────────────────────────

/// Drives the real cursor and focus, under the global pointer arbiter, and
/// puts both back afterwards.
pub struct ExclusiveRealDeviceStrategy {
    arbiter: PointerArbiter,
}

impl ExclusiveRealDeviceStrategy {
    pub fn new(arbiter: PointerArbiter) -> Self {
        Self { arbiter }
    }
}

#[async_trait]
impl InjectionStrategy for ExclusiveRealDeviceStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ExclusiveRealDevice
    }

    async fn attempt(&self, intent: &InjectionIntent, window: &WindowHandle) -> Result<(), StrategyError> {
        let guard = self.arbiter.acquire(window.id).await?;
        let window = window.clone();
        let steps = intent.steps();
        let result = blocking(move || with_real_device(&window, &steps)).await;
        drop(guard);
        result
    }
}

fn with_real_device(window: &WindowHandle, steps: &[InputStep]) -> Result<(), StrategyError> {
    let hwnd = hwnd_of(window.id);
    // SAFETY: plain Win32 state queries and changes; every change made here
    // is reverted before returning.
    unsafe {
        let mut saved = POINT::default();
        GetCursorPos(&mut saved).map_err(|e| StrategyError::Platform(format!("GetCursorPos: {e}")))?;
        let previous = GetForegroundWindow();
        let activated = previous != hwnd;
        if activated {
            raise(hwnd)?;
        }

        let result = replay_send_input(steps, window, CursorMode::Warp);

        let _ = SetCursorPos(saved.x, saved.y);
        if activated && !previous.0.is_null() {
            let _ = SetForegroundWindow(previous);
        }
        result
    }
}

// ── #5 Foreground activation ──────────────────────────────────────────────────

/// Raises the target and leaves it in front.
pub struct ForegroundActivationStrategy;

#[async_trait]
impl InjectionStrategy for ForegroundActivationStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ForegroundActivation
    }

    async fn attempt(&self, intent: &InjectionIntent, window: &WindowHandle) -> Result<(), StrategyError> {
        if !intent.allows_activation() {
            return Err(StrategyError::ActivationNotPermitted);
        }
        let window = window.clone();
        let steps = intent.steps();
        blocking(move || {
            // SAFETY: see `raise`.
            unsafe { raise(hwnd_of(window.id))? };
            replay_send_input(&steps, &window, CursorMode::Warp)
        })
        .await
    }
}

/// Restores a minimised window and makes it the foreground window.
///
/// # Safety
///
/// `hwnd` may be stale; the calls fail cleanly in that case.
unsafe fn raise(hwnd: HWND) -> Result<(), StrategyError> {
    if IsIconic(hwnd).as_bool() {
        let _ = ShowWindow(hwnd, SW_RESTORE);
    }
    if SetForegroundWindow(hwnd).as_bool() {
        Ok(())
    } else {
        Err(StrategyError::Rejected("SetForegroundWindow refused".to_string()))
    }
}

// ── SendInput replay ──────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq)]
enum CursorMode {
    /// Pointer moves are absolute `SendInput` events.
    Synthetic,
    /// Pointer moves warp the real cursor with `SetCursorPos`.
    Warp,
}

fn replay_send_input(steps: &[InputStep], window: &WindowHandle, mode: CursorMode) -> Result<(), StrategyError> {
    for (i, step) in steps.iter().enumerate() {
        if let Err(e) = replay_step(step, window, mode) {
            for release in pending_releases(&steps[..i]) {
                if let Err(undo) = replay_step(&release, window, mode) {
                    warn!(window = %window.id, "could not release after failed replay: {undo}");
                }
            }
            return Err(e);
        }
    }
    Ok(())
}

fn replay_step(step: &InputStep, window: &WindowHandle, mode: CursorMode) -> Result<(), StrategyError> {
    match *step {
        InputStep::MoveTo(p) => {
            let screen = window.to_screen(p);
            match mode {
                // SAFETY: SetCursorPos has no memory-safety preconditions.
                CursorMode::Warp => unsafe { SetCursorPos(screen.x, screen.y) }
                    .map_err(|e| StrategyError::Rejected(format!("SetCursorPos: {e}"))),
                CursorMode::Synthetic => {
                    let (dx, dy) = normalize_to_virtual_desk(screen, virtual_screen());
                    send_mouse(MOUSEEVENTF_MOVE | MOUSEEVENTF_ABSOLUTE | MOUSEEVENTF_VIRTUALDESK, dx, dy)
                }
            }
        }
        InputStep::ButtonDown { button, .. } => send_mouse(button_flags(button, true), 0, 0),
        InputStep::ButtonUp { button, .. } => send_mouse(button_flags(button, false), 0, 0),
        InputStep::KeyDown(key) | InputStep::KeyUp(key) => {
            let Some(vk) = hid_to_vk(key) else {
                return Err(StrategyError::Rejected(format!("no virtual key for {key:?}")));
            };
            send_key(vk, matches!(step, InputStep::KeyUp(_)))
        }
        InputStep::Pause(d) => {
            std::thread::sleep(d);
            Ok(())
        }
    }
}

fn button_flags(button: MouseButton, down: bool) -> MOUSE_EVENT_FLAGS {
    match (button, down) {
        (MouseButton::Left, true) => MOUSEEVENTF_LEFTDOWN,
        (MouseButton::Left, false) => MOUSEEVENTF_LEFTUP,
        (MouseButton::Right, true) => MOUSEEVENTF_RIGHTDOWN,
        (MouseButton::Right, false) => MOUSEEVENTF_RIGHTUP,
        (MouseButton::Middle, true) => MOUSEEVENTF_MIDDLEDOWN,
        (MouseButton::Middle, false) => MOUSEEVENTF_MIDDLEUP,
    }
}

/// Virtual desktop bounds: (left, top, width, height).
fn virtual_screen() -> (i32, i32, i32, i32) {
    // SAFETY: GetSystemMetrics is always safe to call.
    unsafe {
        (
            GetSystemMetrics(SM_XVIRTUALSCREEN),
            GetSystemMetrics(SM_YVIRTUALSCREEN),
            GetSystemMetrics(SM_CXVIRTUALSCREEN),
            GetSystemMetrics(SM_CYVIRTUALSCREEN),
        )
    }
}

/// Maps a screen point onto the `[0, 65535]` range `MOUSEEVENTF_VIRTUALDESK`
/// expects.
fn normalize_to_virtual_desk(p: Point, (left, top, width, height): (i32, i32, i32, i32)) -> (i32, i32) {
    let scale = |v: i32, origin: i32, extent: i32| -> i32 {
        if extent <= 1 {
            return 0;
        }
        (i64::from(v - origin) * 65535 / i64::from(extent - 1)).clamp(0, 65535) as i32
    };
    (scale(p.x, left, width), scale(p.y, top, height))
}

fn send_mouse(flags: MOUSE_EVENT_FLAGS, dx: i32, dy: i32) -> Result<(), StrategyError> {
    let input = INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx,
                dy,
                mouseData: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    };
    send(input)
}

fn send_key(vk: u8, key_up: bool) -> Result<(), StrategyError> {
    let mut flags = KEYBD_EVENT_FLAGS(0);
    if key_up {
        flags |= KEYEVENTF_KEYUP;
    }
    if is_extended_vk(vk) {
        flags |= KEYEVENTF_EXTENDEDKEY;
    }
    let input = INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(u16::from(vk)),
                wScan: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    };
    send(input)
}

fn send(input: INPUT) -> Result<(), StrategyError> {
    // SAFETY: input is a valid INPUT structure on the stack.
    let inserted = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
    if inserted == 1 {
        Ok(())
    } else {
        Err(StrategyError::Rejected("SendInput was blocked".to_string()))
    }
}
