//! Physical key state via `GetAsyncKeyState`.

#![cfg(target_os = "windows")]

use windows::Win32::UI::Input::KeyboardAndMouse::GetAsyncKeyState;

use super::KeyStateReader;

#[derive(Debug, Default, Clone, Copy)]
pub struct AsyncKeyState;

impl KeyStateReader for AsyncKeyState {
    fn is_down(&self, vk: u8) -> bool {
        // SAFETY: `GetAsyncKeyState` only reads global input state.
        let state = unsafe { GetAsyncKeyState(i32::from(vk)) };
        (state as u16) & 0x8000 != 0
    }
}
