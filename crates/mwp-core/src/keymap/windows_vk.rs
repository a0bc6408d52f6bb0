//! USB HID Usage ID to Windows Virtual Key (VK) code translation.
//!
//! Reference: Windows Virtual-Key Codes (winuser.h) and USB HID Usage Tables 1.3.
//!
//! The injection strategies need VK codes for `WM_KEYDOWN`/`WM_KEYUP` and
//! `SendInput`.  The table lives here, OS-free, so it can be unit-tested on
//! any platform.

use super::hid::HidKeyCode;

/// Translates a HID Usage ID to a Windows Virtual Key code.
///
/// Returns `None` for [`HidKeyCode::Unknown`].
pub fn hid_to_vk(hid: HidKeyCode) -> Option<u8> {
    use HidKeyCode::*;
    let vk = match hid {
        // VK_A..VK_Z are ASCII 'A'..'Z'; HID letters are contiguous from 0x04.
        KeyA | KeyB | KeyC | KeyD | KeyE | KeyF | KeyG | KeyH | KeyI | KeyJ | KeyK | KeyL
        | KeyM | KeyN | KeyO | KeyP | KeyQ | KeyR | KeyS | KeyT | KeyU | KeyV | KeyW | KeyX
        | KeyY | KeyZ => 0x41 + (hid.as_u16() - KeyA.as_u16()) as u8,
        // VK_1..VK_9 are ASCII '1'..'9'; HID puts Digit0 after Digit9.
        Digit1 | Digit2 | Digit3 | Digit4 | Digit5 | Digit6 | Digit7 | Digit8 | Digit9 => {
            0x31 + (hid.as_u16() - Digit1.as_u16()) as u8
        }
        Digit0 => 0x30,
        Enter => 0x0D,     // VK_RETURN
        Escape => 0x1B,    // VK_ESCAPE
        Backspace => 0x08, // VK_BACK
        Tab => 0x09,       // VK_TAB
        Space => 0x20,     // VK_SPACE
        Minus => 0xBD,     // VK_OEM_MINUS
        Equal => 0xBB,     // VK_OEM_PLUS
        F1 | F2 | F3 | F4 | F5 | F6 | F7 | F8 | F9 | F10 | F11 | F12 => {
            0x70 + (hid.as_u16() - F1.as_u16()) as u8
        }
        Insert => 0x2D,
        Home => 0x24,
        PageUp => 0x21, // VK_PRIOR
        Delete => 0x2E,
        End => 0x23,
        PageDown => 0x22, // VK_NEXT
        ArrowLeft => 0x25,
        ArrowUp => 0x26,
        ArrowRight => 0x27,
        ArrowDown => 0x28,
        ControlLeft => 0xA2,
        ControlRight => 0xA3,
        ShiftLeft => 0xA0,
        ShiftRight => 0xA1,
        AltLeft => 0xA4,
        AltRight => 0xA5,
        MetaLeft => 0x5B,
        MetaRight => 0x5C,
        Unknown => return None,
    };
    Some(vk)
}

/// Returns `true` for VK codes that need `KEYEVENTF_EXTENDEDKEY` (and bit 24
/// of a key message's `lParam`).
pub fn is_extended_vk(vk: u8) -> bool {
    matches!(
        vk,
        0x21..=0x28 // navigation + arrows
            | 0x2D | 0x2E // Insert, Delete
            | 0x5B | 0x5C // Win keys
            | 0xA3 | 0xA5 // Right Ctrl, Right Alt
    )
}

/// Generic (side-less) VK code for a modifier, as expected in window
/// messages.  Returns the input unchanged for non-modifiers.
pub fn generic_modifier_vk(vk: u8) -> u8 {
    match vk {
        0xA0 | 0xA1 => 0x10, // VK_SHIFT
        0xA2 | 0xA3 => 0x11, // VK_CONTROL
        0xA4 | 0xA5 => 0x12, // VK_MENU
        other => other,
    }
}
