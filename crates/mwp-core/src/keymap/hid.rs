//! USB HID Usage IDs (page 0x07, Keyboard/Keypad page).
//!
//! This is the canonical key representation used throughout MultiWindow
//! Pilot.  Configuration files name keys (`"1"`, `"F3"`, `"Space"`,
//! `"Ctrl"`), [`HidKeyCode::from_name`] turns those names into usage IDs, and
//! the Windows adapters translate usage IDs to Virtual Key codes at the
//! injection boundary (see [`super::windows_vk`]).
//!
//! Only the keys an automation profile realistically binds are listed:
//! letters, digits, function keys, the control/navigation cluster, and the
//! modifiers.
//!
//! Reference: USB HID Usage Tables 1.3, Section 10 (Keyboard/Keypad page 0x07).

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A key name in a configuration file did not match any known key.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown key name: {0:?}")]
pub struct UnknownKeyName(pub String);

/// USB HID Usage ID for keyboard keys (page 0x07).
///
/// The numeric value of each variant is its HID Usage ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum HidKeyCode {
    // Letters (HID 0x04–0x1D)
    KeyA = 0x04,
    KeyB = 0x05,
    KeyC = 0x06,
    KeyD = 0x07,
    KeyE = 0x08,
    KeyF = 0x09,
    KeyG = 0x0A,
    KeyH = 0x0B,
    KeyI = 0x0C,
    KeyJ = 0x0D,
    KeyK = 0x0E,
    KeyL = 0x0F,
    KeyM = 0x10,
    KeyN = 0x11,
    KeyO = 0x12,
    KeyP = 0x13,
    KeyQ = 0x14,
    KeyR = 0x15,
    KeyS = 0x16,
    KeyT = 0x17,
    KeyU = 0x18,
    KeyV = 0x19,
    KeyW = 0x1A,
    KeyX = 0x1B,
    KeyY = 0x1C,
    KeyZ = 0x1D,

    // Digits (HID 0x1E–0x27)
    Digit1 = 0x1E,
    Digit2 = 0x1F,
    Digit3 = 0x20,
    Digit4 = 0x21,
    Digit5 = 0x22,
    Digit6 = 0x23,
    Digit7 = 0x24,
    Digit8 = 0x25,
    Digit9 = 0x26,
    Digit0 = 0x27,

    // Control keys
    Enter = 0x28,
    Escape = 0x29,
    Backspace = 0x2A,
    Tab = 0x2B,
    Space = 0x2C,
    Minus = 0x2D,
    Equal = 0x2E,

    // Function keys (HID 0x3A–0x45)
    F1 = 0x3A,
    F2 = 0x3B,
    F3 = 0x3C,
    F4 = 0x3D,
    F5 = 0x3E,
    F6 = 0x3F,
    F7 = 0x40,
    F8 = 0x41,
    F9 = 0x42,
    F10 = 0x43,
    F11 = 0x44,
    F12 = 0x45,

    // Navigation cluster
    Insert = 0x49,
    Home = 0x4A,
    PageUp = 0x4B,
    Delete = 0x4C,
    End = 0x4D,
    PageDown = 0x4E,
    ArrowRight = 0x4F,
    ArrowLeft = 0x50,
    ArrowDown = 0x51,
    ArrowUp = 0x52,

    // Modifier keys (HID 0xE0–0xE7)
    ControlLeft = 0xE0,
    ShiftLeft = 0xE1,
    AltLeft = 0xE2,
    MetaLeft = 0xE3,
    ControlRight = 0xE4,
    ShiftRight = 0xE5,
    AltRight = 0xE6,
    MetaRight = 0xE7,

    /// Sentinel for keys with no mapping.
    Unknown = 0x0000,
}

/// Every named key, in declaration order.  Drives `from_u16` and `from_name`.
const ALL_KEYS: &[HidKeyCode] = {
    use HidKeyCode::*;
    &[
        KeyA, KeyB, KeyC, KeyD, KeyE, KeyF, KeyG, KeyH, KeyI, KeyJ, KeyK, KeyL, KeyM, KeyN,
        KeyO, KeyP, KeyQ, KeyR, KeyS, KeyT, KeyU, KeyV, KeyW, KeyX, KeyY, KeyZ, Digit1, Digit2,
        Digit3, Digit4, Digit5, Digit6, Digit7, Digit8, Digit9, Digit0, Enter, Escape,
        Backspace, Tab, Space, Minus, Equal, F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12,
        Insert, Home, PageUp, Delete, End, PageDown, ArrowRight, ArrowLeft, ArrowDown, ArrowUp,
        ControlLeft, ShiftLeft, AltLeft, MetaLeft, ControlRight, ShiftRight, AltRight,
        MetaRight,
    ]
};

impl HidKeyCode {
    /// Converts a raw HID Usage ID, returning [`HidKeyCode::Unknown`] for
    /// values this table does not name.
    pub fn from_u16(value: u16) -> Self {
        ALL_KEYS
            .iter()
            .copied()
            .find(|k| k.as_u16() == value)
            .unwrap_or(HidKeyCode::Unknown)
    }

    /// Returns the raw USB HID Usage ID value for this key code.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns `true` if this is a modifier key.
    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            HidKeyCode::ControlLeft
                | HidKeyCode::ControlRight
                | HidKeyCode::ShiftLeft
                | HidKeyCode::ShiftRight
                | HidKeyCode::AltLeft
                | HidKeyCode::AltRight
                | HidKeyCode::MetaLeft
                | HidKeyCode::MetaRight
        )
    }

    /// Parses a configuration key name, case-insensitively.
    ///
    /// Accepts the variant name (`"KeyA"`, `"Digit1"`, `"ControlLeft"`), a
    /// bare letter or digit (`"a"`, `"1"`), and the short aliases `"Ctrl"`,
    /// `"Shift"`, `"Alt"`, `"Win"`, `"Esc"`, `"Return"`, `"Left"`, `"Right"`,
    /// `"Up"`, `"Down"` (aliases resolve to the left-hand modifier).
    ///
    /// # Errors
    ///
    /// Returns [`UnknownKeyName`] when the name matches nothing.
    pub fn from_name(name: &str) -> Result<Self, UnknownKeyName> {
        let trimmed = name.trim();
        let lower = trimmed.to_ascii_lowercase();

        let alias = match lower.as_str() {
            "ctrl" | "control" => Some(HidKeyCode::ControlLeft),
            "shift" => Some(HidKeyCode::ShiftLeft),
            "alt" => Some(HidKeyCode::AltLeft),
            "win" | "meta" | "super" => Some(HidKeyCode::MetaLeft),
            "esc" => Some(HidKeyCode::Escape),
            "return" => Some(HidKeyCode::Enter),
            "left" => Some(HidKeyCode::ArrowLeft),
            "right" => Some(HidKeyCode::ArrowRight),
            "up" => Some(HidKeyCode::ArrowUp),
            "down" => Some(HidKeyCode::ArrowDown),
            _ => None,
        };
        if let Some(key) = alias {
            return Ok(key);
        }

        if lower.len() == 1 {
            let c = lower.as_bytes()[0];
            let candidate = match c {
                b'a'..=b'z' => format!("key{}", c as char),
                b'0'..=b'9' => format!("digit{}", c as char),
                _ => String::new(),
            };
            if let Some(key) = ALL_KEYS
                .iter()
                .copied()
                .find(|k| format!("{k:?}").to_ascii_lowercase() == candidate)
            {
                return Ok(key);
            }
        }

        ALL_KEYS
            .iter()
            .copied()
            .find(|k| format!("{k:?}").to_ascii_lowercase() == lower)
            .ok_or_else(|| UnknownKeyName(trimmed.to_string()))
    }
}

impl FromStr for HidKeyCode {
    type Err = UnknownKeyName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HidKeyCode::from_name(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u16_matches_as_u16_for_every_named_key() {
        for &key in ALL_KEYS {
            assert_eq!(HidKeyCode::from_u16(key.as_u16()), key);
        }
    }

    #[test]
    fn test_unknown_u16_values_return_unknown() {
        assert_eq!(HidKeyCode::from_u16(0xFFFF), HidKeyCode::Unknown);
        assert_eq!(HidKeyCode::from_u16(0x0001), HidKeyCode::Unknown);
    }

    #[test]
    fn test_modifier_keys_are_identified_correctly() {
        assert!(HidKeyCode::ControlLeft.is_modifier());
        assert!(HidKeyCode::AltRight.is_modifier());
        assert!(!HidKeyCode::KeyA.is_modifier());
        assert!(!HidKeyCode::Space.is_modifier());
    }

    #[test]
    fn test_from_name_accepts_bare_digits_and_letters() {
        assert_eq!(HidKeyCode::from_name("1"), Ok(HidKeyCode::Digit1));
        assert_eq!(HidKeyCode::from_name("0"), Ok(HidKeyCode::Digit0));
        assert_eq!(HidKeyCode::from_name("q"), Ok(HidKeyCode::KeyQ));
        assert_eq!(HidKeyCode::from_name("Q"), Ok(HidKeyCode::KeyQ));
    }

    #[test]
    fn test_from_name_accepts_variant_names_case_insensitively() {
        assert_eq!(HidKeyCode::from_name("F3"), Ok(HidKeyCode::F3));
        assert_eq!(HidKeyCode::from_name("space"), Ok(HidKeyCode::Space));
        assert_eq!(HidKeyCode::from_name("controlright"), Ok(HidKeyCode::ControlRight));
    }

    #[test]
    fn test_from_name_resolves_aliases() {
        assert_eq!("Ctrl".parse::<HidKeyCode>(), Ok(HidKeyCode::ControlLeft));
        assert_eq!("Esc".parse::<HidKeyCode>(), Ok(HidKeyCode::Escape));
        assert_eq!(" up ".parse::<HidKeyCode>(), Ok(HidKeyCode::ArrowUp));
    }

    #[test]
    fn test_from_name_rejects_unknown_and_sentinel() {
        assert_eq!(
            HidKeyCode::from_name("Hyper"),
            Err(UnknownKeyName("Hyper".to_string()))
        );
        assert!(HidKeyCode::from_name("Unknown").is_err());
        assert!(HidKeyCode::from_name("").is_err());
    }
}
