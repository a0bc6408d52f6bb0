//! Key code tables.
//!
//! All keys are carried as USB HID Usage IDs ([`hid::HidKeyCode`]).  The
//! Windows injection strategies translate them to Virtual Key codes through
//! [`windows_vk`] at the very last moment.  [`hotkey`] parses key chords
//! like `"ctrl+q"`.

pub mod hid;
pub mod hotkey;
pub mod windows_vk;

pub use hid::{HidKeyCode, UnknownKeyName};
pub use hotkey::{ChordLatch, Hotkey, HotkeyError};
