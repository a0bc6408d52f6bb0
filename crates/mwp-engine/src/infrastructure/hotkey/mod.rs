//! Global stop hotkey.
//!
//! The watcher samples the keyboard every [`POLL_INTERVAL`] and requests a
//! stop of every control loop the first time the configured chord (default
//! `Ctrl+Q`) is fully held.  It reads the physical key state, so it works no
//! matter which window has focus.
//!
//! | Module    | OS      | Notes                                      |
//! |-----------|---------|--------------------------------------------|
//! | `windows` | Windows | `GetAsyncKeyState`                         |
//! | `mock`    | any     | in-memory key state for tests and dry runs |

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

use std::sync::Arc;
use std::time::Duration;

use mwp_core::keymap::{ChordLatch, Hotkey};
use tokio::sync::watch;
use tracing::{debug, info};

pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Source of "is this key physically down?" answers, by Virtual Key code.
pub trait KeyStateReader: Send + Sync {
    fn is_down(&self, vk: u8) -> bool;
}

/// Polls `keys` until `hotkey` is pressed, then sends `true` on `stop`.
///
/// Returns early, without sending, once a stop has been requested some
/// other way.
pub async fn watch_stop_hotkey(hotkey: Hotkey, keys: Arc<dyn KeyStateReader>, stop: Arc<watch::Sender<bool>>) {
    let vks = hotkey.vk_codes();
    let mut latch = ChordLatch::default();
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    debug!(%hotkey, "stop hotkey armed");
    loop {
        ticker.tick().await;
        if *stop.borrow() {
            return;
        }
        let all_down = vks.iter().all(|&vk| keys.is_down(vk));
        if latch.update(all_down) {
            info!(%hotkey, "stop hotkey pressed, stopping all control loops");
            stop.send_replace(true);
            return;
        }
    }
}
