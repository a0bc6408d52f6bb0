//! Status stream: a broadcast of everything observable the engine does.
//!
//! Loops and the coordinator publish; the binary subscribes and logs.  The
//! bus is lossy by nature (`tokio::sync::broadcast` drops the oldest events
//! for slow subscribers), which is acceptable for diagnostics and keeps a
//! stalled subscriber from blocking a control loop.

use mwp_core::{InjectionOutcome, WindowHandle, WindowId};
use tokio::sync::broadcast;

use super::control_loop::{ControlPhase, LoopExit};

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum StatusKind {
    WindowRegistered { handle: WindowHandle },
    WindowRemoved,
    PhaseChanged { from: ControlPhase, to: ControlPhase },
    DetectionsFound { count: usize, nearest: Option<String> },
    Injection(InjectionOutcome),
    Fault { reason: String, consecutive_failures: u32 },
    LoopExited { reason: LoopExit },
    LoopCrashed { restarts: u32 },
}

#[derive(Debug, Clone)]
pub struct StatusEvent {
    pub window: WindowId,
    pub kind: StatusKind,
}

/// Cheaply cloneable publisher handle.
#[derive(Debug, Clone)]
pub struct StatusBus {
    tx: broadcast::Sender<StatusEvent>,
}

impl StatusBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes an event.  Having no subscribers is not an error.
    pub fn publish(&self, window: WindowId, kind: StatusKind) {
        let _ = self.tx.send(StatusEvent { window, kind });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.tx.subscribe()
    }
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new()
    }
}
