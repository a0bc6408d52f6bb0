//! Global Pointer Arbiter: the one process-wide gate around the real cursor.
//!
//! Exactly one injection method (the exclusive real-device fallback) moves
//! the physical pointer and the foreground window.  Two loops doing that at
//! the same time would interleave their cursor moves and clicks, so every
//! use of that method runs inside an [`ArbiterGuard`].
//!
//! # Guarantees
//!
//! - **Mutual exclusion** – at most one guard is alive at any time.
//! - **Fairness** – waiters are served in FIFO order (`tokio::sync::Semaphore`
//!   is fair), so no loop starves.
//! - **No timeout** – `acquire` waits as long as it takes; a half-finished
//!   real-pointer action is worse than a late one.
//! - **Scoped release** – dropping the guard releases the gate, including
//!   when the owning task panics or is aborted mid-action.
//!
//! # Force release
//!
//! If a guard is leaked by a dead loop the coordinator calls
//! [`PointerArbiter::force_release`].  That revokes the stale guard: when it
//! is eventually dropped it finds its generation superseded and forgets its
//! permit instead of releasing the gate a second time.

use std::sync::{Arc, Mutex, PoisonError};

use mwp_core::WindowId;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Error type for arbiter acquisition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ArbiterError {
    /// The underlying semaphore was closed; no further acquisitions succeed.
    #[error("pointer arbiter is closed")]
    Closed,
}

/// Who holds the gate, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArbiterHolder {
    pub window: WindowId,
    pub since: Instant,
    generation: u64,
}

#[derive(Debug, Default)]
struct ArbiterState {
    generation: u64,
    holder: Option<ArbiterHolder>,
}

/// Process-wide mutual-exclusion gate for real-pointer actions.
///
/// Cheap to clone; all clones share the same gate.
#[derive(Debug, Clone)]
pub struct PointerArbiter {
    gate: Arc<Semaphore>,
    state: Arc<Mutex<ArbiterState>>,
}

impl PointerArbiter {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(Semaphore::new(1)),
            state: Arc::new(Mutex::new(ArbiterState::default())),
        }
    }

    /// Waits (without timeout, FIFO-fair) until the gate is free and takes it
    /// on behalf of `window`.
    ///
    /// # Errors
    ///
    /// Returns [`ArbiterError::Closed`] if the semaphore has been closed.
    pub async fn acquire(&self, window: WindowId) -> Result<ArbiterGuard, ArbiterError> {
        let permit = Arc::clone(&self.gate)
            .acquire_owned()
            .await
            .map_err(|_| ArbiterError::Closed)?;

        let generation = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.generation += 1;
            state.holder = Some(ArbiterHolder {
                window,
                since: Instant::now(),
                generation: state.generation,
            });
            state.generation
        };
        debug!(%window, generation, "pointer arbiter acquired");

        Ok(ArbiterGuard {
            permit: Some(permit),
            state: Arc::clone(&self.state),
            window,
            generation,
        })
    }

    /// Returns the current holder, if any.
    pub fn holder(&self) -> Option<ArbiterHolder> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .holder
    }

    /// Reclaims the gate from `window` if it is the current holder.
    ///
    /// Returns `true` if the gate was reclaimed.  The revoked guard, if it is
    /// ever dropped, will not release the gate again.
    pub fn force_release(&self, window: WindowId) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.holder {
            Some(h) if h.window == window => {
                state.holder = None;
                self.gate.add_permits(1);
                warn!(%window, generation = h.generation, "pointer arbiter force-released");
                true
            }
            _ => false,
        }
    }
}

impl Default for PointerArbiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped ownership of the pointer arbiter.  Releases the gate on drop.
#[derive(Debug)]
pub struct ArbiterGuard {
    permit: Option<OwnedSemaphorePermit>,
    state: Arc<Mutex<ArbiterState>>,
    window: WindowId,
    generation: u64,
}

impl ArbiterGuard {
    pub fn window(&self) -> WindowId {
        self.window
    }
}

impl Drop for ArbiterGuard {
    fn drop(&mut self) {
        let Some(permit) = self.permit.take() else {
            return;
        };
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let still_current = state
            .holder
            .is_some_and(|h| h.generation == self.generation);
        if still_current {
            state.holder = None;
            drop(state);
            drop(permit);
            debug!(window = %self.window, generation = self.generation, "pointer arbiter released");
        } else {
            // Revoked by force_release; the gate was already handed back.
            permit.forget();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_acquire_records_holder_and_drop_clears_it() {
        // Arrange
        let arbiter = PointerArbiter::new();

        // Act
        let guard = arbiter.acquire(WindowId(1)).await.unwrap();
        let held = arbiter.holder();
        drop(guard);

        // Assert
        assert_eq!(held.map(|h| h.window), Some(WindowId(1)));
        assert!(arbiter.holder().is_none());
    }

    #[tokio::test]
    async fn test_second_acquire_waits_for_release() {
        let arbiter = PointerArbiter::new();
        let guard = arbiter.acquire(WindowId(1)).await.unwrap();

        let waiting = tokio::time::timeout(Duration::from_millis(50), arbiter.acquire(WindowId(2))).await;
        assert!(waiting.is_err(), "second acquire must block while the gate is held");

        drop(guard);
        let second = arbiter.acquire(WindowId(2)).await.unwrap();
        assert_eq!(second.window(), WindowId(2));
    }

    #[tokio::test]
    async fn test_force_release_frees_gate_held_by_leaked_guard() {
        // Arrange: a guard that is never dropped.
        let arbiter = PointerArbiter::new();
        let leaked = arbiter.acquire(WindowId(7)).await.unwrap();
        std::mem::forget(leaked);

        // Act
        let reclaimed = arbiter.force_release(WindowId(7));

        // Assert
        assert!(reclaimed);
        let next = tokio::time::timeout(Duration::from_millis(50), arbiter.acquire(WindowId(8))).await;
        assert!(next.is_ok(), "gate must be available after force release");
    }

    #[tokio::test]
    async fn test_revoked_guard_drop_does_not_double_release() {
        let arbiter = PointerArbiter::new();
        let stale = arbiter.acquire(WindowId(1)).await.unwrap();
        assert!(arbiter.force_release(WindowId(1)));

        let current = arbiter.acquire(WindowId(2)).await.unwrap();
        drop(stale);

        // The gate is still held by window 2; a third caller must wait.
        assert_eq!(arbiter.holder().map(|h| h.window), Some(WindowId(2)));
        let third = tokio::time::timeout(Duration::from_millis(50), arbiter.acquire(WindowId(3))).await;
        assert!(third.is_err());
        drop(current);
    }

    #[tokio::test]
    async fn test_force_release_ignores_non_holder() {
        let arbiter = PointerArbiter::new();
        let _guard = arbiter.acquire(WindowId(1)).await.unwrap();
        assert!(!arbiter.force_release(WindowId(2)));
        assert_eq!(arbiter.holder().map(|h| h.window), Some(WindowId(1)));
    }

    #[tokio::test]
    async fn test_guard_released_when_holding_task_panics() {
        let arbiter = PointerArbiter::new();
        let a = arbiter.clone();
        let handle = tokio::spawn(async move {
            let _guard = a.acquire(WindowId(9)).await.unwrap();
            panic!("loop crashed mid-action");
        });
        assert!(handle.await.is_err());

        assert!(arbiter.holder().is_none());
        let next = tokio::time::timeout(Duration::from_millis(50), arbiter.acquire(WindowId(1))).await;
        assert!(next.is_ok());
    }
}
