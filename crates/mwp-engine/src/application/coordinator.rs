//! Coordinator: keeps exactly one control loop alive per live target window.
//!
//! The `RegistryTable` is the coordinator's in-memory view of every window it
//! currently drives.  Each entry tracks:
//!
//! - The window handle as it was when the loop was spawned.
//! - A live view (`watch::Receiver`) of the loop's published `ControlState`.
//! - The loop's id and spawn time, for diagnostics.
//!
//! # Rescan cycle
//!
//! ```text
//! reap finished loops ──► enumerate windows ──► spawn loops for new windows
//!                                           └─► signal stop for vanished ones
//! ```
//!
//! Reaping is where failures are isolated.  A loop that exits normally is
//! simply removed.  A loop that panicked is counted as a crash and spawned
//! again on the next rescan, until it has crashed more than `max_restarts`
//! times.  A window dropped for fault cycling is never spawned again.  If a
//! dead loop still owned the pointer arbiter, the gate is force-released.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use mwp_core::{WindowHandle, WindowId};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::arbiter::PointerArbiter;
use super::control_loop::{ControlLoop, ControlState, LoopContext, LoopExit};
use super::error::ControlError;
use super::status::StatusKind;
use super::window_registry::RegistryError;

// ── Registry table ────────────────────────────────────────────────────────────

/// One driven window.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub handle: WindowHandle,
    pub loop_id: Uuid,
    pub spawned_at: Instant,
    state: watch::Receiver<ControlState>,
}

impl RegistryEntry {
    /// Latest state published by the loop.
    pub fn snapshot(&self) -> ControlState {
        self.state.borrow().clone()
    }
}

/// WindowId → entry.  Mutated only by the coordinator.
#[derive(Debug, Default)]
pub struct RegistryTable {
    entries: HashMap<WindowId, RegistryEntry>,
}

impl RegistryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces the entry for a window.
    pub fn upsert(&mut self, entry: RegistryEntry) {
        self.entries.insert(entry.handle.id, entry);
    }

    /// Snapshot of all entries, ordered by window id.
    pub fn all(&self) -> Vec<RegistryEntry> {
        let mut all: Vec<_> = self.entries.values().cloned().collect();
        all.sort_by_key(|e| e.handle.id);
        all
    }

    pub fn get(&self, id: WindowId) -> Option<&RegistryEntry> {
        self.entries.get(&id)
    }

    pub fn remove(&mut self, id: WindowId) -> Option<RegistryEntry> {
        self.entries.remove(&id)
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Coordinator ───────────────────────────────────────────────────────────────

struct LoopHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<LoopExit>,
}

/// Returned by [`Coordinator::shutdown`] once every loop has been joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopConfirmation {
    pub joined: usize,
}

pub struct Coordinator {
    ctx: LoopContext,
    arbiter: PointerArbiter,
    rescan_interval: Duration,
    table: Arc<RwLock<RegistryTable>>,
    loops: HashMap<WindowId, LoopHandle>,
    crashes: HashMap<WindowId, u32>,
    dropped: HashSet<WindowId>,
}

impl Coordinator {
    pub fn new(ctx: LoopContext, arbiter: PointerArbiter, rescan_interval: Duration) -> Self {
        Self {
            ctx,
            arbiter,
            rescan_interval,
            table: Arc::new(RwLock::new(RegistryTable::new())),
            loops: HashMap::new(),
            crashes: HashMap::new(),
            dropped: HashSet::new(),
        }
    }

    /// Shared read access to the registry table for diagnostics.
    pub fn table(&self) -> Arc<RwLock<RegistryTable>> {
        Arc::clone(&self.table)
    }

    /// Windows excluded from respawning.
    pub fn dropped(&self) -> &HashSet<WindowId> {
        &self.dropped
    }

    /// Number of loops not yet reaped.
    pub fn live_loops(&self) -> usize {
        self.loops.len()
    }

    /// Rescans until `shutdown` is signalled, then stops every loop.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> StopConfirmation {
        info!(interval = ?self.rescan_interval, "coordinator started");
        loop {
            if let Err(e) = self.rescan().await {
                warn!("window enumeration failed: {e}");
            }
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.rescan_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        self.shutdown().await
    }

    /// One rescan cycle: reap, enumerate, spawn new, stop vanished.
    ///
    /// # Errors
    ///
    /// Returns the registry error if enumeration fails.  Reaping has already
    /// happened by then.
    pub async fn rescan(&mut self) -> Result<(), RegistryError> {
        self.reap().await;

        let windows = self.ctx.registry.enumerate()?;
        let present: HashSet<WindowId> = windows.iter().map(|w| w.id).collect();

        for window in windows {
            if self.loops.contains_key(&window.id) || self.dropped.contains(&window.id) {
                continue;
            }
            self.spawn(window).await;
        }

        for (id, handle) in &self.loops {
            if !present.contains(id) && !*handle.stop.borrow() {
                info!(window = %id, "window no longer enumerated; stopping its loop");
                handle.stop.send_replace(true);
            }
        }
        Ok(())
    }

    async fn spawn(&mut self, window: WindowHandle) {
        let id = window.id;
        let control = ControlLoop::new(window.clone(), self.ctx.clone());
        let state = control.subscribe();
        let (stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(control.run(stop_rx));

        let entry = RegistryEntry {
            handle: window.clone(),
            loop_id: Uuid::new_v4(),
            spawned_at: Instant::now(),
            state,
        };
        info!(window = %id, title = %window.title, loop_id = %entry.loop_id, "window registered");
        self.table.write().await.upsert(entry);
        self.loops.insert(id, LoopHandle { stop, task });
        self.ctx
            .bus
            .publish(id, StatusKind::WindowRegistered { handle: window });
    }

    /// Removes every finished loop and classifies how it ended.
    async fn reap(&mut self) {
        let finished: Vec<WindowId> = self
            .loops
            .iter()
            .filter(|(_, h)| h.task.is_finished())
            .map(|(id, _)| *id)
            .collect();

        for id in finished {
            let Some(handle) = self.loops.remove(&id) else {
                continue;
            };
            let result = handle.task.await;
            self.table.write().await.remove(id);

            if self.arbiter.holder().is_some_and(|h| h.window == id) {
                error!(window = %id, "{}", ControlError::ArbiterPoisoned(id));
                self.arbiter.force_release(id);
            }

            match result {
                Ok(LoopExit::Dropped) => {
                    self.dropped.insert(id);
                }
                Ok(_) => {}
                Err(e) => {
                    let crashes = self.crashes.entry(id).or_insert(0);
                    *crashes += 1;
                    let crashes = *crashes;
                    if crashes > self.ctx.settings.max_restarts {
                        error!(window = %id, crashes, "loop keeps crashing; dropping window: {e}");
                        self.dropped.insert(id);
                    } else {
                        warn!(window = %id, crashes, "loop crashed; it will be re-spawned: {e}");
                    }
                    self.ctx
                        .bus
                        .publish(id, StatusKind::LoopCrashed { restarts: crashes });
                }
            }
            self.ctx.bus.publish(id, StatusKind::WindowRemoved);
        }
    }

    /// Signals every loop to stop, joins them all, and clears the table.
    pub async fn shutdown(mut self) -> StopConfirmation {
        info!(loops = self.loops.len(), "stopping all control loops");
        for handle in self.loops.values() {
            handle.stop.send_replace(true);
        }

        let mut joined = 0;
        for (id, handle) in self.loops.drain() {
            match handle.task.await {
                Ok(exit) => info!(window = %id, ?exit, "loop joined"),
                Err(e) => warn!(window = %id, "loop ended abnormally: {e}"),
            }
            if self.arbiter.holder().is_some_and(|h| h.window == id) {
                self.arbiter.force_release(id);
            }
            joined += 1;
        }
        *self.table.write().await = RegistryTable::new();

        info!(joined, "all control loops stopped");
        StopConfirmation { joined }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::control_loop::{ControlPhase, LoopSettings};
    use crate::application::inject::InjectionChain;
    use crate::application::status::StatusBus;
    use crate::infrastructure::capture::mock::MockObservationFactory;
    use crate::infrastructure::window_registry::simulated::SimulatedWindowRegistry;
    use mwp_core::Rect;

    fn context(registry: Arc<SimulatedWindowRegistry>) -> LoopContext {
        LoopContext {
            registry,
            chain: InjectionChain::new(Vec::new()),
            observations: Arc::new(MockObservationFactory::empty()),
            bus: StatusBus::new(),
            settings: Arc::new(LoopSettings {
                movement_interval: Duration::from_secs(3600),
                attack_interval: Duration::from_secs(3600),
                rng_seed: Some(5),
                ..LoopSettings::default()
            }),
        }
    }

    fn window(id: u64) -> WindowHandle {
        WindowHandle::new(WindowId(id), Rect::new(0, 0, 800, 600), format!("game {id}"), "game.exe")
    }

    #[tokio::test(start_paused = true)]
    async fn test_rescan_spawns_one_loop_per_window() {
        // Arrange
        let registry = Arc::new(SimulatedWindowRegistry::new());
        registry.open(window(1));
        registry.open(window(2));
        let mut coordinator = Coordinator::new(context(Arc::clone(&registry)), PointerArbiter::new(), Duration::from_secs(5));

        // Act: two rescans must not double-spawn.
        coordinator.rescan().await.unwrap();
        coordinator.rescan().await.unwrap();

        // Assert
        assert_eq!(coordinator.live_loops(), 2);
        assert_eq!(coordinator.table().read().await.len(), 2);
        coordinator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_window_is_removed_from_table() {
        let registry = Arc::new(SimulatedWindowRegistry::new());
        registry.open(window(1));
        registry.open(window(2));
        let mut coordinator = Coordinator::new(context(Arc::clone(&registry)), PointerArbiter::new(), Duration::from_secs(5));
        coordinator.rescan().await.unwrap();

        registry.close(WindowId(1));
        tokio::time::sleep(Duration::from_millis(500)).await;
        coordinator.rescan().await.unwrap();

        let table = coordinator.table();
        assert!(!table.read().await.contains(WindowId(1)));
        assert!(table.read().await.contains(WindowId(2)));
        assert_eq!(coordinator.shutdown().await, StopConfirmation { joined: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_joins_every_loop() {
        let registry = Arc::new(SimulatedWindowRegistry::new());
        for id in 1..=3 {
            registry.open(window(id));
        }
        let mut coordinator = Coordinator::new(context(Arc::clone(&registry)), PointerArbiter::new(), Duration::from_secs(5));
        coordinator.rescan().await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        let table = coordinator.table();
        let phases: Vec<_> = table.read().await.all().iter().map(|e| e.snapshot().phase).collect();
        assert_eq!(phases, vec![ControlPhase::Scanning; 3]);

        let confirmation = coordinator.shutdown().await;

        assert_eq!(confirmation.joined, 3);
        assert!(table.read().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown_signal() {
        let registry = Arc::new(SimulatedWindowRegistry::new());
        registry.open(window(1));
        let coordinator = Coordinator::new(context(Arc::clone(&registry)), PointerArbiter::new(), Duration::from_secs(1));
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(coordinator.run(rx));

        tokio::time::sleep(Duration::from_secs(3)).await;
        tx.send(true).unwrap();

        assert_eq!(task.await.unwrap(), StopConfirmation { joined: 1 });
    }
}
