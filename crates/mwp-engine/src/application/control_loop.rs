//! Per-Window Control Loop: the autonomous state machine driving one window.
//!
//! # Phases (for beginners)
//!
//! ```text
//!            positive detection              nearest target chosen
//! Scanning ───────────────────► EventPending ─────────────────────► Responding
//!    ▲  │                                                               │
//!    │  │ N consecutive failures                 steps done / budget hit│
//!    │  ▼                                                               │
//!    │ Faulted ◄──────────── N consecutive failures ────────────────────┤
//!    │  │                                                               │
//!    └──┴─── backoff elapsed, observation re-opened ◄───────────────────┘
//!
//! any ──► Terminated   (window gone, stop requested, too many fault cycles)
//! ```
//!
//! - **Scanning** – capture the window, run detection, and drive the
//!   baseline cadence: a movement timer and an attack timer.
//! - **EventPending** – a wanted object was seen.  The cadence timers are
//!   *paused*, not reset, so they continue with the right phase later.
//! - **Responding** – one reaction step per tick: an approach move, then a
//!   bounded series of pickup clicks on the target.  When the reaction ends
//!   a cooldown starts; detections seen during it are recorded but do not
//!   leave `Scanning`, so an object that stays on screen cannot starve the
//!   cadence.
//! - **Faulted** – observation kept failing.  Wait for the backoff, re-open
//!   capture and detection, and go back to scanning.
//! - **Terminated** – final.
//!
//! # Tick structure
//!
//! Every tick starts by resolving the window through the registry, so a
//! closed window terminates the loop within one tick and no intent is ever
//! built for it.  Intents are delivered one at a time; each `deliver` is
//! awaited before the next intent is built.
//!
//! The loop never returns errors.  Failures are classified (see
//! [`ControlError`]), counted, and published on the status bus.
//!
//! Two streaks are counted separately: observation failures (reset by any
//! successful capture + detection) and injection failures (reset only by a
//! delivered intent).  Either one reaching `failure_threshold` faults the
//! loop; the injection streak only counts when `count_injection_failures`
//! is set.

use std::sync::Arc;
use std::time::Duration;

use mwp_core::{
    nearest_detection, Detection, DetectionCriteria, FractionalRect, HidKeyCode, InjectionIntent,
    IntentAction, MouseButton, Point, WindowHandle,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::cadence::PausableTimer;
use super::combat::{AttackBinding, AttackRotation, MovePlan, MovementPlanner};
use super::error::ControlError;
use super::inject::InjectionChain;
use super::observe::{Observation, ObservationFactory};
use super::status::{StatusBus, StatusKind};
use super::window_registry::{RegistryError, WindowRegistry};

// ── State ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlPhase {
    Scanning,
    EventPending,
    Responding,
    Faulted,
    Terminated,
}

/// Why the baseline cadence is currently suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseReason {
    HandlingEvent,
    Faulted,
}

/// Why a loop finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The registry no longer knows the window.
    WindowGone,
    /// Stop was requested (global shutdown or window vanished from a rescan).
    Stopped,
    /// Fault cycling exceeded `max_restarts`; the window is dropped for good.
    Dropped,
}

/// Snapshot of one loop's state, published after every tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlState {
    pub phase: ControlPhase,
    pub last_detection_at: Option<Instant>,
    /// Observation failures since the last successful observation.
    pub consecutive_failures: u32,
    /// Undelivered intents since the last delivered one.
    pub consecutive_injection_failures: u32,
    pub pause_reason: Option<PauseReason>,
    /// Completed fault cycles (Faulted → Scanning).
    pub restarts: u32,
    /// Intents abandoned because every permitted strategy failed.
    pub injection_failures: u64,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            phase: ControlPhase::Scanning,
            last_detection_at: None,
            consecutive_failures: 0,
            consecutive_injection_failures: 0,
            pause_reason: None,
            restarts: 0,
            injection_failures: 0,
        }
    }
}

// ── Settings ──────────────────────────────────────────────────────────────────

/// Everything a loop needs from the configuration, already validated.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub tick_interval: Duration,

    pub movement_interval: Duration,
    pub movement_radius: u32,
    pub max_random_moves: u32,
    pub combat_area: FractionalRect,
    /// Hold applied to a random movement click.
    pub movement_hold: Duration,
    /// Hold applied to the return-to-center click.
    pub center_return_hold: Duration,
    /// Modifier held while moving (`None` for plain clicks).
    pub movement_modifier: Option<HidKeyCode>,

    pub attack_interval: Duration,
    pub attack_bindings: Vec<AttackBinding>,
    /// Hold of the short reposition move issued before a mouse attack.
    /// Zero skips the move.
    pub attack_move_hold: Duration,

    pub criteria: DetectionCriteria,

    pub approach_hold: Duration,
    /// Wait between the approach move and the first pickup click.
    pub approach_settle: Duration,
    pub pickup_attempts: u32,
    pub pickup_interval: Duration,
    /// Upper bound on reaction steps (approach + pickups).
    pub response_step_budget: u32,
    /// Upper bound on time spent in `Responding`.
    pub response_time_budget: Duration,
    /// After a reaction ends, detections are ignored for this long.
    pub reaction_cooldown: Duration,

    pub failure_threshold: u32,
    pub fault_backoff: Duration,
    pub max_restarts: u32,
    pub count_injection_failures: bool,

    /// Whether intents may use foreground activation as a last resort.
    pub allow_activation: bool,
    /// Detect and report, but never inject.
    pub observe_only: bool,
    /// Fixed seed for movement planning (mixed with the window id).
    pub rng_seed: Option<u64>,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            movement_interval: Duration::from_secs(2),
            movement_radius: 150,
            max_random_moves: 30,
            combat_area: FractionalRect::new(0.2, 0.2, 0.8, 0.8).unwrap_or_default(),
            movement_hold: Duration::from_millis(500),
            center_return_hold: Duration::from_secs(1),
            movement_modifier: Some(HidKeyCode::ControlLeft),
            attack_interval: Duration::from_millis(1500),
            attack_bindings: vec![AttackBinding::Mouse(MouseButton::Right)],
            attack_move_hold: Duration::from_millis(300),
            criteria: DetectionCriteria::default(),
            approach_hold: Duration::from_millis(500),
            approach_settle: Duration::from_millis(200),
            pickup_attempts: 5,
            pickup_interval: Duration::from_millis(100),
            response_step_budget: 16,
            response_time_budget: Duration::from_secs(3),
            reaction_cooldown: Duration::from_secs(2),
            failure_threshold: 5,
            fault_backoff: Duration::from_secs(5),
            max_restarts: 3,
            count_injection_failures: false,
            allow_activation: false,
            observe_only: false,
            rng_seed: None,
        }
    }
}

/// Collaborators shared by every loop.  Cheap to clone.
#[derive(Clone)]
pub struct LoopContext {
    pub registry: Arc<dyn WindowRegistry>,
    pub chain: InjectionChain,
    pub observations: Arc<dyn ObservationFactory>,
    pub bus: StatusBus,
    pub settings: Arc<LoopSettings>,
}

// ── Reaction ──────────────────────────────────────────────────────────────────

/// The planned response to one detection.
#[derive(Debug, Clone)]
struct Reaction {
    target: Point,
    label: String,
    total_steps: u32,
    steps_done: u32,
    started: Instant,
    next_step_at: Instant,
}

// ── Loop ──────────────────────────────────────────────────────────────────────

pub struct ControlLoop {
    window: WindowHandle,
    ctx: LoopContext,
    observation: Option<Observation>,
    state: ControlState,
    state_tx: watch::Sender<ControlState>,
    movement_timer: PausableTimer,
    attack_timer: PausableTimer,
    planner: MovementPlanner,
    rotation: AttackRotation,
    pending: Vec<Detection>,
    reaction: Option<Reaction>,
    /// Detections are ignored until this instant.
    cooldown_until: Option<Instant>,
}

impl ControlLoop {
    pub fn new(window: WindowHandle, ctx: LoopContext) -> Self {
        let settings = Arc::clone(&ctx.settings);
        let now = Instant::now();
        let rng = match settings.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ window.id.0),
            None => StdRng::from_os_rng(),
        };
        let (state_tx, _) = watch::channel(ControlState::default());

        Self {
            window,
            observation: None,
            state: ControlState::default(),
            state_tx,
            movement_timer: PausableTimer::new(settings.movement_interval, now),
            attack_timer: PausableTimer::new(settings.attack_interval, now),
            planner: MovementPlanner::new(
                settings.movement_radius,
                settings.combat_area,
                settings.max_random_moves,
                rng,
            ),
            rotation: AttackRotation::new(settings.attack_bindings.clone()),
            pending: Vec::new(),
            reaction: None,
            cooldown_until: None,
            ctx,
        }
    }

    /// Read-only view of this loop's state, updated after every tick.
    pub fn subscribe(&self) -> watch::Receiver<ControlState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn window(&self) -> &WindowHandle {
        &self.window
    }

    /// Runs ticks until the window goes away, stop is requested, or the
    /// window is dropped for repeated faults.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> LoopExit {
        info!(window = %self.window.id, title = %self.window.title, "control loop started");
        let exit = loop {
            if *stop.borrow() {
                break LoopExit::Stopped;
            }
            if let Some(exit) = self.tick(&mut stop).await {
                break exit;
            }
            if sleep_or_stop(self.ctx.settings.tick_interval, &mut stop).await {
                break LoopExit::Stopped;
            }
        };

        self.set_phase(ControlPhase::Terminated);
        self.publish_state();
        info!(window = %self.window.id, ?exit, "control loop finished");
        self.ctx
            .bus
            .publish(self.window.id, StatusKind::LoopExited { reason: exit });
        exit
    }

    /// Executes one tick.  Returns `Some` when the loop must exit.
    pub async fn tick(&mut self, stop: &mut watch::Receiver<bool>) -> Option<LoopExit> {
        match self.ctx.registry.resolve(self.window.id) {
            Ok(rect) => self.window = self.window.with_client_rect(rect),
            Err(RegistryError::NotFound(_)) => {
                info!(window = %self.window.id, "{}", ControlError::WindowGone(self.window.id));
                self.set_phase(ControlPhase::Terminated);
                self.publish_state();
                return Some(LoopExit::WindowGone);
            }
            Err(e) => {
                warn!(window = %self.window.id, "could not resolve window, skipping tick: {e}");
                return None;
            }
        }

        let exit = match self.state.phase {
            ControlPhase::Scanning => {
                self.scan().await;
                None
            }
            ControlPhase::EventPending => {
                self.plan_reaction();
                None
            }
            ControlPhase::Responding => {
                self.respond().await;
                None
            }
            ControlPhase::Faulted => self.recover(stop).await,
            ControlPhase::Terminated => Some(LoopExit::Stopped),
        };
        self.publish_state();
        exit
    }

    // ── Scanning ──────────────────────────────────────────────────────────────

    async fn scan(&mut self) {
        let detections = match self.observe().await {
            Ok(d) => d,
            Err(e) => {
                self.state.consecutive_failures += 1;
                self.record_failure(e, self.state.consecutive_failures);
                return;
            }
        };
        self.state.consecutive_failures = 0;

        let criteria = &self.ctx.settings.criteria;
        let matches: Vec<Detection> = detections.into_iter().filter(|d| criteria.is_match(d)).collect();
        if !matches.is_empty() {
            let now = Instant::now();
            self.state.last_detection_at = Some(now);
            if self.cooldown_until.is_some_and(|until| now < until) {
                debug!(window = %self.window.id, count = matches.len(), "positive detections ignored during reaction cooldown");
            } else {
                debug!(window = %self.window.id, count = matches.len(), "positive detections");
                self.cooldown_until = None;
                self.pending = matches;
                self.set_phase(ControlPhase::EventPending);
                return;
            }
        }

        self.run_cadence().await;
    }

    async fn observe(&mut self) -> Result<Vec<Detection>, ControlError> {
        if self.observation.is_none() {
            self.observation = Some(self.ctx.observations.open(&self.window).await?);
        }
        let Some(observation) = self.observation.as_mut() else {
            return Ok(Vec::new());
        };
        let frame = observation.capture.capture(&self.window).await?;
        let detections = observation
            .detector
            .detect(&frame, &self.ctx.settings.criteria)
            .await?;
        Ok(detections)
    }

    async fn run_cadence(&mut self) {
        let now = Instant::now();
        let move_due = self.movement_timer.poll(now);
        let attack_due = self.attack_timer.poll(now);
        let (width, height) = (self.window.client_rect.width, self.window.client_rect.height);

        if move_due {
            let settings = Arc::clone(&self.ctx.settings);
            let (point, hold) = match self.planner.next(width, height) {
                MovePlan::Random(p) => (p, settings.movement_hold),
                MovePlan::ReturnToCenter(p) => {
                    debug!(window = %self.window.id, "returning to center");
                    (p, settings.center_return_hold)
                }
            };
            let intent = self.movement_intent(point, hold);
            self.deliver(intent).await;
        }

        if attack_due && self.state.phase == ControlPhase::Scanning {
            match self.rotation.next_binding() {
                Some(AttackBinding::Key(key)) => {
                    let intent = self.intent(IntentAction::KeyPress { key });
                    self.deliver(intent).await;
                }
                Some(AttackBinding::Mouse(button)) => {
                    let at = self.planner.random_combat_point(width, height);
                    let hold = self.ctx.settings.attack_move_hold;
                    if !hold.is_zero() {
                        let intent = self.movement_intent(at, hold);
                        self.deliver(intent).await;
                        if self.state.phase != ControlPhase::Scanning {
                            return;
                        }
                    }
                    let intent = self.intent(IntentAction::Click { button, at });
                    self.deliver(intent).await;
                }
                None => {}
            }
        }
    }

    // ── Event handling ────────────────────────────────────────────────────────

    fn plan_reaction(&mut self) {
        let reference = self.window.reference_point();
        let pending = std::mem::take(&mut self.pending);
        let Some(index) = nearest_detection(&pending, reference) else {
            self.set_phase(ControlPhase::Scanning);
            return;
        };
        let target = &pending[index];

        let settings = &self.ctx.settings;
        let total_steps = (1 + settings.pickup_attempts).min(settings.response_step_budget);
        let now = Instant::now();
        self.ctx.bus.publish(
            self.window.id,
            StatusKind::DetectionsFound {
                count: pending.len(),
                nearest: Some(target.label.clone()),
            },
        );
        info!(
            window = %self.window.id,
            label = %target.label,
            confidence = target.confidence,
            x = target.target_point().x,
            y = target.target_point().y,
            "responding to nearest detection"
        );
        self.reaction = Some(Reaction {
            target: target.target_point(),
            label: target.label.clone(),
            total_steps,
            steps_done: 0,
            started: now,
            next_step_at: now,
        });
        self.set_phase(ControlPhase::Responding);
    }

    async fn respond(&mut self) {
        let Some(mut reaction) = self.reaction.take() else {
            self.set_phase(ControlPhase::Scanning);
            return;
        };
        let settings = Arc::clone(&self.ctx.settings);
        let now = Instant::now();

        if now.duration_since(reaction.started) > settings.response_time_budget {
            warn!(window = %self.window.id, label = %reaction.label, "response time budget exceeded");
            self.set_phase(ControlPhase::Scanning);
            return;
        }

        if now >= reaction.next_step_at && reaction.steps_done < reaction.total_steps {
            let intent = if reaction.steps_done == 0 {
                self.movement_intent(reaction.target, settings.approach_hold)
            } else {
                self.intent(IntentAction::Click {
                    button: MouseButton::Left,
                    at: reaction.target,
                })
            };
            self.deliver(intent).await;

            let gap = if reaction.steps_done == 0 {
                settings.approach_settle
            } else {
                settings.pickup_interval
            };
            reaction.steps_done += 1;
            reaction.next_step_at = Instant::now() + gap;
        }

        if self.state.phase != ControlPhase::Responding {
            // An injection failure may have faulted the loop mid-reaction.
            return;
        }
        if reaction.steps_done >= reaction.total_steps {
            debug!(window = %self.window.id, steps = reaction.steps_done, "reaction complete");
            self.set_phase(ControlPhase::Scanning);
        } else {
            self.reaction = Some(reaction);
        }
    }

    // ── Faults ────────────────────────────────────────────────────────────────

    async fn recover(&mut self, stop: &mut watch::Receiver<bool>) -> Option<LoopExit> {
        let settings = Arc::clone(&self.ctx.settings);
        if sleep_or_stop(settings.fault_backoff, stop).await {
            return Some(LoopExit::Stopped);
        }

        self.state.restarts += 1;
        if self.state.restarts > settings.max_restarts {
            error!(
                window = %self.window.id,
                restarts = self.state.restarts,
                "fault cycling exceeded max restarts; dropping window"
            );
            self.set_phase(ControlPhase::Terminated);
            return Some(LoopExit::Dropped);
        }

        self.observation = None;
        match self.ctx.observations.open(&self.window).await {
            Ok(observation) => {
                info!(window = %self.window.id, restarts = self.state.restarts, "observation re-opened");
                self.observation = Some(observation);
                self.state.consecutive_failures = 0;
                self.state.consecutive_injection_failures = 0;
                self.set_phase(ControlPhase::Scanning);
            }
            Err(e) => {
                warn!(window = %self.window.id, "re-opening observation failed: {e}");
            }
        }
        None
    }

    /// Reports a failure whose streak now stands at `consecutive_failures`
    /// and faults the loop once the streak reaches the threshold.
    fn record_failure(&mut self, err: ControlError, consecutive_failures: u32) {
        warn!(window = %self.window.id, consecutive_failures, "{err}");
        self.ctx.bus.publish(
            self.window.id,
            StatusKind::Fault {
                reason: err.to_string(),
                consecutive_failures,
            },
        );
        if consecutive_failures >= self.ctx.settings.failure_threshold
            && matches!(self.state.phase, ControlPhase::Scanning | ControlPhase::Responding)
        {
            self.reaction = None;
            self.set_phase(ControlPhase::Faulted);
        }
    }

    // ── Injection ─────────────────────────────────────────────────────────────

    fn intent(&self, action: IntentAction) -> InjectionIntent {
        InjectionIntent::new(self.window.id, action).with_activation(self.ctx.settings.allow_activation)
    }

    fn movement_intent(&self, at: Point, hold: Duration) -> InjectionIntent {
        let intent = self
            .intent(IntentAction::Click {
                button: MouseButton::Left,
                at,
            })
            .with_hold(hold);
        match self.ctx.settings.movement_modifier {
            Some(key) => intent.with_modifier(key),
            None => intent,
        }
    }

    async fn deliver(&mut self, intent: InjectionIntent) {
        if self.ctx.settings.observe_only {
            debug!(window = %self.window.id, action = intent.action().kind_name(), "observe-only: intent not delivered");
            return;
        }

        let outcome = self.ctx.chain.deliver(intent, &self.window).await;
        let failed = !outcome.is_success();
        let err = failed.then(|| ControlError::InjectionFailed {
            action: outcome.action.clone(),
            detail: outcome.detail(),
        });
        self.ctx
            .bus
            .publish(self.window.id, StatusKind::Injection(outcome));

        match err {
            None => self.state.consecutive_injection_failures = 0,
            Some(err) => {
                self.state.injection_failures += 1;
                self.state.consecutive_injection_failures += 1;
                if self.ctx.settings.count_injection_failures {
                    self.record_failure(err, self.state.consecutive_injection_failures);
                }
            }
        }
    }

    // ── Bookkeeping ───────────────────────────────────────────────────────────

    fn set_phase(&mut self, to: ControlPhase) {
        let from = self.state.phase;
        if from == to {
            return;
        }
        let now = Instant::now();
        if from == ControlPhase::Responding && to == ControlPhase::Scanning {
            self.cooldown_until = Some(now + self.ctx.settings.reaction_cooldown);
        }
        match to {
            ControlPhase::Scanning => {
                self.movement_timer.resume(now);
                self.attack_timer.resume(now);
                self.state.pause_reason = None;
            }
            ControlPhase::EventPending | ControlPhase::Responding => {
                self.movement_timer.pause(now);
                self.attack_timer.pause(now);
                self.state.pause_reason = Some(PauseReason::HandlingEvent);
            }
            ControlPhase::Faulted => {
                self.movement_timer.pause(now);
                self.attack_timer.pause(now);
                self.state.pause_reason = Some(PauseReason::Faulted);
            }
            ControlPhase::Terminated => {}
        }
        self.state.phase = to;
        debug!(window = %self.window.id, ?from, ?to, "phase changed");
        self.ctx
            .bus
            .publish(self.window.id, StatusKind::PhaseChanged { from, to });
    }

    fn publish_state(&self) {
        self.state_tx.send_replace(self.state.clone());
    }
}

/// Sleeps for `duration`, waking early on a stop request.
///
/// Returns `true` if stop was requested (or the stop sender is gone).
async fn sleep_or_stop(duration: Duration, stop: &mut watch::Receiver<bool>) -> bool {
    if *stop.borrow() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        changed = stop.changed() => changed.is_err() || *stop.borrow(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::inject::InjectionStrategy;
    use crate::application::observe::{CaptureError, CaptureService, DetectionError, DetectionService, Frame};
    use crate::application::window_registry::MockWindowRegistry;
    use async_trait::async_trait;
    use mwp_core::{Rect, StrategyKind, WindowId};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    // ── Test doubles ──────────────────────────────────────────────────────────

    type Script = Arc<Mutex<VecDeque<Result<Vec<Detection>, ()>>>>;

    struct BlankCapture;

    #[async_trait]
    impl CaptureService for BlankCapture {
        async fn capture(&mut self, w: &WindowHandle) -> Result<Frame, CaptureError> {
            Ok(Frame::blank(w.client_rect.width, w.client_rect.height))
        }
    }

    struct ScriptedDetector(Script);

    #[async_trait]
    impl DetectionService for ScriptedDetector {
        async fn detect(&mut self, _: &Frame, _: &DetectionCriteria) -> Result<Vec<Detection>, DetectionError> {
            match self.0.lock().unwrap().pop_front() {
                Some(Ok(d)) => Ok(d),
                Some(Err(())) => Err(DetectionError::Unavailable("scripted".to_string())),
                None => Ok(Vec::new()),
            }
        }
    }

    struct Factory {
        script: Script,
        opens: Arc<Mutex<u32>>,
    }

    #[async_trait]
    impl ObservationFactory for Factory {
        async fn open(&self, _: &WindowHandle) -> Result<Observation, ControlError> {
            *self.opens.lock().unwrap() += 1;
            Ok(Observation {
                capture: Box::new(BlankCapture),
                detector: Box::new(ScriptedDetector(Arc::clone(&self.script))),
            })
        }
    }

    struct Recorder(Arc<Mutex<Vec<IntentAction>>>);

    #[async_trait]
    impl InjectionStrategy for Recorder {
        fn kind(&self) -> StrategyKind {
            StrategyKind::WindowMessage
        }
        async fn attempt(
            &self,
            intent: &InjectionIntent,
            _: &WindowHandle,
        ) -> Result<(), crate::application::inject::StrategyError> {
            self.0.lock().unwrap().push(intent.action());
            Ok(())
        }
    }

    struct Harness {
        control: ControlLoop,
        script: Script,
        opens: Arc<Mutex<u32>>,
        sent: Arc<Mutex<Vec<IntentAction>>>,
        stop_tx: watch::Sender<bool>,
        stop_rx: watch::Receiver<bool>,
    }

    fn harness(registry: MockWindowRegistry, settings: LoopSettings) -> Harness {
        let script: Script = Arc::new(Mutex::new(VecDeque::new()));
        let opens = Arc::new(Mutex::new(0));
        let sent = Arc::new(Mutex::new(Vec::new()));
        let ctx = LoopContext {
            registry: Arc::new(registry),
            chain: InjectionChain::new(vec![Arc::new(Recorder(Arc::clone(&sent)))]),
            observations: Arc::new(Factory {
                script: Arc::clone(&script),
                opens: Arc::clone(&opens),
            }),
            bus: StatusBus::new(),
            settings: Arc::new(settings),
        };
        let window = WindowHandle::new(WindowId(1), Rect::new(100, 50, 800, 600), "game", "game.exe");
        let (stop_tx, stop_rx) = watch::channel(false);
        Harness {
            control: ControlLoop::new(window, ctx),
            script,
            opens,
            sent,
            stop_tx,
            stop_rx,
        }
    }

    fn live_registry() -> MockWindowRegistry {
        let mut registry = MockWindowRegistry::new();
        registry
            .expect_resolve()
            .returning(|_| Ok(Rect::new(100, 50, 800, 600)));
        registry
    }

    fn quiet_settings() -> LoopSettings {
        LoopSettings {
            movement_interval: Duration::from_secs(3600),
            attack_interval: Duration::from_secs(3600),
            rng_seed: Some(1),
            ..LoopSettings::default()
        }
    }

    fn item(x: i32, y: i32) -> Detection {
        Detection::new("item", 0.95, Rect::new(x - 10, y - 10, 20, 20))
    }

    // ── Tests ─────────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_window_gone_terminates_within_one_tick() {
        // Arrange
        let mut registry = MockWindowRegistry::new();
        registry
            .expect_resolve()
            .returning(|id| Err(RegistryError::NotFound(id)));
        let mut h = harness(registry, quiet_settings());

        // Act
        let exit = h.control.tick(&mut h.stop_rx).await;

        // Assert
        assert_eq!(exit, Some(LoopExit::WindowGone));
        assert_eq!(h.control.state().phase, ControlPhase::Terminated);
        assert!(h.sent.lock().unwrap().is_empty());
        assert_eq!(*h.opens.lock().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_positive_detection_pauses_timers_and_moves_to_event_pending() {
        let mut h = harness(live_registry(), quiet_settings());
        h.script.lock().unwrap().push_back(Ok(vec![item(300, 300)]));

        h.control.tick(&mut h.stop_rx).await;

        assert_eq!(h.control.state().phase, ControlPhase::EventPending);
        assert_eq!(h.control.state().pause_reason, Some(PauseReason::HandlingEvent));
        assert!(h.control.state().last_detection_at.is_some());
        assert!(h.control.movement_timer.is_paused());
        assert!(h.control.attack_timer.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_low_confidence_detection_is_ignored() {
        let mut h = harness(live_registry(), quiet_settings());
        h.script
            .lock()
            .unwrap()
            .push_back(Ok(vec![Detection::new("item", 0.5, Rect::new(0, 0, 10, 10))]));

        h.control.tick(&mut h.stop_rx).await;

        assert_eq!(h.control.state().phase, ControlPhase::Scanning);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaction_approaches_nearest_then_clicks_pickup_attempts() {
        // Arrange: two candidates; (420, 300) is nearer the center (400, 300).
        let settings = LoopSettings {
            pickup_attempts: 2,
            ..quiet_settings()
        };
        let mut h = harness(live_registry(), settings);
        h.script
            .lock()
            .unwrap()
            .push_back(Ok(vec![item(700, 500), item(420, 300)]));

        // Act: scan, plan, then tick until the reaction completes.
        for _ in 0..20 {
            h.control.tick(&mut h.stop_rx).await;
            tokio::time::sleep(Duration::from_millis(100)).await;
            if h.control.state().phase == ControlPhase::Scanning && !h.sent.lock().unwrap().is_empty() {
                break;
            }
        }

        // Assert
        let target = Point::new(420, 300);
        let sent = h.sent.lock().unwrap().clone();
        assert_eq!(
            sent,
            vec![
                IntentAction::Click { button: MouseButton::Left, at: target },
                IntentAction::Click { button: MouseButton::Left, at: target },
                IntentAction::Click { button: MouseButton::Left, at: target },
            ]
        );
        assert_eq!(h.control.state().phase, ControlPhase::Scanning);
        assert!(!h.control.movement_timer.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_faulted_exactly_at_threshold_and_scanning_after_backoff() {
        // Arrange
        let settings = LoopSettings {
            failure_threshold: 3,
            fault_backoff: Duration::from_secs(5),
            ..quiet_settings()
        };
        let mut h = harness(live_registry(), settings);
        h.script.lock().unwrap().extend([Err(()), Err(()), Err(())]);

        // Act / Assert: two failures keep scanning, the third faults.
        h.control.tick(&mut h.stop_rx).await;
        h.control.tick(&mut h.stop_rx).await;
        assert_eq!(h.control.state().phase, ControlPhase::Scanning);
        assert_eq!(h.control.state().consecutive_failures, 2);

        h.control.tick(&mut h.stop_rx).await;
        assert_eq!(h.control.state().phase, ControlPhase::Faulted);

        let before = Instant::now();
        h.control.tick(&mut h.stop_rx).await;
        assert!(Instant::now().duration_since(before) >= Duration::from_secs(5));
        assert_eq!(h.control.state().phase, ControlPhase::Scanning);
        assert_eq!(h.control.state().consecutive_failures, 0);
        assert_eq!(h.control.state().restarts, 1);
        assert_eq!(*h.opens.lock().unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fault_cycling_beyond_max_restarts_drops_window() {
        let settings = LoopSettings {
            failure_threshold: 1,
            max_restarts: 1,
            fault_backoff: Duration::from_millis(10),
            ..quiet_settings()
        };
        let mut h = harness(live_registry(), settings);
        h.script.lock().unwrap().extend([Err(()), Err(())]);

        assert_eq!(h.control.tick(&mut h.stop_rx).await, None); // fault 1
        assert_eq!(h.control.tick(&mut h.stop_rx).await, None); // restart 1
        assert_eq!(h.control.tick(&mut h.stop_rx).await, None); // fault 2
        let exit = h.control.tick(&mut h.stop_rx).await; // restart 2 > max

        assert_eq!(exit, Some(LoopExit::Dropped));
        assert_eq!(h.control.state().phase, ControlPhase::Terminated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cadence_fires_movement_and_attack() {
        let settings = LoopSettings {
            movement_interval: Duration::from_secs(2),
            attack_interval: Duration::from_secs(2),
            attack_bindings: vec![AttackBinding::Key(HidKeyCode::Digit1)],
            rng_seed: Some(9),
            ..LoopSettings::default()
        };
        let mut h = harness(live_registry(), settings);

        tokio::time::sleep(Duration::from_secs(2)).await;
        h.control.tick(&mut h.stop_rx).await;

        let sent = h.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert!(matches!(sent[0], IntentAction::Click { button: MouseButton::Left, .. }));
        assert_eq!(sent[1], IntentAction::KeyPress { key: HidKeyCode::Digit1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_observe_only_never_injects() {
        let settings = LoopSettings {
            observe_only: true,
            movement_interval: Duration::from_millis(100),
            ..quiet_settings()
        };
        let mut h = harness(live_registry(), settings);

        tokio::time::sleep(Duration::from_secs(1)).await;
        h.control.tick(&mut h.stop_rx).await;

        assert!(h.sent.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_exits_on_stop_request() {
        let h = harness(live_registry(), quiet_settings());
        let state = h.control.subscribe();
        let task = tokio::spawn(h.control.run(h.stop_rx.clone()));

        tokio::time::sleep(Duration::from_millis(350)).await;
        h.stop_tx.send(true).unwrap();

        assert_eq!(task.await.unwrap(), LoopExit::Stopped);
        assert_eq!(state.borrow().phase, ControlPhase::Terminated);
    }
}
