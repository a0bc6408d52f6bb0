//! Scriptable injection strategies for tests and dry runs.
//!
//! # Why a mock strategy?
//!
//! The real strategies move cursors, press keys and raise windows on the
//! machine running the tests.  A [`MockStrategy`] does none of that: it
//! decides success or failure from a script and records every attempt,
//! with start and end timestamps, into a shared [`AttemptLog`].  Tests then
//! assert on the log: which kinds were tried, in what order, for which
//! window, and whether two arbiter-held attempts ever overlapped.
//!
//! # Usage in tests
//!
//! ```ignore
//! let log = AttemptLog::default();
//! let chain = InjectionChain::new(vec![
//!     Arc::new(MockStrategy::failing(StrategyKind::PrivilegedLowLevel, log.clone())),
//!     Arc::new(MockStrategy::succeeding(StrategyKind::WindowMessage, log.clone())),
//! ]);
//! chain.deliver(intent, &window).await;
//! assert_eq!(log.kinds(), vec![StrategyKind::PrivilegedLowLevel, StrategyKind::WindowMessage]);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use mwp_core::{InjectionIntent, InputStep, IntentAction, StrategyKind, WindowHandle, WindowId};
use tokio::time::Instant;

use crate::application::arbiter::PointerArbiter;
use crate::application::inject::{InjectionStrategy, StrategyError};

/// One recorded attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub kind: StrategyKind,
    pub window: WindowId,
    pub action: IntentAction,
    pub started: Instant,
    pub finished: Instant,
    pub succeeded: bool,
}

/// Attempt log shared between several mock strategies.
#[derive(Debug, Clone, Default)]
pub struct AttemptLog(Arc<Mutex<Vec<AttemptRecord>>>);

impl AttemptLog {
    pub fn records(&self) -> Vec<AttemptRecord> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn kinds(&self) -> Vec<StrategyKind> {
        self.records().iter().map(|r| r.kind).collect()
    }

    pub fn for_window(&self, window: WindowId) -> Vec<AttemptRecord> {
        self.records().into_iter().filter(|r| r.window == window).collect()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn push(&self, record: AttemptRecord) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(record);
    }
}

/// A strategy whose results come from a script.
pub struct MockStrategy {
    kind: StrategyKind,
    /// Results consumed front to back; `default_ok` applies once empty.
    script: Mutex<VecDeque<bool>>,
    default_ok: bool,
    /// Simulated duration of one attempt.
    delay: Duration,
    /// When set, attempts run inside an arbiter guard.
    arbiter: Option<PointerArbiter>,
    /// Only intents with pointer steps take the arbiter.
    pointer_only: bool,
    log: AttemptLog,
}

impl MockStrategy {
    pub fn succeeding(kind: StrategyKind, log: AttemptLog) -> Self {
        Self::new(kind, true, log)
    }

    pub fn failing(kind: StrategyKind, log: AttemptLog) -> Self {
        Self::new(kind, false, log)
    }

    fn new(kind: StrategyKind, default_ok: bool, log: AttemptLog) -> Self {
        Self {
            kind,
            script: Mutex::new(VecDeque::new()),
            default_ok,
            delay: Duration::ZERO,
            arbiter: None,
            pointer_only: false,
            log,
        }
    }

    /// Queues results for the next attempts.
    pub fn with_script(self, results: impl IntoIterator<Item = bool>) -> Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(results);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Makes every attempt hold the pointer arbiter, like the real-device
    /// strategy does.
    pub fn with_arbiter(mut self, arbiter: PointerArbiter) -> Self {
        self.arbiter = Some(arbiter);
        self
    }

    /// Makes pointer intents hold the arbiter and lets keyboard-only intents
    /// through, like the targeted synthetic strategy does.
    pub fn with_pointer_arbiter(mut self, arbiter: PointerArbiter) -> Self {
        self.arbiter = Some(arbiter);
        self.pointer_only = true;
        self
    }

    fn next_result(&self) -> bool {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(self.default_ok)
    }
}

#[async_trait]
impl InjectionStrategy for MockStrategy {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    async fn attempt(
        &self,
        intent: &InjectionIntent,
        window: &WindowHandle,
    ) -> Result<(), StrategyError> {
        if self.kind == StrategyKind::ForegroundActivation && !intent.allows_activation() {
            return Err(StrategyError::ActivationNotPermitted);
        }

        let arbitrated = !self.pointer_only || intent.steps().iter().any(InputStep::is_pointer);
        let _guard = match &self.arbiter {
            Some(arbiter) if arbitrated => Some(arbiter.acquire(window.id).await?),
            _ => None,
        };
        let started = Instant::now();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let succeeded = self.next_result();
        self.log.push(AttemptRecord {
            kind: self.kind,
            window: window.id,
            action: intent.action(),
            started,
            finished: Instant::now(),
            succeeded,
        });

        if succeeded {
            Ok(())
        } else {
            Err(StrategyError::Rejected(format!("scripted failure of {}", self.kind)))
        }
    }
}
