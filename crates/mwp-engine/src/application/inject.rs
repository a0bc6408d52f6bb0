//! Injection Strategy Chain: deliver one intent through the first method that
//! accepts it.
//!
//! # How the chain works (for beginners)
//!
//! Windows offers several ways to put input into another application, and
//! none of them works everywhere.  Some games ignore posted messages, some
//! reject `SendInput` while unfocused, and driving the real cursor disturbs
//! whatever the user is doing.  The chain therefore tries the methods in
//! strictly descending order of "reliable without side effects":
//!
//! ```text
//! #1 privileged-low-level ─fail─► #2 window-message ─fail─► #3 targeted-synthetic
//!        ─fail─► #4 exclusive-real-device (under the pointer arbiter)
//!        ─fail─► #5 foreground-activation (only if the intent permits it)
//! ```
//!
//! The first success stops the walk; later methods are never invoked for
//! that intent.  If every permitted method fails the intent is abandoned and
//! the outcome says so.  Failure of the whole chain is not an error: it is a
//! normal, reported result.
//!
//! Each strategy is stateless with respect to intents, so one chain is
//! shared by every control loop.

use std::sync::Arc;

use async_trait::async_trait;
use mwp_core::{InjectionIntent, InjectionOutcome, StrategyAttempt, StrategyKind, WindowHandle};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

use super::arbiter::ArbiterError;

/// Why a single strategy did not deliver an intent.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// The method cannot run in this process (missing privilege, no driver).
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The method ran but the target (or the OS) did not accept the input.
    #[error("rejected: {0}")]
    Rejected(String),

    /// An OS call failed.
    #[error("platform error: {0}")]
    Platform(String),

    /// Foreground activation was invoked for an intent that forbids it.
    #[error("activation not permitted for this intent")]
    ActivationNotPermitted,

    #[error("arbiter: {0}")]
    Arbiter(#[from] ArbiterError),
}

/// One delivery method.
///
/// Implementations: the five Win32 strategies in
/// `infrastructure::injection::windows` and `MockStrategy` for tests.
#[async_trait]
pub trait InjectionStrategy: Send + Sync {
    /// Which rank of the chain this strategy occupies.
    fn kind(&self) -> StrategyKind;

    /// Attempts to deliver `intent` to `window`.
    ///
    /// `window` carries the client rectangle resolved on the current tick.
    /// Window-relative points in the intent are converted against it.
    async fn attempt(
        &self,
        intent: &InjectionIntent,
        window: &WindowHandle,
    ) -> Result<(), StrategyError>;
}

/// The ordered list of strategies shared by all control loops.
#[derive(Clone)]
pub struct InjectionChain {
    strategies: Vec<Arc<dyn InjectionStrategy>>,
}

impl InjectionChain {
    /// Builds a chain.  Strategies are stably sorted by [`StrategyKind`], so
    /// the chain order never depends on the order they were registered in.
    pub fn new(mut strategies: Vec<Arc<dyn InjectionStrategy>>) -> Self {
        strategies.sort_by_key(|s| s.kind());
        Self { strategies }
    }

    /// Kinds in the order they will be tried.
    pub fn kinds(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Delivers `intent`, consuming it.
    ///
    /// Walks the chain in order and stops at the first success.  Foreground
    /// activation is skipped (and recorded as skipped) unless the intent
    /// explicitly allows it.
    pub async fn deliver(&self, intent: InjectionIntent, window: &WindowHandle) -> InjectionOutcome {
        let started = Instant::now();
        let action = intent.action().kind_name().to_string();
        let mut attempts = Vec::new();
        let mut skipped = Vec::new();
        let mut succeeded_with = None;

        for strategy in &self.strategies {
            let kind = strategy.kind();
            if kind == StrategyKind::ForegroundActivation && !intent.allows_activation() {
                skipped.push(kind);
                continue;
            }

            match strategy.attempt(&intent, window).await {
                Ok(()) => {
                    attempts.push(StrategyAttempt { kind, error: None });
                    succeeded_with = Some(kind);
                    break;
                }
                Err(e) => {
                    debug!(window = %window.id, %kind, action, "strategy failed: {e}");
                    attempts.push(StrategyAttempt {
                        kind,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let outcome = InjectionOutcome {
            action,
            succeeded_with,
            attempts,
            skipped,
            elapsed: started.elapsed(),
        };

        match outcome.succeeded_with {
            Some(kind) => debug!(window = %window.id, %kind, action = outcome.action, "intent delivered"),
            None => info!(
                window = %window.id,
                action = outcome.action,
                detail = outcome.detail(),
                "intent abandoned: every permitted strategy failed"
            ),
        }
        outcome
    }
}

impl std::fmt::Debug for InjectionChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InjectionChain")
            .field("kinds", &self.kinds())
            .finish()
    }
}
