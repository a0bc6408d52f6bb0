//! Injection outcomes: which delivery method carried an intent, if any.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The five delivery methods, in strictly descending order of
/// reliability-without-side-effects.
///
/// The derived `Ord` follows declaration order, so sorting a list of kinds
/// yields the order in which the chain tries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StrategyKind {
    /// Elevated process delivering synchronously into the target's queue.
    PrivilegedLowLevel,
    /// Posted window messages addressed by handle.
    WindowMessage,
    /// `SendInput` with the thread input state attached to the target.
    TargetedSynthetic,
    /// Real cursor and focus moved under the global pointer arbiter.
    ExclusiveRealDevice,
    /// Target raised permanently; only when the intent permits activation.
    ForegroundActivation,
}

impl StrategyKind {
    /// All kinds in chain order.
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::PrivilegedLowLevel,
        StrategyKind::WindowMessage,
        StrategyKind::TargetedSynthetic,
        StrategyKind::ExclusiveRealDevice,
        StrategyKind::ForegroundActivation,
    ];

    /// 1-based position in the chain.
    pub fn rank(self) -> u8 {
        match self {
            StrategyKind::PrivilegedLowLevel => 1,
            StrategyKind::WindowMessage => 2,
            StrategyKind::TargetedSynthetic => 3,
            StrategyKind::ExclusiveRealDevice => 4,
            StrategyKind::ForegroundActivation => 5,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::PrivilegedLowLevel => "privileged-low-level",
            StrategyKind::WindowMessage => "window-message",
            StrategyKind::TargetedSynthetic => "targeted-synthetic",
            StrategyKind::ExclusiveRealDevice => "exclusive-real-device",
            StrategyKind::ForegroundActivation => "foreground-activation",
        };
        write!(f, "#{} {name}", self.rank())
    }
}

/// Result of one strategy's attempt at one intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyAttempt {
    pub kind: StrategyKind,
    /// `None` on success, otherwise the failure reason.
    pub error: Option<String>,
}

/// Record of delivering one intent through the chain.
///
/// Used for logging and the status stream only; control logic looks at
/// nothing but [`InjectionOutcome::is_success`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionOutcome {
    /// Short action name of the delivered intent (`"click"`, `"key-press"`, …).
    pub action: String,
    pub succeeded_with: Option<StrategyKind>,
    pub attempts: Vec<StrategyAttempt>,
    /// Kinds passed over without being invoked (activation not permitted).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<StrategyKind>,
    pub elapsed: Duration,
}

impl InjectionOutcome {
    pub fn is_success(&self) -> bool {
        self.succeeded_with.is_some()
    }

    /// The kinds that were actually invoked, in invocation order.
    pub fn attempted_kinds(&self) -> Vec<StrategyKind> {
        self.attempts.iter().map(|a| a.kind).collect()
    }

    /// One-line human-readable summary of every attempt.
    pub fn detail(&self) -> String {
        self.attempts
            .iter()
            .map(|a| match &a.error {
                None => format!("{}: ok", a.kind),
                Some(e) => format!("{}: {e}", a.kind),
            })
            .chain(self.skipped.iter().map(|k| format!("{k}: skipped")))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ord_matches_chain_order() {
        let mut kinds = vec![
            StrategyKind::ForegroundActivation,
            StrategyKind::PrivilegedLowLevel,
            StrategyKind::ExclusiveRealDevice,
            StrategyKind::WindowMessage,
            StrategyKind::TargetedSynthetic,
        ];
        kinds.sort();
        assert_eq!(kinds, StrategyKind::ALL.to_vec());
    }

    #[test]
    fn test_rank_is_one_based() {
        let ranks: Vec<u8> = StrategyKind::ALL.iter().map(|k| k.rank()).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_detail_lists_every_attempt() {
        let outcome = InjectionOutcome {
            action: "click".to_string(),
            succeeded_with: Some(StrategyKind::WindowMessage),
            attempts: vec![
                StrategyAttempt {
                    kind: StrategyKind::PrivilegedLowLevel,
                    error: Some("not elevated".to_string()),
                },
                StrategyAttempt { kind: StrategyKind::WindowMessage, error: None },
            ],
            skipped: Vec::new(),
            elapsed: Duration::from_millis(3),
        };

        assert!(outcome.is_success());
        assert_eq!(
            outcome.detail(),
            "#1 privileged-low-level: not elevated; #2 window-message: ok"
        );
    }

    #[test]
    fn test_detail_mentions_skipped_kinds() {
        let outcome = InjectionOutcome {
            action: "key-press".to_string(),
            succeeded_with: None,
            attempts: vec![StrategyAttempt {
                kind: StrategyKind::ExclusiveRealDevice,
                error: Some("denied".to_string()),
            }],
            skipped: vec![StrategyKind::ForegroundActivation],
            elapsed: Duration::ZERO,
        };

        assert!(!outcome.is_success());
        assert!(outcome.detail().ends_with("#5 foreground-activation: skipped"));
    }
}
