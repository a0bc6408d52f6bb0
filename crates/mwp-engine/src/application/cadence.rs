//! Pausable interval timers for the periodic movement and attack intents.
//!
//! While a loop is handling an event its background cadence must freeze,
//! then pick up where it left off.  A plain `tokio::time::interval` cannot
//! do that, so each timer tracks the time remaining until its next firing and
//! stops the countdown while paused.
//!
//! Timers are polled, not awaited: the control loop calls [`PausableTimer::poll`]
//! once per tick with the tick's `Instant`.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct PausableTimer {
    interval: Duration,
    remaining: Duration,
    /// `Some(t)` while running: the countdown was last resumed at `t`.
    resumed_at: Option<Instant>,
}

impl PausableTimer {
    /// A running timer that first fires one `interval` after `now`.
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            remaining: interval,
            resumed_at: Some(now),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_paused(&self) -> bool {
        self.resumed_at.is_none()
    }

    /// Time left until the next firing.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.resumed_at {
            Some(t) => self.remaining.saturating_sub(now.saturating_duration_since(t)),
            None => self.remaining,
        }
    }

    /// Returns `true` (and restarts the countdown) when the timer is due.
    /// A paused timer never fires.
    ///
    /// The next deadline stays on the original grid: polling late by `d`
    /// shortens the following countdown by `d`.  Whole intervals missed
    /// while the caller was busy are skipped, not replayed.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(resumed_at) = self.resumed_at else {
            return false;
        };
        let elapsed = now.saturating_duration_since(resumed_at);
        if elapsed < self.remaining {
            return false;
        }
        let overshoot = elapsed - self.remaining;
        self.remaining = self.interval - phase_offset(overshoot, self.interval);
        self.resumed_at = Some(now);
        true
    }

    /// Freezes the countdown.  Idempotent.
    pub fn pause(&mut self, now: Instant) {
        if self.resumed_at.is_some() {
            self.remaining = self.remaining(now);
            self.resumed_at = None;
        }
    }

    /// Continues the countdown from where it was frozen.  Idempotent.
    pub fn resume(&mut self, now: Instant) {
        if self.resumed_at.is_none() {
            self.resumed_at = Some(now);
        }
    }
}

/// `overshoot` modulo `interval`.
fn phase_offset(overshoot: Duration, interval: Duration) -> Duration {
    if interval.is_zero() {
        return Duration::ZERO;
    }
    let nanos = overshoot.as_nanos() % interval.as_nanos();
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}
