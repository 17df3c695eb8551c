//! Countdown timer engine.
//!
//! The engine is a wall-clock-based state machine. It does not use
//! internal threads - the caller (usually [`super::TimerService`]) is
//! responsible for calling `tick()` once per second.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//!           |
//!           v
//!       Completed -> Running   (start, or immediately with CompletionPolicy::Restart)
//! ```
//!
//! Remaining time is never decremented in place. It is derived from the
//! run-segment start and the accumulated pause time, so pause/resume cycles
//! and late ticks cannot introduce drift:
//!
//! ```text
//! elapsed   = now - run_started - paused_total
//! remaining = max(0, total - elapsed)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::clock::{Clock, SystemClock};
use super::format::format_remaining;
use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    /// Remaining time hit zero and the timer is waiting to be restarted.
    Completed,
}

/// What the engine does after raising `TimerCompleted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionPolicy {
    /// Enter `Completed` with zero remaining until started again.
    #[default]
    Stop,
    /// Re-arm to the full duration and keep running.
    Restart,
}

/// Point-in-time view of the timer, as shown to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerStatus {
    pub state: TimerState,
    /// True only while ticking. A paused timer reports `false`.
    pub is_running: bool,
    /// True while running or paused.
    pub is_active: bool,
    pub remaining_secs: u64,
    pub total_secs: u64,
    pub display: String,
    pub at: DateTime<Utc>,
}

/// Serializable engine state, stored between process runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedTimer {
    pub state: TimerState,
    pub total_ms: u64,
    #[serde(default)]
    pub policy: CompletionPolicy,
    #[serde(default)]
    pub run_started_ms: Option<u64>,
    #[serde(default)]
    pub paused_at_ms: Option<u64>,
    #[serde(default)]
    pub paused_total_ms: u64,
}

impl PersistedTimer {
    /// Epoch seconds at which the current run segment began, if active.
    pub fn started_at_epoch_secs(&self) -> Option<u64> {
        match self.state {
            TimerState::Running | TimerState::Paused => self.run_started_ms.map(|ms| ms / 1000),
            TimerState::Idle | TimerState::Completed => None,
        }
    }
}

/// Core countdown timer.
#[derive(Debug, Clone)]
pub struct TimerEngine<C: Clock = SystemClock> {
    clock: C,
    state: TimerState,
    policy: CompletionPolicy,
    total_ms: u64,
    /// Start of the current run segment (epoch ms).
    run_started_ms: Option<u64>,
    /// When the current pause began (epoch ms), only set while paused.
    paused_at_ms: Option<u64>,
    /// Pause time accumulated within the current run segment.
    paused_total_ms: u64,
}

impl TimerEngine<SystemClock> {
    pub fn new(duration: Duration) -> Self {
        Self::with_clock(duration, SystemClock)
    }
}

impl<C: Clock> TimerEngine<C> {
    /// Create an idle engine with the given interval length.
    pub fn with_clock(duration: Duration, clock: C) -> Self {
        Self {
            clock,
            state: TimerState::Idle,
            policy: CompletionPolicy::default(),
            total_ms: duration_ms(duration),
            run_started_ms: None,
            paused_at_ms: None,
            paused_total_ms: 0,
        }
    }

    /// Rebuild an engine from persisted state.
    ///
    /// A running timer keeps counting against the wall clock, so time spent
    /// while the process was down is accounted for on the next `tick()`.
    pub fn restore(saved: PersistedTimer, clock: C) -> Self {
        let mut engine = Self {
            clock,
            state: saved.state,
            policy: saved.policy,
            total_ms: saved.total_ms,
            run_started_ms: saved.run_started_ms,
            paused_at_ms: saved.paused_at_ms,
            paused_total_ms: saved.paused_total_ms,
        };
        // Bookkeeping that does not match the state cannot be trusted.
        let consistent = match engine.state {
            TimerState::Running => engine.run_started_ms.is_some() && engine.paused_at_ms.is_none(),
            TimerState::Paused => engine.run_started_ms.is_some() && engine.paused_at_ms.is_some(),
            TimerState::Idle | TimerState::Completed => true,
        };
        if !consistent {
            debug!(state = ?engine.state, "Discarding inconsistent persisted timer bookkeeping");
            engine.clear_segment();
            engine.state = TimerState::Idle;
        }
        engine
    }

    pub fn with_policy(mut self, policy: CompletionPolicy) -> Self {
        self.policy = policy;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn policy(&self) -> CompletionPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: CompletionPolicy) {
        self.policy = policy;
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, TimerState::Running | TimerState::Paused)
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ms
    }

    pub fn total_secs(&self) -> u64 {
        self.total_ms / 1000
    }

    pub fn remaining_ms(&self) -> u64 {
        match self.state {
            TimerState::Idle => self.total_ms,
            TimerState::Completed => 0,
            TimerState::Running => self.remaining_at(self.clock.now_ms()),
            TimerState::Paused => {
                let frozen_at = self.paused_at_ms.unwrap_or_else(|| self.clock.now_ms());
                self.remaining_at(frozen_at)
            }
        }
    }

    /// Remaining whole seconds, rounded up so a fresh interval shows its
    /// full length and zero only appears on completion.
    pub fn remaining_secs(&self) -> u64 {
        self.remaining_ms().div_ceil(1000)
    }

    pub fn status(&self) -> TimerStatus {
        let remaining_secs = self.remaining_secs();
        TimerStatus {
            state: self.state,
            is_running: self.is_running(),
            is_active: self.is_active(),
            remaining_secs,
            total_secs: self.total_secs(),
            display: format_remaining(remaining_secs as i64),
            at: Utc::now(),
        }
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot(self.status())
    }

    pub fn persisted(&self) -> PersistedTimer {
        PersistedTimer {
            state: self.state,
            total_ms: self.total_ms,
            policy: self.policy,
            run_started_ms: self.run_started_ms,
            paused_at_ms: self.paused_at_ms,
            paused_total_ms: self.paused_total_ms,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<Event> {
        match self.state {
            TimerState::Idle | TimerState::Completed => {
                // A fresh segment always begins with the full interval.
                self.begin_segment(self.clock.now_ms());
                self.state = TimerState::Running;
                debug!(total_ms = self.total_ms, "Timer started");
                Some(Event::TimerStarted {
                    duration_secs: self.total_secs(),
                    at: Utc::now(),
                })
            }
            TimerState::Paused => self.resume(),
            TimerState::Running => None, // Already running.
        }
    }

    pub fn pause(&mut self) -> Option<Event> {
        match self.state {
            TimerState::Running => {
                self.paused_at_ms = Some(self.clock.now_ms());
                self.state = TimerState::Paused;
                let remaining_secs = self.remaining_secs();
                debug!(remaining_secs, "Timer paused");
                Some(Event::TimerPaused {
                    remaining_secs,
                    at: Utc::now(),
                })
            }
            _ => None,
        }
    }

    pub fn resume(&mut self) -> Option<Event> {
        match self.state {
            TimerState::Paused => {
                let now = self.clock.now_ms();
                if let Some(paused_at) = self.paused_at_ms.take() {
                    self.paused_total_ms = self
                        .paused_total_ms
                        .saturating_add(now.saturating_sub(paused_at));
                }
                self.state = TimerState::Running;
                let remaining_secs = self.remaining_secs();
                debug!(remaining_secs, "Timer resumed");
                Some(Event::TimerResumed {
                    remaining_secs,
                    at: Utc::now(),
                })
            }
            _ => None,
        }
    }

    /// Return to `Idle` with the full interval remaining. Safe to repeat.
    pub fn stop(&mut self) -> Option<Event> {
        self.state = TimerState::Idle;
        self.clear_segment();
        debug!("Timer stopped");
        Some(Event::TimerStopped { at: Utc::now() })
    }

    /// Replace the interval length; remaining becomes the new full length.
    ///
    /// Running and paused timers stay running and paused. A completed timer
    /// goes back to idle.
    pub fn reset(&mut self, duration: Duration) -> Option<Event> {
        self.total_ms = duration_ms(duration);
        let now = self.clock.now_ms();
        match self.state {
            TimerState::Running => self.begin_segment(now),
            TimerState::Paused => {
                self.begin_segment(now);
                self.paused_at_ms = Some(now);
            }
            TimerState::Idle | TimerState::Completed => {
                self.state = TimerState::Idle;
                self.clear_segment();
            }
        }
        debug!(total_ms = self.total_ms, state = ?self.state, "Timer reset");
        Some(Event::TimerReset {
            duration_secs: self.total_secs(),
            at: Utc::now(),
        })
    }

    /// Call periodically. Returns `Some(Event::TimerCompleted)` when the
    /// interval finishes.
    pub fn tick(&mut self) -> Option<Event> {
        if self.state != TimerState::Running {
            return None;
        }
        let now = self.clock.now_ms();
        if self.remaining_at(now) > 0 {
            return None;
        }
        match self.policy {
            CompletionPolicy::Stop => {
                self.state = TimerState::Completed;
                self.clear_segment();
            }
            CompletionPolicy::Restart => self.begin_segment(now),
        }
        debug!(policy = ?self.policy, "Timer completed");
        Some(Event::TimerCompleted {
            duration_secs: self.total_secs(),
            at: Utc::now(),
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn remaining_at(&self, at_ms: u64) -> u64 {
        let started = self.run_started_ms.unwrap_or(at_ms);
        let elapsed = at_ms
            .saturating_sub(started)
            .saturating_sub(self.paused_total_ms);
        self.total_ms.saturating_sub(elapsed)
    }

    fn begin_segment(&mut self, now: u64) {
        self.run_started_ms = Some(now);
        self.paused_at_ms = None;
        self.paused_total_ms = 0;
    }

    fn clear_segment(&mut self) {
        self.run_started_ms = None;
        self.paused_at_ms = None;
        self.paused_total_ms = 0;
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::clock::ManualClock;

    const HALF_HOUR: Duration = Duration::from_secs(1800);

    fn engine(duration: Duration) -> (TimerEngine<ManualClock>, ManualClock) {
        let clock = ManualClock::new(1_700_000_000_000);
        (TimerEngine::with_clock(duration, clock.clone()), clock)
    }

    #[test]
    fn start_pause_resume() {
        let (mut engine, _clock) = engine(HALF_HOUR);
        assert_eq!(engine.state(), TimerState::Idle);

        assert!(engine.start().is_some());
        assert_eq!(engine.state(), TimerState::Running);

        assert!(engine.pause().is_some());
        assert_eq!(engine.state(), TimerState::Paused);

        assert!(engine.resume().is_some());
        assert_eq!(engine.state(), TimerState::Running);
    }

    #[test]
    fn start_is_idempotent_while_running() {
        let (mut engine, clock) = engine(HALF_HOUR);
        engine.start();
        clock.advance_secs(10);
        assert!(engine.start().is_none());
        assert_eq!(engine.remaining_secs(), 1790);
    }

    #[test]
    fn pause_is_noop_unless_running() {
        let (mut engine, _clock) = engine(HALF_HOUR);
        assert!(engine.pause().is_none());
        engine.start();
        engine.pause();
        assert!(engine.pause().is_none());
        assert_eq!(engine.state(), TimerState::Paused);
    }

    #[test]
    fn paused_timer_is_active_but_not_running() {
        let (mut engine, _clock) = engine(HALF_HOUR);
        engine.start();
        engine.pause();
        let status = engine.status();
        assert!(!status.is_running);
        assert!(status.is_active);
        engine.resume();
        assert!(engine.is_running());
        assert!(engine.is_active());
    }

    #[test]
    fn paused_time_is_frozen_and_not_counted() {
        let (mut engine, clock) = engine(HALF_HOUR);
        engine.start();
        clock.advance_secs(100);
        engine.pause();
        clock.advance_secs(500);
        assert_eq!(engine.remaining_secs(), 1700);
        engine.resume();
        clock.advance_secs(50);
        assert_eq!(engine.remaining_secs(), 1650);
    }

    #[test]
    fn immediate_pause_resume_keeps_remaining() {
        let (mut engine, clock) = engine(HALF_HOUR);
        engine.start();
        clock.advance_ms(12_345);
        let before = engine.remaining_ms();
        engine.pause();
        engine.resume();
        assert_eq!(engine.remaining_ms(), before);
    }

    #[test]
    fn many_pause_cycles_do_not_drift() {
        let (mut engine, clock) = engine(HALF_HOUR);
        engine.start();
        for _ in 0..20 {
            clock.advance_ms(700);
            engine.pause();
            clock.advance_ms(3_000);
            engine.resume();
        }
        // 20 * 700ms of running time.
        assert_eq!(engine.remaining_ms(), 1_800_000 - 14_000);
    }

    #[test]
    fn stop_twice_matches_stop_once() {
        let (mut engine, clock) = engine(HALF_HOUR);
        engine.start();
        clock.advance_secs(300);
        engine.stop();
        let once = engine.persisted();
        engine.stop();
        assert_eq!(engine.persisted(), once);
        assert_eq!(engine.state(), TimerState::Idle);
        assert_eq!(engine.remaining_secs(), 1800);
    }

    #[test]
    fn completes_once_after_full_interval() {
        let (mut engine, clock) = engine(HALF_HOUR);
        engine.start();
        let mut completions = 0;
        let mut last = engine.remaining_secs();
        for _ in 0..1800 {
            clock.advance_secs(1);
            if let Some(Event::TimerCompleted { duration_secs, .. }) = engine.tick() {
                assert_eq!(duration_secs, 1800);
                completions += 1;
            }
            let now = engine.remaining_secs();
            if completions == 0 {
                assert_eq!(now, last - 1);
            }
            last = now;
        }
        assert_eq!(completions, 1);
        assert_eq!(engine.state(), TimerState::Completed);
        assert_eq!(engine.remaining_secs(), 0);

        // Further ticks never complete again.
        clock.advance_secs(10);
        assert!(engine.tick().is_none());
    }

    #[test]
    fn restart_policy_rearms_after_completion() {
        let (engine, clock) = engine(HALF_HOUR);
        let mut engine = engine.with_policy(CompletionPolicy::Restart);
        engine.start();
        let mut completions = 0;
        for _ in 0..1800 {
            clock.advance_secs(1);
            if engine.tick().is_some() {
                completions += 1;
            }
        }
        assert_eq!(completions, 1);
        assert_eq!(engine.state(), TimerState::Running);
        assert_eq!(engine.remaining_secs(), 1800);

        for _ in 0..1800 {
            clock.advance_secs(1);
            if engine.tick().is_some() {
                completions += 1;
            }
        }
        assert_eq!(completions, 2);
    }

    #[test]
    fn start_after_completion_rearms_full_interval() {
        let (mut engine, clock) = engine(Duration::from_secs(60));
        engine.start();
        clock.advance_secs(61);
        assert!(engine.tick().is_some());
        assert_eq!(engine.remaining_secs(), 0);
        engine.start();
        assert_eq!(engine.state(), TimerState::Running);
        assert_eq!(engine.remaining_secs(), 60);
    }

    #[test]
    fn remaining_never_negative_after_long_gap() {
        let (mut engine, clock) = engine(Duration::from_secs(60));
        engine.start();
        clock.advance_secs(10_000);
        assert_eq!(engine.remaining_ms(), 0);
        assert_eq!(engine.status().display, "00:00");
    }

    #[test]
    fn reset_while_running_jumps_to_new_total() {
        let (mut engine, clock) = engine(HALF_HOUR);
        engine.start();
        clock.advance_secs(1300);
        assert_eq!(engine.remaining_secs(), 500);

        engine.reset(Duration::from_secs(900));
        assert_eq!(engine.state(), TimerState::Running);
        assert_eq!(engine.total_secs(), 900);
        assert_eq!(engine.remaining_secs(), 900);

        clock.advance_secs(1);
        assert_eq!(engine.remaining_secs(), 899);
    }

    #[test]
    fn reset_while_paused_stays_paused() {
        let (mut engine, clock) = engine(HALF_HOUR);
        engine.start();
        clock.advance_secs(60);
        engine.pause();
        engine.reset(Duration::from_secs(900));
        clock.advance_secs(60);
        assert_eq!(engine.state(), TimerState::Paused);
        assert_eq!(engine.remaining_secs(), 900);
        engine.resume();
        clock.advance_secs(1);
        assert_eq!(engine.remaining_secs(), 899);
    }

    #[test]
    fn reset_when_idle_only_changes_total() {
        let (mut engine, _clock) = engine(HALF_HOUR);
        engine.reset(Duration::from_secs(2700));
        assert_eq!(engine.state(), TimerState::Idle);
        assert_eq!(engine.remaining_secs(), 2700);
    }

    #[test]
    fn restore_continues_counting_against_wall_clock() {
        let (mut engine, clock) = engine(Duration::from_secs(120));
        engine.start();
        clock.advance_secs(30);
        let saved = engine.persisted();

        clock.advance_secs(100);
        let mut restored = TimerEngine::restore(saved, clock.clone());
        assert_eq!(restored.state(), TimerState::Running);
        assert_eq!(restored.remaining_secs(), 0);
        assert!(restored.tick().is_some());
    }

    #[test]
    fn restore_rejects_inconsistent_bookkeeping() {
        let clock = ManualClock::new(0);
        let saved = PersistedTimer {
            state: TimerState::Paused,
            total_ms: 60_000,
            policy: CompletionPolicy::Stop,
            run_started_ms: None,
            paused_at_ms: None,
            paused_total_ms: 0,
        };
        let restored = TimerEngine::restore(saved, clock);
        assert_eq!(restored.state(), TimerState::Idle);
        assert_eq!(restored.remaining_secs(), 60);
    }

    #[test]
    fn snapshot_returns_valid_event() {
        let (engine, _clock) = engine(HALF_HOUR);
        match engine.snapshot() {
            Event::StateSnapshot(status) => {
                assert_eq!(status.state, TimerState::Idle);
                assert_eq!(status.remaining_secs, 1800);
                assert_eq!(status.display, "30:00");
            }
            _ => panic!("Expected StateSnapshot"),
        }
    }
}
