//! Countdown controller: the Idle/Running/Paused state machine
//!
//! Remaining time while running is never accumulated from ticks. It is
//! recomputed from an absolute end deadline on every tick, so delayed,
//! skipped or coalesced ticks (host suspension, scheduler jitter) cannot
//! make the countdown drift.

use std::{sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::{clock::Clock, format_remaining, TimerSnapshot, TimerState};
use crate::services::{
    AlertDispatcher, BackgroundContinuation, ContinuationToken, NotificationScheduler,
    TickHandle, TickSource,
};

pub const MIN_DURATION_MINUTES: u32 = 1;
pub const MAX_DURATION_MINUTES: u32 = 120;
pub const DEFAULT_DURATION_MINUTES: u32 = 30;

/// Interval between reconciliation ticks
pub const TICK_PERIOD: StdDuration = StdDuration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControllerError {
    #[error("duration must be between 1 and 120 minutes, got {0}")]
    InvalidDuration(u32),
    #[error("cannot change the duration while the countdown is running")]
    Running,
}

/// Result of a tick or reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The countdown was not running
    Ignored,
    /// Still counting down
    Running,
    /// Reached zero on this call; the alert was fired
    Completed,
}

/// Host integrations the controller drives
#[derive(Clone)]
pub struct Collaborators {
    pub alert: Arc<dyn AlertDispatcher>,
    pub notifications: Arc<dyn NotificationScheduler>,
    pub continuation: Arc<dyn BackgroundContinuation>,
    pub ticks: Arc<dyn TickSource>,
}

/// Resources held while the countdown is running. Dropping the session
/// releases all of them, so every exit from `Running` cleans up.
struct RunSession {
    deadline: DateTime<Utc>,
    ticks: TickHandle,
    continuation: Option<ContinuationToken>,
    continuation_host: Arc<dyn BackgroundContinuation>,
    notifications: Arc<dyn NotificationScheduler>,
    /// Set on completion: the scheduled notification is due and is left for the host to deliver
    notification_due: bool,
}

impl RunSession {
    fn open(deadline: DateTime<Utc>, message: &str, collaborators: &Collaborators) -> Self {
        let ticks = collaborators.ticks.start(TICK_PERIOD);

        let continuation = collaborators.continuation.begin("Countdown running");
        match continuation {
            Some(token) => debug!("Background continuation granted: {:?}", token),
            None => warn!("Background continuation denied, relying on deadline reconciliation"),
        }

        collaborators.notifications.cancel_all_pending();
        collaborators.notifications.schedule_one_shot(deadline, message);

        Self {
            deadline,
            ticks,
            continuation,
            continuation_host: Arc::clone(&collaborators.continuation),
            notifications: Arc::clone(&collaborators.notifications),
            notification_due: false,
        }
    }

    fn complete(mut self) {
        self.notification_due = true;
    }
}

impl Drop for RunSession {
    fn drop(&mut self) {
        self.ticks.cancel();
        if let Some(token) = self.continuation.take() {
            self.continuation_host.end(token);
        }
        if !self.notification_due {
            self.notifications.cancel_all_pending();
        }
    }
}

/// Owns the countdown state and its run session
pub struct CountdownController {
    state: TimerState,
    configured_minutes: u32,
    remaining_secs: u64,
    session: Option<RunSession>,
    clock: Arc<dyn Clock>,
    collaborators: Collaborators,
}

impl CountdownController {
    /// Create an idle controller with the full duration remaining
    pub fn new(
        configured_minutes: u32,
        clock: Arc<dyn Clock>,
        collaborators: Collaborators,
    ) -> Result<Self, ControllerError> {
        validate_minutes(configured_minutes)?;
        Ok(Self {
            state: TimerState::Idle,
            configured_minutes,
            remaining_secs: minutes_to_secs(configured_minutes),
            session: None,
            clock,
            collaborators,
        })
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn configured_minutes(&self) -> u32 {
        self.configured_minutes
    }

    /// Remaining seconds as of the last tick or reconciliation
    pub fn remaining_seconds(&self) -> u64 {
        self.remaining_secs
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.session.as_ref().map(|s| s.deadline)
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot::new(
            self.state,
            self.configured_minutes,
            self.remaining_secs,
            self.deadline(),
        )
    }

    /// Change the configured duration. Rejected while running; a paused
    /// countdown is discarded and the controller returns to idle.
    pub fn set_duration(&mut self, minutes: u32) -> Result<TimerSnapshot, ControllerError> {
        validate_minutes(minutes)?;
        if self.state.is_running() {
            debug!("Rejecting duration change to {}min while running", minutes);
            return Err(ControllerError::Running);
        }

        self.configured_minutes = minutes;
        self.remaining_secs = minutes_to_secs(minutes);
        self.state = TimerState::Idle;
        info!("Duration set to {} minutes", minutes);
        Ok(self.snapshot())
    }

    /// Start or resume the countdown. No-op while already running.
    pub fn start(&mut self) -> TimerSnapshot {
        if self.state.is_running() {
            debug!("Start ignored, countdown already running");
            return self.snapshot();
        }

        if self.remaining_secs == 0 {
            self.remaining_secs = minutes_to_secs(self.configured_minutes);
        }

        let deadline = self.clock.now() + Duration::seconds(self.remaining_secs as i64);
        let message = expiry_message(self.configured_minutes);
        self.session = Some(RunSession::open(deadline, &message, &self.collaborators));
        self.state = TimerState::Running;

        info!(
            "Countdown started with {} remaining, deadline {}",
            format_remaining(self.remaining_secs),
            deadline
        );
        self.snapshot()
    }

    /// Pause the countdown, freezing the remaining time. No-op unless running.
    pub fn pause(&mut self) -> TimerSnapshot {
        if !self.state.is_running() {
            debug!("Pause ignored, countdown is {}", self.state);
            return self.snapshot();
        }

        // The deadline may already have passed while ticks were held back
        if self.tick() == TickOutcome::Completed {
            return self.snapshot();
        }

        self.session = None;
        self.state = TimerState::Paused;
        info!("Countdown paused at {}", format_remaining(self.remaining_secs));
        self.snapshot()
    }

    /// Pause when running, start otherwise
    pub fn toggle(&mut self) -> TimerSnapshot {
        if self.state.is_running() {
            self.pause()
        } else {
            self.start()
        }
    }

    /// Reconcile remaining time against the deadline; completes the
    /// countdown and fires the alert once it reaches zero
    pub fn tick(&mut self) -> TickOutcome {
        let Some(session) = self.session.as_ref() else {
            return TickOutcome::Ignored;
        };

        let left = seconds_until(session.deadline, self.clock.now());
        self.remaining_secs = self.remaining_secs.min(left);
        if self.remaining_secs > 0 {
            return TickOutcome::Running;
        }

        if let Some(session) = self.session.take() {
            session.complete();
        }
        self.state = TimerState::Idle;
        info!("Countdown of {} minutes finished", self.configured_minutes);
        self.collaborators.alert.play_alert();
        TickOutcome::Completed
    }

    /// Release every held resource ahead of shutdown
    pub fn teardown(&mut self) {
        if self.state.is_running() {
            info!("Tearing down running countdown");
            self.pause();
        }
    }
}

impl std::fmt::Debug for CountdownController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountdownController")
            .field("state", &self.state)
            .field("configured_minutes", &self.configured_minutes)
            .field("remaining_secs", &self.remaining_secs)
            .field("deadline", &self.deadline())
            .finish()
    }
}

fn validate_minutes(minutes: u32) -> Result<(), ControllerError> {
    if (MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&minutes) {
        Ok(())
    } else {
        Err(ControllerError::InvalidDuration(minutes))
    }
}

fn minutes_to_secs(minutes: u32) -> u64 {
    u64::from(minutes) * 60
}

/// Whole seconds until `deadline`, rounded up so zero means the deadline has passed
fn seconds_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let left = deadline - now;
    if left <= Duration::zero() {
        return 0;
    }
    let whole = left.num_seconds();
    if left > Duration::seconds(whole) {
        whole as u64 + 1
    } else {
        whole as u64
    }
}

fn expiry_message(minutes: u32) -> String {
    format!("Time's up! Your {}-minute countdown has finished.", minutes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::clock::ManualClock;
    use std::sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Mutex,
    };

    #[derive(Default)]
    struct CountingAlert(AtomicUsize);

    impl AlertDispatcher for CountingAlert {
        fn play_alert(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Scheduled {
        OneShot(DateTime<Utc>),
        CancelAll,
    }

    #[derive(Default)]
    struct RecordingScheduler(Mutex<Vec<Scheduled>>);

    impl RecordingScheduler {
        fn calls(&self) -> Vec<Scheduled> {
            self.0.lock().unwrap().clone()
        }
    }

    impl NotificationScheduler for RecordingScheduler {
        fn schedule_one_shot(&self, deadline: DateTime<Utc>, _message: &str) {
            self.0.lock().unwrap().push(Scheduled::OneShot(deadline));
        }

        fn cancel_all_pending(&self) {
            self.0.lock().unwrap().push(Scheduled::CancelAll);
        }
    }

    #[derive(Default)]
    struct Inhibitor {
        next: AtomicU64,
        held: Mutex<Vec<ContinuationToken>>,
        deny: bool,
    }

    impl BackgroundContinuation for Inhibitor {
        fn begin(&self, _reason: &str) -> Option<ContinuationToken> {
            if self.deny {
                return None;
            }
            let token = ContinuationToken(self.next.fetch_add(1, Ordering::SeqCst));
            self.held.lock().unwrap().push(token);
            Some(token)
        }

        fn end(&self, token: ContinuationToken) {
            self.held.lock().unwrap().retain(|t| *t != token);
        }
    }

    #[derive(Default)]
    struct ManualTicks {
        live: Arc<AtomicUsize>,
        started: AtomicUsize,
    }

    impl TickSource for ManualTicks {
        fn start(&self, period: StdDuration) -> TickHandle {
            assert_eq!(period, TICK_PERIOD);
            self.started.fetch_add(1, Ordering::SeqCst);
            self.live.fetch_add(1, Ordering::SeqCst);
            let live = Arc::clone(&self.live);
            TickHandle::new(move || {
                live.fetch_sub(1, Ordering::SeqCst);
            })
        }
    }

    struct Harness {
        clock: ManualClock,
        alert: Arc<CountingAlert>,
        scheduler: Arc<RecordingScheduler>,
        inhibitor: Arc<Inhibitor>,
        ticks: Arc<ManualTicks>,
        controller: CountdownController,
    }

    impl Harness {
        fn new(minutes: u32) -> Self {
            Self::with_inhibitor(minutes, Inhibitor::default())
        }

        fn with_inhibitor(minutes: u32, inhibitor: Inhibitor) -> Self {
            let clock = ManualClock::default();
            let alert = Arc::new(CountingAlert::default());
            let scheduler = Arc::new(RecordingScheduler::default());
            let inhibitor = Arc::new(inhibitor);
            let ticks = Arc::new(ManualTicks::default());
            let collaborators = Collaborators {
                alert: alert.clone(),
                notifications: scheduler.clone(),
                continuation: inhibitor.clone(),
                ticks: ticks.clone(),
            };
            let controller =
                CountdownController::new(minutes, Arc::new(clock.clone()), collaborators).unwrap();
            Self {
                clock,
                alert,
                scheduler,
                inhibitor,
                ticks,
                controller,
            }
        }

        /// Advance one second and deliver a tick
        fn step(&mut self) -> TickOutcome {
            self.clock.advance_secs(1);
            self.controller.tick()
        }

        fn alerts(&self) -> usize {
            self.alert.0.load(Ordering::SeqCst)
        }

        fn live_ticks(&self) -> usize {
            self.ticks.live.load(Ordering::SeqCst)
        }

        fn held_tokens(&self) -> usize {
            self.inhibitor.held.lock().unwrap().len()
        }
    }

    #[test]
    fn starts_idle_with_full_duration() {
        let harness = Harness::new(DEFAULT_DURATION_MINUTES);
        let snapshot = harness.controller.snapshot();

        assert_eq!(snapshot.state, TimerState::Idle);
        assert_eq!(snapshot.remaining_seconds, 30 * 60);
        assert_eq!(snapshot.display, "30:00");
        assert_eq!(snapshot.deadline, None);
    }

    #[test]
    fn rejects_out_of_range_durations() {
        let mut harness = Harness::new(30);
        assert_eq!(
            harness.controller.set_duration(0),
            Err(ControllerError::InvalidDuration(0))
        );
        assert_eq!(
            harness.controller.set_duration(121),
            Err(ControllerError::InvalidDuration(121))
        );
        assert!(harness.controller.set_duration(120).is_ok());
        assert!(harness.controller.set_duration(1).is_ok());
    }

    #[test]
    fn ticks_reduce_remaining_one_second_each() {
        for minutes in [1, 2, 30, 99, 120] {
            let mut harness = Harness::new(minutes);
            harness.controller.start();

            let total = u64::from(minutes) * 60;
            let n = total - 1;
            for _ in 0..n {
                assert_eq!(harness.step(), TickOutcome::Running);
            }

            assert_eq!(harness.controller.remaining_seconds(), total - n);
            assert_eq!(harness.controller.state(), TimerState::Running);
            assert_eq!(harness.alerts(), 0);
        }
    }

    #[test]
    fn pause_then_start_resumes_from_paused_time() {
        let mut harness = Harness::new(30);
        harness.controller.start();
        for _ in 0..90 {
            harness.step();
        }

        let paused = harness.controller.pause();
        assert_eq!(paused.state, TimerState::Paused);
        assert_eq!(paused.remaining_seconds, 30 * 60 - 90);
        assert_eq!(paused.deadline, None);

        // Time passing while paused is not counted
        harness.clock.advance_secs(600);
        assert_eq!(harness.controller.tick(), TickOutcome::Ignored);

        let resumed = harness.controller.start();
        assert_eq!(resumed.state, TimerState::Running);
        assert_eq!(resumed.remaining_seconds, 30 * 60 - 90);
        assert_eq!(
            resumed.deadline,
            Some(harness.clock.now() + Duration::seconds(30 * 60 - 90))
        );
    }

    #[test]
    fn one_minute_countdown_completes_and_alerts_once() {
        let mut harness = Harness::new(1);
        harness.controller.start();

        let outcomes: Vec<_> = (0..60).map(|_| harness.step()).collect();
        assert!(outcomes[..59].iter().all(|o| *o == TickOutcome::Running));
        assert_eq!(outcomes[59], TickOutcome::Completed);

        let snapshot = harness.controller.snapshot();
        assert_eq!(snapshot.display, "00:00");
        assert_eq!(snapshot.state, TimerState::Idle);
        assert_eq!(harness.alerts(), 1);

        // Stray ticks after completion never alert again
        for _ in 0..5 {
            assert_eq!(harness.step(), TickOutcome::Ignored);
        }
        assert_eq!(harness.alerts(), 1);
    }

    #[test]
    fn delayed_tick_reconciles_against_deadline() {
        let mut harness = Harness::new(30);
        harness.controller.start();

        harness.clock.advance_secs(65);
        assert_eq!(harness.controller.tick(), TickOutcome::Running);
        assert_eq!(harness.controller.remaining_seconds(), 30 * 60 - 65);
    }

    #[test]
    fn suspension_past_deadline_completes_on_next_tick() {
        let mut harness = Harness::new(5);
        harness.controller.start();

        harness.clock.advance_secs(3 * 3600);
        assert_eq!(harness.controller.tick(), TickOutcome::Completed);
        assert_eq!(harness.controller.remaining_seconds(), 0);
        assert_eq!(harness.alerts(), 1);
    }

    #[test]
    fn partial_seconds_round_up() {
        let mut harness = Harness::new(1);
        harness.controller.start();

        harness.clock.advance(Duration::milliseconds(59_500));
        assert_eq!(harness.controller.tick(), TickOutcome::Running);
        assert_eq!(harness.controller.remaining_seconds(), 1);

        harness.clock.advance(Duration::milliseconds(500));
        assert_eq!(harness.controller.tick(), TickOutcome::Completed);
    }

    #[test]
    fn clock_moving_backwards_never_increases_remaining() {
        let mut harness = Harness::new(10);
        harness.controller.start();
        harness.clock.advance_secs(30);
        harness.controller.tick();

        harness.clock.advance_secs(-120);
        harness.controller.tick();
        assert_eq!(harness.controller.remaining_seconds(), 10 * 60 - 30);
    }

    #[test]
    fn pause_when_not_running_is_a_noop() {
        let mut harness = Harness::new(30);
        let idle = harness.controller.pause();
        assert_eq!(idle.state, TimerState::Idle);

        harness.controller.start();
        harness.step();
        let first = harness.controller.pause();
        let second = harness.controller.pause();
        assert_eq!(first, second);
        assert_eq!(second.state, TimerState::Paused);
        assert_eq!(harness.alerts(), 0);
    }

    #[test]
    fn start_while_running_keeps_the_same_session() {
        let mut harness = Harness::new(30);
        let first = harness.controller.start();
        harness.step();
        let second = harness.controller.start();

        assert_eq!(first.deadline, second.deadline);
        assert_eq!(harness.ticks.started.load(Ordering::SeqCst), 1);
        assert_eq!(harness.live_ticks(), 1);
    }

    #[test]
    fn set_duration_while_idle_resets_remaining() {
        let mut harness = Harness::new(30);
        let snapshot = harness.controller.set_duration(45).unwrap();

        assert_eq!(snapshot.configured_minutes, 45);
        assert_eq!(snapshot.display, "45:00");
        assert_eq!(snapshot.state, TimerState::Idle);
    }

    #[test]
    fn set_duration_while_running_is_rejected() {
        let mut harness = Harness::new(30);
        harness.controller.start();
        for _ in 0..10 {
            harness.step();
        }

        assert_eq!(
            harness.controller.set_duration(10),
            Err(ControllerError::Running)
        );
        assert_eq!(harness.controller.configured_minutes(), 30);
        assert_eq!(harness.controller.remaining_seconds(), 30 * 60 - 10);
        assert_eq!(harness.controller.state(), TimerState::Running);
    }

    #[test]
    fn set_duration_while_paused_returns_to_idle() {
        let mut harness = Harness::new(30);
        harness.controller.start();
        harness.step();
        harness.controller.pause();

        let snapshot = harness.controller.set_duration(5).unwrap();
        assert_eq!(snapshot.state, TimerState::Idle);
        assert_eq!(snapshot.remaining_seconds, 300);
    }

    #[test]
    fn restart_after_completion_uses_configured_duration() {
        let mut harness = Harness::new(1);
        harness.controller.start();
        harness.clock.advance_secs(60);
        harness.controller.tick();

        let restarted = harness.controller.start();
        assert_eq!(restarted.state, TimerState::Running);
        assert_eq!(restarted.remaining_seconds, 60);
    }

    #[test]
    fn toggle_alternates_between_running_and_paused() {
        let mut harness = Harness::new(30);
        assert_eq!(harness.controller.toggle().state, TimerState::Running);
        assert_eq!(harness.controller.toggle().state, TimerState::Paused);
        assert_eq!(harness.controller.toggle().state, TimerState::Running);
    }

    #[test]
    fn pause_releases_session_resources() {
        let mut harness = Harness::new(30);
        let started = harness.controller.start();
        assert_eq!(harness.live_ticks(), 1);
        assert_eq!(harness.held_tokens(), 1);

        harness.controller.pause();
        assert_eq!(harness.live_ticks(), 0);
        assert_eq!(harness.held_tokens(), 0);
        assert_eq!(
            harness.scheduler.calls(),
            vec![
                Scheduled::CancelAll,
                Scheduled::OneShot(started.deadline.unwrap()),
                Scheduled::CancelAll,
            ]
        );
    }

    #[test]
    fn completion_releases_ticks_and_continuation_but_keeps_due_notification() {
        let mut harness = Harness::new(1);
        harness.controller.start();
        harness.clock.advance_secs(60);
        harness.controller.tick();

        assert_eq!(harness.live_ticks(), 0);
        assert_eq!(harness.held_tokens(), 0);
        assert_eq!(
            harness.scheduler.calls().last(),
            Some(&Scheduled::OneShot(harness.clock.now()))
        );
    }

    #[test]
    fn restart_cancels_previous_notification_before_scheduling() {
        let mut harness = Harness::new(1);
        harness.controller.start();
        harness.clock.advance_secs(60);
        harness.controller.tick();
        harness.controller.start();

        let calls = harness.scheduler.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[2], Scheduled::CancelAll);
        assert!(matches!(calls[3], Scheduled::OneShot(_)));
    }

    #[test]
    fn denied_continuation_does_not_block_the_countdown() {
        let mut harness = Harness::with_inhibitor(
            1,
            Inhibitor {
                deny: true,
                ..Inhibitor::default()
            },
        );
        harness.controller.start();
        harness.clock.advance_secs(60);

        assert_eq!(harness.controller.tick(), TickOutcome::Completed);
        assert_eq!(harness.alerts(), 1);
    }

    #[test]
    fn pause_after_deadline_completes_instead() {
        let mut harness = Harness::new(1);
        harness.controller.start();
        harness.clock.advance_secs(90);

        let snapshot = harness.controller.pause();
        assert_eq!(snapshot.state, TimerState::Idle);
        assert_eq!(snapshot.remaining_seconds, 0);
        assert_eq!(harness.alerts(), 1);
    }

    #[test]
    fn teardown_and_drop_release_resources() {
        let mut harness = Harness::new(30);
        harness.controller.start();
        harness.controller.teardown();
        assert_eq!(harness.controller.state(), TimerState::Paused);
        assert_eq!(harness.live_ticks(), 0);

        harness.controller.start();
        let ticks = Arc::clone(&harness.ticks);
        let inhibitor = Arc::clone(&harness.inhibitor);
        drop(harness.controller);
        assert_eq!(ticks.live.load(Ordering::SeqCst), 0);
        assert!(inhibitor.held.lock().unwrap().is_empty());
    }
}
