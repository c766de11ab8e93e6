//! Recording doubles for the countdown's host integrations.

use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use chrono::{DateTime, Utc};
use countdown_timer::services::{
    AlertDispatcher, BackgroundContinuation, ContinuationToken, NotificationScheduler,
    TickHandle, TickSource,
};
use countdown_timer::state::{AppState, Collaborators, CountdownController, ManualClock};

#[derive(Default)]
pub struct CountingAlert {
    pub fired: AtomicUsize,
}

impl AlertDispatcher for CountingAlert {
    fn play_alert(&self) {
        self.fired.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct PendingNotifications {
    pub pending: Mutex<Option<DateTime<Utc>>>,
}

impl NotificationScheduler for PendingNotifications {
    fn schedule_one_shot(&self, deadline: DateTime<Utc>, _message: &str) {
        *self.pending.lock().unwrap() = Some(deadline);
    }

    fn cancel_all_pending(&self) {
        *self.pending.lock().unwrap() = None;
    }
}

#[derive(Default)]
pub struct TokenCounter {
    next: AtomicU64,
    pub held: AtomicUsize,
}

impl BackgroundContinuation for TokenCounter {
    fn begin(&self, _reason: &str) -> Option<ContinuationToken> {
        self.held.fetch_add(1, Ordering::SeqCst);
        Some(ContinuationToken(self.next.fetch_add(1, Ordering::SeqCst)))
    }

    fn end(&self, _token: ContinuationToken) {
        self.held.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct LiveTicks {
    pub live: Arc<AtomicUsize>,
}

impl TickSource for LiveTicks {
    fn start(&self, _period: Duration) -> TickHandle {
        self.live.fetch_add(1, Ordering::SeqCst);
        let live = Arc::clone(&self.live);
        TickHandle::new(move || {
            live.fetch_sub(1, Ordering::SeqCst);
        })
    }
}

#[allow(dead_code)]
pub struct TestApp {
    pub state: Arc<AppState>,
    pub clock: ManualClock,
    pub alert: Arc<CountingAlert>,
    pub notifications: Arc<PendingNotifications>,
    pub continuation: Arc<TokenCounter>,
    pub ticks: Arc<LiveTicks>,
}

#[allow(dead_code)]
impl TestApp {
    pub fn new(minutes: u32) -> Self {
        let clock = ManualClock::default();
        let alert = Arc::new(CountingAlert::default());
        let notifications = Arc::new(PendingNotifications::default());
        let continuation = Arc::new(TokenCounter::default());
        let ticks = Arc::new(LiveTicks::default());

        let collaborators = Collaborators {
            alert: alert.clone(),
            notifications: notifications.clone(),
            continuation: continuation.clone(),
            ticks: ticks.clone(),
        };
        let controller =
            CountdownController::new(minutes, Arc::new(clock.clone()), collaborators).unwrap();
        let state = Arc::new(AppState::new(20554, "127.0.0.1".to_string(), controller));

        Self {
            state,
            clock,
            alert,
            notifications,
            continuation,
            ticks,
        }
    }

    pub fn alerts(&self) -> usize {
        self.alert.fired.load(Ordering::SeqCst)
    }

    pub fn live_ticks(&self) -> usize {
        self.ticks.live.load(Ordering::SeqCst)
    }

    pub fn held_continuations(&self) -> usize {
        self.continuation.held.load(Ordering::SeqCst)
    }

    pub fn pending_notification(&self) -> Option<DateTime<Utc>> {
        *self.notifications.pending.lock().unwrap()
    }
}
