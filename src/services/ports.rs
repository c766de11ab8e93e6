//! Collaborator traits the countdown controller drives
//!
//! The controller receives one implementation of each at construction, so
//! tests can substitute recording doubles for the host integrations.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Plays the expiry alert. Fire-and-forget: failures are logged by the
/// implementation and never reported back.
pub trait AlertDispatcher: Send + Sync {
    fn play_alert(&self);
}

/// Schedules a one-shot notification that the host delivers at `deadline`,
/// even if this process is stopped by then.
pub trait NotificationScheduler: Send + Sync {
    fn schedule_one_shot(&self, deadline: DateTime<Utc>, message: &str);

    /// Cancel every pending notification. Must be safe to call repeatedly.
    fn cancel_all_pending(&self);
}

/// Opaque handle for a granted background continuation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContinuationToken(pub u64);

/// Best-effort request to keep running while the host would rather suspend.
/// The host may deny the request or revoke it at any time.
pub trait BackgroundContinuation: Send + Sync {
    /// Returns `None` when the host denies the request
    fn begin(&self, reason: &str) -> Option<ContinuationToken>;

    /// Release a continuation. Ending an already-ended or unknown token is a no-op.
    fn end(&self, token: ContinuationToken);
}

/// Recurring tick delivery
pub trait TickSource: Send + Sync {
    /// Begin delivering ticks every `period` until the returned handle is
    /// cancelled or dropped
    fn start(&self, period: Duration) -> TickHandle;
}

/// Stops a running tick source on cancel or drop
pub struct TickHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TickHandle {
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop tick delivery; subsequent calls do nothing
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_none()
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for TickHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Scheduler used when OS notifications are turned off
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNotifications;

impl NotificationScheduler for NoNotifications {
    fn schedule_one_shot(&self, _deadline: DateTime<Utc>, _message: &str) {}

    fn cancel_all_pending(&self) {}
}

/// Continuation provider used when sleep inhibition is turned off; always denies
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContinuation;

impl BackgroundContinuation for NoContinuation {
    fn begin(&self, _reason: &str) -> Option<ContinuationToken> {
        None
    }

    fn end(&self, _token: ContinuationToken) {}
}
