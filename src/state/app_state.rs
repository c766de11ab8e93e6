//! Main application state management

use std::{
    sync::{Mutex, MutexGuard},
    time::Instant,
};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{info, warn};

use super::{ControllerError, CountdownController, TickOutcome, TimerSnapshot};

/// Errors surfaced by [`AppState`] operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Controller(#[from] ControllerError),
    #[error("Failed to lock {0}")]
    LockPoisoned(&'static str),
}

/// Main application state shared between the API and background tasks
#[derive(Debug)]
pub struct AppState {
    /// Countdown state machine; every mutation goes through this lock
    controller: Mutex<CountdownController>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    pub last_action: Mutex<Option<String>>,
    pub last_action_time: Mutex<Option<DateTime<Utc>>>,
    /// Channel for timer updates
    pub timer_update_tx: watch::Sender<TimerSnapshot>,
    /// Keep the receiver alive to prevent channel closure
    pub _timer_update_rx: watch::Receiver<TimerSnapshot>,
}

impl AppState {
    /// Create a new AppState around an idle controller
    pub fn new(port: u16, host: String, controller: CountdownController) -> Self {
        let (timer_update_tx, timer_update_rx) = watch::channel(controller.snapshot());

        Self {
            controller: Mutex::new(controller),
            start_time: Instant::now(),
            port,
            host,
            last_action: Mutex::new(None),
            last_action_time: Mutex::new(None),
            timer_update_tx,
            _timer_update_rx: timer_update_rx,
        }
    }

    fn lock_controller(&self) -> Result<MutexGuard<'_, CountdownController>, Error> {
        self.controller
            .lock()
            .map_err(|_| Error::LockPoisoned("countdown controller"))
    }

    /// Run an operation against the controller and publish the resulting snapshot
    fn apply<T, F>(&self, action: Option<&str>, op: F) -> Result<T, Error>
    where
        F: FnOnce(&mut CountdownController) -> T,
    {
        let mut controller = self.lock_controller()?;
        let result = op(&mut controller);
        let snapshot = controller.snapshot();
        drop(controller); // Release the lock early

        if let Some(action) = action {
            self.record_action(action);
        }
        self.publish(snapshot);
        Ok(result)
    }

    fn record_action(&self, action: &str) {
        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action.to_string());
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(Utc::now());
        }
    }

    fn publish(&self, snapshot: TimerSnapshot) {
        // send_if_modified keeps watchers quiet when a tick changed nothing
        self.timer_update_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    /// Start or resume the countdown
    pub fn start(&self) -> Result<TimerSnapshot, Error> {
        info!("Start requested");
        self.apply(Some("start"), |c| c.start())
    }

    /// Pause the countdown
    pub fn pause(&self) -> Result<TimerSnapshot, Error> {
        info!("Pause requested");
        self.apply(Some("pause"), |c| c.pause())
    }

    /// Start/pause button
    pub fn toggle(&self) -> Result<TimerSnapshot, Error> {
        self.apply(Some("toggle"), |c| c.toggle())
    }

    /// Change the configured duration
    pub fn set_duration(&self, minutes: u32) -> Result<TimerSnapshot, Error> {
        info!("Duration change to {} minutes requested", minutes);
        self.apply(Some("duration"), |c| c.set_duration(minutes))?
            .map_err(Error::from)
    }

    /// Deliver one tick from the tick source
    pub fn tick(&self) -> Result<TickOutcome, Error> {
        self.apply(None, |c| c.tick())
    }

    /// Reconcile against the deadline and return the fresh snapshot
    pub fn reconcile(&self) -> Result<TimerSnapshot, Error> {
        self.apply(None, |c| {
            c.tick();
            c.snapshot()
        })
    }

    /// Release every resource the countdown holds
    pub fn teardown(&self) {
        match self.apply(Some("teardown"), |c| c.teardown()) {
            Ok(()) => info!("Countdown resources released"),
            Err(e) => warn!("Failed to tear down countdown: {}", e),
        }
    }

    /// Get current timer state, reconciled against the clock
    pub fn get_timer_state(&self) -> Result<TimerSnapshot, Error> {
        self.reconcile()
    }

    /// Subscribe to timer snapshot updates
    pub fn subscribe(&self) -> watch::Receiver<TimerSnapshot> {
        self.timer_update_tx.subscribe()
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }
}
