//! One-shot expiry notifications

use std::{
    sync::Mutex,
    time::Duration,
};
use chrono::{DateTime, Utc};
use notify_rust::{Notification, Timeout};
use tokio::{
    process::Command,
    runtime::Handle,
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::sleep,
};
use tracing::{debug, error, info, warn};

use super::NotificationScheduler;

const NOTIFICATION_SUMMARY: &str = "Countdown finished";

/// Longest in-process sleep before the wall clock is checked again
const WALL_CLOCK_RECHECK: Duration = Duration::from_secs(5);

#[derive(Debug)]
enum SchedulerCommand {
    Schedule {
        deadline: DateTime<Utc>,
        message: String,
    },
    CancelAll,
    Flush(oneshot::Sender<()>),
}

/// Schedules the notification as a transient systemd user timer, so it is
/// delivered at the deadline even if this process is stopped or killed.
///
/// Commands are applied in order by a single worker task.
#[derive(Debug, Clone)]
pub struct SystemdTimerScheduler {
    tx: mpsc::UnboundedSender<SchedulerCommand>,
}

impl SystemdTimerScheduler {
    /// Spawn the worker; must be called from within a Tokio runtime
    pub fn spawn(unit: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(scheduler_worker(unit.into(), rx));
        Self { tx }
    }

    /// Wait until every command sent so far has been applied
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(SchedulerCommand::Flush(done_tx));
        let _ = done_rx.await;
    }

    fn send(&self, command: SchedulerCommand) {
        if let Err(e) = self.tx.send(command) {
            error!("Notification scheduler stopped, dropping {:?}", e.0);
        }
    }
}

impl NotificationScheduler for SystemdTimerScheduler {
    fn schedule_one_shot(&self, deadline: DateTime<Utc>, message: &str) {
        self.send(SchedulerCommand::Schedule {
            deadline,
            message: message.to_string(),
        });
    }

    fn cancel_all_pending(&self) {
        self.send(SchedulerCommand::CancelAll);
    }
}

async fn scheduler_worker(unit: String, mut rx: mpsc::UnboundedReceiver<SchedulerCommand>) {
    info!("Starting notification scheduler for unit {}", unit);

    while let Some(command) = rx.recv().await {
        match command {
            SchedulerCommand::Schedule { deadline, message } => {
                if let Err(e) = schedule_transient_timer(&unit, deadline, &message).await {
                    warn!("Failed to schedule expiry notification: {}", e);
                }
            }
            SchedulerCommand::CancelAll => {
                if let Err(e) = stop_transient_timer(&unit).await {
                    debug!("No pending notification cancelled: {}", e);
                }
            }
            SchedulerCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    debug!("Notification scheduler for unit {} stopped", unit);
}

/// Format a deadline as a systemd calendar expression
pub fn calendar_spec(deadline: DateTime<Utc>) -> String {
    deadline.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Create a transient user timer that runs notify-send at `deadline`
pub async fn schedule_transient_timer(
    unit: &str,
    deadline: DateTime<Utc>,
    message: &str,
) -> Result<(), String> {
    debug!("Scheduling {} for {}", unit, deadline);

    let output = Command::new("systemd-run")
        .arg("--user")
        .arg(format!("--unit={}", unit))
        .arg("--description=Countdown timer expiry notification")
        .arg(format!("--on-calendar={}", calendar_spec(deadline)))
        .arg("--timer-property=AccuracySec=1s")
        .args(["notify-send", "--app-name=countdown-timer", "--urgency=critical"])
        .arg(NOTIFICATION_SUMMARY)
        .arg(message)
        .output()
        .await
        .map_err(|e| format!("Failed to execute systemd-run: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("systemd-run failed: {}", stderr));
    }

    info!("Expiry notification scheduled for {}", deadline);
    Ok(())
}

/// Stop the transient timer; a notification already being shown is left alone
pub async fn stop_transient_timer(unit: &str) -> Result<(), String> {
    let timer = format!("{}.timer", unit);
    let service = format!("{}.service", unit);

    let output = Command::new("systemctl")
        .args(["--user", "stop", &timer])
        .output()
        .await
        .map_err(|e| format!("Failed to execute systemctl stop: {}", e))?;

    // Clear leftovers so the unit name can be reused
    let _ = Command::new("systemctl")
        .args(["--user", "reset-failed", &timer, &service])
        .output()
        .await;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("systemctl stop failed: {}", stderr));
    }

    info!("Pending expiry notification cancelled");
    Ok(())
}

/// In-process fallback: a task that waits for the deadline and shows a
/// desktop notification. Only fires while this process is alive.
#[derive(Debug)]
pub struct DesktopNotificationScheduler {
    runtime: Handle,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl DesktopNotificationScheduler {
    /// Must be called from within a Tokio runtime
    pub fn new() -> Self {
        Self {
            runtime: Handle::current(),
            pending: Mutex::new(None),
        }
    }

    fn replace_pending(&self, next: Option<JoinHandle<()>>) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        *pending = next;
    }
}

impl NotificationScheduler for DesktopNotificationScheduler {
    fn schedule_one_shot(&self, deadline: DateTime<Utc>, message: &str) {
        let message = message.to_string();
        let task = self.runtime.spawn(async move {
            wait_until(deadline).await;
            let shown = tokio::task::spawn_blocking(move || {
                show_notification(NOTIFICATION_SUMMARY, &message)
            })
            .await;
            match shown {
                Ok(Ok(())) => info!("Expiry notification shown"),
                Ok(Err(e)) => warn!("{}", e),
                Err(e) => error!("Notification task failed: {}", e),
            }
        });
        self.replace_pending(Some(task));
        debug!("Desktop notification scheduled for {}", deadline);
    }

    fn cancel_all_pending(&self) {
        self.replace_pending(None);
    }
}

/// Sleep until the wall clock reaches `deadline`. Monotonic sleeps stall
/// while the host is suspended, so the wall clock is re-read periodically.
async fn wait_until(deadline: DateTime<Utc>) {
    loop {
        let left = match (deadline - Utc::now()).to_std() {
            Ok(left) if !left.is_zero() => left,
            _ => return,
        };
        sleep(left.min(WALL_CLOCK_RECHECK)).await;
    }
}

/// Show a desktop notification immediately
pub fn show_notification(summary: &str, body: &str) -> anyhow::Result<()> {
    Notification::new()
        .appname("countdown-timer")
        .summary(summary)
        .body(body)
        .timeout(Timeout::Milliseconds(10000))
        .show()
        .map_err(|e| anyhow::anyhow!("Failed to show notification: {}", e))?;

    Ok(())
}
