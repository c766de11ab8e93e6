//! Wake-up recovery background task

use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use chrono::{DateTime, Utc};
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// How often the clocks are compared
pub const CHECK_INTERVAL: Duration = Duration::from_secs(15);

/// Wall-clock progress beyond monotonic progress that counts as a resume
pub const RESUME_THRESHOLD: Duration = Duration::from_secs(5);

/// Background task that detects a resume from suspend and reconciles the
/// countdown right away instead of waiting for the next tick
pub async fn wake_up_recovery_task(state: Arc<AppState>) {
    info!("Starting wake-up recovery task");

    let mut interval = interval(CHECK_INTERVAL);
    let mut last_wall = Utc::now();
    let mut last_mono = Instant::now();

    loop {
        interval.tick().await;

        let now_wall = Utc::now();
        let now_mono = Instant::now();
        let gap = detect_resume(last_wall, now_wall, now_mono - last_mono);
        last_wall = now_wall;
        last_mono = now_mono;

        let Some(gap) = gap else {
            continue;
        };

        info!("System wake-up detected after ~{}s, reconciling countdown", gap.as_secs());
        match state.reconcile() {
            Ok(snapshot) => debug!("Countdown after wake-up: {} ({})", snapshot.display, snapshot.state),
            Err(e) => warn!("Failed to reconcile after wake-up: {}", e),
        }
    }
}

/// Compare wall-clock and monotonic progress between two samples. The
/// monotonic clock stops while the host is suspended, so a wall-clock lead
/// beyond [`RESUME_THRESHOLD`] means the host slept; returns that lead.
pub fn detect_resume(
    last_wall: DateTime<Utc>,
    now_wall: DateTime<Utc>,
    mono_elapsed: Duration,
) -> Option<Duration> {
    let wall_elapsed = (now_wall - last_wall).to_std().ok()?;
    let lead = wall_elapsed.checked_sub(mono_elapsed)?;
    (lead > RESUME_THRESHOLD).then_some(lead)
}
