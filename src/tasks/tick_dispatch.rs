//! Tick dispatch background task

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::state::{AppState, TickOutcome};

/// Background task that applies ticks from the tick source to the countdown
pub async fn tick_dispatch_task(state: Arc<AppState>, mut tick_rx: mpsc::UnboundedReceiver<()>) {
    info!("Starting tick dispatch task");

    while tick_rx.recv().await.is_some() {
        match state.tick() {
            Ok(TickOutcome::Completed) => info!("Countdown completed"),
            Ok(TickOutcome::Running) => {}
            // Ticks queued before a pause or completion land here
            Ok(TickOutcome::Ignored) => debug!("Stale tick ignored"),
            Err(e) => error!("Failed to apply tick: {}", e),
        }
    }

    debug!("Tick channel closed, stopping tick dispatch task");
}
