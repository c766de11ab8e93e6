//! Console countdown display

use std::sync::Arc;
use tracing::{debug, info};

use crate::state::{AppState, TimerSnapshot};

/// Background task that prints the countdown as it changes: every state
/// change and every whole minute at info, every second at debug
pub async fn display_task(state: Arc<AppState>) {
    let mut updates = state.subscribe();
    let mut last = updates.borrow_and_update().clone();
    info!("Countdown {} ({})", last.display, last.state);

    while updates.changed().await.is_ok() {
        let current = updates.borrow_and_update().clone();
        if is_notable(&last, &current) {
            info!("Countdown {} ({})", current.display, current.state);
        } else {
            debug!("Countdown {}", current.display);
        }
        last = current;
    }
}

/// Whether an update is worth showing at info level
pub fn is_notable(previous: &TimerSnapshot, current: &TimerSnapshot) -> bool {
    previous.state != current.state
        || previous.configured_minutes != current.configured_minutes
        || (current.remaining_seconds % 60 == 0
            && current.remaining_seconds != previous.remaining_seconds)
}
