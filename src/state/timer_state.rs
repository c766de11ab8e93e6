//! Timer state structure and snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of the countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
}

impl TimerState {
    /// Check if the countdown is running
    pub fn is_running(&self) -> bool {
        matches!(self, TimerState::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimerState::Idle => "idle",
            TimerState::Running => "running",
            TimerState::Paused => "paused",
        }
    }
}

impl std::fmt::Display for TimerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of the countdown, shared with the API and watchers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub state: TimerState,
    pub configured_minutes: u32,
    pub remaining_seconds: u64,
    /// Remaining time rendered as `MM:SS`
    pub display: String,
    /// End deadline, only present while running
    pub deadline: Option<DateTime<Utc>>,
}

impl TimerSnapshot {
    pub fn new(
        state: TimerState,
        configured_minutes: u32,
        remaining_seconds: u64,
        deadline: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            state,
            configured_minutes,
            remaining_seconds,
            display: format_remaining(remaining_seconds),
            deadline,
        }
    }

    /// Check if the countdown is running
    pub fn is_active(&self) -> bool {
        self.state.is_running()
    }
}

/// Format whole seconds as `MM:SS`; minutes grow past two digits when needed
pub fn format_remaining(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
