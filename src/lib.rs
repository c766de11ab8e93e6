//! Countdown Timer - a single countdown timer controlled over local HTTP
//! 
//! The countdown reconciles against a wall-clock deadline, holds a sleep
//! inhibitor while running and schedules an OS-level notification for the
//! moment it expires.

pub mod config;
pub mod state;
pub mod api;
pub mod services;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use state::{AppState, CountdownController, TimerSnapshot, TimerState};
pub use api::create_router;
pub use utils::signals::shutdown_signal;
