//! State management module
//! 
//! This module contains the countdown state machine and the shared
//! application state wrapped around it.

pub mod app_state;
pub mod clock;
pub mod controller;
pub mod timer_state;

// Re-export main types
pub use app_state::{AppState, Error};
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{
    Collaborators, ControllerError, CountdownController, TickOutcome,
    DEFAULT_DURATION_MINUTES, MAX_DURATION_MINUTES, MIN_DURATION_MINUTES, TICK_PERIOD,
};
pub use timer_state::{format_remaining, TimerSnapshot, TimerState};
