//! Background tasks module
//! 
//! This module contains background tasks that run alongside the HTTP server.

pub mod display;
pub mod tick_dispatch;
pub mod wake_up_recovery;

// Re-export main functions
pub use display::display_task;
pub use tick_dispatch::tick_dispatch_task;
pub use wake_up_recovery::{detect_resume, wake_up_recovery_task};
