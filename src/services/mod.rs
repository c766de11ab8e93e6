//! Host integrations module
//! 
//! This module contains the collaborator traits the countdown controller
//! drives and their implementations on a systemd desktop: alert sound,
//! scheduled notifications, sleep inhibition and the tick source.

pub mod alert;
pub mod notifications;
pub mod ports;
pub mod system;
pub mod ticker;

// Re-export main types
pub use alert::SoundAlert;
pub use notifications::{DesktopNotificationScheduler, SystemdTimerScheduler};
pub use ports::*;
pub use system::{check_host_tool, SleepInhibitor};
pub use ticker::IntervalTickSource;
