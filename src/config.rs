//! Configuration and CLI argument handling

use std::path::PathBuf;
use clap::{Parser, ValueEnum};

use crate::state::{DEFAULT_DURATION_MINUTES, MAX_DURATION_MINUTES, MIN_DURATION_MINUTES};

/// How the expiry notification is scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NotifierKind {
    /// Transient systemd user timer; fires even if this process is gone
    Systemd,
    /// In-process desktop notification
    Desktop,
    /// No scheduled notification
    None,
}

/// CLI argument parsing structure
#[derive(Debug, Parser)]
#[command(name = "countdown-timer")]
#[command(about = "A single countdown timer with deadline reconciliation and scheduled alerts")]
#[command(version)]
pub struct Config {
    /// Port to bind the control server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Countdown duration in minutes
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_DURATION_MINUTES,
        value_parser = clap::value_parser!(u32).range(MIN_DURATION_MINUTES as i64..=MAX_DURATION_MINUTES as i64)
    )]
    pub duration: u32,

    /// Sound file played when the countdown finishes
    #[arg(long)]
    pub sound: Option<PathBuf>,

    /// Command used to play the alert sound
    #[arg(long, default_value = "paplay")]
    pub player: String,

    /// How to schedule the expiry notification
    #[arg(long, value_enum, default_value_t = NotifierKind::Systemd)]
    pub notifier: NotifierKind,

    /// Do not inhibit system sleep while the countdown runs
    #[arg(long)]
    pub no_inhibit: bool,

    /// Start the countdown immediately
    #[arg(long)]
    pub start: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}
