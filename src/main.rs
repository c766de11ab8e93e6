//! Countdown Timer - a single countdown timer controlled over local HTTP
//!
//! This is the main entry point for the countdown-timer application.

use std::sync::Arc;
use tokio::{net::TcpListener, sync::mpsc};
use tracing::{info, warn};

use countdown_timer::{
    config::{Config, NotifierKind},
    state::{AppState, Collaborators, CountdownController, SystemClock},
    api::create_router,
    services::{
        check_host_tool, BackgroundContinuation, DesktopNotificationScheduler,
        IntervalTickSource, NoContinuation, NoNotifications, NotificationScheduler,
        SleepInhibitor, SoundAlert, SystemdTimerScheduler,
    },
    tasks::{display_task, tick_dispatch_task, wake_up_recovery_task},
    utils::shutdown_signal,
};

const NOTIFICATION_UNIT: &str = "countdown-timer-expiry";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("countdown_timer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting countdown-timer v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: host={}, port={}, duration={}min, notifier={:?}, inhibit={}",
          config.host, config.port, config.duration, config.notifier, !config.no_inhibit);

    let (tick_tx, tick_rx) = mpsc::unbounded_channel();
    let (notifications, systemd_scheduler) = notification_scheduler(config.notifier).await;
    let collaborators = Collaborators {
        alert: Arc::new(SoundAlert::new(config.sound.clone(), config.player.clone())),
        notifications,
        continuation: background_continuation(config.no_inhibit).await,
        ticks: Arc::new(IntervalTickSource::new(tick_tx)),
    };

    let controller = CountdownController::new(config.duration, Arc::new(SystemClock), collaborators)?;
    let state = Arc::new(AppState::new(config.port, config.host.clone(), controller));

    tokio::spawn(tick_dispatch_task(Arc::clone(&state), tick_rx));
    tokio::spawn(wake_up_recovery_task(Arc::clone(&state)));
    tokio::spawn(display_task(Arc::clone(&state)));

    if config.start {
        state.start()?;
    }

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /start     - Start or resume the countdown");
    info!("  POST /pause     - Pause the countdown");
    info!("  POST /toggle    - Start/pause button");
    info!("  PUT  /duration  - Set duration, body {{\"minutes\": 1-120}}");
    info!("  GET  /status    - Current countdown");
    info!("  GET  /health    - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    state.teardown();
    if let Some(scheduler) = systemd_scheduler {
        // Let the pending-notification cancel reach systemd before exiting
        scheduler.flush().await;
    }
    info!("Server shutdown complete");
    Ok(())
}

/// Pick the notification scheduler, degrading when host tools are missing.
/// The systemd scheduler is also returned on its own so shutdown can flush it.
async fn notification_scheduler(
    kind: NotifierKind,
) -> (Arc<dyn NotificationScheduler>, Option<SystemdTimerScheduler>) {
    let scheduler: Arc<dyn NotificationScheduler> = match kind {
        NotifierKind::Systemd => match check_host_tool("systemd-run").await {
            Ok(()) => {
                let systemd = SystemdTimerScheduler::spawn(NOTIFICATION_UNIT);
                let shared: Arc<dyn NotificationScheduler> = Arc::new(systemd.clone());
                return (shared, Some(systemd));
            }
            Err(e) => {
                warn!("{}, falling back to desktop notifications", e);
                Arc::new(DesktopNotificationScheduler::new())
            }
        },
        NotifierKind::Desktop => Arc::new(DesktopNotificationScheduler::new()),
        NotifierKind::None => Arc::new(NoNotifications),
    };
    (scheduler, None)
}

/// Pick the background continuation provider
async fn background_continuation(disabled: bool) -> Arc<dyn BackgroundContinuation> {
    if disabled {
        return Arc::new(NoContinuation);
    }
    match check_host_tool("systemd-inhibit").await {
        Ok(()) => Arc::new(SleepInhibitor::new("countdown-timer")),
        Err(e) => {
            warn!("{}, system sleep will not be inhibited", e);
            Arc::new(NoContinuation)
        }
    }
}
