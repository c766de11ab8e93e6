//! System operations: sleep inhibition and host tool checks

use std::{
    collections::HashMap,
    process::Stdio,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};
use tokio::{
    process::{Child, Command},
    runtime::Handle,
};
use tracing::{debug, info, warn};

use super::{BackgroundContinuation, ContinuationToken};

/// Background continuation backed by a `systemd-inhibit` lock. The lock is
/// held by a child process for as long as the continuation is granted; the
/// host revokes it by terminating that process.
#[derive(Debug)]
pub struct SleepInhibitor {
    who: String,
    runtime: Handle,
    next_token: AtomicU64,
    held: Mutex<HashMap<ContinuationToken, Child>>,
}

impl SleepInhibitor {
    /// Must be called from within a Tokio runtime
    pub fn new(who: impl Into<String>) -> Self {
        Self {
            who: who.into(),
            runtime: Handle::current(),
            next_token: AtomicU64::new(1),
            held: Mutex::new(HashMap::new()),
        }
    }

    fn spawn_inhibitor(&self, reason: &str) -> std::io::Result<Child> {
        let _guard = self.runtime.enter();
        Command::new("systemd-inhibit")
            .arg("--what=sleep:idle")
            .arg("--mode=block")
            .arg(format!("--who={}", self.who))
            .arg(format!("--why={}", reason))
            .args(["sleep", "infinity"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
    }

    /// Number of continuations currently held
    pub fn held_count(&self) -> usize {
        self.held.lock().map(|h| h.len()).unwrap_or(0)
    }
}

impl BackgroundContinuation for SleepInhibitor {
    fn begin(&self, reason: &str) -> Option<ContinuationToken> {
        let child = match self.spawn_inhibitor(reason) {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to acquire sleep inhibitor: {}", e);
                return None;
            }
        };

        let token = ContinuationToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        match self.held.lock() {
            Ok(mut held) => {
                held.insert(token, child);
                info!("Sleep inhibitor acquired ({:?})", token);
                Some(token)
            }
            Err(e) => {
                // child is dropped here and killed by kill_on_drop
                warn!("Failed to lock inhibitor table: {}", e);
                None
            }
        }
    }

    fn end(&self, token: ContinuationToken) {
        let child = match self.held.lock() {
            Ok(mut held) => held.remove(&token),
            Err(e) => {
                warn!("Failed to lock inhibitor table: {}", e);
                return;
            }
        };

        let Some(mut child) = child else {
            debug!("Sleep inhibitor {:?} already released", token);
            return;
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                warn!("Sleep inhibitor {:?} was revoked earlier ({})", token, status);
            }
            _ => {
                if let Err(e) = child.start_kill() {
                    warn!("Failed to release sleep inhibitor {:?}: {}", token, e);
                } else {
                    info!("Sleep inhibitor released ({:?})", token);
                }
            }
        }
    }
}

/// Check if a host tool is available on the system
pub async fn check_host_tool(tool: &str) -> Result<(), String> {
    Command::new(tool)
        .arg("--version")
        .output()
        .await
        .map_err(|_| format!("{} is not available on this system", tool))?;

    info!("{} is available", tool);
    Ok(())
}
