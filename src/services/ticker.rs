//! One-second tick source

use std::time::Duration;
use tokio::{
    runtime::Handle,
    sync::mpsc,
    time::{interval, MissedTickBehavior},
};
use tracing::debug;

use super::{TickHandle, TickSource};

/// Tick source backed by a Tokio interval. Ticks are forwarded into a
/// channel so they are applied on the same path as API requests.
#[derive(Debug, Clone)]
pub struct IntervalTickSource {
    tick_tx: mpsc::UnboundedSender<()>,
    runtime: Handle,
}

impl IntervalTickSource {
    /// Must be called from within a Tokio runtime
    pub fn new(tick_tx: mpsc::UnboundedSender<()>) -> Self {
        Self {
            tick_tx,
            runtime: Handle::current(),
        }
    }
}

impl TickSource for IntervalTickSource {
    fn start(&self, period: Duration) -> TickHandle {
        let tick_tx = self.tick_tx.clone();
        let task = self.runtime.spawn(async move {
            let mut ticks = interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately
            ticks.tick().await;

            loop {
                ticks.tick().await;
                if tick_tx.send(()).is_err() {
                    debug!("Tick receiver closed, stopping tick source");
                    break;
                }
            }
        });

        debug!("Tick source started");
        TickHandle::new(move || {
            task.abort();
            debug!("Tick source stopped");
        })
    }
}
