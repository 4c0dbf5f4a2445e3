//! Periodic sweep and paced drain of the resend queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, trace};

use crate::engine::TabSync;

/// The two background tasks that keep every viewer's tab list current.
pub struct ResendLoop {
    sweep: JoinHandle<()>,
    drain: JoinHandle<()>,
}

impl ResendLoop {
    /// Spawns the sweep and the drain on the current runtime. Returns `None`
    /// without raising anything when there is no runtime or `shutdown` has
    /// already fired.
    pub fn start(engine: Arc<TabSync>, shutdown: watch::Receiver<bool>) -> Option<Self> {
        if *shutdown.borrow() {
            debug!(target: "tabsync::sweep", "shutdown already signalled, resend loop not started");
            return None;
        }
        let Ok(handle) = Handle::try_current() else {
            debug!(target: "tabsync::sweep", "no runtime, resend loop not started");
            return None;
        };
        let sweep = handle.spawn(run_sweep(engine.clone(), shutdown.clone()));
        let drain = handle.spawn(run_drain(engine, shutdown));
        Some(Self { sweep, drain })
    }

    pub fn is_finished(&self) -> bool {
        self.sweep.is_finished() && self.drain.is_finished()
    }

    /// Waits for both tasks to stop.
    pub async fn join(self) {
        if let Err(err) = self.sweep.await {
            debug!(target: "tabsync::sweep", error = %err, "sweep task ended abnormally");
        }
        if let Err(err) = self.drain.await {
            debug!(target: "tabsync::drain", error = %err, "drain task ended abnormally");
        }
    }
}

async fn run_sweep(engine: Arc<TabSync>, mut shutdown: watch::Receiver<bool>) {
    let mut reloads = engine.subscribe_reloads();
    while !*shutdown.borrow() {
        // re-read on every pass so a reload can switch the sweep on or off
        let interval = engine.config().sweep_interval();
        let sleep = async {
            match interval {
                Some(interval) => tokio::time::sleep(interval).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            _ = sleep => {
                engine.sweep();
            }
            changed = reloads.changed() => {
                if changed.is_err() {
                    break;
                }
                trace!(target: "tabsync::sweep", "config reloaded, sweep re-armed");
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    debug!(target: "tabsync::sweep", "sweep stopped");
}

async fn run_drain(engine: Arc<TabSync>, mut shutdown: watch::Receiver<bool>) {
    let mut period = engine.config().drain_interval();
    let mut ticker = ticker_at(Instant::now(), period);
    while !*shutdown.borrow() {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        }
        let config = engine.config();
        let report = engine.drain_once(config.drain_batch_size);
        if report.drained > 0 {
            trace!(
                target: "tabsync::drain",
                drained = report.drained,
                sent = report.sent,
                unchanged = report.unchanged,
                skipped = report.skipped,
                failed = report.failed,
                pending = engine.queue().len(),
                "drain tick"
            );
        }
        let next = config.drain_interval();
        if next != period {
            period = next;
            ticker = ticker_at(Instant::now() + period, period);
        }
    }
    debug!(target: "tabsync::drain", "drain stopped");
}

fn ticker_at(start: Instant, period: Duration) -> Interval {
    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
