//! Latest reachability sample per backend server, for placeholders.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PingInfo {
    pub online: bool,
    pub latency_ms: u32,
    pub players_online: u32,
    pub updated_at: Instant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServerPing {
    pub latency_ms: u32,
    pub players_online: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PingError {
    #[error("server {0} unreachable")]
    Unreachable(String),
    #[error("ping timed out")]
    Timeout,
}

#[async_trait]
pub trait ServerPinger: Send + Sync {
    async fn ping(&self, server: &str) -> Result<ServerPing, PingError>;
}

#[derive(Debug, Default)]
pub struct ServerStates {
    states: DashMap<String, PingInfo>,
}

impl ServerStates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, server: &str) -> Option<PingInfo> {
        self.states.get(server).map(|state| *state.value())
    }

    pub fn record(&self, server: &str, info: PingInfo) {
        self.states.insert(server.to_string(), info);
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Pings `server` once and stores the result, offline on failure.
    pub async fn refresh(&self, pinger: &dyn ServerPinger, server: &str, timeout: Duration) {
        let result = match tokio::time::timeout(timeout, pinger.ping(server)).await {
            Ok(result) => result,
            Err(_) => Err(PingError::Timeout),
        };
        let info = match result {
            Ok(ping) => PingInfo {
                online: true,
                latency_ms: ping.latency_ms,
                players_online: ping.players_online,
                updated_at: Instant::now(),
            },
            Err(err) => {
                trace!(server = %server, error = %err, "server ping failed");
                PingInfo {
                    online: false,
                    latency_ms: 0,
                    players_online: 0,
                    updated_at: Instant::now(),
                }
            }
        };
        self.record(server, info);
    }
}

/// One task per server, pinging every `delay`. A zero delay or a missing
/// runtime starts nothing.
pub fn spawn_ping_tasks(
    servers: &[String],
    delay: Duration,
    pinger: Arc<dyn ServerPinger>,
    states: Arc<ServerStates>,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    if delay.is_zero() {
        return Vec::new();
    }
    let Ok(handle) = Handle::try_current() else {
        debug!("no runtime, server pings not started");
        return Vec::new();
    };
    servers
        .iter()
        .cloned()
        .map(|server| {
            let pinger = pinger.clone();
            let states = states.clone();
            let mut shutdown = shutdown.clone();
            handle.spawn(async move {
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                break;
                            }
                            continue;
                        }
                    }
                    states.refresh(pinger.as_ref(), &server, delay).await;
                }
                debug!(server = %server, "server ping stopped");
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Counting {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ServerPinger for Counting {
        async fn ping(&self, server: &str) -> Result<ServerPing, PingError> {
            let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if server == "down" {
                return Err(PingError::Unreachable(server.to_string()));
            }
            Ok(ServerPing {
                latency_ms: 12,
                players_online: calls,
            })
        }
    }

    struct Stuck;

    #[async_trait]
    impl ServerPinger for Stuck {
        async fn ping(&self, _server: &str) -> Result<ServerPing, PingError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn tasks_poll_until_shutdown() {
        let pinger = Arc::new(Counting {
            calls: AtomicU32::new(0),
        });
        let states = Arc::new(ServerStates::new());
        let (tx, rx) = watch::channel(false);
        let tasks = spawn_ping_tasks(
            &["lobby".to_string(), "down".to_string()],
            Duration::from_secs(5),
            pinger.clone(),
            states.clone(),
            rx,
        );
        assert_eq!(tasks.len(), 2);
        assert!(states.get("lobby").is_none());

        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert!(states.get("lobby").is_some_and(|s| s.online));
        assert!(states.get("down").is_some_and(|s| !s.online));

        tx.send(true).unwrap();
        for task in tasks {
            task.await.unwrap();
        }
        let calls = pinger.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(pinger.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_ping_marks_server_offline() {
        let states = ServerStates::new();
        states
            .refresh(&Stuck, "lobby", Duration::from_secs(1))
            .await;
        assert_eq!(states.get("lobby").map(|s| s.online), Some(false));
    }

    #[test]
    fn zero_delay_starts_nothing() {
        let (_tx, rx) = watch::channel(false);
        let tasks = spawn_ping_tasks(
            &["lobby".to_string()],
            Duration::ZERO,
            Arc::new(Stuck),
            Arc::new(ServerStates::new()),
            rx,
        );
        assert!(tasks.is_empty());
    }
}
