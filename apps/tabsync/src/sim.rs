//! In-process stand-in for a proxy: a churning player population behind the
//! collaborator traits, used by the binary to drive the engine end to end.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use rand::Rng;
use tablist_wire::{GameMode, ProtocolVersion};
use uuid::Uuid;

use crate::collab::{PacketSink, PermissionCheck, PlayerInfo, PlayerProvider, ServerDirectory};
use crate::error::SinkError;
use crate::model::ViewerId;
use crate::ping::{PingError, ServerPing, ServerPinger};

const NAME_STEMS: &[&str] = &[
    "Steve", "Alex", "Creeper", "Notch", "Herobrine", "Enderman", "Blaze", "Wither",
    "Ghast", "Piglin", "Strider", "Axolotl",
];

const MODERN_VERSIONS: &[ProtocolVersion] = &[
    ProtocolVersion::V1_8,
    ProtocolVersion::V1_9_4,
    ProtocolVersion::V1_11_2,
    ProtocolVersion::V1_12_2,
];

/// What a churn step changed, for the caller to forward to the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimEvent {
    Joined {
        viewer: ViewerId,
        version: ProtocolVersion,
    },
    Left {
        viewer: ViewerId,
    },
    Moved {
        viewer: ViewerId,
    },
    Idle,
}

pub struct SimulatedProxy {
    servers: Vec<String>,
    legacy_share: f64,
    online: RwLock<HashMap<ViewerId, PlayerInfo>>,
    operators: RwLock<HashSet<Uuid>>,
    offline_servers: RwLock<HashSet<String>>,
    next_viewer: AtomicU64,
    packets: AtomicU64,
    bytes: AtomicU64,
}

impl SimulatedProxy {
    /// `legacy_share` is the fraction of joining clients on a 1.7 protocol.
    pub fn new(servers: Vec<String>, legacy_share: f64) -> Self {
        let servers = if servers.is_empty() {
            vec!["lobby".to_string()]
        } else {
            servers
        };
        Self {
            servers,
            legacy_share: legacy_share.clamp(0.0, 1.0),
            online: RwLock::new(HashMap::new()),
            operators: RwLock::new(HashSet::new()),
            offline_servers: RwLock::new(HashSet::new()),
            next_viewer: AtomicU64::new(1),
            packets: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
        }
    }

    pub fn online(&self) -> usize {
        self.online.read().len()
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets.load(Ordering::Relaxed)
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn grant_operator(&self, id: Uuid) {
        self.operators.write().insert(id);
    }

    pub fn set_server_offline(&self, server: &str, offline: bool) {
        let mut servers = self.offline_servers.write();
        if offline {
            servers.insert(server.to_string());
        } else {
            servers.remove(server);
        }
    }

    pub fn join(&self, rng: &mut impl Rng) -> (ViewerId, ProtocolVersion) {
        let viewer = ViewerId(self.next_viewer.fetch_add(1, Ordering::Relaxed));
        let stem = NAME_STEMS.choose(rng).copied().unwrap_or("Player");
        let mut player = PlayerInfo::new(
            Uuid::new_v4(),
            format!("{stem}{}", viewer.0 % 10_000),
            self.servers.choose(rng).map(String::as_str),
        );
        player.ping_millis = rng.gen_range(5..250);
        player.game_mode = if rng.gen_bool(0.1) {
            GameMode::Spectator
        } else {
            GameMode::Survival
        };
        player.vanished = rng.gen_bool(0.02);
        player.viewer = Some(viewer);
        self.online.write().insert(viewer, player);

        let version = if rng.gen_bool(self.legacy_share) {
            ProtocolVersion::V1_7_6
        } else {
            MODERN_VERSIONS
                .choose(rng)
                .copied()
                .unwrap_or(ProtocolVersion::V1_8)
        };
        (viewer, version)
    }

    pub fn leave(&self, viewer: ViewerId) -> bool {
        self.online.write().remove(&viewer).is_some()
    }

    /// One random change, biased towards `target` players online. Pings of
    /// a few players drift on every step.
    pub fn step(&self, rng: &mut impl Rng, target: usize) -> SimEvent {
        self.jitter_pings(rng);
        let online = self.online();
        let roll: f64 = rng.gen_range(0.0..1.0);
        if online < target && roll < 0.5 {
            let (viewer, version) = self.join(rng);
            return SimEvent::Joined { viewer, version };
        }
        let Some(viewer) = self.random_viewer(rng) else {
            return SimEvent::Idle;
        };
        if online > target / 2 && roll < 0.75 {
            self.leave(viewer);
            return SimEvent::Left { viewer };
        }
        let Some(server) = self.servers.choose(rng).cloned() else {
            return SimEvent::Idle;
        };
        match self.online.write().get_mut(&viewer) {
            Some(player) => {
                player.server = Some(server);
                SimEvent::Moved { viewer }
            }
            None => SimEvent::Idle,
        }
    }

    fn random_viewer(&self, rng: &mut impl Rng) -> Option<ViewerId> {
        let online = self.online.read();
        if online.is_empty() {
            return None;
        }
        let index = rng.gen_range(0..online.len());
        online.keys().nth(index).copied()
    }

    fn jitter_pings(&self, rng: &mut impl Rng) {
        let mut online = self.online.write();
        for player in online.values_mut() {
            if rng.gen_bool(0.05) {
                let delta: i64 = rng.gen_range(-20..=20);
                player.ping_millis = (i64::from(player.ping_millis) + delta).clamp(1, 999) as u32;
            }
        }
    }
}

impl PlayerProvider for SimulatedProxy {
    fn players(&self) -> Vec<PlayerInfo> {
        self.online.read().values().cloned().collect()
    }

    fn player(&self, viewer: ViewerId) -> Option<PlayerInfo> {
        self.online.read().get(&viewer).cloned()
    }
}

impl ServerDirectory for SimulatedProxy {
    fn servers(&self) -> Vec<String> {
        self.servers.clone()
    }
}

impl PermissionCheck for SimulatedProxy {
    fn has_permission(&self, player: &PlayerInfo, _permission: &str) -> bool {
        self.operators.read().contains(&player.id)
    }
}

impl PacketSink for SimulatedProxy {
    fn send_packets(&self, viewer: ViewerId, packets: Vec<Bytes>) -> Result<(), SinkError> {
        if !self.online.read().contains_key(&viewer) {
            return Err(SinkError::Disconnected);
        }
        let bytes: usize = packets.iter().map(Bytes::len).sum();
        self.packets
            .fetch_add(packets.len() as u64, Ordering::Relaxed);
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        Ok(())
    }
}

#[async_trait]
impl ServerPinger for SimulatedProxy {
    async fn ping(&self, server: &str) -> Result<ServerPing, PingError> {
        if self.offline_servers.read().contains(server) {
            return Err(PingError::Unreachable(server.to_string()));
        }
        let latency_ms = rand::thread_rng().gen_range(1..40);
        tokio::time::sleep(Duration::from_millis(u64::from(latency_ms))).await;
        let players_online = self
            .online
            .read()
            .values()
            .filter(|player| player.server() == Some(server))
            .count();
        Ok(ServerPing {
            latency_ms,
            players_online: u32::try_from(players_online).unwrap_or(u32::MAX),
        })
    }
}
