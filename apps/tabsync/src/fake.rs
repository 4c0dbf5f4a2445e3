//! Players listed from configuration rather than from connections.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tablist_wire::team::char_len;
use tablist_wire::SkinRef;
use uuid::Uuid;

use crate::collab::{PlayerInfo, PlayerProvider};
use crate::model::ViewerId;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FakePlayerConfig {
    pub name: String,
    pub server: Option<String>,
    pub ping: u32,
    /// Base64 `textures` value; unsigned.
    pub skin: Option<String>,
}

impl FakePlayerConfig {
    pub fn validate(&self) -> Result<(), String> {
        match char_len(&self.name) {
            0 => Err("fake player without a name".to_string()),
            1..=16 => Ok(()),
            _ => Err(format!("fake player name {:?} is longer than 16 chars", self.name)),
        }
    }

    /// Same name, same id, so a reload keeps the row in place.
    pub fn id(&self) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("tabsync-fake:{}", self.name).as_bytes())
    }

    fn to_player(&self) -> PlayerInfo {
        let mut player = PlayerInfo::new(self.id(), self.name.clone(), self.server.as_deref());
        player.ping_millis = self.ping;
        player.skin = self.skin.clone().map(|value| SkinRef {
            value,
            signature: None,
        });
        player
    }
}

/// Config-defined players. They show up in every player list but never
/// connect, so they are never viewers.
#[derive(Default)]
pub struct FakePlayers {
    players: RwLock<Vec<PlayerInfo>>,
}

impl FakePlayers {
    pub fn new(configs: &[FakePlayerConfig]) -> Self {
        let fake = Self::default();
        fake.reload(configs);
        fake
    }

    /// Replaces the whole set. A repeated name keeps its first definition.
    pub fn reload(&self, configs: &[FakePlayerConfig]) {
        let mut players: Vec<PlayerInfo> = Vec::with_capacity(configs.len());
        for config in configs {
            let player = config.to_player();
            if !players.iter().any(|existing| existing.id == player.id) {
                players.push(player);
            }
        }
        *self.players.write() = players;
    }

    pub fn len(&self) -> usize {
        self.players.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.read().is_empty()
    }
}

impl PlayerProvider for FakePlayers {
    fn players(&self) -> Vec<PlayerInfo> {
        self.players.read().clone()
    }

    fn player(&self, _viewer: ViewerId) -> Option<PlayerInfo> {
        None
    }
}
