//! Seams to the hosting proxy.

use bytes::Bytes;
use tablist_wire::{GameMode, SkinRef};
use uuid::Uuid;

use crate::config::TabSyncConfig;
use crate::error::{SinkError, SourceError};
use crate::model::{EntrySet, ViewerId};

/// Produces what a viewer should see right now. Called from the drain, never
/// from a network callback.
pub trait EntrySource: Send + Sync {
    fn desired_entries(&self, viewer: ViewerId) -> Result<EntrySet, SourceError>;

    /// Applies a reloaded config. Sources without config-derived state keep
    /// the default, which ignores it.
    fn reconfigure(&self, _config: &TabSyncConfig) {}
}

impl<F> EntrySource for F
where
    F: Fn(ViewerId) -> Result<EntrySet, SourceError> + Send + Sync,
{
    fn desired_entries(&self, viewer: ViewerId) -> Result<EntrySet, SourceError> {
        self(viewer)
    }
}

/// Hands packet bodies to the viewer's connection. Must keep call order per
/// viewer and must not block.
pub trait PacketSink: Send + Sync {
    fn send_packets(&self, viewer: ViewerId, packets: Vec<Bytes>) -> Result<(), SinkError>;
}

/// A player as the proxy reports it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerInfo {
    pub id: Uuid,
    pub name: String,
    pub server: Option<String>,
    pub ping_millis: u32,
    pub game_mode: GameMode,
    pub skin: Option<SkinRef>,
    /// Vanish flag reported by the backend bridge.
    pub vanished: bool,
    /// Set when the player is connected through this proxy.
    pub viewer: Option<ViewerId>,
}

impl PlayerInfo {
    pub fn new(id: Uuid, name: impl Into<String>, server: Option<&str>) -> Self {
        Self {
            id,
            name: name.into(),
            server: server.map(str::to_string),
            ping_millis: 0,
            game_mode: GameMode::default(),
            skin: None,
            vanished: false,
            viewer: None,
        }
    }

    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }
}

pub trait PlayerProvider: Send + Sync {
    fn players(&self) -> Vec<PlayerInfo>;
    fn player(&self, viewer: ViewerId) -> Option<PlayerInfo>;
}

/// Backend servers registered with the proxy, whether or not any tab list
/// names them.
pub trait ServerDirectory: Send + Sync {
    fn servers(&self) -> Vec<String>;
}

pub trait PermissionCheck: Send + Sync {
    fn has_permission(&self, player: &PlayerInfo, permission: &str) -> bool;
}

/// Grants nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPermissions;

impl PermissionCheck for NoPermissions {
    fn has_permission(&self, _player: &PlayerInfo, _permission: &str) -> bool {
        false
    }
}
