use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::collab::{PermissionCheck, PlayerInfo};

/// Permission that lets a viewer see hidden and vanished players.
pub const SEE_VANISHED: &str = "tabsync.seevanished";

/// Names hidden from every tab list by operator request.
#[derive(Debug, Default)]
pub struct HiddenPlayers {
    names: RwLock<HashSet<String>>,
}

impl HiddenPlayers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the name was already hidden.
    pub fn hide(&self, name: &str) -> bool {
        self.names.write().insert(name.to_ascii_lowercase())
    }

    /// Only undoes [`HiddenPlayers::hide`]; backend vanish stays in effect.
    pub fn unhide(&self, name: &str) -> bool {
        self.names.write().remove(&name.to_ascii_lowercase())
    }

    pub fn is_hidden(&self, name: &str) -> bool {
        self.names.read().contains(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.read().is_empty()
    }
}

/// Decides which players a viewer may see listed.
pub struct VisibilityPolicy {
    hidden: Arc<HiddenPlayers>,
    hidden_servers: RwLock<HashSet<String>>,
    permissions: Arc<dyn PermissionCheck>,
}

impl VisibilityPolicy {
    pub fn new(
        hidden: Arc<HiddenPlayers>,
        hidden_servers: impl IntoIterator<Item = String>,
        permissions: Arc<dyn PermissionCheck>,
    ) -> Self {
        Self {
            hidden,
            hidden_servers: RwLock::new(hidden_servers.into_iter().collect()),
            permissions,
        }
    }

    pub fn hidden_players(&self) -> &Arc<HiddenPlayers> {
        &self.hidden
    }

    /// Replaces the hidden server list, as on a config reload.
    pub fn set_hidden_servers(&self, servers: impl IntoIterator<Item = String>) {
        *self.hidden_servers.write() = servers.into_iter().collect();
    }

    pub fn is_hidden(&self, player: &PlayerInfo, viewer: &PlayerInfo) -> bool {
        if self.permissions.has_permission(viewer, SEE_VANISHED) {
            return false;
        }
        player.vanished
            || self.hidden.is_hidden(&player.name)
            || player
                .server()
                .is_some_and(|server| self.hidden_servers.read().contains(server))
    }
}
