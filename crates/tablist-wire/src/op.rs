use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Viewer-local scoreboard team used by the name-length bypass.
pub type TeamId = u16;

/// Stable identity of a tab-list row, independent of its text and position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotKey(pub Uuid);

impl SlotKey {
    const FIXED_NAMESPACE: u64 = 0x7461_6273_796e_6300;

    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Deterministic key for a row that has no player behind it.
    pub fn fixed(group: u32, index: u32) -> Self {
        Self(Uuid::from_u64_pair(
            Self::FIXED_NAMESPACE | u64::from(group & 0xff),
            u64::from(index) | (u64::from(group) << 32),
        ))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for SlotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    #[default]
    Survival,
    Creative,
    Adventure,
    Spectator,
}

impl GameMode {
    pub fn id(self) -> i32 {
        match self {
            GameMode::Survival => 0,
            GameMode::Creative => 1,
            GameMode::Adventure => 2,
            GameMode::Spectator => 3,
        }
    }
}

/// Signed `textures` profile property.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SkinRef {
    pub value: String,
    pub signature: Option<String>,
}

/// A row as it goes on the wire.
///
/// `field` is the list-entry name: the row identity on the legacy dialect and
/// the profile name on the entry-list dialect. `display` is only written by
/// dialects with a separate display-name field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireEntry {
    pub key: SlotKey,
    pub field: String,
    pub display: String,
    pub ping: u32,
    pub game_mode: GameMode,
    pub skin: Option<SkinRef>,
}

/// Abstract tab-list operation produced by the diff and consumed by the codec.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TabOp {
    Add(WireEntry),
    Remove {
        key: SlotKey,
        field: String,
    },
    /// Text change. Rewrites the row on dialects keyed by text.
    UpdateText {
        old_field: String,
        entry: WireEntry,
    },
    UpdatePing {
        key: SlotKey,
        field: String,
        ping: u32,
    },
    UpdateGameMode {
        key: SlotKey,
        game_mode: GameMode,
    },
    /// Skin or profile-name change; the entry-list protocol can only re-add.
    UpdateSkin(WireEntry),
    TeamCreate {
        team: TeamId,
        prefix: String,
        suffix: String,
        member: String,
    },
    TeamUpdate {
        team: TeamId,
        prefix: String,
        suffix: String,
    },
    TeamRemove {
        team: TeamId,
    },
    HeaderFooter {
        header: String,
        footer: String,
    },
}

impl TabOp {
    /// Row the op targets, if any.
    pub fn key(&self) -> Option<SlotKey> {
        match self {
            TabOp::Add(entry) | TabOp::UpdateSkin(entry) => Some(entry.key),
            TabOp::UpdateText { entry, .. } => Some(entry.key),
            TabOp::Remove { key, .. }
            | TabOp::UpdatePing { key, .. }
            | TabOp::UpdateGameMode { key, .. } => Some(*key),
            TabOp::TeamCreate { .. }
            | TabOp::TeamUpdate { .. }
            | TabOp::TeamRemove { .. }
            | TabOp::HeaderFooter { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TabOp::Add(_) => "add",
            TabOp::Remove { .. } => "remove",
            TabOp::UpdateText { .. } => "update_text",
            TabOp::UpdatePing { .. } => "update_ping",
            TabOp::UpdateGameMode { .. } => "update_game_mode",
            TabOp::UpdateSkin(_) => "update_skin",
            TabOp::TeamCreate { .. } => "team_create",
            TabOp::TeamUpdate { .. } => "team_update",
            TabOp::TeamRemove { .. } => "team_remove",
            TabOp::HeaderFooter { .. } => "header_footer",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_keys_are_stable_and_distinct() {
        assert_eq!(SlotKey::fixed(1, 2), SlotKey::fixed(1, 2));
        assert_ne!(SlotKey::fixed(1, 2), SlotKey::fixed(2, 1));
        assert_ne!(SlotKey::fixed(0, 0), SlotKey::fixed(0, 1));
    }
}
