use serde::{Deserialize, Serialize};

/// Protocol number negotiated by a client at handshake time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolVersion(pub i32);

impl ProtocolVersion {
    pub const V1_7_2: Self = Self(4);
    pub const V1_7_6: Self = Self(5);
    pub const V1_8: Self = Self(47);
    pub const V1_9: Self = Self(107);
    pub const V1_9_2: Self = Self(109);
    pub const V1_9_4: Self = Self(110);
    pub const V1_10: Self = Self(210);
    pub const V1_11: Self = Self(315);
    pub const V1_11_2: Self = Self(316);
    pub const V1_12: Self = Self(335);
    pub const V1_12_1: Self = Self(338);
    pub const V1_12_2: Self = Self(340);

    /// Oldest protocol the engine can drive.
    pub const MIN_SUPPORTED: Self = Self::V1_7_2;
    /// Newest protocol with a known packet table.
    pub const MAX_SUPPORTED: Self = Self::V1_12_2;

    pub fn number(self) -> i32 {
        self.0
    }

    /// Resolves the dialect for this version, `None` for versions without a
    /// packet table.
    pub fn dialect(self) -> Option<Dialect> {
        PacketIds::for_version(self).map(|_| {
            if self < Self::V1_8 {
                Dialect::LegacyFixedSlot
            } else {
                Dialect::EntryList
            }
        })
    }

    pub(crate) fn has_name_tag_visibility(self) -> bool {
        self >= Self::V1_8
    }

    pub(crate) fn has_collision_rule(self) -> bool {
        self >= Self::V1_9
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "protocol {}", self.0)
    }
}

/// Family of tab-list semantics shared by a range of protocol versions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// 1.7.x: rows are keyed by their 16-char text, the client shows a fixed
    /// 80-cell grid in insertion order.
    LegacyFixedSlot,
    /// 1.8+: rows are keyed by UUID and updated field by field.
    EntryList,
}

impl Dialect {
    pub const LEGACY_GRID_CELLS: usize = 80;
    pub const LEGACY_GRID_COLUMNS: usize = 4;
    pub const LEGACY_FIELD_LIMIT: usize = 16;
    /// Profile names are capped at 16 chars in every dialect.
    pub const PROFILE_NAME_LIMIT: usize = 16;
    const CHAT_LIMIT: usize = 32_767;

    /// Limit of the text field that carries what the viewer reads.
    pub fn text_limit(self) -> usize {
        match self {
            Dialect::LegacyFixedSlot => Self::LEGACY_FIELD_LIMIT,
            Dialect::EntryList => Self::CHAT_LIMIT,
        }
    }

    pub fn grid_size(self) -> Option<usize> {
        match self {
            Dialect::LegacyFixedSlot => Some(Self::LEGACY_GRID_CELLS),
            Dialect::EntryList => None,
        }
    }

    /// Whether the row identity on the wire is its text field.
    pub fn keyed_by_text(self) -> bool {
        matches!(self, Dialect::LegacyFixedSlot)
    }
}

/// Clientbound packet ids used by the tab list, per protocol version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketIds {
    pub player_list_item: i32,
    pub teams: i32,
    pub header_footer: Option<i32>,
}

impl PacketIds {
    pub fn for_version(version: ProtocolVersion) -> Option<Self> {
        let ids = match version.0 {
            4..=5 => (0x38, 0x3E, None),
            47 => (0x38, 0x3E, Some(0x47)),
            107..=109 => (0x2D, 0x41, Some(0x48)),
            110..=316 => (0x2D, 0x41, Some(0x47)),
            335 => (0x2D, 0x43, Some(0x49)),
            338..=340 => (0x2E, 0x44, Some(0x4A)),
            _ => return None,
        };
        Some(Self {
            player_list_item: ids.0,
            teams: ids.1,
            header_footer: ids.2,
        })
    }
}
