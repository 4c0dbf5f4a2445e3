use tablist_wire::{Codec, Dialect, SlotKey, SplitText, TeamId, WireEntry};

use crate::bypass::TeamPool;
use crate::diff::{self, DiffContext, DiffOutcome};
use crate::model::{EntrySet, HeaderFooter, ViewerId};

/// A row as last sent to the viewer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedRow {
    pub entry: crate::model::Entry,
    /// List-entry name on the wire. On the legacy dialect this is the row
    /// identity the client keys on.
    pub field: String,
    /// Display name written by dialects that have one.
    pub display: String,
    pub team: Option<TeamId>,
    pub split: Option<SplitText>,
}

impl RenderedRow {
    pub fn key(&self) -> SlotKey {
        self.entry.slot_key
    }

    pub(crate) fn wire(&self) -> WireEntry {
        WireEntry {
            key: self.entry.slot_key,
            field: self.field.clone(),
            display: self.display.clone(),
            ping: self.entry.ping_millis,
            game_mode: self.entry.game_mode,
            skin: self.entry.skin.clone(),
        }
    }
}

/// What the viewer's client currently shows, in display order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    rows: Vec<RenderedRow>,
    header_footer: Option<HeaderFooter>,
    pool: TeamPool,
}

impl Snapshot {
    pub(crate) fn from_parts(
        rows: Vec<RenderedRow>,
        header_footer: Option<HeaderFooter>,
        pool: TeamPool,
    ) -> Self {
        Self {
            rows,
            header_footer,
            pool,
        }
    }

    pub fn rows(&self) -> &[RenderedRow] {
        &self.rows
    }

    pub fn get(&self, key: &SlotKey) -> Option<&RenderedRow> {
        self.rows.iter().find(|row| &row.entry.slot_key == key)
    }

    pub fn header_footer(&self) -> Option<&HeaderFooter> {
        self.header_footer.as_ref()
    }

    pub fn pool(&self) -> &TeamPool {
        &self.pool
    }

    pub fn team_of(&self, key: &SlotKey) -> Option<TeamId> {
        self.get(key).and_then(|row| row.team)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The desired set this snapshot was rendered from.
    pub fn entries(&self) -> EntrySet {
        EntrySet::new(self.rows.iter().map(|row| row.entry.clone()))
            .with_header_footer(self.header_footer.clone())
    }
}

/// Diff baseline for one connected viewer.
#[derive(Debug)]
pub struct ViewerRenderState {
    viewer: ViewerId,
    codec: Codec,
    snapshot: Snapshot,
    syncs: u64,
}

impl ViewerRenderState {
    pub fn new(viewer: ViewerId, codec: Codec) -> Self {
        Self {
            viewer,
            codec,
            snapshot: Snapshot::default(),
            syncs: 0,
        }
    }

    pub fn viewer(&self) -> ViewerId {
        self.viewer
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn dialect(&self) -> Dialect {
        self.codec.dialect()
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Number of committed snapshots since connect.
    pub fn syncs(&self) -> u64 {
        self.syncs
    }

    pub fn context(&self, bypass_enabled: bool) -> DiffContext {
        DiffContext {
            dialect: self.codec.dialect(),
            bypass: bypass_enabled && self.codec.supports_scoreboard_bypass(),
            header_footer: self.codec.supports_header_footer(),
        }
    }

    /// Diffs `desired` against the current baseline without touching it.
    pub fn plan(&self, desired: &EntrySet, bypass_enabled: bool) -> DiffOutcome {
        diff::compute(&self.snapshot, desired, &self.context(bypass_enabled))
    }

    /// Adopts the snapshot of a plan whose packets reached the viewer.
    pub fn commit(&mut self, snapshot: Snapshot) {
        self.snapshot = snapshot;
        self.syncs += 1;
    }
}
