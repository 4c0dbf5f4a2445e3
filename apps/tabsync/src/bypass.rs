use std::collections::BTreeSet;

use tablist_wire::TeamId;

/// Per-viewer allocator for bypass teams.
///
/// Freed ids are handed out again lowest first, so the number of distinct
/// teams a viewer ever sees is bounded by its peak concurrent overflow rows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TeamPool {
    free: BTreeSet<TeamId>,
    next: u32,
}

impl TeamPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` once every id is in use.
    pub fn acquire(&mut self) -> Option<TeamId> {
        if let Some(team) = self.free.pop_first() {
            return Some(team);
        }
        let team = TeamId::try_from(self.next).ok()?;
        self.next += 1;
        Some(team)
    }

    pub fn release(&mut self, team: TeamId) {
        debug_assert!(u32::from(team) < self.next, "release of unallocated team");
        self.free.insert(team);
    }

    pub fn in_use(&self) -> usize {
        self.next as usize - self.free.len()
    }

    /// Number of distinct ids ever created.
    pub fn high_water(&self) -> usize {
        self.next as usize
    }
}
