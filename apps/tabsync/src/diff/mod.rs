//! Minimal wire ops between what a viewer shows and what it should show.
//!
//! Rows are matched by slot key, never by text or position. Ops come out in
//! a fixed order: removes in previous order, then adds and updates in desired
//! order, then the header/footer. A team release follows the remove of its
//! row; a team create precedes the add of its row.

mod entry_list;
mod legacy;

use tablist_wire::{Dialect, TabOp};
use tracing::trace;

use crate::bypass::TeamPool;
use crate::model::EntrySet;
use crate::render_state::{RenderedRow, Snapshot};

/// Per-viewer settings a diff runs under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiffContext {
    pub dialect: Dialect,
    /// Text over the legacy field limit rides on a team instead of being cut.
    pub bypass: bool,
    pub header_footer: bool,
}

impl DiffContext {
    /// Everything the dialect can do switched on.
    pub fn full(dialect: Dialect) -> Self {
        Self {
            dialect,
            bypass: true,
            header_footer: matches!(dialect, Dialect::EntryList),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffOutcome {
    pub ops: Vec<TabOp>,
    pub snapshot: Snapshot,
}

impl DiffOutcome {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

struct Rendered {
    ops: Vec<TabOp>,
    rows: Vec<RenderedRow>,
    pool: TeamPool,
}

pub fn compute(previous: &Snapshot, desired: &EntrySet, ctx: &DiffContext) -> DiffOutcome {
    let Rendered {
        mut ops,
        rows,
        pool,
    } = match ctx.dialect {
        Dialect::EntryList => entry_list::diff(previous, desired),
        Dialect::LegacyFixedSlot => legacy::diff(previous, desired, ctx.bypass),
    };

    let header_footer = if ctx.header_footer {
        desired.header_footer().cloned()
    } else {
        None
    };
    if ctx.header_footer && header_footer.as_ref() != previous.header_footer() {
        let shown = header_footer.clone().unwrap_or_default();
        ops.push(TabOp::HeaderFooter {
            header: shown.header,
            footer: shown.footer,
        });
    }

    trace!(
        target: "tabsync::diff",
        dialect = ?ctx.dialect,
        previous = previous.len(),
        desired = desired.len(),
        ops = ops.len(),
        teams = pool.in_use(),
        "computed diff"
    );
    DiffOutcome {
        ops,
        snapshot: Snapshot::from_parts(rows, header_footer, pool),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entry, HeaderFooter};
    use tablist_wire::SlotKey;
    use uuid::Uuid;

    fn key(n: u128) -> SlotKey {
        SlotKey::new(Uuid::from_u128(n))
    }

    #[test]
    fn header_footer_sent_once_per_change() {
        let ctx = DiffContext::full(Dialect::EntryList);
        let desired = EntrySet::new([Entry::new(key(1), "Alice", "", 5)])
            .with_header_footer(Some(HeaderFooter::new("top", "bottom")));
        let first = compute(&Snapshot::default(), &desired, &ctx);
        assert_eq!(first.ops.len(), 2);
        assert!(matches!(first.ops[1], TabOp::HeaderFooter { .. }));

        let again = compute(&first.snapshot, &desired, &ctx);
        assert!(again.is_empty());

        let cleared = compute(&first.snapshot, &desired.clone().with_header_footer(None), &ctx);
        assert_eq!(
            cleared.ops,
            vec![TabOp::HeaderFooter {
                header: String::new(),
                footer: String::new(),
            }]
        );
    }

    #[test]
    fn header_footer_ignored_where_unsupported() {
        let ctx = DiffContext::full(Dialect::LegacyFixedSlot);
        let desired = EntrySet::empty().with_header_footer(Some(HeaderFooter::new("a", "b")));
        let outcome = compute(&Snapshot::default(), &desired, &ctx);
        assert!(outcome.is_empty());
        assert_eq!(outcome.snapshot.header_footer(), None);
    }
}
