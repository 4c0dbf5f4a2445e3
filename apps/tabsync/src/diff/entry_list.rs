use std::collections::{HashMap, HashSet};

use tablist_wire::team::truncate_field;
use tablist_wire::{Dialect, SlotKey, TabOp};

use super::Rendered;
use crate::model::{Entry, EntrySet};
use crate::render_state::{RenderedRow, Snapshot};

pub(super) fn diff(previous: &Snapshot, desired: &EntrySet) -> Rendered {
    let wanted: HashSet<SlotKey> = desired.iter().map(|entry| entry.slot_key).collect();
    let mut ops = Vec::new();
    for row in previous.rows() {
        if !wanted.contains(&row.key()) {
            ops.push(TabOp::Remove {
                key: row.key(),
                field: row.field.clone(),
            });
        }
    }

    let before: HashMap<SlotKey, &RenderedRow> =
        previous.rows().iter().map(|row| (row.key(), row)).collect();
    let mut rows = Vec::with_capacity(desired.len());
    for entry in desired {
        let row = render(entry);
        match before.get(&entry.slot_key) {
            None => ops.push(TabOp::Add(row.wire())),
            Some(old) => push_updates(old, &row, &mut ops),
        }
        rows.push(row);
    }

    Rendered {
        ops,
        rows,
        pool: previous.pool().clone(),
    }
}

fn render(entry: &Entry) -> RenderedRow {
    RenderedRow {
        entry: entry.clone(),
        field: truncate_field(&entry.name, Dialect::PROFILE_NAME_LIMIT),
        display: truncate_field(&entry.display_text, Dialect::EntryList.text_limit()),
        team: None,
        split: None,
    }
}

fn push_updates(old: &RenderedRow, new: &RenderedRow, ops: &mut Vec<TabOp>) {
    // Profile name and properties only travel with an add.
    if old.field != new.field || old.entry.skin != new.entry.skin {
        ops.push(TabOp::UpdateSkin(new.wire()));
        return;
    }
    if old.display != new.display {
        ops.push(TabOp::UpdateText {
            old_field: old.field.clone(),
            entry: new.wire(),
        });
    }
    if old.entry.ping_millis != new.entry.ping_millis {
        ops.push(TabOp::UpdatePing {
            key: new.key(),
            field: new.field.clone(),
            ping: new.entry.ping_millis,
        });
    }
    if old.entry.game_mode != new.entry.game_mode {
        ops.push(TabOp::UpdateGameMode {
            key: new.key(),
            game_mode: new.entry.game_mode,
        });
    }
}
