//! Fixed-slot grid of 1.7 clients.
//!
//! The client identifies a row by its list name and shows rows in the order
//! they were added, so a row can only be placed by re-adding it and every
//! row behind it. The diff keeps the longest unchanged run of leading cells
//! and rewrites the rest. Rows whose text does not fit the field, or whose
//! field would collide with another row, carry their text on a team.

use std::collections::{HashMap, HashSet};

use tablist_wire::team::{char_len, split_overflow, stand_in, truncate_field, unique_marker};
use tablist_wire::{Dialect, SlotKey, TabOp, TeamId};
use tracing::{debug, warn};

use super::Rendered;
use crate::model::{Entry, EntrySet};
use crate::render_state::{RenderedRow, Snapshot};

const FIELD_LIMIT: usize = Dialect::LEGACY_FIELD_LIMIT;
/// Width of `unique_marker` for any cell of the grid.
const MARKER_WIDTH: usize = 4;

enum FieldPlan {
    Plain(String),
    Team,
}

pub(super) fn diff(previous: &Snapshot, desired: &EntrySet, bypass: bool) -> Rendered {
    let cells: Vec<&Entry> = desired.iter().take(Dialect::LEGACY_GRID_CELLS).collect();
    if desired.len() > cells.len() {
        debug!(
            target: "tabsync::diff",
            dropped = desired.len() - cells.len(),
            "legacy grid full"
        );
    }
    let plans = plan_fields(&cells, bypass);

    let wants_team: HashSet<SlotKey> = cells
        .iter()
        .zip(&plans)
        .filter(|(_, plan)| matches!(plan, FieldPlan::Team))
        .map(|(entry, _)| entry.slot_key)
        .collect();

    // Teams of rows that leave or no longer overflow go back to the pool
    // before new rows draw from it.
    let mut pool = previous.pool().clone();
    let mut kept: HashMap<SlotKey, TeamId> = HashMap::new();
    let mut released: HashSet<SlotKey> = HashSet::new();
    for row in previous.rows() {
        if let Some(team) = row.team {
            if wants_team.contains(&row.key()) {
                kept.insert(row.key(), team);
            } else {
                pool.release(team);
                released.insert(row.key());
            }
        }
    }

    let mut created: HashSet<SlotKey> = HashSet::new();
    let mut rows = Vec::with_capacity(cells.len());
    for (cell, (entry, plan)) in cells.iter().zip(plans).enumerate() {
        let row = match plan {
            FieldPlan::Plain(field) => plain_row(entry, field),
            FieldPlan::Team => {
                let team = kept.get(&entry.slot_key).copied().or_else(|| {
                    let team = pool.acquire();
                    if team.is_some() {
                        created.insert(entry.slot_key);
                    }
                    team
                });
                match team {
                    Some(team) => team_row(entry, team),
                    None => {
                        warn!(target: "tabsync::diff", cell, "bypass teams exhausted");
                        plain_row(entry, marked(entry.shown_text(), cell))
                    }
                }
            }
        };
        rows.push(row);
    }

    let before = previous.rows();
    let unchanged = before
        .iter()
        .zip(&rows)
        .take_while(|(old, new)| old.key() == new.key() && old.field == new.field)
        .count();
    let previous_rows: HashMap<SlotKey, &RenderedRow> =
        before.iter().map(|row| (row.key(), row)).collect();

    let mut ops = Vec::new();
    for old in &before[unchanged..] {
        ops.push(TabOp::Remove {
            key: old.key(),
            field: old.field.clone(),
        });
        if let Some(team) = old.team {
            if released.contains(&old.key()) {
                ops.push(TabOp::TeamRemove { team });
            }
        }
    }
    for (cell, row) in rows.iter().enumerate() {
        if let (Some(team), Some(split)) = (row.team, &row.split) {
            if created.contains(&row.key()) {
                ops.push(TabOp::TeamCreate {
                    team,
                    prefix: split.prefix.clone(),
                    suffix: split.suffix.clone(),
                    member: row.field.clone(),
                });
            } else if previous_rows
                .get(&row.key())
                .and_then(|old| old.split.as_ref())
                != Some(split)
            {
                ops.push(TabOp::TeamUpdate {
                    team,
                    prefix: split.prefix.clone(),
                    suffix: split.suffix.clone(),
                });
            }
        }
        if cell < unchanged {
            if before[cell].entry.ping_millis != row.entry.ping_millis {
                ops.push(TabOp::UpdatePing {
                    key: row.key(),
                    field: row.field.clone(),
                    ping: row.entry.ping_millis,
                });
            }
        } else {
            ops.push(TabOp::Add(row.wire()));
        }
    }

    Rendered { ops, rows, pool }
}

/// Decides per cell whether the text goes in the list field or on a team.
fn plan_fields(cells: &[&Entry], bypass: bool) -> Vec<FieldPlan> {
    let plain: Vec<Option<String>> = cells
        .iter()
        .map(|entry| {
            let text = entry.shown_text();
            if bypass && char_len(text) > FIELD_LIMIT {
                None
            } else {
                Some(truncate_field(text, FIELD_LIMIT))
            }
        })
        .collect();
    let mut uses: HashMap<&str, usize> = HashMap::new();
    for field in plain.iter().flatten() {
        *uses.entry(field.as_str()).or_default() += 1;
    }

    cells
        .iter()
        .zip(&plain)
        .enumerate()
        .map(|(cell, (entry, field))| match field {
            None => FieldPlan::Team,
            Some(field) if uses.get(field.as_str()).copied().unwrap_or(0) > 1 => {
                let text = entry.shown_text();
                if char_len(text) + MARKER_WIDTH <= FIELD_LIMIT {
                    FieldPlan::Plain(format!("{text}{}", unique_marker(cell)))
                } else if bypass {
                    FieldPlan::Team
                } else {
                    FieldPlan::Plain(marked(text, cell))
                }
            }
            Some(field) => FieldPlan::Plain(field.clone()),
        })
        .collect()
}

fn marked(text: &str, cell: usize) -> String {
    format!(
        "{}{}",
        truncate_field(text, FIELD_LIMIT - MARKER_WIDTH),
        unique_marker(cell)
    )
}

fn plain_row(entry: &Entry, field: String) -> RenderedRow {
    RenderedRow {
        entry: entry.clone(),
        display: entry.shown_text().to_string(),
        field,
        team: None,
        split: None,
    }
}

fn team_row(entry: &Entry, team: TeamId) -> RenderedRow {
    RenderedRow {
        entry: entry.clone(),
        display: entry.shown_text().to_string(),
        field: stand_in(team),
        team: Some(team),
        split: Some(split_overflow(entry.shown_text(), FIELD_LIMIT)),
    }
}
