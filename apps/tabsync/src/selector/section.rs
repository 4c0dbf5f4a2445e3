use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tablist_wire::{Dialect, SlotKey};
use uuid::Uuid;

use super::placeholders::{PlaceholderContext, PlaceholderResolver};
use super::sort::{sort_players, SortRule};
use crate::collab::PlayerInfo;
use crate::model::Entry;
use crate::ping::ServerStates;

const COLUMNS: usize = Dialect::LEGACY_GRID_COLUMNS;

/// Text of an empty row. A bare reset renders as nothing on every dialect,
/// where an empty display would fall back to the profile name.
pub const BLANK: &str = "§r";

/// One block of a tab-list layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Section {
    /// Static rows, one per template.
    FixedSlots { slots: Vec<String> },
    /// Players on the given servers, all servers when empty.
    PlayerList {
        #[serde(default)]
        servers: Vec<String>,
        #[serde(default)]
        prefix: String,
        #[serde(default)]
        suffix: String,
        #[serde(default)]
        sort_rules: Vec<SortRule>,
        #[serde(default)]
        max_players: Option<usize>,
    },
    /// Every player not listed yet, starting on the next cell of
    /// `start_column`.
    AutoFillPlayers {
        #[serde(default)]
        start_column: usize,
        #[serde(default)]
        prefix: String,
        #[serde(default)]
        suffix: String,
        #[serde(default)]
        sort_rules: Vec<SortRule>,
        #[serde(default)]
        max_players: Option<usize>,
    },
    /// Blank rows up to the layout size.
    FillBlank,
}

/// Inputs shared by every section of one layout pass.
pub struct RenderContext<'a> {
    pub viewer: &'a PlayerInfo,
    /// Players visible to the viewer.
    pub players: &'a [PlayerInfo],
    pub servers: &'a ServerStates,
    pub placeholders: &'a dyn PlaceholderResolver,
    pub size: usize,
}

impl RenderContext<'_> {
    fn resolve(&self, template: &str, subject: Option<&PlayerInfo>) -> String {
        self.placeholders.resolve(
            template,
            &PlaceholderContext {
                viewer: self.viewer,
                subject,
                players: self.players,
                servers: self.servers,
            },
        )
    }
}

/// Where the previous sections left off.
pub struct Cursor<'a> {
    pub cell: usize,
    /// Players already placed by earlier sections.
    pub placed: &'a HashSet<Uuid>,
}

impl Section {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Section::AutoFillPlayers { start_column, .. } if *start_column >= COLUMNS => Err(
                format!("start_column {start_column} is outside the {COLUMNS} grid columns"),
            ),
            _ => Ok(()),
        }
    }

    /// Rows this section contributes at `cursor`, never more than the space
    /// left in the layout.
    pub fn render(&self, index: u32, ctx: &RenderContext<'_>, cursor: &Cursor<'_>) -> Vec<Entry> {
        let capacity = ctx.size.saturating_sub(cursor.cell);
        match self {
            Section::FixedSlots { slots } => slots
                .iter()
                .take(capacity)
                .enumerate()
                .map(|(i, template)| filler(index, i, ctx.resolve(template, None)))
                .collect(),
            Section::PlayerList {
                servers,
                prefix,
                suffix,
                sort_rules,
                max_players,
            } => {
                let candidates = ctx.players.iter().filter(|player| {
                    !cursor.placed.contains(&player.id) && on_servers(player, servers)
                });
                let limit = max_players.unwrap_or(usize::MAX).min(capacity);
                player_rows(ctx, candidates, sort_rules, prefix, suffix, limit)
            }
            Section::AutoFillPlayers {
                start_column,
                prefix,
                suffix,
                sort_rules,
                max_players,
            } => {
                let pad = (start_column % COLUMNS + COLUMNS - cursor.cell % COLUMNS) % COLUMNS;
                if pad >= capacity {
                    return Vec::new();
                }
                let candidates = ctx
                    .players
                    .iter()
                    .filter(|player| !cursor.placed.contains(&player.id));
                let limit = max_players.unwrap_or(usize::MAX).min(capacity - pad);
                let players = player_rows(ctx, candidates, sort_rules, prefix, suffix, limit);
                if players.is_empty() {
                    return players;
                }
                let mut rows: Vec<Entry> =
                    (0..pad).map(|i| filler(index, i, String::new())).collect();
                rows.extend(players);
                rows
            }
            Section::FillBlank => (0..capacity)
                .map(|i| filler(index, i, String::new()))
                .collect(),
        }
    }
}

fn on_servers(player: &PlayerInfo, servers: &[String]) -> bool {
    servers.is_empty()
        || player
            .server()
            .is_some_and(|server| servers.iter().any(|s| s.eq_ignore_ascii_case(server)))
}

fn player_rows<'a>(
    ctx: &RenderContext<'_>,
    candidates: impl Iterator<Item = &'a PlayerInfo>,
    sort_rules: &[SortRule],
    prefix: &str,
    suffix: &str,
    limit: usize,
) -> Vec<Entry> {
    let mut players: Vec<&PlayerInfo> = candidates.collect();
    sort_players(&mut players, sort_rules, ctx.viewer);
    let template = format!("{prefix}{{player}}{suffix}");
    players
        .into_iter()
        .take(limit)
        .map(|player| {
            Entry::new(
                SlotKey::new(player.id),
                player.name.clone(),
                ctx.resolve(&template, Some(player)),
                player.ping_millis,
            )
            .with_game_mode(player.game_mode)
            .with_skin(player.skin.clone())
        })
        .collect()
}

/// Row without a player behind it. Key and profile name depend only on the
/// section and the row's index in it, so the row keeps its identity when
/// earlier sections grow or shrink.
fn filler(section: u32, index: usize, text: String) -> Entry {
    let index = u32::try_from(index).unwrap_or(u32::MAX);
    let text = if text.is_empty() {
        BLANK.to_string()
    } else {
        text
    };
    Entry::new(
        SlotKey::fixed(section, index),
        format!(" tab{section:02}-{index:03}"),
        text,
        0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::placeholders::BasicPlaceholders;

    fn player(n: u128, name: &str, server: &str) -> PlayerInfo {
        PlayerInfo::new(Uuid::from_u128(n), name, Some(server))
    }

    struct Fixture {
        viewer: PlayerInfo,
        players: Vec<PlayerInfo>,
        servers: ServerStates,
    }

    impl Fixture {
        fn new() -> Self {
            let viewer = player(1, "Viewer", "lobby");
            Self {
                players: vec![
                    viewer.clone(),
                    player(2, "Alice", "pvp"),
                    player(3, "Bob", "lobby"),
                ],
                viewer,
                servers: ServerStates::new(),
            }
        }

        fn ctx(&self, size: usize) -> RenderContext<'_> {
            RenderContext {
                viewer: &self.viewer,
                players: &self.players,
                servers: &self.servers,
                placeholders: &BasicPlaceholders,
                size,
            }
        }
    }

    #[test]
    fn fixed_slots_resolve_and_respect_capacity() {
        let fixture = Fixture::new();
        let section = Section::FixedSlots {
            slots: vec!["&6Hi {viewer}".into(), "two".into(), "three".into()],
        };
        let placed = HashSet::new();
        let rows = section.render(0, &fixture.ctx(2), &Cursor { cell: 0, placed: &placed });
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].display_text, "§6Hi Viewer");
        assert_eq!(rows[0].slot_key, SlotKey::fixed(0, 0));
    }

    #[test]
    fn player_list_filters_servers_and_placed() {
        let fixture = Fixture::new();
        let section = Section::PlayerList {
            servers: vec!["LOBBY".into()],
            prefix: "&a".into(),
            suffix: String::new(),
            sort_rules: vec![SortRule::Alphabetical],
            max_players: None,
        };
        let placed: HashSet<Uuid> = [Uuid::from_u128(1)].into_iter().collect();
        let rows = section.render(1, &fixture.ctx(80), &Cursor { cell: 0, placed: &placed });
        let names: Vec<&str> = rows.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Bob"]);
        assert_eq!(rows[0].display_text, "§aBob");
    }

    #[test]
    fn auto_fill_pads_to_its_column() {
        let fixture = Fixture::new();
        let section = Section::AutoFillPlayers {
            start_column: 2,
            prefix: String::new(),
            suffix: String::new(),
            sort_rules: vec![],
            max_players: Some(2),
        };
        let placed = HashSet::new();
        let rows = section.render(3, &fixture.ctx(80), &Cursor { cell: 5, placed: &placed });
        // cell 5 is column 1, one blank brings the first player to column 2
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].display_text, BLANK);
        assert_eq!(rows[1].name, "Alice");
        assert_eq!(rows[2].name, "Bob");
    }

    #[test]
    fn auto_fill_without_room_is_empty() {
        let fixture = Fixture::new();
        let section = Section::AutoFillPlayers {
            start_column: 0,
            prefix: String::new(),
            suffix: String::new(),
            sort_rules: vec![],
            max_players: None,
        };
        let placed = HashSet::new();
        let rows = section.render(0, &fixture.ctx(8), &Cursor { cell: 6, placed: &placed });
        assert!(rows.is_empty());
    }

    #[test]
    fn fill_blank_uses_the_rest() {
        let fixture = Fixture::new();
        let placed = HashSet::new();
        let cursor = Cursor {
            cell: 7,
            placed: &placed,
        };
        let rows = Section::FillBlank.render(2, &fixture.ctx(10), &cursor);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|e| e.display_text == BLANK));
    }

    #[test]
    fn start_column_is_validated() {
        let section = Section::AutoFillPlayers {
            start_column: 4,
            prefix: String::new(),
            suffix: String::new(),
            sort_rules: vec![],
            max_players: None,
        };
        assert!(section.validate().is_err());
    }
}
