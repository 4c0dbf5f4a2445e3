//! Default [`EntrySource`]: builds each viewer's rows from configured layouts.

pub mod placeholders;
pub mod section;
pub mod sort;

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tablist_wire::Dialect;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::collab::{EntrySource, PlayerInfo, PlayerProvider};
use crate::config::TabSyncConfig;
use crate::error::SourceError;
use crate::fake::{FakePlayerConfig, FakePlayers};
use crate::hidden::VisibilityPolicy;
use crate::model::{Entry, EntrySet, HeaderFooter, ViewerId};
use crate::ping::ServerStates;

pub use placeholders::{BasicPlaceholders, PlaceholderContext, PlaceholderResolver};
pub use section::{Cursor, RenderContext, Section, BLANK};
pub use sort::SortRule;

/// A named layout and the servers it applies to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabListDefinition {
    pub name: String,
    /// Servers whose players see this layout; empty matches every server.
    pub servers: Vec<String>,
    pub header: String,
    pub footer: String,
    pub size: usize,
    pub sections: Vec<Section>,
}

impl Default for TabListDefinition {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            servers: Vec::new(),
            header: String::new(),
            footer: String::new(),
            size: Dialect::LEGACY_GRID_CELLS,
            sections: vec![Section::PlayerList {
                servers: Vec::new(),
                prefix: String::new(),
                suffix: String::new(),
                sort_rules: vec![SortRule::YouFirst, SortRule::Alphabetical],
                max_players: None,
            }],
        }
    }
}

impl TabListDefinition {
    pub fn applies_to(&self, server: Option<&str>) -> bool {
        self.servers.is_empty()
            || server.is_some_and(|server| {
                self.servers
                    .iter()
                    .any(|candidate| candidate.eq_ignore_ascii_case(server))
            })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.size == 0 {
            return Err(format!("tab list {:?} has size 0", self.name));
        }
        for section in &self.sections {
            section
                .validate()
                .map_err(|err| format!("tab list {:?}: {err}", self.name))?;
        }
        Ok(())
    }
}

fn or_default(definitions: Vec<TabListDefinition>) -> Arc<Vec<TabListDefinition>> {
    if definitions.is_empty() {
        Arc::new(vec![TabListDefinition::default()])
    } else {
        Arc::new(definitions)
    }
}

pub struct Selector {
    definitions: RwLock<Arc<Vec<TabListDefinition>>>,
    players: Arc<dyn PlayerProvider>,
    fake: Arc<FakePlayers>,
    visibility: Arc<VisibilityPolicy>,
    servers: Arc<ServerStates>,
    placeholders: Arc<dyn PlaceholderResolver>,
}

impl Selector {
    /// An empty `definitions` list falls back to [`TabListDefinition::default`].
    pub fn new(
        definitions: Vec<TabListDefinition>,
        players: Arc<dyn PlayerProvider>,
        visibility: Arc<VisibilityPolicy>,
        servers: Arc<ServerStates>,
    ) -> Self {
        Self {
            definitions: RwLock::new(or_default(definitions)),
            players,
            fake: Arc::new(FakePlayers::default()),
            visibility,
            servers,
            placeholders: Arc::new(BasicPlaceholders),
        }
    }

    pub fn with_placeholders(mut self, placeholders: Arc<dyn PlaceholderResolver>) -> Self {
        self.placeholders = placeholders;
        self
    }

    pub fn with_fake_players(self, configs: &[FakePlayerConfig]) -> Self {
        self.fake.reload(configs);
        self
    }

    pub fn definitions(&self) -> Arc<Vec<TabListDefinition>> {
        self.definitions.read().clone()
    }

    pub fn fake_players(&self) -> &Arc<FakePlayers> {
        &self.fake
    }

    fn layout(&self, viewer: &PlayerInfo, definition: &TabListDefinition) -> EntrySet {
        let visible: Vec<PlayerInfo> = self
            .players
            .players()
            .into_iter()
            .chain(self.fake.players())
            .filter(|player| player.id == viewer.id || !self.visibility.is_hidden(player, viewer))
            .collect();
        let ctx = RenderContext {
            viewer,
            players: &visible,
            servers: &self.servers,
            placeholders: self.placeholders.as_ref(),
            size: definition.size,
        };

        let mut entries: Vec<Entry> = Vec::new();
        let mut placed: HashSet<Uuid> = HashSet::new();
        for (index, section) in definition.sections.iter().enumerate() {
            if entries.len() >= definition.size {
                break;
            }
            let index = u32::try_from(index).unwrap_or(u32::MAX);
            let rows = section.render(
                index,
                &ctx,
                &Cursor {
                    cell: entries.len(),
                    placed: &placed,
                },
            );
            for row in rows {
                placed.insert(row.slot_key.0);
                let sort_key = i64::try_from(entries.len()).unwrap_or(i64::MAX);
                entries.push(row.with_sort_key(sort_key));
            }
        }
        entries.truncate(definition.size);

        let header_footer = if definition.header.is_empty() && definition.footer.is_empty() {
            None
        } else {
            let resolve = |template: &str| {
                self.placeholders.resolve(
                    template,
                    &PlaceholderContext {
                        viewer,
                        subject: None,
                        players: &visible,
                        servers: &self.servers,
                    },
                )
            };
            Some(HeaderFooter::new(
                resolve(&definition.header),
                resolve(&definition.footer),
            ))
        };
        EntrySet::new(entries).with_header_footer(header_footer)
    }
}

impl EntrySource for Selector {
    fn desired_entries(&self, viewer: ViewerId) -> Result<EntrySet, SourceError> {
        let player = self
            .players
            .player(viewer)
            .ok_or(SourceError::UnknownViewer(viewer))?;
        let definitions = self.definitions();
        let Some(definition) = definitions
            .iter()
            .find(|definition| definition.applies_to(player.server()))
        else {
            trace!(target: "tabsync::selector", viewer = %viewer, "no tab list applies");
            return Ok(EntrySet::empty());
        };
        Ok(self.layout(&player, definition))
    }

    /// Rebuilds everything derived from the config: layouts, hidden servers
    /// and fake players.
    fn reconfigure(&self, config: &TabSyncConfig) {
        *self.definitions.write() = or_default(config.tab_lists.clone());
        self.visibility
            .set_hidden_servers(config.hidden_servers.iter().cloned());
        self.fake.reload(&config.fake_players);
        debug!(
            target: "tabsync::selector",
            tab_lists = config.tab_lists.len(),
            fake_players = self.fake.len(),
            "selector reconfigured"
        );
    }
}
