use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tablist_wire::{GameMode, SkinRef, SlotKey};

/// Connection-scoped handle for a client whose tab list is rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewerId(pub u64);

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "viewer-{}", self.0)
    }
}

/// One desired row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub slot_key: SlotKey,
    /// Short profile name, at most 16 chars on the wire.
    pub name: String,
    pub display_text: String,
    pub ping_millis: u32,
    pub game_mode: GameMode,
    pub skin: Option<SkinRef>,
    pub sort_key: i64,
}

impl Entry {
    pub fn new(
        slot_key: SlotKey,
        name: impl Into<String>,
        display_text: impl Into<String>,
        ping_millis: u32,
    ) -> Self {
        Self {
            slot_key,
            name: name.into(),
            display_text: display_text.into(),
            ping_millis,
            game_mode: GameMode::default(),
            skin: None,
            sort_key: 0,
        }
    }

    pub fn with_game_mode(mut self, game_mode: GameMode) -> Self {
        self.game_mode = game_mode;
        self
    }

    pub fn with_skin(mut self, skin: Option<SkinRef>) -> Self {
        self.skin = skin;
        self
    }

    pub fn with_sort_key(mut self, sort_key: i64) -> Self {
        self.sort_key = sort_key;
        self
    }

    /// Text the viewer reads for this row.
    pub fn shown_text(&self) -> &str {
        if self.display_text.is_empty() {
            &self.name
        } else {
            &self.display_text
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderFooter {
    pub header: String,
    pub footer: String,
}

impl HeaderFooter {
    pub fn new(header: impl Into<String>, footer: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            footer: footer.into(),
        }
    }
}

/// Ordered rows with unique slot keys, plus the optional header and footer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntrySet {
    entries: Vec<Entry>,
    header_footer: Option<HeaderFooter>,
}

impl EntrySet {
    /// Builds a set from `entries`. A repeated slot key keeps its first row.
    pub fn new(entries: impl IntoIterator<Item = Entry>) -> Self {
        let mut seen = HashSet::new();
        let entries = entries
            .into_iter()
            .filter(|entry| seen.insert(entry.slot_key))
            .collect();
        Self {
            entries,
            header_footer: None,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_header_footer(mut self, header_footer: Option<HeaderFooter>) -> Self {
        self.header_footer = header_footer;
        self
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn header_footer(&self) -> Option<&HeaderFooter> {
        self.header_footer.as_ref()
    }

    pub fn get(&self, key: &SlotKey) -> Option<&Entry> {
        self.entries.iter().find(|entry| &entry.slot_key == key)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<Entry> for EntrySet {
    fn from_iter<T: IntoIterator<Item = Entry>>(iter: T) -> Self {
        Self::new(iter)
    }
}

impl<'a> IntoIterator for &'a EntrySet {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
