use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::collab::PlayerInfo;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortRule {
    /// The viewer's own row first.
    YouFirst,
    /// Players on the viewer's server before everyone else.
    SameServerFirst,
    Alphabetical,
    /// Lowest ping first.
    Ping,
    /// Grouped by server name, players without a server last.
    Server,
}

impl SortRule {
    pub fn as_str(self) -> &'static str {
        match self {
            SortRule::YouFirst => "you-first",
            SortRule::SameServerFirst => "same-server-first",
            SortRule::Alphabetical => "alphabetical",
            SortRule::Ping => "ping",
            SortRule::Server => "server",
        }
    }

    fn compare(self, viewer: &PlayerInfo, a: &PlayerInfo, b: &PlayerInfo) -> Ordering {
        match self {
            SortRule::YouFirst => (b.id == viewer.id).cmp(&(a.id == viewer.id)),
            SortRule::SameServerFirst => {
                let same = |p: &PlayerInfo| p.server.is_some() && p.server == viewer.server;
                same(b).cmp(&same(a))
            }
            SortRule::Alphabetical => compare_names(a, b),
            SortRule::Ping => a.ping_millis.cmp(&b.ping_millis),
            SortRule::Server => match (a.server(), b.server()) {
                (Some(x), Some(y)) => x.to_ascii_lowercase().cmp(&y.to_ascii_lowercase()),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        }
    }
}

fn compare_names(a: &PlayerInfo, b: &PlayerInfo) -> Ordering {
    a.name.to_lowercase().cmp(&b.name.to_lowercase())
}

/// First rule that tells the players apart wins; name then id settle the rest.
pub fn compare(rules: &[SortRule], viewer: &PlayerInfo, a: &PlayerInfo, b: &PlayerInfo) -> Ordering {
    rules
        .iter()
        .map(|rule| rule.compare(viewer, a, b))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
        .then_with(|| compare_names(a, b))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn sort_players(players: &mut [&PlayerInfo], rules: &[SortRule], viewer: &PlayerInfo) {
    players.sort_by(|a, b| compare(rules, viewer, a, b));
}
