use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::model::ViewerId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Ahead of every back entry.
    Front,
    /// Behind everything queued so far.
    Back,
}

/// A queued viewer, linked to its neighbours in the same lane.
#[derive(Clone, Copy, Debug)]
struct Link {
    priority: Priority,
    prev: Option<ViewerId>,
    next: Option<ViewerId>,
}

#[derive(Clone, Copy, Debug, Default)]
struct Lane {
    head: Option<ViewerId>,
    tail: Option<ViewerId>,
}

#[derive(Default)]
struct Inner {
    links: HashMap<ViewerId, Link>,
    front: Lane,
    back: Lane,
}

impl Inner {
    fn lane(&mut self, priority: Priority) -> &mut Lane {
        match priority {
            Priority::Front => &mut self.front,
            Priority::Back => &mut self.back,
        }
    }

    fn push_back(&mut self, viewer: ViewerId, priority: Priority) {
        let prev = self.lane(priority).tail;
        self.links.insert(
            viewer,
            Link {
                priority,
                prev,
                next: None,
            },
        );
        match prev {
            Some(tail) => self.relink(tail, |link| link.next = Some(viewer)),
            None => self.lane(priority).head = Some(viewer),
        }
        self.lane(priority).tail = Some(viewer);
    }

    fn unlink(&mut self, viewer: ViewerId) -> Option<Priority> {
        let link = self.links.remove(&viewer)?;
        match link.prev {
            Some(prev) => self.relink(prev, |neighbour| neighbour.next = link.next),
            None => self.lane(link.priority).head = link.next,
        }
        match link.next {
            Some(next) => self.relink(next, |neighbour| neighbour.prev = link.prev),
            None => self.lane(link.priority).tail = link.prev,
        }
        Some(link.priority)
    }

    fn relink(&mut self, viewer: ViewerId, update: impl FnOnce(&mut Link)) {
        if let Some(link) = self.links.get_mut(&viewer) {
            update(link);
        }
    }

    fn pop(&mut self) -> Option<ViewerId> {
        let viewer = self.front.head.or(self.back.head)?;
        self.unlink(viewer);
        Some(viewer)
    }
}

/// Viewers waiting for a resync, at most once each.
///
/// Two lanes, each in enqueue order: every front entry drains before any back
/// entry. Entries are linked through the viewer map, so promotion and removal
/// unlink in place and nothing stale is left behind.
#[derive(Default)]
pub struct ResendQueue {
    inner: Mutex<Inner>,
}

impl ResendQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the call changed the queue. A viewer already queued at
    /// the requested priority or higher keeps its place.
    pub fn enqueue(&self, viewer: ViewerId, priority: Priority) -> bool {
        let mut inner = self.inner.lock();
        let current = inner.links.get(&viewer).map(|link| link.priority);
        match (current, priority) {
            (Some(_), Priority::Back) | (Some(Priority::Front), Priority::Front) => false,
            (Some(Priority::Back), Priority::Front) => {
                inner.unlink(viewer);
                inner.push_back(viewer, Priority::Front);
                true
            }
            (None, priority) => {
                inner.push_back(viewer, priority);
                true
            }
        }
    }

    pub fn drain(&self, max: usize) -> Vec<ViewerId> {
        let mut inner = self.inner.lock();
        let mut out = Vec::with_capacity(max.min(inner.links.len()));
        while out.len() < max {
            match inner.pop() {
                Some(viewer) => out.push(viewer),
                None => break,
            }
        }
        out
    }

    /// Drops a pending entry. A drain racing this call may still return it.
    pub fn remove(&self, viewer: ViewerId) -> bool {
        self.inner.lock().unlink(viewer).is_some()
    }

    pub fn contains(&self, viewer: ViewerId) -> bool {
        self.inner.lock().links.contains_key(&viewer)
    }

    pub fn priority_of(&self, viewer: ViewerId) -> Option<Priority> {
        self.inner.lock().links.get(&viewer).map(|link| link.priority)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().links.is_empty()
    }
}
