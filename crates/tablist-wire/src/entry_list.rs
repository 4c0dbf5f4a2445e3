//! 1.8+ player list item: one action per packet, any number of rows.

use bytes::{BufMut, Bytes, BytesMut};

use crate::op::{GameMode, SlotKey, WireEntry};
use crate::team::truncate_field;
use crate::version::{Dialect, PacketIds};
use crate::writer::{
    chat_json, finish, packet, write_bool, write_string, write_uuid, write_var_i32,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ListAction {
    Add,
    GameMode,
    Latency,
    DisplayName,
    Remove,
}

impl ListAction {
    fn id(self) -> i32 {
        match self {
            ListAction::Add => 0,
            ListAction::GameMode => 1,
            ListAction::Latency => 2,
            ListAction::DisplayName => 3,
            ListAction::Remove => 4,
        }
    }
}

/// Accumulates rows sharing one action into a single packet.
pub(crate) struct ListBatch {
    action: ListAction,
    count: i32,
    rows: BytesMut,
}

impl ListBatch {
    pub(crate) fn new(action: ListAction) -> Self {
        Self {
            action,
            count: 0,
            rows: BytesMut::with_capacity(128),
        }
    }

    pub(crate) fn action(&self) -> ListAction {
        self.action
    }

    pub(crate) fn push_add(&mut self, entry: &WireEntry) {
        debug_assert_eq!(self.action, ListAction::Add);
        write_uuid(&mut self.rows, entry.key.as_uuid());
        write_string(
            &mut self.rows,
            &truncate_field(&entry.field, Dialect::PROFILE_NAME_LIMIT),
        );
        match &entry.skin {
            Some(skin) => {
                write_var_i32(&mut self.rows, 1);
                write_string(&mut self.rows, "textures");
                write_string(&mut self.rows, &skin.value);
                write_bool(&mut self.rows, skin.signature.is_some());
                if let Some(signature) = &skin.signature {
                    write_string(&mut self.rows, signature);
                }
            }
            None => write_var_i32(&mut self.rows, 0),
        }
        write_var_i32(&mut self.rows, entry.game_mode.id());
        write_var_i32(&mut self.rows, ping_value(entry.ping));
        self.write_display(&entry.display);
        self.count += 1;
    }

    pub(crate) fn push_game_mode(&mut self, key: &SlotKey, game_mode: GameMode) {
        debug_assert_eq!(self.action, ListAction::GameMode);
        write_uuid(&mut self.rows, key.as_uuid());
        write_var_i32(&mut self.rows, game_mode.id());
        self.count += 1;
    }

    pub(crate) fn push_latency(&mut self, key: &SlotKey, ping: u32) {
        debug_assert_eq!(self.action, ListAction::Latency);
        write_uuid(&mut self.rows, key.as_uuid());
        write_var_i32(&mut self.rows, ping_value(ping));
        self.count += 1;
    }

    pub(crate) fn push_display(&mut self, key: &SlotKey, display: &str) {
        debug_assert_eq!(self.action, ListAction::DisplayName);
        write_uuid(&mut self.rows, key.as_uuid());
        self.write_display(display);
        self.count += 1;
    }

    pub(crate) fn push_remove(&mut self, key: &SlotKey) {
        debug_assert_eq!(self.action, ListAction::Remove);
        write_uuid(&mut self.rows, key.as_uuid());
        self.count += 1;
    }

    fn write_display(&mut self, display: &str) {
        if display.is_empty() {
            write_bool(&mut self.rows, false);
        } else {
            write_bool(&mut self.rows, true);
            write_string(&mut self.rows, &chat_json(display));
        }
    }

    pub(crate) fn finish(self, ids: &PacketIds) -> Bytes {
        let mut buf = packet(ids.player_list_item);
        write_var_i32(&mut buf, self.action.id());
        write_var_i32(&mut buf, self.count);
        buf.put_slice(&self.rows);
        finish(buf)
    }
}

pub(crate) fn header_footer(id: i32, header: &str, footer: &str) -> Bytes {
    let mut buf = packet(id);
    write_string(&mut buf, &chat_json(header));
    write_string(&mut buf, &chat_json(footer));
    finish(buf)
}

fn ping_value(ping: u32) -> i32 {
    ping.min(i32::MAX as u32) as i32
}
