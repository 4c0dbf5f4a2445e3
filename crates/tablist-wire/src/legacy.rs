//! 1.7 player list item: the row is its name.

use bytes::{BufMut, Bytes};

use crate::version::PacketIds;
use crate::writer::{finish, packet, write_bool, write_string};

pub(crate) fn player_list_item(ids: &PacketIds, name: &str, online: bool, ping: u32) -> Bytes {
    let mut buf = packet(ids.player_list_item);
    write_string(&mut buf, name);
    write_bool(&mut buf, online);
    buf.put_i16(clamp_ping(ping));
    finish(buf)
}

pub(crate) fn add(ids: &PacketIds, name: &str, ping: u32) -> Bytes {
    player_list_item(ids, name, true, ping)
}

pub(crate) fn remove(ids: &PacketIds, name: &str) -> Bytes {
    player_list_item(ids, name, false, 0)
}

fn clamp_ping(ping: u32) -> i16 {
    ping.min(i16::MAX as u32) as i16
}
