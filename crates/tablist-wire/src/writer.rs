use bytes::{BufMut, Bytes, BytesMut};
use uuid::Uuid;

/// Starts a packet buffer with its VarInt id already written.
pub(crate) fn packet(id: i32) -> BytesMut {
    let mut buf = BytesMut::with_capacity(64);
    write_var_i32(&mut buf, id);
    buf
}

pub(crate) fn finish(buf: BytesMut) -> Bytes {
    buf.freeze()
}

/// Protocol VarInt: 7-bit groups, least significant first, two's complement
/// for negatives (always five bytes).
pub(crate) fn write_var_i32(buf: &mut BytesMut, value: i32) {
    let mut value = value as u32;
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

pub(crate) fn write_string(buf: &mut BytesMut, value: &str) {
    write_var_i32(buf, value.len() as i32);
    buf.put_slice(value.as_bytes());
}

pub(crate) fn write_bool(buf: &mut BytesMut, value: bool) {
    buf.put_u8(value as u8);
}

pub(crate) fn write_uuid(buf: &mut BytesMut, value: &Uuid) {
    buf.put_u128(value.as_u128());
}

/// Minimal JSON chat component around legacy-formatted text.
pub(crate) fn chat_json(text: &str) -> String {
    serde_json::json!({ "text": text }).to_string()
}
