//! Scoreboard teams as a carrier for text longer than the legacy list field.
//!
//! A row that needs the bypass gets its own team. The list field holds an
//! invisible stand-in name, the team prefix and suffix hold the text around it.

use bytes::{BufMut, Bytes};

use crate::op::TeamId;
use crate::version::{PacketIds, ProtocolVersion};
use crate::writer::{finish, packet, write_string, write_var_i32};

pub const COLOR_CHAR: char = '§';

/// Prefix and suffix are each capped at this many chars on every dialect
/// that carries them as plain strings.
pub const AFFIX_LIMIT: usize = 16;

const MODE_CREATE: u8 = 0;
const MODE_REMOVE: u8 = 1;
const MODE_UPDATE: u8 = 2;

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Text split across a team prefix and suffix.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SplitText {
    pub prefix: String,
    pub suffix: String,
}

/// Name of the team owning `team`. Fits the 16-char team name field.
pub fn team_name(team: TeamId) -> String {
    format!("tabsync-{team:05}")
}

/// Invisible list name standing in for a row whose text rides on a team.
///
/// Color codes render as nothing, the trailing reset keeps the stand-in from
/// leaking a color into the suffix.
pub fn stand_in(team: TeamId) -> String {
    let mut out = String::with_capacity(9);
    for digit in hex_digits(usize::from(team)) {
        out.push(COLOR_CHAR);
        out.push(digit);
    }
    out.push(COLOR_CHAR);
    out.push('r');
    out
}

/// Invisible marker appended to a legacy row so that equal texts stay
/// distinct when no team is available.
pub fn unique_marker(index: usize) -> String {
    let mut out = String::with_capacity(6);
    for digit in hex_digits(index) {
        out.push(COLOR_CHAR);
        out.push(digit);
    }
    out
}

fn hex_digits(mut value: usize) -> Vec<char> {
    let mut digits = Vec::with_capacity(2);
    loop {
        digits.push(HEX[value & 0xF] as char);
        value >>= 4;
        if value == 0 {
            break;
        }
    }
    while digits.len() < 2 {
        digits.push('0');
    }
    digits.reverse();
    digits
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Cuts `text` to `limit` chars without leaving a dangling color char.
pub fn truncate_field(text: &str, limit: usize) -> String {
    let mut chars: Vec<char> = text.chars().take(limit).collect();
    if chars.len() == limit && chars.last() == Some(&COLOR_CHAR) {
        chars.pop();
    }
    chars.into_iter().collect()
}

/// Splits text over a prefix and a suffix of `limit` chars each.
///
/// The suffix re-opens the color and format codes active at the end of the
/// prefix, since the stand-in between them resets formatting.
pub fn split_overflow(text: &str, limit: usize) -> SplitText {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= limit {
        return SplitText {
            prefix: text.to_string(),
            suffix: String::new(),
        };
    }
    let mut cut = limit;
    if chars[cut - 1] == COLOR_CHAR {
        cut -= 1;
    }
    let prefix: String = chars[..cut].iter().collect();
    let rest: String = chars[cut..].iter().collect();
    let carried = active_formatting(&prefix);
    let suffix = if rest.starts_with(COLOR_CHAR) {
        truncate_field(&rest, limit)
    } else {
        truncate_field(&format!("{carried}{rest}"), limit)
    };
    SplitText { prefix, suffix }
}

/// Color code plus format codes in effect at the end of `text`.
fn active_formatting(text: &str) -> String {
    let mut active = String::new();
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != COLOR_CHAR {
            continue;
        }
        let Some(code) = chars.next() else {
            break;
        };
        match code.to_ascii_lowercase() {
            '0'..='9' | 'a'..='f' => {
                active.clear();
                active.push(COLOR_CHAR);
                active.push(code);
            }
            'r' => active.clear(),
            'k'..='o' => {
                active.push(COLOR_CHAR);
                active.push(code);
            }
            _ => {}
        }
    }
    active
}

pub(crate) enum TeamAction<'a> {
    Create {
        text: &'a SplitText,
        members: &'a [&'a str],
    },
    Update {
        text: &'a SplitText,
    },
    Remove,
}

pub(crate) fn encode_team(
    ids: &PacketIds,
    version: ProtocolVersion,
    team: TeamId,
    action: TeamAction<'_>,
) -> Bytes {
    let mut buf = packet(ids.teams);
    let name = team_name(team);
    write_string(&mut buf, &name);
    match action {
        TeamAction::Create { text, members } => {
            buf.put_u8(MODE_CREATE);
            write_team_info(&mut buf, version, &name, text);
            write_members(&mut buf, version, members);
        }
        TeamAction::Update { text } => {
            buf.put_u8(MODE_UPDATE);
            write_team_info(&mut buf, version, &name, text);
        }
        TeamAction::Remove => {
            buf.put_u8(MODE_REMOVE);
        }
    }
    finish(buf)
}

fn write_team_info(
    buf: &mut bytes::BytesMut,
    version: ProtocolVersion,
    name: &str,
    text: &SplitText,
) {
    write_string(buf, name);
    write_string(buf, &truncate_field(&text.prefix, AFFIX_LIMIT));
    write_string(buf, &truncate_field(&text.suffix, AFFIX_LIMIT));
    // friendly fire flags
    buf.put_u8(0);
    if version.has_name_tag_visibility() {
        write_string(buf, "always");
    }
    if version.has_collision_rule() {
        write_string(buf, "always");
    }
    if version.has_name_tag_visibility() {
        // no team color
        buf.put_i8(-1);
    }
}

fn write_members(buf: &mut bytes::BytesMut, version: ProtocolVersion, members: &[&str]) {
    if version.has_name_tag_visibility() {
        write_var_i32(buf, members.len() as i32);
    } else {
        buf.put_i16(members.len() as i16);
    }
    for member in members {
        write_string(buf, member);
    }
}
