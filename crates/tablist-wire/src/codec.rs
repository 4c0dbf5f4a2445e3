use bytes::Bytes;
use thiserror::Error;
use tracing::trace;

use crate::capability::{Capability, HostCapabilities, Unsupported};
use crate::entry_list::{self, ListAction, ListBatch};
use crate::legacy;
use crate::op::TabOp;
use crate::team::{self, truncate_field, SplitText, TeamAction};
use crate::version::{Dialect, PacketIds, ProtocolVersion};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("no packet table for {0}")]
pub struct UnknownVersion(pub ProtocolVersion);

/// Packets for one batch of ops plus the ops the dialect could not express.
#[derive(Debug, Default)]
pub struct EncodedBatch {
    pub packets: Vec<Bytes>,
    pub unsupported: Vec<Unsupported>,
}

impl EncodedBatch {
    pub fn byte_len(&self) -> usize {
        self.packets.iter().map(Bytes::len).sum()
    }
}

/// Encoder bound to one negotiated protocol version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Codec {
    version: ProtocolVersion,
    dialect: Dialect,
    ids: PacketIds,
    caps: HostCapabilities,
}

impl Codec {
    pub fn new(version: ProtocolVersion, caps: HostCapabilities) -> Result<Self, UnknownVersion> {
        let ids = PacketIds::for_version(version).ok_or(UnknownVersion(version))?;
        let dialect = version.dialect().ok_or(UnknownVersion(version))?;
        Ok(Self {
            version,
            dialect,
            ids,
            caps,
        })
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn supports_tab_modification(&self) -> bool {
        self.caps.tab_modification
    }

    pub fn supports_scoreboard_bypass(&self) -> bool {
        self.caps.scoreboard_bypass
    }

    pub fn supports_header_footer(&self) -> bool {
        self.caps.header_footer && self.ids.header_footer.is_some()
    }

    /// Encodes a single op. Consecutive list ops are not merged here.
    pub fn encode(&self, op: &TabOp) -> Result<Vec<Bytes>, Unsupported> {
        let mut writer = BatchWriter::new(self);
        writer.write(op)?;
        Ok(writer.finish())
    }

    /// Encodes a whole batch. Unsupported ops are reported and skipped, the
    /// rest of the batch still goes out. Consecutive entry-list ops of the
    /// same action share one packet.
    pub fn encode_batch(&self, ops: &[TabOp]) -> EncodedBatch {
        let mut writer = BatchWriter::new(self);
        let mut unsupported = Vec::new();
        for op in ops {
            if let Err(err) = writer.write(op) {
                unsupported.push(err);
            }
        }
        let packets = writer.finish();
        trace!(
            target: "tabsync::codec",
            version = self.version.0,
            ops = ops.len(),
            packets = packets.len(),
            skipped = unsupported.len(),
            "encoded batch"
        );
        EncodedBatch {
            packets,
            unsupported,
        }
    }

    fn unsupported(&self, capability: Capability) -> Unsupported {
        Unsupported {
            capability,
            dialect: self.dialect,
        }
    }
}

struct BatchWriter<'a> {
    codec: &'a Codec,
    pending: Option<ListBatch>,
    out: Vec<Bytes>,
}

impl<'a> BatchWriter<'a> {
    fn new(codec: &'a Codec) -> Self {
        Self {
            codec,
            pending: None,
            out: Vec::new(),
        }
    }

    fn list(&mut self, action: ListAction) -> &mut ListBatch {
        if self
            .pending
            .as_ref()
            .is_some_and(|batch| batch.action() != action)
        {
            self.flush();
        }
        self.pending.get_or_insert_with(|| ListBatch::new(action))
    }

    fn push(&mut self, packet: Bytes) {
        self.flush();
        self.out.push(packet);
    }

    fn flush(&mut self) {
        if let Some(batch) = self.pending.take() {
            self.out.push(batch.finish(&self.codec.ids));
        }
    }

    fn finish(mut self) -> Vec<Bytes> {
        self.flush();
        self.out
    }

    fn write(&mut self, op: &TabOp) -> Result<(), Unsupported> {
        match self.codec.dialect {
            Dialect::LegacyFixedSlot => self.write_legacy(op),
            Dialect::EntryList => self.write_entry_list(op),
        }
    }

    fn write_team(&mut self, op: &TabOp) -> Result<(), Unsupported> {
        self.require_teams()?;
        let ids = self.codec.ids;
        let version = self.codec.version;
        let packet = match op {
            TabOp::TeamCreate {
                team,
                prefix,
                suffix,
                member,
            } => {
                let text = SplitText {
                    prefix: prefix.clone(),
                    suffix: suffix.clone(),
                };
                let members = [member.as_str()];
                team::encode_team(
                    &ids,
                    version,
                    *team,
                    TeamAction::Create {
                        text: &text,
                        members: &members,
                    },
                )
            }
            TabOp::TeamUpdate {
                team,
                prefix,
                suffix,
            } => {
                let text = SplitText {
                    prefix: prefix.clone(),
                    suffix: suffix.clone(),
                };
                team::encode_team(&ids, version, *team, TeamAction::Update { text: &text })
            }
            TabOp::TeamRemove { team } => {
                team::encode_team(&ids, version, *team, TeamAction::Remove)
            }
            _ => return Ok(()),
        };
        self.push(packet);
        Ok(())
    }

    fn require_teams(&self) -> Result<(), Unsupported> {
        if self.codec.supports_scoreboard_bypass() {
            Ok(())
        } else {
            Err(self.codec.unsupported(Capability::ScoreboardBypass))
        }
    }

    fn write_legacy(&mut self, op: &TabOp) -> Result<(), Unsupported> {
        let ids = self.codec.ids;
        let field = |name: &str| truncate_field(name, Dialect::LEGACY_FIELD_LIMIT);
        match op {
            TabOp::Add(entry) => {
                self.push(legacy::add(&ids, &field(&entry.field), entry.ping));
            }
            TabOp::Remove { field: name, .. } => {
                self.push(legacy::remove(&ids, &field(name)));
            }
            TabOp::UpdateText { old_field, entry } => {
                let old = field(old_field);
                let new = field(&entry.field);
                if old != new {
                    self.push(legacy::remove(&ids, &old));
                }
                self.push(legacy::add(&ids, &new, entry.ping));
            }
            TabOp::UpdatePing { field: name, ping, .. } => {
                self.push(legacy::add(&ids, &field(name), *ping));
            }
            TabOp::UpdateGameMode { .. } => {
                return Err(self.codec.unsupported(Capability::GameMode));
            }
            TabOp::UpdateSkin(_) => {
                return Err(self.codec.unsupported(Capability::Skin));
            }
            TabOp::HeaderFooter { .. } => {
                return Err(self.codec.unsupported(Capability::HeaderFooter));
            }
            TabOp::TeamCreate { .. } | TabOp::TeamUpdate { .. } | TabOp::TeamRemove { .. } => {
                return self.write_team(op);
            }
        }
        Ok(())
    }

    fn write_entry_list(&mut self, op: &TabOp) -> Result<(), Unsupported> {
        match op {
            TabOp::Add(entry) => self.list(ListAction::Add).push_add(entry),
            TabOp::Remove { key, .. } => self.list(ListAction::Remove).push_remove(key),
            TabOp::UpdateText { entry, .. } => self
                .list(ListAction::DisplayName)
                .push_display(&entry.key, &entry.display),
            TabOp::UpdatePing { key, ping, .. } => {
                self.list(ListAction::Latency).push_latency(key, *ping)
            }
            TabOp::UpdateGameMode { key, game_mode } => self
                .list(ListAction::GameMode)
                .push_game_mode(key, *game_mode),
            TabOp::UpdateSkin(entry) => {
                self.list(ListAction::Remove).push_remove(&entry.key);
                self.list(ListAction::Add).push_add(entry);
            }
            TabOp::HeaderFooter { header, footer } => {
                let id = match self.codec.ids.header_footer {
                    Some(id) if self.codec.caps.header_footer => id,
                    _ => return Err(self.codec.unsupported(Capability::HeaderFooter)),
                };
                self.push(entry_list::header_footer(id, header, footer));
            }
            TabOp::TeamCreate { .. } | TabOp::TeamUpdate { .. } | TabOp::TeamRemove { .. } => {
                return self.write_team(op);
            }
        }
        Ok(())
    }
}
