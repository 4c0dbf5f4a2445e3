//! Tab-list wire encoding for the two historical protocol dialects.
//!
//! The engine speaks in [`TabOp`]s; a [`Codec`] bound to the client's
//! negotiated [`ProtocolVersion`] turns them into packet bodies (VarInt id
//! followed by fields). Framing and compression are left to the proxy
//! connection.

pub mod capability;
pub mod codec;
mod entry_list;
mod legacy;
pub mod op;
pub mod reader;
pub mod team;
pub mod version;
mod writer;

pub use capability::{probe, Capability, HostCapabilities, HostInfo, NegotiationError, Unsupported};
pub use codec::{Codec, EncodedBatch, UnknownVersion};
pub use op::{GameMode, SkinRef, SlotKey, TabOp, TeamId, WireEntry};
pub use reader::{PacketReader, WireError};
pub use team::SplitText;
pub use version::{Dialect, PacketIds, ProtocolVersion};
