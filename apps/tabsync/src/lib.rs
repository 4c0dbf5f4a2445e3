//! Per-viewer tab-list synchronization for a multi-version game proxy.
//!
//! [`TabSync`] owns one render state per connected viewer. Refresh requests
//! land in the [`ResendQueue`]; the [`ResendLoop`] drains it at a steady pace,
//! asks the [`EntrySource`] what each viewer should see, diffs that against
//! what the viewer shows and hands the encoded packets to the [`PacketSink`].

pub mod bypass;
pub mod collab;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod fake;
pub mod hidden;
pub mod metrics;
pub mod model;
pub mod ping;
pub mod pipeline;
pub mod queue;
pub mod render_state;
pub mod selector;
pub mod sim;
pub mod telemetry;

pub use collab::{
    EntrySource, PacketSink, PermissionCheck, PlayerInfo, PlayerProvider, ServerDirectory,
};
pub use config::{ConfigError, TabSyncConfig};
pub use engine::{DrainReport, ResyncOutcome, TabSync};
pub use error::{EngineError, SinkError, SourceError};
pub use fake::{FakePlayerConfig, FakePlayers};
pub use hidden::{HiddenPlayers, VisibilityPolicy};
pub use model::{Entry, EntrySet, HeaderFooter, ViewerId};
pub use pipeline::ResendLoop;
pub use queue::{Priority, ResendQueue};
pub use render_state::{RenderedRow, Snapshot, ViewerRenderState};
pub use selector::{Selector, TabListDefinition};
