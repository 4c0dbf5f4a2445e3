use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::version::{Dialect, ProtocolVersion};

/// What the hosting proxy reports about itself at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    pub min_protocol: ProtocolVersion,
    pub max_protocol: ProtocolVersion,
    /// The proxy can write scoreboard team packets to clients.
    pub team_packet: bool,
}

/// Features the host can drive, probed once and cached by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCapabilities {
    pub tab_modification: bool,
    pub scoreboard_bypass: bool,
    pub header_footer: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    TabModification,
    ScoreboardBypass,
    HeaderFooter,
    GameMode,
    Skin,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::TabModification => "tab_modification",
            Capability::ScoreboardBypass => "scoreboard_bypass",
            Capability::HeaderFooter => "header_footer",
            Capability::GameMode => "game_mode",
            Capability::Skin => "skin",
        }
    }
}

/// Returned by the codec for an operation the dialect cannot express.
/// Callers skip the op and keep going.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("{} is not supported by the {dialect:?} dialect", .capability.as_str())]
pub struct Unsupported {
    pub capability: Capability,
    pub dialect: Dialect,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NegotiationError {
    #[error("host speaks up to {max}, tab modification needs at least {}", ProtocolVersion::MIN_SUPPORTED)]
    TooOld { max: ProtocolVersion },
    #[error("host protocol range is empty ({min} > {max})")]
    EmptyRange {
        min: ProtocolVersion,
        max: ProtocolVersion,
    },
}

/// Probes the host once at startup.
pub fn probe(host: &HostInfo) -> Result<HostCapabilities, NegotiationError> {
    if host.min_protocol > host.max_protocol {
        return Err(NegotiationError::EmptyRange {
            min: host.min_protocol,
            max: host.max_protocol,
        });
    }
    if host.max_protocol < ProtocolVersion::MIN_SUPPORTED {
        return Err(NegotiationError::TooOld {
            max: host.max_protocol,
        });
    }
    Ok(HostCapabilities {
        tab_modification: true,
        scoreboard_bypass: host.team_packet,
        header_footer: host.max_protocol >= ProtocolVersion::V1_8,
    })
}
