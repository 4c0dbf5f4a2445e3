use tablist_wire::NegotiationError;
use thiserror::Error;

use crate::model::ViewerId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SinkError {
    /// The connection closed before the packets were handed over.
    #[error("viewer disconnected")]
    Disconnected,
    #[error("connection write failed: {0}")]
    Write(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    /// The host no longer knows the viewer.
    #[error("{0} is not connected")]
    UnknownViewer(ViewerId),
    #[error("entry source failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("host cannot drive the tab list: {0}")]
    Negotiation(#[from] NegotiationError),
    #[error("desired entries for {viewer} unavailable")]
    Source {
        viewer: ViewerId,
        #[source]
        source: SourceError,
    },
    #[error("dispatch to {viewer} failed")]
    Sink {
        viewer: ViewerId,
        #[source]
        source: SinkError,
    },
    #[error("resync of {viewer} panicked")]
    Panicked { viewer: ViewerId },
}
