//! Engine context: viewer registry, refresh requests and the per-viewer resync.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tablist_wire::{probe, Capability, Codec, HostCapabilities, HostInfo, ProtocolVersion, Unsupported};
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

use crate::collab::{EntrySource, PacketSink};
use crate::config::TabSyncConfig;
use crate::error::{EngineError, SinkError, SourceError};
use crate::metrics;
use crate::model::ViewerId;
use crate::queue::{Priority, ResendQueue};
use crate::render_state::{Snapshot, ViewerRenderState};

/// What one resync did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResyncOutcome {
    /// The snapshot advanced; `packets` may be zero when the dialect could
    /// express none of the ops.
    Sent { ops: usize, packets: usize },
    /// Nothing had to be sent; the snapshot still adopts any change the
    /// dialect cannot express, such as a reorder on the entry-list dialect.
    Unchanged,
    /// The viewer went away before or during the resync.
    Skipped,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub drained: usize,
    pub sent: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

type ViewerHandle = Arc<Mutex<ViewerRenderState>>;

pub struct TabSync {
    capabilities: HostCapabilities,
    viewers: DashMap<ViewerId, ViewerHandle>,
    queue: ResendQueue,
    config: RwLock<Arc<TabSyncConfig>>,
    source: RwLock<Arc<dyn EntrySource>>,
    sink: Arc<dyn PacketSink>,
    reported: Mutex<HashSet<Capability>>,
    unknown_versions: Mutex<HashSet<ProtocolVersion>>,
    reloads: watch::Sender<u64>,
}

impl TabSync {
    /// Probes the host once; a host that cannot drive the tab list is an error
    /// and nothing is started.
    pub fn new(
        host: &HostInfo,
        config: TabSyncConfig,
        source: Arc<dyn EntrySource>,
        sink: Arc<dyn PacketSink>,
    ) -> Result<Self, EngineError> {
        let capabilities = probe(host)?;
        info!(
            tab_modification = capabilities.tab_modification,
            scoreboard_bypass = capabilities.scoreboard_bypass,
            header_footer = capabilities.header_footer,
            "host capabilities probed"
        );
        let (reloads, _) = watch::channel(0);
        Ok(Self {
            capabilities,
            viewers: DashMap::new(),
            queue: ResendQueue::new(),
            config: RwLock::new(Arc::new(config)),
            source: RwLock::new(source),
            sink,
            reported: Mutex::new(HashSet::new()),
            unknown_versions: Mutex::new(HashSet::new()),
            reloads,
        })
    }

    pub fn capabilities(&self) -> HostCapabilities {
        self.capabilities
    }

    pub fn config(&self) -> Arc<TabSyncConfig> {
        self.config.read().clone()
    }

    pub fn source(&self) -> Arc<dyn EntrySource> {
        self.source.read().clone()
    }

    pub fn queue(&self) -> &ResendQueue {
        &self.queue
    }

    /// Registers render state for a new connection and schedules its first
    /// sync ahead of everyone else. Returns `false` when the client's protocol
    /// has no known packet table; such viewers are not tracked.
    pub fn on_connect(&self, viewer: ViewerId, version: ProtocolVersion) -> bool {
        let codec = match Codec::new(version, self.capabilities) {
            Ok(codec) => codec,
            Err(err) => {
                if self.unknown_versions.lock().insert(version) {
                    info!(viewer = %viewer, error = %err, "client protocol unsupported, tab list left alone");
                }
                return false;
            }
        };
        let dialect = codec.dialect();
        let state = Arc::new(Mutex::new(ViewerRenderState::new(viewer, codec)));
        if self.viewers.insert(viewer, state).is_some() {
            debug!(viewer = %viewer, "viewer reconnected, render state reset");
        }
        metrics::CONNECTED_VIEWERS.set(self.viewers.len() as i64);
        self.queue.enqueue(viewer, Priority::Front);
        debug!(viewer = %viewer, version = %version, dialect = ?dialect, "viewer connected");
        true
    }

    /// Drops the viewer's render state and any pending refresh.
    pub fn on_disconnect(&self, viewer: ViewerId) -> bool {
        let removed = self.viewers.remove(&viewer).is_some();
        self.queue.remove(viewer);
        if removed {
            metrics::CONNECTED_VIEWERS.set(self.viewers.len() as i64);
            debug!(viewer = %viewer, "viewer disconnected");
        }
        removed
    }

    pub fn is_connected(&self, viewer: ViewerId) -> bool {
        self.viewers.contains_key(&viewer)
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    /// Schedules `viewer` ahead of everything queued.
    pub fn request_immediate_refresh(&self, viewer: ViewerId) -> bool {
        self.is_connected(viewer) && self.queue.enqueue(viewer, Priority::Front)
    }

    /// Schedules `viewer` behind everything queued.
    pub fn request_refresh(&self, viewer: ViewerId) -> bool {
        self.is_connected(viewer) && self.queue.enqueue(viewer, Priority::Back)
    }

    /// Schedules every connected viewer at the back. Returns how many were
    /// newly queued.
    pub fn refresh_all(&self) -> usize {
        let viewers: Vec<ViewerId> = self.viewers.iter().map(|entry| *entry.key()).collect();
        viewers
            .into_iter()
            .filter(|viewer| self.queue.enqueue(*viewer, Priority::Back))
            .count()
    }

    pub fn sweep(&self) -> usize {
        let queued = self.refresh_all();
        metrics::SWEEPS.inc();
        trace!(target: "tabsync::sweep", viewers = self.viewer_count(), queued, "sweep");
        queued
    }

    /// Swaps in a new config (and optionally a new entry source), lets the
    /// source rebuild its config-derived state, then refreshes everyone.
    /// Render states are kept, so the next resync diffs against what viewers
    /// actually show.
    pub fn reload(&self, config: TabSyncConfig, source: Option<Arc<dyn EntrySource>>) -> usize {
        if let Some(source) = source {
            *self.source.write() = source;
        }
        self.source().reconfigure(&config);
        *self.config.write() = Arc::new(config);
        self.reloads.send_modify(|generation| *generation += 1);
        let queued = self.refresh_all();
        info!(viewers = self.viewer_count(), "configuration reloaded");
        queued
    }

    /// Bumped on every [`TabSync::reload`].
    pub fn subscribe_reloads(&self) -> watch::Receiver<u64> {
        self.reloads.subscribe()
    }

    pub fn snapshot_of(&self, viewer: ViewerId) -> Option<Snapshot> {
        let handle = self.viewers.get(&viewer)?.value().clone();
        let state = handle.lock();
        Some(state.snapshot().clone())
    }

    /// Brings one viewer up to date: desired entries, diff, encode, dispatch.
    /// Runs under the viewer's lock, so resyncs of one viewer never overlap.
    pub fn resync(&self, viewer: ViewerId) -> Result<ResyncOutcome, EngineError> {
        let Some(handle) = self.viewers.get(&viewer).map(|entry| entry.value().clone()) else {
            debug!(target: "tabsync::drain", viewer = %viewer, "viewer gone, skipping");
            return Ok(ResyncOutcome::Skipped);
        };
        let config = self.config();
        let source = self.source();
        let mut state = handle.lock();
        if !self.still_registered(viewer, &handle) {
            debug!(target: "tabsync::drain", viewer = %viewer, "viewer gone, skipping");
            return Ok(ResyncOutcome::Skipped);
        }

        let desired = match source.desired_entries(viewer) {
            Ok(desired) => desired,
            Err(SourceError::UnknownViewer(_)) => {
                debug!(target: "tabsync::drain", viewer = %viewer, "host forgot viewer, skipping");
                return Ok(ResyncOutcome::Skipped);
            }
            Err(source) => return Err(EngineError::Source { viewer, source }),
        };

        let outcome = state.plan(&desired, config.use_scoreboard_to_bypass_16_char_limit);
        if outcome.is_empty() {
            // Order-only changes carry no ops but still become the baseline.
            if outcome.snapshot != *state.snapshot() {
                state.commit(outcome.snapshot);
            }
            return Ok(ResyncOutcome::Unchanged);
        }
        let ops = outcome.ops.len();
        let batch = state.codec().encode_batch(&outcome.ops);
        for unsupported in &batch.unsupported {
            self.report_unsupported(unsupported);
        }
        let packets = batch.packets.len();
        if packets > 0 {
            match self.sink.send_packets(viewer, batch.packets) {
                Ok(()) => metrics::PACKETS_SENT.inc_by(packets as u64),
                Err(SinkError::Disconnected) => {
                    debug!(target: "tabsync::drain", viewer = %viewer, "viewer disconnected mid-send");
                    return Ok(ResyncOutcome::Skipped);
                }
                Err(source) => return Err(EngineError::Sink { viewer, source }),
            }
        }
        state.commit(outcome.snapshot);
        trace!(target: "tabsync::drain", viewer = %viewer, ops, packets, "viewer resynced");
        Ok(ResyncOutcome::Sent { ops, packets })
    }

    /// Pops up to `max` viewers and resyncs each. A failing or panicking
    /// viewer is logged and the rest still run.
    pub fn drain_once(&self, max: usize) -> DrainReport {
        let batch = self.queue.drain(max);
        let mut report = DrainReport {
            drained: batch.len(),
            ..DrainReport::default()
        };
        for viewer in batch {
            let result = catch_unwind(AssertUnwindSafe(|| self.resync(viewer)))
                .unwrap_or(Err(EngineError::Panicked { viewer }));
            let label = match result {
                Ok(ResyncOutcome::Sent { .. }) => {
                    report.sent += 1;
                    "sent"
                }
                Ok(ResyncOutcome::Unchanged) => {
                    report.unchanged += 1;
                    "unchanged"
                }
                Ok(ResyncOutcome::Skipped) => {
                    report.skipped += 1;
                    "skipped"
                }
                Err(err) => {
                    report.failed += 1;
                    metrics::RESYNC_FAILURES.inc();
                    match err {
                        EngineError::Panicked { .. } => {
                            error!(target: "tabsync::drain", viewer = %viewer, error = %err, "resync panicked")
                        }
                        _ => {
                            warn!(target: "tabsync::drain", viewer = %viewer, error = %err, "resync failed")
                        }
                    }
                    "failed"
                }
            };
            metrics::VIEWERS_DRAINED.with_label_values(&[label]).inc();
        }
        report
    }

    fn still_registered(&self, viewer: ViewerId, handle: &ViewerHandle) -> bool {
        self.viewers
            .get(&viewer)
            .is_some_and(|entry| Arc::ptr_eq(entry.value(), handle))
    }

    fn report_unsupported(&self, unsupported: &Unsupported) {
        metrics::UNSUPPORTED_OPS
            .with_label_values(&[unsupported.capability.as_str()])
            .inc();
        if self.reported.lock().insert(unsupported.capability) {
            info!(
                target: "tabsync::codec",
                capability = unsupported.capability.as_str(),
                dialect = ?unsupported.dialect,
                "operation not supported by client, skipping"
            );
        }
    }

    #[cfg(test)]
    pub(crate) fn unsupported_reported(&self, capability: Capability) -> bool {
        self.reported.lock().contains(&capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entry, EntrySet};
    use bytes::Bytes;
    use tablist_wire::SlotKey;
    use uuid::Uuid;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(ViewerId, usize)>>,
        gone: Mutex<HashSet<ViewerId>>,
    }

    impl PacketSink for Recorder {
        fn send_packets(&self, viewer: ViewerId, packets: Vec<Bytes>) -> Result<(), SinkError> {
            if self.gone.lock().contains(&viewer) {
                return Err(SinkError::Disconnected);
            }
            self.sent.lock().push((viewer, packets.len()));
            Ok(())
        }
    }

    fn host() -> HostInfo {
        HostInfo {
            min_protocol: ProtocolVersion::V1_7_2,
            max_protocol: ProtocolVersion::V1_12_2,
            team_packet: true,
        }
    }

    fn row(n: u128, name: &str) -> Entry {
        Entry::new(SlotKey::new(Uuid::from_u128(n)), name, name, 10)
    }

    fn engine(sink: Arc<Recorder>) -> TabSync {
        let source = |viewer: ViewerId| -> Result<EntrySet, SourceError> {
            match viewer.0 {
                13 => Err(SourceError::Failed("broken".into())),
                14 => panic!("selector bug"),
                _ => Ok(EntrySet::new(vec![row(1, "Alice"), row(2, "Bob")])),
            }
        };
        TabSync::new(&host(), TabSyncConfig::default(), Arc::new(source), sink).unwrap()
    }

    #[test]
    fn too_old_host_is_rejected() {
        let old = HostInfo {
            min_protocol: ProtocolVersion(1),
            max_protocol: ProtocolVersion(3),
            team_packet: false,
        };
        let sink = Arc::new(Recorder::default());
        let result = TabSync::new(
            &old,
            TabSyncConfig::default(),
            Arc::new(|_: ViewerId| -> Result<EntrySet, SourceError> { Ok(EntrySet::empty()) }),
            sink,
        );
        assert!(matches!(result, Err(EngineError::Negotiation(_))));
    }

    #[test]
    fn connect_queues_front_and_resync_is_idempotent() {
        let sink = Arc::new(Recorder::default());
        let engine = engine(sink.clone());
        assert!(engine.on_connect(ViewerId(1), ProtocolVersion::V1_8));
        assert_eq!(engine.queue().priority_of(ViewerId(1)), Some(Priority::Front));

        let report = engine.drain_once(10);
        assert_eq!(report.drained, 1);
        assert_eq!(report.sent, 1);
        assert_eq!(sink.sent.lock().as_slice(), &[(ViewerId(1), 1)]);
        assert_eq!(engine.snapshot_of(ViewerId(1)).map(|s| s.len()), Some(2));

        assert_eq!(engine.resync(ViewerId(1)).unwrap(), ResyncOutcome::Unchanged);
        assert_eq!(sink.sent.lock().len(), 1);
    }

    #[test]
    fn unknown_protocol_is_not_tracked() {
        let engine = engine(Arc::new(Recorder::default()));
        assert!(!engine.on_connect(ViewerId(1), ProtocolVersion(393)));
        assert!(!engine.is_connected(ViewerId(1)));
        assert!(engine.queue().is_empty());
    }

    #[test]
    fn disconnect_drops_state_and_queue_entry() {
        let engine = engine(Arc::new(Recorder::default()));
        engine.on_connect(ViewerId(1), ProtocolVersion::V1_8);
        assert!(engine.on_disconnect(ViewerId(1)));
        assert!(engine.queue().is_empty());
        assert!(!engine.request_refresh(ViewerId(1)));
        assert_eq!(engine.resync(ViewerId(1)).unwrap(), ResyncOutcome::Skipped);
    }

    #[test]
    fn disconnected_sink_keeps_old_snapshot() {
        let sink = Arc::new(Recorder::default());
        let engine = engine(sink.clone());
        engine.on_connect(ViewerId(1), ProtocolVersion::V1_8);
        sink.gone.lock().insert(ViewerId(1));
        assert_eq!(engine.resync(ViewerId(1)).unwrap(), ResyncOutcome::Skipped);
        assert_eq!(engine.snapshot_of(ViewerId(1)).map(|s| s.len()), Some(0));
    }

    #[test]
    fn faulty_viewers_do_not_stop_the_drain() {
        let sink = Arc::new(Recorder::default());
        let engine = engine(sink.clone());
        for id in [13, 14, 1] {
            engine.on_connect(ViewerId(id), ProtocolVersion::V1_12_2);
        }
        let report = engine.drain_once(10);
        assert_eq!(report.drained, 3);
        assert_eq!(report.failed, 2);
        assert_eq!(report.sent, 1);
        assert_eq!(sink.sent.lock().as_slice(), &[(ViewerId(1), 1)]);
    }

    #[test]
    fn legacy_client_gets_rows_without_header_footer() {
        let sink = Arc::new(Recorder::default());
        let source = |_: ViewerId| -> Result<EntrySet, SourceError> {
            Ok(EntrySet::new(vec![row(1, "Alice")])
                .with_header_footer(Some(crate::model::HeaderFooter::new("top", "bottom"))))
        };
        let engine =
            TabSync::new(&host(), TabSyncConfig::default(), Arc::new(source), sink.clone()).unwrap();
        engine.on_connect(ViewerId(1), ProtocolVersion::V1_7_6);
        let outcome = engine.resync(ViewerId(1)).unwrap();
        assert_eq!(outcome, ResyncOutcome::Sent { ops: 1, packets: 1 });
        assert!(!engine.unsupported_reported(Capability::HeaderFooter));
    }

    #[test]
    fn unsupported_capability_is_reported_once() {
        let engine = engine(Arc::new(Recorder::default()));
        let skipped = Unsupported {
            capability: Capability::Skin,
            dialect: tablist_wire::Dialect::LegacyFixedSlot,
        };
        let before = metrics::UNSUPPORTED_OPS.with_label_values(&["skin"]).get();
        engine.report_unsupported(&skipped);
        engine.report_unsupported(&skipped);
        assert!(engine.unsupported_reported(Capability::Skin));
        assert!(!engine.unsupported_reported(Capability::GameMode));
        assert!(metrics::UNSUPPORTED_OPS.with_label_values(&["skin"]).get() >= before + 2);
    }

    #[test]
    fn refresh_all_enqueues_each_viewer_once() {
        let engine = engine(Arc::new(Recorder::default()));
        for id in 1..=3 {
            engine.on_connect(ViewerId(id), ProtocolVersion::V1_8);
        }
        assert_eq!(engine.refresh_all(), 0);
        engine.drain_once(10);
        assert_eq!(engine.sweep(), 3);
        assert_eq!(engine.queue().priority_of(ViewerId(2)), Some(Priority::Back));
    }
}
