use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tablist_wire::{HostInfo, ProtocolVersion, SlotKey};
use tabsync::{
    Entry, EntrySet, PacketSink, Priority, ResendLoop, SinkError, SourceError, TabSync,
    TabSyncConfig, ViewerId,
};
use test_timeout::{timeout, tokio_timeout_test};
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Default)]
struct CountingSink {
    batches: AtomicUsize,
}

impl PacketSink for CountingSink {
    fn send_packets(&self, _viewer: ViewerId, _packets: Vec<Bytes>) -> Result<(), SinkError> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Fixture {
    engine: Arc<TabSync>,
    sink: Arc<CountingSink>,
    lookups: Arc<AtomicUsize>,
}

fn fixture(config: TabSyncConfig) -> Fixture {
    let lookups = Arc::new(AtomicUsize::new(0));
    let source = {
        let lookups = lookups.clone();
        move |_: ViewerId| -> Result<EntrySet, SourceError> {
            let n = lookups.fetch_add(1, Ordering::SeqCst);
            // ping drifts on every lookup so each resync sends something
            Ok(EntrySet::new([Entry::new(
                SlotKey::new(Uuid::from_u128(1)),
                "Alice",
                "Alice",
                n as u32,
            )]))
        }
    };
    let sink = Arc::new(CountingSink::default());
    let host = HostInfo {
        min_protocol: ProtocolVersion::MIN_SUPPORTED,
        max_protocol: ProtocolVersion::MAX_SUPPORTED,
        team_packet: true,
    };
    let engine = TabSync::new(&host, config, Arc::new(source), sink.clone()).unwrap();
    Fixture {
        engine: Arc::new(engine),
        sink,
        lookups,
    }
}

fn sweep_every(seconds: f64) -> TabSyncConfig {
    TabSyncConfig {
        tablist_update_interval: seconds,
        ..TabSyncConfig::default()
    }
}

#[tokio_timeout_test(10, paused)]
async fn connected_viewer_is_synced_on_the_next_tick() {
    let f = fixture(sweep_every(0.0));
    let (shutdown, rx) = watch::channel(false);
    let resend = ResendLoop::start(f.engine.clone(), rx).unwrap();

    f.engine.on_connect(ViewerId(1), ProtocolVersion::V1_8);
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(f.sink.batches.load(Ordering::SeqCst), 1);
    assert!(f.engine.queue().is_empty());

    shutdown.send(true).unwrap();
    resend.join().await;
}

#[tokio_timeout_test(10, paused)]
async fn disabled_sweep_stays_quiet_until_reload_enables_it() {
    let f = fixture(sweep_every(0.0));
    let (shutdown, rx) = watch::channel(false);
    let resend = ResendLoop::start(f.engine.clone(), rx).unwrap();
    f.engine.on_connect(ViewerId(1), ProtocolVersion::V1_12_2);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(f.lookups.load(Ordering::SeqCst), 1);

    f.engine.reload(sweep_every(1.0), None);
    tokio::time::sleep(Duration::from_millis(3_500)).await;
    // one for the reload, three sweeps
    assert!(f.lookups.load(Ordering::SeqCst) >= 5);

    shutdown.send(true).unwrap();
    resend.join().await;
}

#[tokio_timeout_test(10, paused)]
async fn negative_interval_disables_the_sweep() {
    let f = fixture(sweep_every(-5.0));
    let (shutdown, rx) = watch::channel(false);
    let resend = ResendLoop::start(f.engine.clone(), rx).unwrap();
    f.engine.on_connect(ViewerId(1), ProtocolVersion::V1_8);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(f.lookups.load(Ordering::SeqCst), 1);
    shutdown.send(true).unwrap();
    resend.join().await;
}

#[tokio_timeout_test(10, paused)]
async fn sweep_resyncs_everyone_periodically() {
    let f = fixture(sweep_every(1.0));
    let (shutdown, rx) = watch::channel(false);
    let resend = ResendLoop::start(f.engine.clone(), rx).unwrap();
    for id in 1..=3 {
        f.engine.on_connect(ViewerId(id), ProtocolVersion::V1_9_4);
    }
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    // initial sync plus two sweeps for each viewer
    assert_eq!(f.sink.batches.load(Ordering::SeqCst), 9);
    shutdown.send(true).unwrap();
    resend.join().await;
}

#[tokio_timeout_test(10, paused)]
async fn loops_stop_on_shutdown_and_never_rearm() {
    let f = fixture(sweep_every(1.0));
    let (shutdown, rx) = watch::channel(false);
    let resend = ResendLoop::start(f.engine.clone(), rx.clone()).unwrap();
    shutdown.send(true).unwrap();
    resend.join().await;

    f.engine.on_connect(ViewerId(1), ProtocolVersion::V1_8);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(f.lookups.load(Ordering::SeqCst), 0);
    assert_eq!(f.engine.queue().priority_of(ViewerId(1)), Some(Priority::Front));

    assert!(ResendLoop::start(f.engine.clone(), rx).is_none());
}

#[tokio_timeout_test(10, paused)]
async fn dropping_the_shutdown_sender_stops_the_loops() {
    let f = fixture(sweep_every(1.0));
    let (shutdown, rx) = watch::channel(false);
    let resend = ResendLoop::start(f.engine.clone(), rx).unwrap();
    drop(shutdown);
    resend.join().await;
}

#[timeout(5)]
fn start_without_a_runtime_is_rejected_quietly() {
    let f = fixture(TabSyncConfig::default());
    let (_shutdown, rx) = watch::channel(false);
    assert!(ResendLoop::start(f.engine.clone(), rx).is_none());
}

#[timeout(5)]
fn draining_a_vanished_viewer_is_a_no_op() {
    let f = fixture(TabSyncConfig::default());
    f.engine.on_connect(ViewerId(1), ProtocolVersion::V1_8);
    f.engine.on_disconnect(ViewerId(1));
    // a refresh that raced the disconnect
    f.engine.queue().enqueue(ViewerId(1), Priority::Back);

    let report = f.engine.drain_once(8);
    assert_eq!(report.drained, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(f.lookups.load(Ordering::SeqCst), 0);
}

#[timeout(5)]
fn refresh_requests_are_deduplicated() {
    let f = fixture(TabSyncConfig::default());
    f.engine.on_connect(ViewerId(1), ProtocolVersion::V1_8);
    f.engine.on_connect(ViewerId(2), ProtocolVersion::V1_8);
    f.engine.drain_once(8);

    assert!(f.engine.request_refresh(ViewerId(1)));
    assert!(!f.engine.request_refresh(ViewerId(1)));
    assert!(f.engine.request_refresh(ViewerId(2)));
    assert_eq!(f.engine.queue().len(), 2);

    assert!(f.engine.request_immediate_refresh(ViewerId(2)));
    assert_eq!(f.engine.queue().len(), 2);
    assert_eq!(f.engine.queue().drain(1), vec![ViewerId(2)]);
    assert!(!f.engine.request_refresh(ViewerId(99)));
}
