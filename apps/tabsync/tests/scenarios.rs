use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tablist_wire::team::{char_len, stand_in, team_name};
use tablist_wire::{Dialect, HostInfo, PacketReader, ProtocolVersion, SlotKey};
use tabsync::collab::NoPermissions;
use tabsync::diff::{compute, DiffContext};
use tabsync::ping::ServerStates;
use tabsync::{
    Entry, EntrySet, FakePlayerConfig, HiddenPlayers, PacketSink, PlayerInfo, PlayerProvider,
    ResyncOutcome, Selector, SinkError, Snapshot, SourceError, TabSync, TabSyncConfig, ViewerId,
    VisibilityPolicy,
};
use uuid::Uuid;

#[derive(Default)]
struct RecordingSink {
    batches: Mutex<Vec<Vec<Bytes>>>,
}

impl RecordingSink {
    fn take(&self) -> Vec<Vec<Bytes>> {
        std::mem::take(&mut *self.batches.lock())
    }
}

impl PacketSink for RecordingSink {
    fn send_packets(&self, _viewer: ViewerId, packets: Vec<Bytes>) -> Result<(), SinkError> {
        self.batches.lock().push(packets);
        Ok(())
    }
}

/// Desired state the test can swap between resyncs.
#[derive(Default)]
struct Desired(Mutex<EntrySet>);

impl Desired {
    fn set(&self, entries: Vec<Entry>) {
        *self.0.lock() = EntrySet::new(entries);
    }
}

struct Harness {
    engine: TabSync,
    sink: Arc<RecordingSink>,
    desired: Arc<Desired>,
}

fn harness() -> Harness {
    let sink = Arc::new(RecordingSink::default());
    let desired = Arc::new(Desired::default());
    let source = {
        let desired = desired.clone();
        move |_: ViewerId| -> Result<EntrySet, SourceError> { Ok(desired.0.lock().clone()) }
    };
    let host = HostInfo {
        min_protocol: ProtocolVersion::MIN_SUPPORTED,
        max_protocol: ProtocolVersion::MAX_SUPPORTED,
        team_packet: true,
    };
    let engine =
        TabSync::new(&host, TabSyncConfig::default(), Arc::new(source), sink.clone()).unwrap();
    Harness {
        engine,
        sink,
        desired,
    }
}

fn key(n: u128) -> SlotKey {
    SlotKey::new(Uuid::from_u128(n))
}

fn entry(n: u128, name: &str, ping: u32) -> Entry {
    Entry::new(key(n), name, name, ping)
}

/// Action, count and first UUID of a 1.8+ player-list packet.
fn list_header(packet: &[u8]) -> (i32, i32, Uuid) {
    let mut reader = PacketReader::new(packet);
    assert_eq!(reader.read_var_i32().unwrap(), 0x38);
    let action = reader.read_var_i32().unwrap();
    let count = reader.read_var_i32().unwrap();
    (action, count, reader.read_uuid().unwrap())
}

#[test]
fn entry_list_join_then_swap_sends_only_the_difference() {
    let ctx = DiffContext::full(Dialect::EntryList);
    let joined = compute(
        &Snapshot::default(),
        &EntrySet::new([entry(1, "Alice", 50), entry(2, "Bob", 80)]),
        &ctx,
    );
    let kinds: Vec<(&str, Option<SlotKey>)> =
        joined.ops.iter().map(|op| (op.kind(), op.key())).collect();
    assert_eq!(kinds, vec![("add", Some(key(1))), ("add", Some(key(2)))]);

    let swapped = compute(
        &joined.snapshot,
        &EntrySet::new([entry(1, "Alice", 50), entry(3, "Carl", 40)]),
        &ctx,
    );
    let kinds: Vec<(&str, Option<SlotKey>)> =
        swapped.ops.iter().map(|op| (op.kind(), op.key())).collect();
    assert_eq!(kinds, vec![("remove", Some(key(2))), ("add", Some(key(3)))]);
}

#[test]
fn entry_list_scenario_on_the_wire() {
    let h = harness();
    h.desired.set(vec![entry(1, "Alice", 50), entry(2, "Bob", 80)]);
    assert!(h.engine.on_connect(ViewerId(1), ProtocolVersion::V1_8));
    assert_eq!(
        h.engine.resync(ViewerId(1)).unwrap(),
        ResyncOutcome::Sent { ops: 2, packets: 1 }
    );
    let batches = h.sink.take();
    assert_eq!(list_header(&batches[0][0]), (0, 2, Uuid::from_u128(1)));

    h.desired.set(vec![entry(1, "Alice", 50), entry(3, "Carl", 40)]);
    assert_eq!(
        h.engine.resync(ViewerId(1)).unwrap(),
        ResyncOutcome::Sent { ops: 2, packets: 2 }
    );
    let batches = h.sink.take();
    assert_eq!(list_header(&batches[0][0]), (4, 1, Uuid::from_u128(2)));
    assert_eq!(list_header(&batches[0][1]), (0, 1, Uuid::from_u128(3)));

    assert_eq!(h.engine.resync(ViewerId(1)).unwrap(), ResyncOutcome::Unchanged);
    assert!(h.sink.take().is_empty());
}

#[test]
fn legacy_long_name_goes_through_a_team() {
    let h = harness();
    h.desired.set(vec![Entry::new(
        key(1),
        "VeryLong",
        "VeryLongPlayerName123",
        30,
    )]);
    h.engine.on_connect(ViewerId(7), ProtocolVersion::V1_7_6);
    assert_eq!(
        h.engine.resync(ViewerId(7)).unwrap(),
        ResyncOutcome::Sent { ops: 2, packets: 2 }
    );
    let batches = h.sink.take();
    let packets = &batches[0];

    let mut team = PacketReader::new(&packets[0]);
    assert_eq!(team.read_var_i32().unwrap(), 0x3E);
    assert_eq!(team.read_string().unwrap(), team_name(0));
    assert_eq!(team.read_i8().unwrap(), 0);
    team.read_string().unwrap();
    assert_eq!(team.read_string().unwrap(), "VeryLongPlayerNa");
    assert_eq!(team.read_string().unwrap(), "me123");

    let mut slot = PacketReader::new(&packets[1]);
    assert_eq!(slot.read_var_i32().unwrap(), 0x38);
    let field = slot.read_string().unwrap();
    assert_eq!(field, stand_in(0));
    assert!(char_len(&field) <= 16);
    assert!(slot.read_bool().unwrap());
}

#[test]
fn bypass_teams_are_reused_across_add_remove_cycles() {
    let h = harness();
    h.engine.on_connect(ViewerId(3), ProtocolVersion::V1_7_2);
    for _ in 0..10 {
        h.desired.set(vec![Entry::new(key(5), "x", "TwentyCharacterText!", 0)]);
        h.engine.resync(ViewerId(3)).unwrap();
        let snapshot = h.engine.snapshot_of(ViewerId(3)).unwrap();
        assert_eq!(snapshot.team_of(&key(5)), Some(0));

        h.desired.set(Vec::new());
        h.engine.resync(ViewerId(3)).unwrap();
        let snapshot = h.engine.snapshot_of(ViewerId(3)).unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.pool().in_use(), 0);
    }
    let snapshot = h.engine.snapshot_of(ViewerId(3)).unwrap();
    assert_eq!(snapshot.pool().high_water(), 1);

    let kinds: Vec<&str> = h
        .sink
        .take()
        .last()
        .map(|batch| {
            batch
                .iter()
                .map(|packet| {
                    let mut reader = PacketReader::new(packet);
                    match reader.read_var_i32().unwrap() {
                        0x38 => "list",
                        0x3E => "team",
                        _ => "other",
                    }
                })
                .collect()
        })
        .unwrap_or_default();
    // removal: row first, then its team
    assert_eq!(kinds, vec!["list", "team"]);
}

#[test]
fn resync_of_an_identical_state_is_silent() {
    let h = harness();
    h.desired.set(vec![entry(1, "Alice", 50), entry(2, "Alice", 50)]);
    for (viewer, version) in [(1, ProtocolVersion::V1_7_6), (2, ProtocolVersion::V1_12_2)] {
        h.engine.on_connect(ViewerId(viewer), version);
        assert!(matches!(
            h.engine.resync(ViewerId(viewer)).unwrap(),
            ResyncOutcome::Sent { .. }
        ));
        let snapshot = h.engine.snapshot_of(ViewerId(viewer)).unwrap();
        let again = compute(
            &snapshot,
            &snapshot.entries(),
            &DiffContext::full(if viewer == 1 {
                Dialect::LegacyFixedSlot
            } else {
                Dialect::EntryList
            }),
        );
        assert!(again.ops.is_empty());
        assert_eq!(again.snapshot, snapshot);
        assert_eq!(
            h.engine.resync(ViewerId(viewer)).unwrap(),
            ResyncOutcome::Unchanged
        );
    }
}

#[test]
fn entry_list_reorder_is_adopted_without_packets() {
    let h = harness();
    h.desired.set(vec![entry(1, "Alice", 50), entry(2, "Bob", 80)]);
    h.engine.on_connect(ViewerId(4), ProtocolVersion::V1_8);
    h.engine.resync(ViewerId(4)).unwrap();
    h.sink.take();

    h.desired.set(vec![entry(2, "Bob", 80), entry(1, "Alice", 50)]);
    assert_eq!(h.engine.resync(ViewerId(4)).unwrap(), ResyncOutcome::Unchanged);
    assert!(h.sink.take().is_empty());
    let snapshot = h.engine.snapshot_of(ViewerId(4)).unwrap();
    let order: Vec<SlotKey> = snapshot.rows().iter().map(|row| row.key()).collect();
    assert_eq!(order, vec![key(2), key(1)]);
    assert_eq!(snapshot.entries(), *h.desired.0.lock());
}

struct Roster(Vec<PlayerInfo>);

impl PlayerProvider for Roster {
    fn players(&self) -> Vec<PlayerInfo> {
        self.0.clone()
    }

    fn player(&self, viewer: ViewerId) -> Option<PlayerInfo> {
        self.0.iter().find(|p| p.viewer == Some(viewer)).cloned()
    }
}

fn online(n: u64, name: &str, server: &str) -> PlayerInfo {
    let mut player = PlayerInfo::new(Uuid::from_u128(u128::from(n)), name, Some(server));
    player.viewer = Some(ViewerId(n));
    player
}

#[test]
fn reload_rebuilds_the_selector_from_the_new_config() {
    let roster = Roster(vec![online(1, "Alice", "lobby"), online(2, "Bob", "pvp")]);
    let visibility = Arc::new(VisibilityPolicy::new(
        Arc::new(HiddenPlayers::new()),
        Vec::new(),
        Arc::new(NoPermissions),
    ));
    let selector = Selector::new(
        Vec::new(),
        Arc::new(roster),
        visibility,
        Arc::new(ServerStates::new()),
    );
    let host = HostInfo {
        min_protocol: ProtocolVersion::MIN_SUPPORTED,
        max_protocol: ProtocolVersion::MAX_SUPPORTED,
        team_packet: true,
    };
    let sink = Arc::new(RecordingSink::default());
    let engine =
        TabSync::new(&host, TabSyncConfig::default(), Arc::new(selector), sink.clone()).unwrap();
    engine.on_connect(ViewerId(1), ProtocolVersion::V1_8);
    engine.drain_once(8);
    let listed = |engine: &TabSync| -> Vec<String> {
        engine
            .snapshot_of(ViewerId(1))
            .unwrap()
            .rows()
            .iter()
            .map(|row| row.entry.name.clone())
            .collect()
    };
    assert_eq!(listed(&engine), vec!["Alice", "Bob"]);

    let reloaded = TabSyncConfig {
        hidden_servers: vec!["pvp".into()],
        fake_players: vec![FakePlayerConfig {
            name: "Herobrine".into(),
            server: Some("lobby".into()),
            ping: 3,
            skin: None,
        }],
        ..TabSyncConfig::default()
    };
    assert_eq!(engine.reload(reloaded, None), 1);
    let report = engine.drain_once(8);
    assert_eq!(report.sent, 1);
    assert_eq!(listed(&engine), vec!["Alice", "Herobrine"]);
}
