use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub static SWEEPS: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("tabsync_sweeps_total", "Full sweeps that enqueued every viewer")
        .unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub static VIEWERS_DRAINED: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("tabsync_viewers_drained_total", "Viewers popped by the drain"),
        &["result"],
    )
    .unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub static PACKETS_SENT: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("tabsync_packets_sent_total", "Packets handed to the proxy")
        .unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub static UNSUPPORTED_OPS: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new(
            "tabsync_unsupported_ops_total",
            "Operations skipped because the client dialect lacks them",
        ),
        &["capability"],
    )
    .unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub static RESYNC_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("tabsync_resync_failures_total", "Resyncs that failed").unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub static CONNECTED_VIEWERS: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new("tabsync_connected_viewers", "Viewers with render state").unwrap();
    REGISTRY.register(Box::new(g.clone())).ok();
    g
});

/// Text exposition of every registered metric.
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&REGISTRY.gather(), &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
