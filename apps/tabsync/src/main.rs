use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tablist_wire::{HostInfo, ProtocolVersion};
use tabsync::collab::ServerDirectory;
use tabsync::config::TabSyncConfig;
use tabsync::engine::TabSync;
use tabsync::hidden::{HiddenPlayers, VisibilityPolicy};
use tabsync::metrics;
use tabsync::ping::{spawn_ping_tasks, ServerStates};
use tabsync::pipeline::ResendLoop;
use tabsync::selector::Selector;
use tabsync::sim::{SimEvent, SimulatedProxy};
use tabsync::telemetry::init_tracing;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Drives the tab-list engine against a simulated proxy population.
#[derive(Debug, Parser)]
#[command(name = "tabsync", version, about)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, env = "TABSYNC_CONFIG")]
    config: Option<PathBuf>,
    /// Players kept online by the simulation.
    #[arg(long, default_value_t = 200)]
    viewers: usize,
    /// Seconds to run; 0 runs until ctrl-c.
    #[arg(long, default_value_t = 30)]
    duration: u64,
    /// Fraction of clients joining on a 1.7 protocol.
    #[arg(long, default_value_t = 0.25)]
    legacy_share: f64,
    /// Milliseconds between population changes.
    #[arg(long, default_value_t = 100)]
    churn_interval_ms: u64,
    /// Backend servers registered with the simulated proxy.
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "lobby,survival,creative"
    )]
    servers: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = TabSyncConfig::load(cli.config.as_deref()).context("loading configuration")?;
    init_tracing(&config.log_filter);

    let proxy = Arc::new(SimulatedProxy::new(cli.servers.clone(), cli.legacy_share));
    let servers = proxy.servers();
    let states = Arc::new(ServerStates::new());
    let visibility = Arc::new(VisibilityPolicy::new(
        Arc::new(HiddenPlayers::new()),
        config.hidden_servers.clone(),
        proxy.clone(),
    ));
    let selector = Selector::new(
        config.tab_lists.clone(),
        proxy.clone(),
        visibility,
        states.clone(),
    )
    .with_fake_players(&config.fake_players);
    let host = HostInfo {
        min_protocol: ProtocolVersion::MIN_SUPPORTED,
        max_protocol: ProtocolVersion::MAX_SUPPORTED,
        team_packet: true,
    };
    let engine = match TabSync::new(&host, config.clone(), Arc::new(selector), proxy.clone()) {
        Ok(engine) => Arc::new(engine),
        Err(err) => {
            error!(error = %err, "tab list synchronization disabled");
            return Ok(());
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pings = spawn_ping_tasks(
        &servers,
        config.ping_interval(),
        proxy.clone(),
        states,
        shutdown_rx.clone(),
    );
    let resend = ResendLoop::start(engine.clone(), shutdown_rx)
        .context("resend loop could not be scheduled")?;

    let mut rng = StdRng::from_entropy();
    for _ in 0..cli.viewers {
        let (viewer, version) = proxy.join(&mut rng);
        engine.on_connect(viewer, version);
    }
    info!(
        viewers = engine.viewer_count(),
        servers = ?servers,
        sweep_interval = ?config.sweep_interval(),
        drain_interval_ms = config.drain_interval_ms,
        drain_batch = config.drain_batch_size,
        bypass = config.use_scoreboard_to_bypass_16_char_limit,
        "starting tabsync simulation"
    );

    let run_for = async {
        if cli.duration == 0 {
            std::future::pending::<()>().await;
        } else {
            tokio::time::sleep(Duration::from_secs(cli.duration)).await;
        }
    };
    tokio::pin!(run_for);
    let mut churn = tokio::time::interval(Duration::from_millis(cli.churn_interval_ms.max(1)));
    loop {
        tokio::select! {
            _ = churn.tick() => {
                let event = proxy.step(&mut rng, cli.viewers);
                apply(&engine, event);
            }
            _ = &mut run_for => break,
            signal = tokio::signal::ctrl_c() => {
                signal.context("listening for ctrl-c")?;
                info!("interrupted");
                break;
            }
        }
    }

    let _ = shutdown_tx.send(true);
    resend.join().await;
    for ping in pings {
        let _ = ping.await;
    }
    info!(
        viewers = engine.viewer_count(),
        packets = proxy.packets_sent(),
        bytes = proxy.bytes_sent(),
        "tabsync simulation stopped"
    );
    println!("{}", metrics::gather());
    Ok(())
}

fn apply(engine: &TabSync, event: SimEvent) {
    match event {
        SimEvent::Joined { viewer, version } => {
            engine.on_connect(viewer, version);
        }
        SimEvent::Left { viewer } => {
            engine.on_disconnect(viewer);
        }
        SimEvent::Moved { viewer } => {
            engine.request_immediate_refresh(viewer);
        }
        SimEvent::Idle => debug!("no population change"),
    }
}
