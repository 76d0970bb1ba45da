#![cfg_attr(not(test), deny(clippy::panic))]

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use werewolf_server::broadcast::ChannelBroadcaster;
use werewolf_server::config;
use werewolf_server::database::InMemoryDocumentStore;
use werewolf_server::engine::GameEngine;
use werewolf_server::logging;
use werewolf_server::pump::TimerPump;
use werewolf_server::rooms::RoomRegistry;
use werewolf_server::server::{build_router, AppState};
use werewolf_server::store::InMemorySnapshotStore;

/// Werewolf Server -- authoritative backend for a multiplayer social-deduction game
#[derive(Parser, Debug)]
#[command(name = "werewolf-server")]
#[command(about = "Authoritative backend for a multiplayer Werewolf game")]
#[command(version)]
struct Cli {
    /// Print the loaded configuration to stdout (as JSON) and exit.
    /// Useful for debugging configuration loading.
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration from config.json if present; otherwise use code defaults.
    let cfg = config::load();

    if cli.print_config {
        let json = serde_json::to_string_pretty(&cfg)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    logging::init_with_config(&cfg.logging);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!(%addr, "Starting Werewolf server");

    // Wire the ports to their in-memory adapters
    let store = Arc::new(InMemorySnapshotStore::new());
    let db = Arc::new(InMemoryDocumentStore::new());
    let hub = Arc::new(ChannelBroadcaster::new(cfg.server.broadcast_capacity));

    let rooms = Arc::new(RoomRegistry::new(
        store.clone(),
        db.clone(),
        hub.clone(),
        cfg.timers.to_phase_timers(),
    ));
    let engine = Arc::new(GameEngine::new(
        store.clone(),
        db.clone(),
        hub.clone(),
        rooms.clone(),
    ));

    let pump = TimerPump::new(
        engine.clone(),
        rooms.clone(),
        hub.clone(),
        Duration::from_millis(cfg.server.pump_tick_millis),
        Duration::from_secs(cfg.server.room_sweep_interval_secs),
    );
    tokio::spawn(pump.run());

    let app = build_router(AppState {
        engine,
        rooms,
        db,
        hub,
    });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
