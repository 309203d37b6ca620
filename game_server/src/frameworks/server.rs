// Framework bootstrap for the game server runtime.

use crate::frameworks::config;
use crate::interface_adapters::net::{
    entity_position_handler, health_handler, state_handler, ws_handler,
};
use crate::interface_adapters::state::AppState;
use crate::use_cases::game::world_task;

use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::{io::Result, sync::Arc};
use tokio::sync::{Notify, mpsc};

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    // build state
    let state = build_state();
    // Start the Web Server
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/state", get(state_handler))
        .route("/entities/{id}/position", get(entity_position_handler))
        .with_state(state);

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::from(([127, 0, 0, 1], config::http_port()));

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

fn build_state() -> Arc<AppState> {
    let settings = config::simulation_settings();
    let tick_rate_hz = settings.tick_rate_hz();
    tracing::debug!(
        tick_rate_hz,
        view_distance = settings.view_distance,
        lag_comp_retention_ms = settings.lag_comp_retention_ms,
        max_step_ms = settings.limits.max_step_ms,
        movement_tolerance = settings.limits.movement_tolerance,
        monsters = settings.monster_count,
        "simulation configured"
    );

    // The world task owns all simulation state; everything else talks to it over this channel.
    let (input_tx, input_rx) = mpsc::channel(config::INPUT_CHANNEL_CAPACITY);
    // Never notified in production; the world lives as long as the process.
    let shutdown = Arc::new(Notify::new());
    tokio::spawn(world_task(input_rx, settings, shutdown));

    Arc::new(AppState {
        input_tx,
        tick_rate_hz,
        outbound_capacity: config::OUTBOUND_CHANNEL_CAPACITY,
    })
}
