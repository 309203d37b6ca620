// Framework bootstrap for the headless bot client.

use crate::frameworks::config::{self, BotSettings, FRAME_INTERVAL};
use crate::interface_adapters::{ClientNetError, ServerConnection};
use crate::use_cases::{ClientSession, SessionStats, scripted_input};

use std::time::Instant;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{Instrument, info, info_span, warn};

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

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Connects, joins and plays the scripted pattern until the run time is up or
/// the server goes away.
pub async fn run_bot(settings: BotSettings) -> Result<SessionStats, ClientNetError> {
    let span = info_span!("bot", name = %settings.session.display_name);
    async move {
        let mut conn = ServerConnection::connect(&settings.url).await?;
        let mut session = ClientSession::new(settings.session.clone());
        conn.send(&session.join_message()).await?;

        let started = Instant::now();
        let deadline = sleep(settings.run_for);
        tokio::pin!(deadline);
        let mut frames = interval(FRAME_INTERVAL);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    info!("run time elapsed");
                    break;
                }
                incoming = conn.recv() => match incoming? {
                    Some(message) => {
                        session.handle(message, elapsed_ms(started));
                    }
                    None => {
                        warn!("server closed the connection");
                        break;
                    }
                },
                _ = frames.tick() => {
                    let now = elapsed_ms(started);
                    if let Some(command) = session.tick_input(scripted_input(now), now) {
                        conn.send(&command).await?;
                    }
                }
            }
        }

        conn.close().await;
        Ok(session.stats())
    }
    .instrument(span)
    .await
}

pub async fn run_with_config() -> Result<(), ClientNetError> {
    init_runtime();
    let settings = config::bot_settings();
    info!(url = %settings.url, class = ?settings.session.class, "starting bot");

    let stats = run_bot(settings).await?;
    info!(
        updates = stats.updates,
        commands = stats.commands_sent,
        last_ack = stats.last_ack,
        blended = stats.blended,
        replayed = stats.replayed,
        snapped = stats.snapped,
        max_error = stats.max_error,
        mean_error = stats.mean_error(),
        "session finished"
    );
    Ok(())
}
