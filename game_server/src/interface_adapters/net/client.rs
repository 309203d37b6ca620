use crate::domain::ConnectionId;
use crate::interface_adapters::protocol::{
    ClientMessage, IdentityPayload, JoinPayload, ServerMessage, SyncUpdate, sanitize_display_name,
};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::ids::{next_connection_id, next_player_id};
use crate::use_cases::GameEvent;
use crate::use_cases::throttle::{should_log, throttle_origin};

use axum::{
    Error,
    body::Bytes,
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use futures::SinkExt;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{MissedTickBehavior, timeout};
use tracing::{Instrument, debug, error, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    InputClosed,
    SyncUpdatesClosed,
    JoinRequired,
    JoinTimeout,
    JoinDropped,
    ClosedBeforeJoin,
}

const MAX_INVALID_JSON: u32 = 10;
const JOIN_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const PING_INTERVAL: Duration = Duration::from_secs(1);

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        // Separate connection id for correlating logs before/after a player_id exists.
        let conn_id = next_connection_id();
        let span = info_span!("conn", conn_id, player_id = tracing::field::Empty);
        handle_socket(socket, state, conn_id).instrument(span)
    })
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, conn_id: ConnectionId) {
    let mut ctx = match bootstrap_connection(&mut socket, &state, conn_id).await {
        Ok(ctx) => ctx,
        Err(NetError::ClosedBeforeJoin) => {
            info!("client disconnected before join handshake");
            return;
        }
        Err(e) => {
            error!(error = ?e, "failed to bootstrap connection");
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: "bootstrap failed".into(),
                })))
                .await;
            let _ = socket.close().await;
            return;
        }
    };

    tracing::Span::current().record("player_id", ctx.player_id);
    info!(
        player_id = ctx.player_id,
        display_name = %ctx.display_name,
        "client connected"
    );

    // Main Client Loop
    if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
        warn!(error = ?e, "client loop exited with error");
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<usize, NetError> {
    let txt = serde_json::to_string(msg).map_err(NetError::Serialization)?;
    let bytes = txt.len();
    socket
        .send(Message::Text(txt.into()))
        .await
        .map_err(NetError::Ws)?;
    Ok(bytes)
}

async fn send_close_with_reason(
    socket: &mut WebSocket,
    code: u16,
    reason: &'static str,
) -> Result<(), NetError> {
    socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await
        .map_err(NetError::Ws)?;
    socket.close().await.map_err(NetError::Ws)
}

struct ConnCtx {
    pub conn_id: ConnectionId,
    pub player_id: u64,
    pub display_name: String,
    pub input_tx: mpsc::Sender<GameEvent>,
    pub updates_rx: mpsc::Receiver<SyncUpdate>,

    // Outstanding ping payload and when it was sent.
    pub ping_seq: u64,
    pub ping_sent: Option<(u64, Instant)>,

    pub msgs_in: u64,
    pub msgs_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,

    pub invalid_json: u32,

    pub last_input_full_log: Instant,
    pub last_invalid_input_log: Instant,

    pub close_frame: Option<CloseFrame>,
}

async fn bootstrap_connection(
    socket: &mut WebSocket,
    state: &AppState,
    conn_id: ConnectionId,
) -> Result<ConnCtx, NetError> {
    let (join, bytes_in) = match timeout(JOIN_HANDSHAKE_TIMEOUT, read_join_handshake(socket)).await
    {
        Ok(result) => result?,
        Err(_) => {
            let _ = send_close_with_reason(socket, close_code::POLICY, "join timeout").await;
            return Err(NetError::JoinTimeout);
        }
    };

    // The socket layer acts as the session registry: one player id per connection.
    let player_id = next_player_id();
    let display_name = sanitize_display_name(&join.display_name, player_id);

    // Join happens before Identity so the first sync update already includes the player.
    let (updates_tx, updates_rx) = mpsc::channel(state.outbound_capacity);
    let (reply_tx, reply_rx) = oneshot::channel();
    state
        .input_tx
        .send(GameEvent::Join {
            conn_id,
            player_id,
            display_name: display_name.clone(),
            class: join.class,
            outbound: updates_tx,
            reply: reply_tx,
        })
        .await
        .map_err(|_| NetError::InputClosed)?;
    let accepted = reply_rx.await.map_err(|_| NetError::JoinDropped)?;

    // Tell the client "This is who you are".
    let identity = ServerMessage::Identity(IdentityPayload {
        player_id,
        entity_id: accepted.entity_id,
        tick_rate_hz: state.tick_rate_hz,
        server_time_ms: accepted.server_time_ms,
    });
    let bytes_out = match send_message(socket, &identity).await {
        Ok(bytes) => bytes as u64,
        Err(err) => {
            // If anything after Join fails, compensate with Leave to avoid "spawned but never connected".
            let _ = state.input_tx.send(GameEvent::Leave { conn_id }).await;
            return Err(err);
        }
    };

    let now = throttle_origin();
    Ok(ConnCtx {
        conn_id,
        player_id,
        display_name,
        input_tx: state.input_tx.clone(),
        updates_rx,

        ping_seq: 0,
        ping_sent: None,

        msgs_in: 1,
        msgs_out: 1,
        bytes_in,
        bytes_out,

        invalid_json: 0,

        last_input_full_log: now,
        last_invalid_input_log: now,

        close_frame: None,
    })
}

async fn read_join_handshake(socket: &mut WebSocket) -> Result<(JoinPayload, u64), NetError> {
    loop {
        let Some(incoming) = socket.recv().await else {
            return Err(NetError::ClosedBeforeJoin);
        };

        let message = incoming.map_err(NetError::Ws)?;
        match message {
            Message::Text(text) => {
                let bytes_in = text.len() as u64;
                return match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Join(payload)) => Ok((payload, bytes_in)),
                    Ok(ClientMessage::Input(_)) => {
                        let _ = send_close_with_reason(socket, close_code::POLICY, "join required")
                            .await;
                        Err(NetError::JoinRequired)
                    }
                    Err(_) => {
                        let _ = send_close_with_reason(
                            socket,
                            close_code::POLICY,
                            "invalid join payload",
                        )
                        .await;
                        Err(NetError::JoinRequired)
                    }
                };
            }
            Message::Binary(_) => {
                let _ = send_close_with_reason(
                    socket,
                    close_code::UNSUPPORTED,
                    "binary messages not supported",
                )
                .await;
                return Err(NetError::JoinRequired);
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => return Err(NetError::ClosedBeforeJoin),
        }
    }
}

enum LoopControl {
    Continue,
    Disconnect,
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    let mut fatal: Option<NetError> = None;
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // disconnect becomes true on error
        let disconnect: bool = tokio::select! {
            // Incoming Message from Client
            incoming = socket.recv() => {
                match handle_incoming_ws(incoming, ctx) {
                    Ok(LoopControl::Continue) => false,
                    Ok(LoopControl::Disconnect) => true,
                    Err(e) => {
                        fatal = Some(e);
                        true
                    }
                }
            }

            // Outgoing sync update for this connection
            update = ctx.updates_rx.recv() => {
                match update {
                    Some(update) => match forward_update(update, socket, ctx).await {
                        LoopControl::Continue => false,
                        LoopControl::Disconnect => true,
                    },
                    None => {
                        warn!(player_id = ctx.player_id, "sync updates channel closed; disconnecting");
                        fatal = Some(NetError::SyncUpdatesClosed);
                        true
                    }
                }
            }

            // Latency probe
            _ = ping_interval.tick() => {
                ctx.ping_seq += 1;
                let payload = Bytes::copy_from_slice(&ctx.ping_seq.to_be_bytes());
                match socket.send(Message::Ping(payload)).await {
                    Ok(()) => {
                        ctx.ping_sent = Some((ctx.ping_seq, Instant::now()));
                        false
                    }
                    Err(err) => {
                        warn!(error = ?err, "failed to send ping");
                        true
                    }
                }
            }
        };

        if disconnect {
            if let Some(frame) = ctx.close_frame.take() {
                let _ = socket.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    if let Err(e) = disconnect_cleanup(ctx).await {
        warn!(error = ?e, "error during disconnect cleanup");
        if fatal.is_none() {
            fatal = Some(e);
        }
    }

    if let Some(err) = fatal {
        Err(err)
    } else {
        Ok(())
    }
}

fn handle_incoming_ws(
    incoming: Option<Result<Message, Error>>,
    ctx: &mut ConnCtx,
) -> Result<LoopControl, NetError> {
    let player_id = ctx.player_id;
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                ctx.msgs_in += 1;
                ctx.bytes_in += text.len() as u64;

                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Join(_)) => {
                        // Ignore repeated Join packets after bootstrap to keep the session stable.
                        if should_log(&mut ctx.last_invalid_input_log) {
                            warn!(player_id, "duplicate join ignored");
                        }
                        Ok(LoopControl::Continue)
                    }
                    Ok(ClientMessage::Input(command)) => {
                        let event = GameEvent::Input {
                            conn_id: ctx.conn_id,
                            command,
                        };
                        match ctx.input_tx.try_send(event) {
                            Ok(()) => Ok(LoopControl::Continue),
                            Err(mpsc::error::TrySendError::Full(_)) => {
                                if should_log(&mut ctx.last_input_full_log) {
                                    warn!(player_id, "input channel full; dropping input");
                                }
                                Ok(LoopControl::Continue)
                            }
                            Err(mpsc::error::TrySendError::Closed(_)) => Err(NetError::InputClosed),
                        }
                    }
                    Err(parse_err) => {
                        ctx.invalid_json += 1;
                        if should_log(&mut ctx.last_invalid_input_log) {
                            warn!(
                                player_id,
                                bytes = text.len(),
                                error = %parse_err,
                                "failed to parse client message"
                            );
                        }

                        if ctx.invalid_json > MAX_INVALID_JSON {
                            ctx.close_frame = Some(CloseFrame {
                                code: close_code::POLICY,
                                reason: "too many invalid messages".into(),
                            });
                            return Ok(LoopControl::Disconnect);
                        }

                        Ok(LoopControl::Continue)
                    }
                }
            }
            Message::Pong(payload) => {
                record_pong(&payload, ctx);
                Ok(LoopControl::Continue)
            }
            Message::Binary(_) => {
                ctx.close_frame = Some(CloseFrame {
                    code: close_code::UNSUPPORTED,
                    reason: "binary messages not supported".into(),
                });
                Ok(LoopControl::Disconnect)
            }
            Message::Ping(_) => Ok(LoopControl::Continue),
            Message::Close(_) => Ok(LoopControl::Disconnect),
        },
        Some(Err(e)) => {
            warn!(player_id, error = %e, "websocket recv error");
            Ok(LoopControl::Disconnect)
        }
        None => {
            info!(player_id, "websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

fn record_pong(payload: &[u8], ctx: &mut ConnCtx) {
    let Ok(bytes) = <[u8; 8]>::try_from(payload) else {
        return;
    };
    let seq = u64::from_be_bytes(bytes);
    let Some((expected, sent_at)) = ctx.ping_sent else {
        return;
    };
    if seq != expected {
        return;
    }
    ctx.ping_sent = None;
    let event = GameEvent::Latency {
        conn_id: ctx.conn_id,
        rtt: sent_at.elapsed(),
    };
    // Latency samples are best-effort; a full queue just skips one.
    let _ = ctx.input_tx.try_send(event);
}

async fn forward_update(update: SyncUpdate, socket: &mut WebSocket, ctx: &mut ConnCtx) -> LoopControl {
    match send_message(socket, &ServerMessage::Sync(update)).await {
        Ok(bytes) => {
            ctx.msgs_out += 1;
            ctx.bytes_out += bytes as u64;
            LoopControl::Continue
        }
        Err(err) => {
            // Log unexpected send failures; disconnect will follow immediately.
            warn!(error = ?err, "failed to send sync update");
            LoopControl::Disconnect
        }
    }
}

async fn disconnect_cleanup(ctx: &ConnCtx) -> Result<(), NetError> {
    ctx.input_tx
        .send(GameEvent::Leave {
            conn_id: ctx.conn_id,
        })
        .await
        .map_err(|_| NetError::InputClosed)?;

    debug!(
        player_id = ctx.player_id,
        msgs_in = ctx.msgs_in,
        msgs_out = ctx.msgs_out,
        bytes_in = ctx.bytes_in,
        bytes_out = ctx.bytes_out,
        invalid_json = ctx.invalid_json,
        "connection stats"
    );
    info!(player_id = ctx.player_id, "client disconnected");
    Ok(())
}
