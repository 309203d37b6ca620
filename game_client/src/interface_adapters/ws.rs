// WebSocket transport to the game server. Frames are JSON text messages; the
// server's pings are answered by tungstenite on the next read or write.

use futures_util::{SinkExt, StreamExt};
use std::fmt;
use std::time::Duration;
use sync_core::protocol::{ClientMessage, ServerMessage};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_INVALID_JSON: u32 = 10;

#[derive(Debug)]
pub enum ClientNetError {
    Connect(tungstenite::Error),
    ConnectTimeout,
    Ws(tungstenite::Error),
    Serialization(serde_json::Error),
    TooManyInvalidMessages,
}

impl fmt::Display for ClientNetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientNetError::Connect(e) => write!(f, "connect failed: {e}"),
            ClientNetError::ConnectTimeout => write!(f, "connect timed out"),
            ClientNetError::Ws(e) => write!(f, "websocket error: {e}"),
            ClientNetError::Serialization(e) => write!(f, "serialization error: {e}"),
            ClientNetError::TooManyInvalidMessages => write!(f, "too many invalid messages"),
        }
    }
}

impl std::error::Error for ClientNetError {}

pub struct ServerConnection {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    invalid_json: u32,
}

impl ServerConnection {
    pub async fn connect(url: &str) -> Result<Self, ClientNetError> {
        let (socket, _) = timeout(CONNECT_TIMEOUT, connect_async(url))
            .await
            .map_err(|_| ClientNetError::ConnectTimeout)?
            .map_err(ClientNetError::Connect)?;
        debug!(url, "connected");
        Ok(Self {
            socket,
            invalid_json: 0,
        })
    }

    pub async fn send(&mut self, message: &ClientMessage) -> Result<(), ClientNetError> {
        let text = serde_json::to_string(message).map_err(ClientNetError::Serialization)?;
        self.socket
            .send(Message::text(text))
            .await
            .map_err(ClientNetError::Ws)
    }

    /// Next server message, or `None` once the server closed the connection.
    /// Frames that fail to parse are skipped up to a limit.
    pub async fn recv(&mut self) -> Result<Option<ServerMessage>, ClientNetError> {
        while let Some(frame) = self.socket.next().await {
            match frame.map_err(ClientNetError::Ws)? {
                Message::Text(text) => match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(message) => return Ok(Some(message)),
                    Err(e) => {
                        self.invalid_json += 1;
                        warn!(error = %e, count = self.invalid_json, "invalid server message");
                        if self.invalid_json >= MAX_INVALID_JSON {
                            return Err(ClientNetError::TooManyInvalidMessages);
                        }
                    }
                },
                Message::Close(frame) => {
                    debug!(?frame, "server closed connection");
                    return Ok(None);
                }
                Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_) => {}
            }
        }
        Ok(None)
    }

    pub async fn close(mut self) {
        if let Err(e) = self.socket.close(None).await {
            debug!(error = %e, "close handshake failed");
        }
    }
}
