//! Transport seam: how the engine reaches the chat server.
//!
//! The engine talks to the wire through the [`Transport`] /
//! [`TransportConn`] trait pair, so production code runs over
//! [`WebSocketTransport`] and tests can script an in-memory connection.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

/// Transport-level failures, distinct from protocol and caller errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The WebSocket layer reported a failure.
    #[error("websocket error: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),
    /// The peer closed the connection.
    #[error("connection closed by peer")]
    Closed,
}

/// Opens connections to a chat server.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by [`open`](Transport::open).
    type Conn: TransportConn;

    /// Open a connection to `url`.
    async fn open(&self, url: &str) -> Result<Self::Conn, TransportError>;
}

/// A duplex, line-oriented connection.
#[async_trait]
pub trait TransportConn: Send + 'static {
    /// The next inbound line, without its terminator. `None` once the
    /// peer has closed the stream.
    async fn read_line(&mut self) -> Option<Result<String, TransportError>>;

    /// Write one line. The caller includes the terminator.
    async fn write_line(&mut self, line: &str) -> Result<(), TransportError>;

    /// Close the connection. Idempotent; close failures are not
    /// interesting during teardown.
    async fn close(&mut self);
}

/// The production transport: IRC lines over a WebSocket.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

/// An open WebSocket carrying newline-delimited IRC lines.
///
/// A single text frame may carry several lines; they are split here and
/// handed to the engine one at a time, in order.
pub struct WebSocketConn {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    pending: VecDeque<String>,
}

#[async_trait]
impl Transport for WebSocketTransport {
    type Conn = WebSocketConn;

    async fn open(&self, url: &str) -> Result<WebSocketConn, TransportError> {
        let (stream, _response) = connect_async(url).await?;
        Ok(WebSocketConn {
            stream,
            pending: VecDeque::new(),
        })
    }
}

#[async_trait]
impl TransportConn for WebSocketConn {
    async fn read_line(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Some(Ok(line));
            }
            match self.stream.next().await? {
                Ok(WsMessage::Text(text)) => {
                    for line in text.lines().filter(|l| !l.is_empty()) {
                        self.pending.push_back(line.to_owned());
                    }
                }
                Ok(WsMessage::Close(_)) => return None,
                // tungstenite answers pings itself; nothing else carries lines
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        self.stream
            .send(WsMessage::Text(line.to_owned()))
            .await
            .map_err(TransportError::from)
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "websocket close");
        }
    }
}
