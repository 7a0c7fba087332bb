//! WebSocket listener and connection halves over `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use crate::{ConnectionId, TransportError};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<TcpStream>;

/// Accepts WebSocket connections on a TCP address.
pub struct WebSocketListener {
    listener: TcpListener,
}

impl WebSocketListener {
    /// Binds to `addr`. Use port 0 to let the OS pick one.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket listener bound");
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Waits for the next TCP connection and completes the WebSocket
    /// upgrade.
    pub async fn accept(&self) -> Result<WebSocketConnection, TransportError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let ws = tokio_tungstenite::accept_async(stream).await.map_err(|e| {
            TransportError::AcceptFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                e,
            ))
        })?;

        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, %peer, "accepted WebSocket connection");

        Ok(WebSocketConnection { id, peer, ws })
    }
}

/// An upgraded connection, not yet split.
pub struct WebSocketConnection {
    id: ConnectionId,
    peer: SocketAddr,
    ws: WsStream,
}

impl WebSocketConnection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Splits into independently owned write and read halves.
    pub fn split(self) -> (ConnectionWriter, ConnectionReader) {
        let (sink, stream) = self.ws.split();
        (
            ConnectionWriter { id: self.id, sink },
            ConnectionReader {
                id: self.id,
                stream,
            },
        )
    }
}

/// Write half of a connection.
pub struct ConnectionWriter {
    id: ConnectionId,
    sink: SplitSink<WsStream, Message>,
}

impl ConnectionWriter {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Sends one binary frame.
    pub async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.sink
            .send(Message::Binary(data.to_vec().into()))
            .await
            .map_err(TransportError::SendFailed)
    }

    /// Sends a close frame. Errors from an already-closed peer are ignored
    /// by callers; the connection is going away either way.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.sink
            .send(Message::Close(None))
            .await
            .map_err(TransportError::SendFailed)
    }
}

/// Read half of a connection.
pub struct ConnectionReader {
    id: ConnectionId,
    stream: SplitStream<WsStream>,
}

impl ConnectionReader {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Receives the next data frame (binary or text).
    ///
    /// Returns `Ok(None)` once the peer closed the connection. Ping/pong
    /// frames are answered by tungstenite and skipped here.
    pub async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.into())),
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(TransportError::ReceiveFailed(e)),
            }
        }
    }
}
