//! WebSocket transport for Crossmark.
//!
//! A [`WebSocketListener`] accepts upgraded connections. Each
//! [`WebSocketConnection`] splits into a [`ConnectionReader`] and a
//! [`ConnectionWriter`] so one task can wait for client frames while
//! another pushes match broadcasts, without either blocking the other.

mod error;
mod websocket;

pub use error::TransportError;
pub use websocket::{
    ConnectionReader, ConnectionWriter, WebSocketConnection, WebSocketListener,
};

use std::fmt;

/// Opaque identifier for a connection, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_into_inner() {
        assert_eq!(ConnectionId::new(42).into_inner(), 42);
    }
}
