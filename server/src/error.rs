//! Errors that can stop the server or a single connection.
//!
//! Nothing raised inside the room is represented here: a bad frame or an
//! invalid input is logged and dropped where it happens.

use shared::CodecError;
use std::net::SocketAddr;
use tokio_tungstenite::tungstenite;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listening socket could not be opened
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket upgrade failed for one incoming connection
    #[error("Handshake with {addr} failed: {source}")]
    Handshake {
        addr: SocketAddr,
        #[source]
        source: tungstenite::Error,
    },

    #[error("WebSocket error: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}
