//! Error types returned across the session API.

use std::time::Duration;

use roomnet_shared::protocol::CodecError;

/// Why a connect attempt did not produce a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// A connection is already open or being opened.
    #[error("already connected")]
    AlreadyConnected,
    #[error("could not resolve {addr}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} did not resolve to any address")]
    NoAddress(String),
    #[error("connecting to {addr} timed out after {after:?}")]
    Timeout { addr: String, after: Duration },
    #[error("could not connect to {addr}: {source}")]
    Io {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Why an outbound line was not written.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("not connected to the server")]
    NotConnected,
    /// The line would be split in two by the framing.
    #[error("outbound line contains a line break")]
    MultiLine,
    #[error(transparent)]
    Encode(#[from] CodecError),
    /// The write failed; the session has been disconnected.
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}
