//! Error type shared by the codec, the transport and the client.

use thiserror::Error;

/// Main error type of the ICAP codec.
#[derive(Error, Debug)]
pub enum Error {
    /// TCP connection to the ICAP server could not be established.
    #[error("Cannot connect to icap://{host}:{port} ({source})")]
    Connection {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// Read/write failure on an established connection.
    #[error("Network error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer answered with something that is not an ICAP message.
    #[error("ICAP protocol error: {0}")]
    Protocol(String),

    /// Chunk length line is not hexadecimal or the chunk is truncated.
    #[error("Malformed chunk: {0}")]
    MalformedChunk(String),

    /// Authority URI is not of the form `icap://host[:port]`.
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    /// Client configuration is incomplete.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Body parts violate header-before-body ordering.
    #[error("Invalid section order: {0}")]
    SectionOrder(String),

    /// The server closed the connection without sending anything.
    #[error("Empty response")]
    EmptyResponse,
}

impl Error {
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    pub fn malformed_chunk(message: impl Into<String>) -> Self {
        Self::MalformedChunk(message.into())
    }

    pub fn invalid_uri(message: impl Into<String>) -> Self {
        Self::InvalidUri(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Result of ICAP operations.
pub type IcapResult<T> = Result<T, Error>;
