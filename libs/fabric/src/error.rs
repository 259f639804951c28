use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Message error: {0}")]
    Message(#[from] constellation_core::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Failed to bind {endpoint}: {source}")]
    Bind {
        endpoint: String,
        source: std::io::Error,
    },

    #[error("Address already in use: {0}")]
    AddressInUse(String),

    #[error("No listener bound at {0}")]
    EndpointNotFound(String),

    #[error("Request '{command}' timed out after {attempts} attempts")]
    Timeout { command: String, attempts: u32 },

    #[error("Request '{command}' failed remotely: {message}")]
    Remote { command: String, message: String },

    #[error("Request '{command}' got a malformed reply: {source}")]
    MalformedReply {
        command: String,
        source: constellation_core::Error,
    },

    #[error("Socket closed")]
    Closed,

    #[error("Request '{command}' on closed socket")]
    SocketClosed { command: String },

    #[error("{0}")]
    Custom(String),
}

pub type Result<T> = std::result::Result<T, Error>;
