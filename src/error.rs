//! Error types for the chat relay
//!
//! Defines relay-level errors and message send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Relay-level errors
///
/// Per-connection variants never leave the session task that hit them;
/// they are logged and turned into a dead-connection event.
#[derive(Debug, Error)]
pub enum RelayError {
    /// IO error (fatal for the connection)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Inbound line framing error (includes over-long lines)
    #[error("Line error: {0}")]
    Line(#[from] tokio_util::codec::LinesCodecError),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),

    /// Configured log level is not one tracing understands
    #[error("not a valid log level: {0:?}")]
    InvalidLogLevel(String),

    /// Logging could not be initialized
    #[error("Logging init error: {0}")]
    LoggingInit(String),

    /// Channel send error (internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// A write did not finish within the configured timeout
    #[error("Write timed out")]
    WriteTimeout,

    /// Peer closed the connection or the session was released
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Message send errors
///
/// Occurs when attempting to send events through closed channels.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
}
