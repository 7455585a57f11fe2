//! Line-oriented Chat Relay Library
//!
//! Clients attach over raw TCP, pick (or are assigned) a display name, and
//! every line they send is broadcast to all attached clients. One-shot
//! messages can also be submitted over HTTP.
//!
//! # Architecture
//! - `Transporter` is the event loop over three `mpsc` streams: new
//!   connections, outbound messages and dead connections
//! - Each connection runs its own `handle_connection` task (handshake, then
//!   a read loop)
//! - Each message runs its own `broadcast` task, one write task per client
//! - `Registry` is the only shared state; it is never locked across I/O
//!
//! # Example
//! ```ignore
//! use chat_relay::{TcpListenerTask, Transporter, TransporterSettings};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (transporter, handle) = Transporter::new(TransporterSettings::default());
//!     tokio::spawn(transporter.run());
//!
//!     let listener = TcpListenerTask::bind("127.0.0.1:6000").await.unwrap();
//!     listener.run(handle.new_connections(), CancellationToken::new()).await;
//! }
//! ```

pub mod broadcast;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logging;
pub mod message;
pub mod registry;
pub mod tcp;
pub mod transporter;
pub mod types;

// Re-export main types for convenience
pub use broadcast::{broadcast, BroadcastReport};
pub use client::{ClientHandle, Connection, SessionState};
pub use config::Config;
pub use error::{RelayError, SendError};
pub use handler::{handle_connection, SessionContext};
pub use http::HttpListener;
pub use message::Message;
pub use registry::Registry;
pub use tcp::TcpListenerTask;
pub use transporter::{Transporter, TransporterHandle, TransporterSettings};
pub use types::{ClientId, DisplayName};
