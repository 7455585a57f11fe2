//! Client connection and handle definitions
//!
//! A `Connection` is what a listener hands to the relay: the accepted stream
//! split into a boxed reader and writer. Once the relay accepts it, the writer
//! moves into a `ClientHandle`, a cheap-to-clone reference shared by the
//! session task, the registry and broadcasts.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::RelayError;
use crate::types::ClientId;

/// Boxed read half of a client stream
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed write half of a client stream
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A freshly accepted, not yet handled connection
pub struct Connection {
    pub reader: BoxedReader,
    pub writer: BoxedWriter,
    pub peer: Option<SocketAddr>,
}

impl Connection {
    /// Wrap any reader/writer pair (tests use `tokio::io::duplex`)
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
            peer: None,
        }
    }

    /// Split an accepted TCP stream
    pub fn from_tcp(stream: TcpStream) -> Self {
        let peer = stream.peer_addr().ok();
        let (reader, writer) = stream.into_split();
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
            peer,
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").field("peer", &self.peer).finish()
    }
}

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Handshake in progress
    Connecting = 0,
    /// Registered and exchanging messages
    Active = 1,
    /// Final; the handle has been released
    Terminated = 2,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Connecting,
            1 => SessionState::Active,
            _ => SessionState::Terminated,
        }
    }
}

/// Shared reference to one client's write side and session state
///
/// Writes are serialized through an async mutex so concurrent broadcasts
/// never interleave partial lines on the same stream.
#[derive(Clone)]
pub struct ClientHandle {
    id: ClientId,
    peer: Option<SocketAddr>,
    writer: Arc<Mutex<BoxedWriter>>,
    state: Arc<AtomicU8>,
    closed: CancellationToken,
}

impl ClientHandle {
    /// Create a handle in the `Connecting` state
    ///
    /// `closed` is cancelled when the handle is released; the session's
    /// read loop treats that as a terminal read failure.
    pub fn new(writer: BoxedWriter, peer: Option<SocketAddr>, closed: CancellationToken) -> Self {
        Self {
            id: ClientId::new(),
            peer,
            writer: Arc::new(Mutex::new(writer)),
            state: Arc::new(AtomicU8::new(SessionState::Connecting as u8)),
            closed,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move `Connecting -> Active`
    ///
    /// Returns false if the session was already terminated.
    pub fn activate(&self) -> bool {
        self.state
            .compare_exchange(
                SessionState::Connecting as u8,
                SessionState::Active as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Move to `Terminated`
    ///
    /// Returns true only for the caller that performed the transition.
    pub fn terminate(&self) -> bool {
        self.state.swap(SessionState::Terminated as u8, Ordering::AcqRel)
            != SessionState::Terminated as u8
    }

    /// Token cancelled once the handle is released
    pub fn closed_token(&self) -> &CancellationToken {
        &self.closed
    }

    /// Write one complete line (the caller supplies the terminator)
    pub async fn write_line(&self, line: &str) -> Result<(), RelayError> {
        if self.closed.is_cancelled() {
            return Err(RelayError::ConnectionClosed);
        }
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Release the handle: stop the read loop and shut the write side down
    pub async fn close(&self) {
        self.closed.cancel();
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("state", &self.state())
            .finish()
    }
}
