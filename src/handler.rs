//! Session lifecycle handler
//!
//! Drives one accepted connection through name negotiation, turns each
//! subsequent line into an outbound message and reports the connection as
//! dead once any read or write fails.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{BoxedReader, ClientHandle};
use crate::error::RelayError;
use crate::message::{Message, LINE_TERMINATOR};
use crate::registry::Registry;
use crate::types::DisplayName;

/// Everything a session task needs from the relay
#[derive(Clone)]
pub struct SessionContext {
    pub registry: Arc<Registry>,
    pub messages: mpsc::Sender<Message>,
    pub dead_connections: mpsc::Sender<ClientHandle>,
    pub max_line_length: usize,
}

/// Prompt sent before the name is read
pub fn prompt_line(placeholder: &DisplayName) -> String {
    format!("Enter your name (default: {placeholder}){LINE_TERMINATOR}")
}

/// Acknowledgment sent once the name is resolved
pub fn welcome_line(name: &DisplayName) -> String {
    format!("Welcome to telchat {name}{LINE_TERMINATOR}")
}

/// Handle one client session from handshake to termination
///
/// Never returns an error: whatever ends the session is logged and reported
/// as a single dead-connection event for `handle`.
pub async fn handle_connection(handle: ClientHandle, reader: BoxedReader, ctx: SessionContext) {
    let client_id = handle.id();
    debug!(%client_id, peer = ?handle.peer(), "session started");

    let reason = run_session(&handle, reader, &ctx).await;
    match &reason {
        RelayError::ConnectionClosed => debug!(%client_id, "session closed"),
        other => warn!(%client_id, error = %other, "session ended with error"),
    }

    if ctx.dead_connections.send(handle).await.is_err() {
        debug!(%client_id, "relay stopped, dropping dead-connection event");
    }
}

/// Run the session protocol, returning whatever ended it
async fn run_session(handle: &ClientHandle, reader: BoxedReader, ctx: &SessionContext) -> RelayError {
    match session_protocol(handle, reader, ctx).await {
        Ok(never) => match never {},
        Err(e) => e,
    }
}

async fn session_protocol(
    handle: &ClientHandle,
    reader: BoxedReader,
    ctx: &SessionContext,
) -> Result<std::convert::Infallible, RelayError> {
    let placeholder = DisplayName::placeholder();
    handle.write_line(&prompt_line(&placeholder)).await?;

    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(ctx.max_line_length));
    let submitted = next_line(&mut lines, handle.closed_token()).await?;
    let name = DisplayName::resolve(&submitted, placeholder);

    if !handle.activate() {
        return Err(RelayError::ConnectionClosed);
    }
    ctx.registry.insert(handle.clone(), name.clone());
    info!(
        client_id = %handle.id(),
        peer = ?handle.peer(),
        name = %name,
        clients = ctx.registry.count(),
        "client connected"
    );

    handle.write_line(&welcome_line(&name)).await?;

    ctx.messages
        .send(Message::joined(name.as_str()))
        .await
        .map_err(|_| RelayError::ChannelSend)?;

    loop {
        let line = next_line(&mut lines, handle.closed_token()).await?;
        debug!(sender = %name, message = %line, "received message via tcp");
        ctx.messages
            .send(Message::new(name.as_str(), line))
            .await
            .map_err(|_| RelayError::ChannelSend)?;
    }
}

/// Read the next line, treating a released handle like a closed peer
async fn next_line(
    lines: &mut FramedRead<BoxedReader, LinesCodec>,
    closed: &CancellationToken,
) -> Result<String, RelayError> {
    tokio::select! {
        _ = closed.cancelled() => Err(RelayError::ConnectionClosed),
        line = lines.next() => match line {
            Some(Ok(line)) => Ok(line),
            Some(Err(e)) => Err(e.into()),
            None => Err(RelayError::ConnectionClosed),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::SessionState;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

    struct Harness {
        ctx: SessionContext,
        messages: mpsc::Receiver<Message>,
        dead: mpsc::Receiver<ClientHandle>,
    }

    fn harness() -> Harness {
        let (msg_tx, msg_rx) = mpsc::channel(16);
        let (dead_tx, dead_rx) = mpsc::channel(16);
        Harness {
            ctx: SessionContext {
                registry: Arc::new(Registry::new()),
                messages: msg_tx,
                dead_connections: dead_tx,
                max_line_length: 64,
            },
            messages: msg_rx,
            dead: dead_rx,
        }
    }

    /// Spawn a session over an in-memory stream, returning the client side
    fn spawn_session(ctx: &SessionContext) -> (ClientHandle, DuplexStream) {
        let (server, client) = tokio::io::duplex(1024);
        let (reader, writer) = tokio::io::split(server);
        let handle = ClientHandle::new(Box::new(writer), None, CancellationToken::new());
        tokio::spawn(handle_connection(handle.clone(), Box::new(reader), ctx.clone()));
        (handle, client)
    }

    #[tokio::test]
    async fn test_handshake_registers_and_joins() {
        let mut h = harness();
        let (handle, client) = spawn_session(&h.ctx);
        let (read, mut write) = tokio::io::split(client);
        let mut read = BufReader::new(read);

        let mut line = String::new();
        read.read_line(&mut line).await.unwrap();
        assert!(line.starts_with("Enter your name (default: "));
        assert!(line.ends_with(")\r\n"));

        write.write_all(b"sender\r\n").await.unwrap();

        line.clear();
        read.read_line(&mut line).await.unwrap();
        assert_eq!(line, "Welcome to telchat sender\r\n");

        let joined = h.messages.recv().await.unwrap();
        assert_eq!(joined, Message::joined("sender"));
        assert_eq!(h.ctx.registry.lookup(&handle.id()).unwrap().as_str(), "sender");
        assert_eq!(handle.state(), SessionState::Active);

        write.write_all(b"my message\r\n").await.unwrap();
        let msg = h.messages.recv().await.unwrap();
        assert_eq!(msg, Message::new("sender", "my message"));

        drop(write);
        drop(read);
        let dead = h.dead.recv().await.unwrap();
        assert_eq!(dead.id(), handle.id());
    }

    #[tokio::test]
    async fn test_empty_name_keeps_placeholder() {
        let mut h = harness();
        let (handle, client) = spawn_session(&h.ctx);
        let (read, mut write) = tokio::io::split(client);
        let mut read = BufReader::new(read);

        let mut prompt = String::new();
        read.read_line(&mut prompt).await.unwrap();
        let placeholder = prompt
            .trim_start_matches("Enter your name (default: ")
            .trim_end_matches(")\r\n")
            .to_string();

        write.write_all(b"\r\n").await.unwrap();

        let joined = h.messages.recv().await.unwrap();
        assert_eq!(joined.sender, placeholder);
        assert_eq!(
            h.ctx.registry.lookup(&handle.id()).unwrap().as_str(),
            placeholder
        );
    }

    #[tokio::test]
    async fn test_submitted_name_kept_verbatim() {
        let mut h = harness();
        let (handle, client) = spawn_session(&h.ctx);
        let (read, mut write) = tokio::io::split(client);
        let mut read = BufReader::new(read);

        let mut line = String::new();
        read.read_line(&mut line).await.unwrap();
        write.write_all(b"  bob \r\n").await.unwrap();

        line.clear();
        read.read_line(&mut line).await.unwrap();
        assert_eq!(line, "Welcome to telchat   bob \r\n");
        assert_eq!(h.messages.recv().await.unwrap(), Message::joined("  bob "));
        assert_eq!(h.ctx.registry.lookup(&handle.id()).unwrap().as_str(), "  bob ");
    }

    #[tokio::test]
    async fn test_prompt_failure_never_registers() {
        let mut h = harness();
        let (server, client) = tokio::io::duplex(1024);
        drop(client);
        let (reader, writer) = tokio::io::split(server);
        let handle = ClientHandle::new(Box::new(writer), None, CancellationToken::new());

        handle_connection(handle.clone(), Box::new(reader), h.ctx.clone()).await;

        let dead = h.dead.recv().await.unwrap();
        assert_eq!(dead.id(), handle.id());
        assert_eq!(h.ctx.registry.count(), 0);
        assert!(h.ctx.registry.snapshot().is_empty());
        assert!(h.messages.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_during_handshake_reports_dead() {
        let mut h = harness();
        let (handle, client) = spawn_session(&h.ctx);
        let mut read = BufReader::new(client);

        let mut prompt = String::new();
        read.read_line(&mut prompt).await.unwrap();
        drop(read);

        let dead = h.dead.recv().await.unwrap();
        assert_eq!(dead.id(), handle.id());
        assert!(h.ctx.registry.lookup(&handle.id()).is_none());
        assert_eq!(handle.state(), SessionState::Connecting);
    }

    #[tokio::test]
    async fn test_released_handle_ends_read_loop() {
        let mut h = harness();
        let (handle, client) = spawn_session(&h.ctx);
        let (read, mut write) = tokio::io::split(client);
        let mut read = BufReader::new(read);

        let mut line = String::new();
        read.read_line(&mut line).await.unwrap();
        write.write_all(b"alice\n").await.unwrap();
        h.messages.recv().await.unwrap();

        handle.closed_token().cancel();

        let dead = h.dead.recv().await.unwrap();
        assert_eq!(dead.id(), handle.id());
    }

    #[tokio::test]
    async fn test_overlong_line_is_terminal() {
        let mut h = harness();
        let (handle, client) = spawn_session(&h.ctx);
        let (read, mut write) = tokio::io::split(client);
        let mut read = BufReader::new(read);

        let mut line = String::new();
        read.read_line(&mut line).await.unwrap();
        write.write_all(b"alice\n").await.unwrap();
        h.messages.recv().await.unwrap();

        let long = format!("{}\n", "x".repeat(200));
        write.write_all(long.as_bytes()).await.unwrap();

        let dead = h.dead.recv().await.unwrap();
        assert_eq!(dead.id(), handle.id());
        assert!(h.messages.try_recv().is_err());
    }
}
