//! Transporter event loop
//!
//! The relay's single coordination point. It owns three input streams:
//! new connections, outbound messages and dead connections, and dispatches
//! each event to a spawned task so the loop itself never waits on client I/O.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, info_span, Instrument, Span};

use crate::broadcast::broadcast;
use crate::client::{ClientHandle, Connection};
use crate::error::SendError;
use crate::handler::{handle_connection, SessionContext};
use crate::message::Message;
use crate::registry::Registry;

/// Channel buffer size for each input stream
const CHANNEL_BUFFER_SIZE: usize = 256;

/// Tunables for the transporter
#[derive(Debug, Clone)]
pub struct TransporterSettings {
    /// Upper bound on a single broadcast write to one client
    pub write_timeout: Duration,
    /// Longest inbound line accepted from a client, in bytes
    pub max_line_length: usize,
}

impl Default for TransporterSettings {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_secs(10),
            max_line_length: 4096,
        }
    }
}

/// Cheap-to-clone handle for feeding and stopping a running `Transporter`
#[derive(Clone)]
pub struct TransporterHandle {
    new_connections: mpsc::Sender<Connection>,
    messages: mpsc::Sender<Message>,
    registry: Arc<Registry>,
    shutdown: CancellationToken,
}

impl TransporterHandle {
    /// Sender listeners push accepted connections into
    pub fn new_connections(&self) -> mpsc::Sender<Connection> {
        self.new_connections.clone()
    }

    /// Sender for one-shot messages that bypass the handshake
    pub fn messages(&self) -> mpsc::Sender<Message> {
        self.messages.clone()
    }

    /// Hand a connection to the relay
    pub async fn connect(&self, connection: Connection) -> Result<(), SendError> {
        self.new_connections
            .send(connection)
            .await
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Submit a message for broadcast
    pub async fn submit(&self, message: Message) -> Result<(), SendError> {
        self.messages
            .send(message)
            .await
            .map_err(|_| SendError::ChannelClosed)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Ask the loop to stop; `run` returns once in-flight broadcasts finish
    pub fn stop(&self) {
        info!("stopping transporter...");
        self.shutdown.cancel();
    }
}

/// The relay event loop
pub struct Transporter {
    registry: Arc<Registry>,
    settings: TransporterSettings,
    new_connections: mpsc::Receiver<Connection>,
    messages: mpsc::Receiver<Message>,
    dead_connections: mpsc::Receiver<ClientHandle>,
    messages_tx: mpsc::Sender<Message>,
    dead_tx: mpsc::Sender<ClientHandle>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    span: Span,
}

impl Transporter {
    /// Create a transporter and the handle used to drive it
    pub fn new(settings: TransporterSettings) -> (Self, TransporterHandle) {
        let (conn_tx, conn_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let (msg_tx, msg_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let (dead_tx, dead_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let registry = Arc::new(Registry::new());
        let shutdown = CancellationToken::new();

        let handle = TransporterHandle {
            new_connections: conn_tx,
            messages: msg_tx.clone(),
            registry: Arc::clone(&registry),
            shutdown: shutdown.clone(),
        };

        let transporter = Self {
            registry,
            settings,
            new_connections: conn_rx,
            messages: msg_rx,
            dead_connections: dead_rx,
            messages_tx: msg_tx,
            dead_tx,
            shutdown,
            tracker: TaskTracker::new(),
            span: info_span!("transporter"),
        };

        (transporter, handle)
    }

    /// Run the event loop until `TransporterHandle::stop` is called
    ///
    /// On stop, no further connections are dispatched, live sessions are
    /// released and the call waits for in-flight broadcasts to finish.
    pub async fn run(mut self) {
        let span = self.span.clone();
        async {
            info!("transporter started");

            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => break,
                    Some(connection) = self.new_connections.recv() => {
                        self.dispatch_connection(connection);
                    }
                    Some(message) = self.messages.recv() => {
                        self.dispatch_broadcast(message);
                    }
                    Some(handle) = self.dead_connections.recv() => {
                        self.handle_dead_connection(handle);
                    }
                }
            }

            // Stop accepting before draining; session tokens are children of
            // the shutdown token, so live read loops have already been released
            self.new_connections.close();
            debug!(sessions = self.registry.count(), "draining in-flight broadcasts");

            // Broadcasts still report failed writes while draining, so keep
            // consuming dead events or a full channel would stall them
            self.tracker.close();
            let drained = self.tracker.wait();
            tokio::pin!(drained);
            loop {
                tokio::select! {
                    _ = &mut drained => break,
                    Some(handle) = self.dead_connections.recv() => {
                        release_on_stop(&self.registry, handle);
                    }
                }
            }
            while let Ok(handle) = self.dead_connections.try_recv() {
                release_on_stop(&self.registry, handle);
            }
            info!("transporter stopped");
        }
        .instrument(span)
        .await
    }

    /// Start a lifecycle handler for a newly accepted connection
    fn dispatch_connection(&self, connection: Connection) {
        let Connection {
            reader,
            writer,
            peer,
        } = connection;
        let handle = ClientHandle::new(writer, peer, self.shutdown.child_token());
        debug!(client_id = %handle.id(), ?peer, "dispatching new connection");

        let ctx = SessionContext {
            registry: Arc::clone(&self.registry),
            messages: self.messages_tx.clone(),
            dead_connections: self.dead_tx.clone(),
            max_line_length: self.settings.max_line_length,
        };

        // Untracked: a session ends on I/O failure or when its child token is cancelled
        tokio::spawn(handle_connection(handle, reader, ctx).in_current_span());
    }

    /// Start a broadcast of one message
    fn dispatch_broadcast(&self, message: Message) {
        let registry = Arc::clone(&self.registry);
        let dead_tx = self.dead_tx.clone();
        let write_timeout = self.settings.write_timeout;

        self.tracker.spawn(
            async move {
                broadcast(message, &registry, &dead_tx, write_timeout).await;
            }
            .in_current_span(),
        );
    }

    /// Tear down a dead session and announce it to everyone else
    fn handle_dead_connection(&self, handle: ClientHandle) {
        let client_id = handle.id();
        if !handle.terminate() {
            debug!(%client_id, "session already terminated");
            return;
        }

        let name = self
            .registry
            .delete(&client_id)
            .map(|name| name.into_string())
            .unwrap_or_default();

        info!(
            %client_id,
            peer = ?handle.peer(),
            name = %name,
            clients = self.registry.count(),
            "client disconnected"
        );

        // Removed before the notice goes out so the departing client is not a recipient
        self.dispatch_broadcast(Message::disconnected(name));

        let close_timeout = self.settings.write_timeout;
        self.tracker.spawn(
            async move {
                if tokio::time::timeout(close_timeout, handle.close()).await.is_err() {
                    debug!(%client_id, "writer shutdown timed out");
                }
            }
            .in_current_span(),
        );
    }
}

/// Drop a dead session while stopping; nobody is left to hear a notice
fn release_on_stop(registry: &Registry, handle: ClientHandle) {
    if handle.terminate() {
        let name = registry.delete(&handle.id());
        debug!(client_id = %handle.id(), ?name, "released session during stop");
    }
}
