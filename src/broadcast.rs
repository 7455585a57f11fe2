//! Message fan-out
//!
//! One broadcast writes one rendered message to every handle in a registry
//! snapshot. Each write runs in its own task; a failed write reports that
//! handle as dead without affecting its siblings, and the broadcast
//! completes only after every write has finished.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn, Instrument};

use crate::client::ClientHandle;
use crate::error::RelayError;
use crate::message::Message;
use crate::registry::Registry;

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BroadcastReport {
    /// Handles in the snapshot (write attempts made)
    pub attempted: usize,
    /// Writes that failed or timed out
    pub failed: usize,
}

/// Deliver `message` to every registered client
///
/// Failed handles are pushed into `dead_connections`, once per failure.
pub async fn broadcast(
    message: Message,
    registry: &Registry,
    dead_connections: &mpsc::Sender<ClientHandle>,
    write_timeout: Duration,
) -> BroadcastReport {
    let recipients = registry.snapshot();
    let line = message.render();

    let mut writes = JoinSet::new();
    for handle in recipients.iter().cloned() {
        let line = line.clone();
        writes.spawn(
            async move {
                let result = deliver(&handle, &line, write_timeout).await;
                (handle, result)
            }
            .in_current_span(),
        );
    }

    let mut report = BroadcastReport {
        attempted: recipients.len(),
        failed: 0,
    };

    while let Some(joined) = writes.join_next().await {
        let (handle, result) = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "delivery task failed");
                report.failed += 1;
                continue;
            }
        };

        match result {
            Ok(()) => {
                debug!(
                    receiver = ?registry.lookup(&handle.id()).map(|n| n.into_string()),
                    sender = %message.sender,
                    "sent message"
                );
            }
            Err(e) => {
                report.failed += 1;
                debug!(client_id = %handle.id(), error = %e, "delivery failed");
                if dead_connections.send(handle).await.is_err() {
                    debug!("relay stopped, dropping dead-connection event");
                }
            }
        }
    }

    info!(
        message = %message.message.trim_end(),
        sender = %message.sender,
        recipients = report.attempted,
        failed = report.failed,
        "sent message to all clients"
    );

    report
}

/// Write one line to one handle, bounded by `write_timeout`
async fn deliver(handle: &ClientHandle, line: &str, write_timeout: Duration) -> Result<(), RelayError> {
    match tokio::time::timeout(write_timeout, handle.write_line(line)).await {
        Ok(result) => result,
        Err(_) => Err(RelayError::WriteTimeout),
    }
}
