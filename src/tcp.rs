//! TCP listener
//!
//! Accepts raw line-oriented connections and hands each one to the relay's
//! new-connection stream. Accept errors stay here; the relay only ever sees
//! successfully accepted streams.

use std::net::SocketAddr;

use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::client::Connection;
use crate::error::RelayError;

/// A bound TCP listener that feeds connections into the relay
pub struct TcpListenerTask {
    listener: TcpListener,
}

impl TcpListenerTask {
    /// Bind the listener without accepting yet
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` is cancelled or the relay goes away
    pub async fn run(self, new_connections: mpsc::Sender<Connection>, shutdown: CancellationToken) {
        let addr = self.listener.local_addr().ok();
        info!(address = ?addr, "TCP listener accepting connections");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("stopping TCP listener...");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "accepted connection");
                        if new_connections.send(Connection::from_tcp(stream)).await.is_err() {
                            info!("relay closed, stopping TCP listener");
                            break;
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "failed to accept connection");
                    }
                },
            }
        }
    }
}
