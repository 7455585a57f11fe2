//! HTTP message endpoint
//!
//! `POST /message` takes `{"message": ..., "sender": ...}` and pushes it
//! straight into the relay's outbound stream. No handshake happens and no
//! registry entry is created for the sender.

use std::net::SocketAddr;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::RelayError;
use crate::message::Message;

/// Build the endpoint router around the relay's message sender
pub fn router(messages: mpsc::Sender<Message>) -> Router {
    Router::new()
        .route("/message", post(post_message))
        .with_state(messages)
}

async fn post_message(
    State(messages): State<mpsc::Sender<Message>>,
    Json(message): Json<Message>,
) -> (StatusCode, &'static str) {
    info!(
        message = %message.message,
        sender = %message.sender,
        "received message via http POST"
    );

    match messages.send(message).await {
        Ok(()) => (StatusCode::OK, "sent\n"),
        Err(_) => {
            warn!("relay closed, rejecting message");
            (StatusCode::SERVICE_UNAVAILABLE, "relay unavailable\n")
        }
    }
}

/// A bound HTTP listener serving the message endpoint
pub struct HttpListener {
    listener: TcpListener,
}

impl HttpListener {
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `shutdown` is cancelled
    pub async fn run(
        self,
        messages: mpsc::Sender<Message>,
        shutdown: CancellationToken,
    ) -> Result<(), RelayError> {
        info!(address = ?self.listener.local_addr().ok(), "HTTP listener accepting connections");

        axum::serve(self.listener, router(messages))
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                info!("stopping HTTP listener...");
            })
            .await?;

        Ok(())
    }
}
