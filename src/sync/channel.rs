use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::select;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::backend::PushEnvelope;
use crate::common::error::EscrowError;
use crate::trade::TradeRecord;

/// Fixed reconnection delay. No backoff growth and no retry cap - a trade's
/// duration is bounded by its own expiry, not by the channel's retry policy.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// One push subscription, as the sync channel consumes it.
#[async_trait]
pub trait PushStream: Send {
    /// Next text payload, or `None` once the channel has closed.
    async fn next_message(&mut self) -> Option<String>;
}

/// Connection seam for the push channel, so the reconnect loop can be
/// exercised without a live server.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn subscribe(&self, url: &Url) -> Result<Box<dyn PushStream>, EscrowError>;
}

/// Production transport over a WebSocket connection.
pub struct WsTransport;

#[async_trait]
impl PushTransport for WsTransport {
    async fn subscribe(&self, url: &Url) -> Result<Box<dyn PushStream>, EscrowError> {
        let (stream, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
        Ok(Box::new(WsStream { inner: stream }))
    }
}

struct WsStream {
    inner: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
}

#[async_trait]
impl PushStream for WsStream {
    async fn next_message(&mut self) -> Option<String> {
        loop {
            match self.inner.next().await {
                Some(Ok(Message::Text(text))) => return Some(text),
                Some(Ok(Message::Close(_))) | None => return None,
                // Control frames carry no trade updates
                Some(Ok(_)) => continue,
                Some(Err(error)) => {
                    debug!("Push stream errored - {}", error);
                    return None;
                }
            }
        }
    }
}

/// What the channel reports upward. `Connected` fires on every successful
/// (re)subscribe so the owner can run a catch-up fetch to close any delivery
/// gap - the channel offers no replay of missed messages.
#[derive(Debug)]
pub(crate) enum SyncEvent {
    Connected,
    Update(TradeRecord),
}

/// Keeps the orchestrator's cached record fresh: one live subscription per
/// trade, reconnecting forever on closure, torn down when the trade view is
/// exited. A reconnect never clears cached state - it only resumes delivery.
pub(crate) struct SyncChannel {
    shutdown_tx: watch::Sender<bool>,
    task_handle: tokio::task::JoinHandle<()>,
}

impl SyncChannel {
    pub(crate) fn start(
        trade_id: Uuid,
        ws_url: Url,
        transport: Arc<dyn PushTransport>,
        event_tx: mpsc::Sender<SyncEvent>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let actor = SyncActor {
            trade_id,
            ws_url,
            transport,
            event_tx,
            shutdown_rx,
        };
        let task_handle = tokio::spawn(async move { actor.run().await });
        Self {
            shutdown_tx,
            task_handle,
        }
    }

    pub(crate) fn terminate(self) {
        let _ = self.shutdown_tx.send(true);
        self.task_handle.abort();
    }
}

struct SyncActor {
    trade_id: Uuid,
    ws_url: Url,
    transport: Arc<dyn PushTransport>,
    event_tx: mpsc::Sender<SyncEvent>,
    shutdown_rx: watch::Receiver<bool>,
}

impl SyncActor {
    async fn run(mut self) {
        loop {
            let mut stream = select! {
                result = self.transport.subscribe(&self.ws_url) => match result {
                    Ok(stream) => {
                        debug!("Push channel for trade {} connected", self.trade_id);
                        if self.event_tx.send(SyncEvent::Connected).await.is_err() {
                            break;
                        }
                        stream
                    }
                    Err(error) => {
                        // Subscribe failures retry silently
                        debug!(
                            "Push channel for trade {} failed to connect - {}",
                            self.trade_id, error
                        );
                        if self.sleep_or_shutdown().await {
                            break;
                        }
                        continue;
                    }
                },
                _ = self.shutdown_rx.changed() => break,
            };

            let shutting_down = loop {
                select! {
                    message = stream.next_message() => match message {
                        Some(payload) => self.handle_payload(payload).await,
                        None => break false,
                    },
                    _ = self.shutdown_rx.changed() => break true,
                }
            };
            if shutting_down {
                break;
            }

            info!(
                "Push channel for trade {} closed, reconnecting in {:?}",
                self.trade_id, RECONNECT_DELAY
            );
            if self.sleep_or_shutdown().await {
                break;
            }
        }
        debug!("Sync channel for trade {} terminating", self.trade_id);
    }

    /// True when the owner tore the channel down during the wait.
    async fn sleep_or_shutdown(&mut self) -> bool {
        select! {
            _ = tokio::time::sleep(RECONNECT_DELAY) => false,
            _ = self.shutdown_rx.changed() => true,
        }
    }

    async fn handle_payload(&self, payload: String) {
        match serde_json::from_str::<PushEnvelope>(&payload) {
            Ok(PushEnvelope::TradeUpdate { trade }) => {
                let _ = self.event_tx.send(SyncEvent::Update(trade)).await;
            }
            Ok(PushEnvelope::Unknown) => {
                debug!(
                    "Push channel for trade {} ignoring unrecognized envelope",
                    self.trade_id
                );
            }
            Err(error) => {
                warn!(
                    "Push channel for trade {} dropping malformed payload - {}",
                    self.trade_id, error
                );
            }
        }
    }
}
