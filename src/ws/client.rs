//! Physical WebSocket sessions

use super::types::{WsConfig, WsError, WsMessage};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Produces physical socket sessions for the shared connection
///
/// Each call to [`Connector::open`] starts one connection attempt. The
/// connection manager owns reconnection; a connector never retries.
pub trait Connector: Send + 'static {
    fn open(&mut self) -> Session;
}

/// One physical socket: a stream of events, torn down on drop
pub struct Session {
    events: mpsc::Receiver<WsMessage>,
    task: Option<JoinHandle<()>>,
}

impl Session {
    /// Session whose socket runs in `task`
    pub fn new(events: mpsc::Receiver<WsMessage>, task: JoinHandle<()>) -> Self {
        Self {
            events,
            task: Some(task),
        }
    }

    /// Session fed by some other producer, e.g. an in-process channel
    pub fn detached(events: mpsc::Receiver<WsMessage>) -> Self {
        Self { events, task: None }
    }

    /// Next event; `None` once the socket side has gone away
    pub async fn recv(&mut self) -> Option<WsMessage> {
        self.events.recv().await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// tokio-tungstenite backed connector
pub struct WsConnector {
    config: WsConfig,
}

impl WsConnector {
    pub fn new(config: WsConfig) -> Self {
        Self { config }
    }

    /// Get the configured URL
    pub fn url(&self) -> &str {
        &self.config.url
    }
}

impl Connector for WsConnector {
    fn open(&mut self) -> Session {
        let (tx, rx) = mpsc::channel(self.config.buffer_size);
        let config = self.config.clone();

        let task = tokio::spawn(async move {
            let last = match connect_and_stream(&config, &tx).await {
                Ok(()) => WsMessage::Closed,
                Err(e) => {
                    tracing::warn!(error = %e, url = %config.url, "WebSocket session ended");
                    WsMessage::Failed(e)
                }
            };
            let _ = tx.send(last).await;
        });

        Session::new(rx, task)
    }
}

/// Connect to WebSocket and stream frames until close, error or heartbeat loss
async fn connect_and_stream(config: &WsConfig, tx: &mpsc::Sender<WsMessage>) -> Result<(), WsError> {
    tracing::info!(url = %config.url, "Connecting to WebSocket");

    let (ws_stream, _response) = connect_async(&config.url)
        .await
        .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;

    let (mut write, mut read) = ws_stream.split();

    tracing::info!("WebSocket connected");

    if tx.send(WsMessage::Connected).await.is_err() {
        return Ok(());
    }

    let mut ping_interval = tokio::time::interval(config.ping_interval);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // first tick completes immediately
    ping_interval.tick().await;

    let mut unanswered_pings: u32 = 0;

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if tx.send(WsMessage::Text(text)).await.is_err() {
                            tracing::debug!("Session dropped, closing socket");
                            return Ok(());
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        if tx.send(WsMessage::Binary(data)).await.is_err() {
                            tracing::debug!("Session dropped, closing socket");
                            return Ok(());
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        write.send(Message::Pong(data)).await
                            .map_err(|e| WsError::SendFailed(e.to_string()))?;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        unanswered_pings = 0;
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("Received close frame");
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(WsError::ConnectionFailed(e.to_string()));
                    }
                    None => {
                        return Err(WsError::StreamEnded);
                    }
                    _ => {}
                }
            }

            _ = ping_interval.tick() => {
                if unanswered_pings >= config.max_missed_pongs {
                    return Err(WsError::HeartbeatLost(unanswered_pings));
                }
                write.send(Message::Ping(vec![])).await
                    .map_err(|e| WsError::SendFailed(e.to_string()))?;
                unanswered_pings += 1;
            }
        }
    }
}
