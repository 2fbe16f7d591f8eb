//! Shared, reference-counted connection
//!
//! Many logical subscribers share one physical socket. The socket opens
//! lazily on the first subscriber, closes after an idle grace period once the
//! last one leaves, and reconnects after a fixed delay while anyone is still
//! listening. All of this runs in a single actor task; subscribers talk to it
//! over a command channel, so no locks are involved.

use super::client::{Connector, Session};
use super::envelope::Envelope;
use super::types::{ConnectionState, TransportStatus, WsConfig, WsError, WsMessage};
use crate::telemetry::{increment, CounterMetric};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, Sleep};

/// Subscriber callback, invoked synchronously for every envelope
pub type Handler = Arc<dyn Fn(&Envelope) -> anyhow::Result<()> + Send + Sync>;

enum Command {
    Subscribe { id: u64, handler: Handler },
    Unsubscribe { id: u64 },
}

/// Handle to the shared connection; cheap to clone and pass around
#[derive(Clone)]
pub struct SharedConnection {
    commands: mpsc::UnboundedSender<Command>,
    next_id: Arc<AtomicU64>,
    status: watch::Receiver<TransportStatus>,
}

impl SharedConnection {
    /// Start the connection manager; no socket is opened until someone subscribes
    pub fn spawn<C: Connector>(config: WsConfig, connector: C) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(TransportStatus::default());

        let actor = ConnectionActor {
            config,
            connector,
            commands: commands_rx,
            subscribers: BTreeMap::new(),
            session: None,
            state: ConnectionState::Idle,
            reconnect_timer: None,
            idle_timer: None,
            reconnect_attempts: 0,
            last_message_at: None,
            status: status_tx,
        };
        tokio::spawn(actor.run());

        Self {
            commands: commands_tx,
            next_id: Arc::new(AtomicU64::new(1)),
            status: status_rx,
        }
    }

    /// Register a subscriber; it stays registered until the handle drops
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Envelope) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let _ = self.commands.send(Command::Subscribe {
            id,
            handler: Arc::new(handler),
        });
        Subscription {
            id,
            commands: self.commands.clone(),
        }
    }

    /// Watch channel carrying the latest transport status
    pub fn status(&self) -> watch::Receiver<TransportStatus> {
        self.status.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }
}

/// RAII subscription; dropping it unsubscribes
pub struct Subscription {
    id: u64,
    commands: mpsc::UnboundedSender<Command>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Explicit unsubscribe, same as dropping the handle
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Unsubscribe { id: self.id });
    }
}

enum Step {
    Command(Option<Command>),
    Session(Option<WsMessage>),
    ReconnectDue,
    IdleExpired,
}

struct ConnectionActor<C> {
    config: WsConfig,
    connector: C,
    commands: mpsc::UnboundedReceiver<Command>,
    subscribers: BTreeMap<u64, Handler>,
    session: Option<Session>,
    state: ConnectionState,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
    idle_timer: Option<Pin<Box<Sleep>>>,
    reconnect_attempts: u32,
    last_message_at: Option<DateTime<Utc>>,
    status: watch::Sender<TransportStatus>,
}

impl<C: Connector> ConnectionActor<C> {
    async fn run(mut self) {
        loop {
            let step = tokio::select! {
                cmd = self.commands.recv() => Step::Command(cmd),
                msg = next_message(&mut self.session) => Step::Session(msg),
                _ = fire(&mut self.reconnect_timer) => Step::ReconnectDue,
                _ = fire(&mut self.idle_timer) => Step::IdleExpired,
            };

            match step {
                Step::Command(None) => break,
                Step::Command(Some(Command::Subscribe { id, handler })) => {
                    self.on_subscribe(id, handler)
                }
                Step::Command(Some(Command::Unsubscribe { id })) => self.on_unsubscribe(id),
                Step::Session(msg) => self.on_session_message(msg),
                Step::ReconnectDue => {
                    self.reconnect_timer = None;
                    self.on_reconnect_due();
                }
                Step::IdleExpired => {
                    self.idle_timer = None;
                    self.on_idle_expired();
                }
            }

            self.publish_status();
        }

        tracing::debug!("All connection handles dropped, stopping connection manager");
    }

    fn on_subscribe(&mut self, id: u64, handler: Handler) {
        self.subscribers.insert(id, handler);
        tracing::debug!(subscriber = id, total = self.subscribers.len(), "Subscriber added");

        if self.idle_timer.take().is_some() {
            tracing::debug!("Resubscribed within idle grace, keeping socket");
        }

        if self.session.is_none() && self.reconnect_timer.is_none() {
            self.open_session();
        }
    }

    fn on_unsubscribe(&mut self, id: u64) {
        if self.subscribers.remove(&id).is_none() {
            return;
        }
        tracing::debug!(subscriber = id, total = self.subscribers.len(), "Subscriber removed");

        if !self.subscribers.is_empty() {
            return;
        }

        if self.reconnect_timer.take().is_some() {
            tracing::info!("No subscribers left, cancelling reconnect");
        }

        if self.session.is_some() {
            self.idle_timer = Some(Box::pin(sleep(self.config.idle_close_delay)));
        } else {
            self.state = ConnectionState::Idle;
        }
    }

    fn on_session_message(&mut self, msg: Option<WsMessage>) {
        match msg {
            Some(WsMessage::Connected) => {
                tracing::info!(url = %self.config.url, "Shared connection open");
                self.state = ConnectionState::Open;
                self.reconnect_attempts = 0;
            }
            Some(WsMessage::Text(text)) => self.deliver(&text),
            Some(WsMessage::Binary(data)) => match String::from_utf8(data) {
                Ok(text) => self.deliver(&text),
                Err(_) => tracing::debug!("Dropping non UTF-8 binary frame"),
            },
            Some(WsMessage::Closed) | None => self.on_disconnect(ConnectionState::Closed, None),
            Some(WsMessage::Failed(e)) => self.on_disconnect(ConnectionState::Errored, Some(e)),
        }
    }

    fn on_disconnect(&mut self, state: ConnectionState, error: Option<WsError>) {
        self.session = None;
        self.idle_timer = None;

        if self.subscribers.is_empty() {
            self.state = ConnectionState::Idle;
            return;
        }

        self.state = state;
        self.reconnect_attempts += 1;
        increment(CounterMetric::Reconnects, 1);
        tracing::warn!(
            error = ?error,
            attempt = self.reconnect_attempts,
            delay_ms = self.config.reconnect_delay.as_millis() as u64,
            "Shared connection lost, scheduling reconnect"
        );
        self.reconnect_timer = Some(Box::pin(sleep(self.config.reconnect_delay)));
    }

    fn on_reconnect_due(&mut self) {
        if self.subscribers.is_empty() || self.session.is_some() {
            return;
        }
        tracing::info!(attempt = self.reconnect_attempts, "Reconnecting shared connection");
        self.open_session();
    }

    fn on_idle_expired(&mut self) {
        if !self.subscribers.is_empty() {
            return;
        }
        tracing::info!("Idle grace elapsed, closing shared connection");
        self.session = None;
        self.state = ConnectionState::Idle;
    }

    fn open_session(&mut self) {
        self.session = Some(self.connector.open());
        self.state = ConnectionState::Connecting;
    }

    /// Normalize one frame and fan it out to every current subscriber
    fn deliver(&mut self, text: &str) {
        let now = Utc::now();
        let Some(envelope) = Envelope::parse(text, now) else {
            tracing::debug!(preview = %text.chars().take(100).collect::<String>(), "Dropping non-JSON frame");
            increment(CounterMetric::FramesDropped, 1);
            return;
        };
        self.last_message_at = Some(now);
        increment(CounterMetric::FramesReceived, 1);

        for (id, handler) in &self.subscribers {
            match catch_unwind(AssertUnwindSafe(|| handler(&envelope))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    increment(CounterMetric::SubscriberFailures, 1);
                    tracing::warn!(subscriber = id, kind = %envelope.kind, error = %e, "Subscriber failed");
                }
                Err(_) => {
                    increment(CounterMetric::SubscriberFailures, 1);
                    tracing::error!(subscriber = id, kind = %envelope.kind, "Subscriber panicked");
                }
            }
        }
    }

    fn publish_status(&self) {
        self.status.send_replace(TransportStatus {
            state: self.state,
            subscribers: self.subscribers.len(),
            reconnect_attempts: self.reconnect_attempts,
            last_message_at: self.last_message_at,
        });
    }
}

async fn next_message(session: &mut Option<Session>) -> Option<WsMessage> {
    match session {
        Some(session) => session.recv().await,
        None => std::future::pending().await,
    }
}

async fn fire(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => std::future::pending().await,
    }
}
