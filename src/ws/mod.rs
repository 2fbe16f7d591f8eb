//! Event transport
//!
//! One shared WebSocket connection multiplexed over many subscribers, with
//! fixed-delay reconnection, idle disconnect and ping/pong liveness.

mod client;
mod envelope;
mod shared;
mod types;

pub use client::{Connector, Session, WsConnector};
pub use envelope::Envelope;
pub use shared::{Handler, SharedConnection, Subscription};
pub use types::{ConnectionState, TransportStatus, WsConfig, WsError, WsMessage};
