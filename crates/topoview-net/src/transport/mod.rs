//! Self-reconnecting WebSocket transport.
//!
//! The [`Transport`] owns one connection to the topology source. Socket I/O
//! runs on its own tokio task; everything it observes reaches the owner as
//! [`TransportEvent`]s on an unbounded channel, in arrival order.

mod client;
mod config;
mod state;

pub use client::{Transport, TransportEvent, TransportEvents};
pub use config::{DEFAULT_RECONNECT_DELAY, DEFAULT_URL, TransportConfig};
pub use state::{CloseCode, ConnectionState};
