//! Networking for Topoview.
//!
//! This crate provides the connection to the topology source:
//!
//! - **Transport**: a WebSocket client that reconnects after a fixed delay
//!   whenever the connection drops, and delivers frames as events
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use topoview_core::Query;
//! use topoview_net::transport::{Transport, TransportConfig, TransportEvent};
//!
//! # async fn run() -> topoview_net::Result<()> {
//! let config = TransportConfig::new("ws://127.0.0.1:9000")
//!     .reconnect_delay(Duration::from_secs(2));
//! let (transport, mut events) = Transport::new(config);
//! transport.open()?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         TransportEvent::Opened => transport.send(&Query::select("node"))?,
//!         TransportEvent::Frame(text) => println!("{text}"),
//!         TransportEvent::Closed { .. } => println!("connection lost"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod error;
pub mod transport;

pub use error::{NetworkError, Result};
pub use transport::{ConnectionState, Transport, TransportConfig, TransportEvent, TransportEvents};
