//! Topoview - a live network-topology view driven by an event feed.
//!
//! This is the main crate: it re-exports the core systems and adds the
//! dashboard handlers, the session configuration and the session loop.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use topoview::{RecordingRenderer, Session, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionConfig::from_file("topoview.toml")?;
//!     let renderer = Arc::new(RecordingRenderer::new());
//!
//!     let mut session = Session::new(config, renderer)?;
//!     let stats = session
//!         .run(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!     println!("{stats:?}");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod handlers;
pub mod session;

pub use topoview_core::*;

/// Connection to the topology source.
pub mod net {
    pub use topoview_net::*;
}

pub use config::{ConfigError, SessionConfig};
pub use handlers::{DashboardContext, DashboardStyle};
pub use session::{Session, SessionError, SessionStats};
