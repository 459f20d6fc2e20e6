//! Topoview live view
//!
//! Connects to a topology source and logs every batch the view would draw.
//! An optional argument names a TOML config file.
//!
//! Run with: cargo run -p topoview --example live_view -- topoview.toml
//! Logs are filtered with RUST_LOG, e.g. RUST_LOG=topoview=debug,topoview_net=debug

use std::sync::Arc;

use topoview::{EdgeMutation, NodeMutation, Renderer, Session, SessionConfig};
use tracing_subscriber::EnvFilter;

/// A renderer that only logs what it receives.
struct LogRenderer;

impl Renderer for LogRenderer {
    fn add_or_update_nodes(&self, nodes: Vec<NodeMutation>) {
        for node in &nodes {
            tracing::info!(
                target: "live_view",
                id = %node.id,
                label = node.label.as_deref().unwrap_or(""),
                image = node.image.as_deref().unwrap_or(""),
                "node"
            );
        }
    }

    fn add_or_update_edges(&self, edges: Vec<EdgeMutation>) {
        for edge in &edges {
            tracing::info!(
                target: "live_view",
                id = %edge.id,
                from = ?edge.from,
                to = ?edge.to,
                label = edge.label.as_deref().unwrap_or(""),
                "edge"
            );
        }
    }

    fn fit_view(&self) {
        tracing::info!(target: "live_view", "fit view");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => SessionConfig::from_file(path)?,
        None => SessionConfig::default(),
    };
    tracing::info!(target: "live_view", url = %config.url, "starting");

    let mut session = Session::new(config, Arc::new(LogRenderer))?;
    let stats = session
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    println!("{stats:#?}");
    Ok(())
}
