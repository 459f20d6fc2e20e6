//! Coalescing buffer between message handlers and the renderer.
//!
//! Handlers append mutations as messages arrive; a periodic flush hands
//! everything accumulated since the previous flush to the [`Renderer`] as one
//! batch per kind. The pending sequences are swapped out under a single lock,
//! so an enqueue racing with a flush lands either in the batch being flushed or
//! in the next one, never in both and never in neither.

use parking_lot::Mutex;

use crate::entity::{EdgeMutation, NodeMutation};
use crate::logging::targets;
use crate::render::Renderer;

#[derive(Debug, Default)]
struct Pending {
    nodes: Vec<NodeMutation>,
    edges: Vec<EdgeMutation>,
}

/// Mutations taken out of the buffer by one flush.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Batch {
    /// Node mutations in enqueue order.
    pub nodes: Vec<NodeMutation>,
    /// Edge mutations in enqueue order.
    pub edges: Vec<EdgeMutation>,
}

impl Batch {
    /// Whether the batch holds no mutation.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// What a flush delivered.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    /// Node mutations handed to the renderer.
    pub nodes: usize,
    /// Edge mutations handed to the renderer.
    pub edges: usize,
}

impl FlushReport {
    /// Whether the renderer was called at all.
    pub fn is_empty(&self) -> bool {
        self.nodes == 0 && self.edges == 0
    }
}

/// Pending node and edge mutations awaiting the next flush.
#[derive(Debug, Default)]
pub struct UpdateBuffer {
    pending: Mutex<Pending>,
}

impl UpdateBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node mutation. No merge by id takes place.
    pub fn enqueue_node(&self, mutation: NodeMutation) {
        self.pending.lock().nodes.push(mutation);
    }

    /// Append an edge mutation. No merge by id takes place.
    pub fn enqueue_edge(&self, mutation: EdgeMutation) {
        self.pending.lock().edges.push(mutation);
    }

    /// Take every pending mutation, leaving the buffer empty.
    pub fn take(&self) -> Batch {
        let mut pending = self.pending.lock();
        Batch {
            nodes: std::mem::take(&mut pending.nodes),
            edges: std::mem::take(&mut pending.edges),
        }
    }

    /// Hand pending mutations to `renderer`, one call per non-empty kind.
    ///
    /// Nodes are delivered before edges so that edge endpoints exist when the
    /// edges arrive. The renderer is called outside the lock.
    #[tracing::instrument(skip_all, target = "topoview_core::buffer", level = "trace")]
    pub fn flush(&self, renderer: &dyn Renderer) -> FlushReport {
        let batch = self.take();
        let report = FlushReport {
            nodes: batch.nodes.len(),
            edges: batch.edges.len(),
        };

        if !batch.nodes.is_empty() {
            renderer.add_or_update_nodes(batch.nodes);
        }
        if !batch.edges.is_empty() {
            renderer.add_or_update_edges(batch.edges);
        }

        if !report.is_empty() {
            tracing::trace!(target: targets::BUFFER, nodes = report.nodes, edges = report.edges, "flushed");
        }
        report
    }

    /// Number of pending node mutations.
    pub fn pending_nodes(&self) -> usize {
        self.pending.lock().nodes.len()
    }

    /// Number of pending edge mutations.
    pub fn pending_edges(&self) -> usize {
        self.pending.lock().edges.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        let pending = self.pending.lock();
        pending.nodes.is_empty() && pending.edges.is_empty()
    }
}
