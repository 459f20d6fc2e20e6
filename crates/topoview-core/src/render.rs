//! The rendering collaborator.
//!
//! Layout and drawing happen outside this crate. The core only hands batches
//! of mutations to a [`Renderer`] and occasionally asks it to fit the view.

use parking_lot::Mutex;

use crate::entity::{EdgeMutation, NodeMutation};

/// Consumer of batched graph mutations.
///
/// Implementations apply each mutation as an id-keyed upsert, in order, so a
/// later mutation for the same id overrides an earlier one.
pub trait Renderer: Send + Sync {
    /// Add or update a batch of nodes.
    fn add_or_update_nodes(&self, nodes: Vec<NodeMutation>);

    /// Add or update a batch of edges.
    fn add_or_update_edges(&self, edges: Vec<EdgeMutation>);

    /// Fit the viewport to the current graph.
    fn fit_view(&self);
}

/// One call received by a [`RecordingRenderer`].
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCall {
    /// `add_or_update_nodes`
    Nodes(Vec<NodeMutation>),
    /// `add_or_update_edges`
    Edges(Vec<EdgeMutation>),
    /// `fit_view`
    FitView,
}

/// A renderer that records every call, for headless runs and tests.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    calls: Mutex<Vec<RenderCall>>,
}

impl RecordingRenderer {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All calls received so far, in order.
    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().clone()
    }

    /// Remove and return the recorded calls.
    pub fn take_calls(&self) -> Vec<RenderCall> {
        std::mem::take(&mut *self.calls.lock())
    }

    /// Every node mutation received, flattened across batches.
    pub fn nodes(&self) -> Vec<NodeMutation> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                RenderCall::Nodes(nodes) => Some(nodes.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Every edge mutation received, flattened across batches.
    pub fn edges(&self) -> Vec<EdgeMutation> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                RenderCall::Edges(edges) => Some(edges.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Number of `fit_view` calls.
    pub fn fit_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, RenderCall::FitView))
            .count()
    }
}

impl Renderer for RecordingRenderer {
    fn add_or_update_nodes(&self, nodes: Vec<NodeMutation>) {
        self.calls.lock().push(RenderCall::Nodes(nodes));
    }

    fn add_or_update_edges(&self, edges: Vec<EdgeMutation>) {
        self.calls.lock().push(RenderCall::Edges(edges));
    }

    fn fit_view(&self) {
        self.calls.lock().push(RenderCall::FitView);
    }
}
