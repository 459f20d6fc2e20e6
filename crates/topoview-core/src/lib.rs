//! Core systems for Topoview.
//!
//! This crate holds everything of the live topology view that does not touch
//! the network:
//!
//! - **Query Protocol**: outbound [`Query`] values and inbound [`Message`] frames
//! - **Dispatcher**: routes messages to handlers keyed by (action, entity kind)
//! - **Entity Registry**: id↔name and interface→node resolution
//! - **Update Buffer**: coalesces node and edge mutations between flushes
//! - **Renderer**: the trait the buffer flushes into
//! - **Timers**: one-shot and repeating timers for the session loop
//!
//! # Example
//!
//! ```
//! use topoview_core::{
//!     Action, Dispatcher, EntityId, EntityRegistry, Message, NodeMutation, RecordingRenderer,
//!     RegistryMode, UpdateBuffer,
//! };
//!
//! struct State {
//!     registry: EntityRegistry,
//!     buffer: UpdateBuffer,
//! }
//!
//! let mut dispatcher = Dispatcher::<State>::new();
//! dispatcher.bind(Action::Update, "node", |state, msg| {
//!     let id = state.registry.resolve_by_filter(&msg.filter)?;
//!     state.buffer.enqueue_node(NodeMutation::new(id).image("img/router.png"));
//!     Ok(())
//! });
//!
//! let mut state = State {
//!     registry: EntityRegistry::new(RegistryMode::Permissive),
//!     buffer: UpdateBuffer::new(),
//! };
//! state.registry.register_node(EntityId::Int(5), "r1", ["eth0"]).unwrap();
//!
//! let frame = r#"{"action":"update","object_name":"node","filter":[["name","==","r1"]]}"#;
//! dispatcher.dispatch(&mut state, &Message::decode(frame).unwrap());
//!
//! let renderer = RecordingRenderer::new();
//! state.buffer.flush(&renderer);
//! assert_eq!(renderer.nodes()[0].image.as_deref(), Some("img/router.png"));
//! ```

pub mod buffer;
pub mod dispatcher;
pub mod entity;
mod error;
pub mod logging;
pub mod protocol;
pub mod registry;
pub mod render;
pub mod timer;

pub use buffer::{Batch, FlushReport, UpdateBuffer};
pub use dispatcher::{DispatchKey, DispatchReport, Dispatcher, HandlerError, HandlerResult};
pub use entity::{EdgeMutation, EntityId, Font, LabelAlign, NodeMutation, Position};
pub use error::{CoreError, Result, TimerError};
pub use logging::PerfSpan;
pub use protocol::{
    Action, CONNECTION_KIND, EntityKind, Filter, Message, Operator, Predicate, Query, WireQuery,
};
pub use registry::{EntityRegistry, RegistryMode};
pub use render::{RecordingRenderer, RenderCall, Renderer};
pub use timer::{TimerId, TimerKind, TimerManager};
