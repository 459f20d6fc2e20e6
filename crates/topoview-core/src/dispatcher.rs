//! Message dispatch keyed by (action, entity kind).
//!
//! A [`Dispatcher`] maps each [`DispatchKey`] to the handlers bound to it and
//! delivers a [`Message`] to every handler registered under the message's key,
//! in registration order. Handlers receive an explicit mutable context `C`
//! instead of capturing shared state, so the owner of the context decides where
//! it lives and which thread touches it.
//!
//! # Fault isolation
//!
//! A handler that returns an error or panics does not stop delivery: the
//! failure is logged, counted in the [`DispatchReport`], and the next handler
//! for the same key still runs.
//!
//! # Example
//!
//! ```
//! use topoview_core::dispatcher::Dispatcher;
//! use topoview_core::protocol::{Action, Message};
//!
//! let mut dispatcher = Dispatcher::<Vec<String>>::new();
//! dispatcher
//!     .bind(Action::Insert, "node", |log, msg| {
//!         log.push(format!("first {}", msg.kind));
//!         Ok(())
//!     })
//!     .bind(Action::Insert, "node", |log, _| {
//!         log.push("second".to_string());
//!         Ok(())
//!     });
//!
//! let mut log = Vec::new();
//! let report = dispatcher.dispatch(&mut log, &Message::new(Action::Insert, "node"));
//! assert_eq!(report.delivered, 2);
//! assert_eq!(log, vec!["first node", "second"]);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::error::CoreError;
use crate::logging::targets;
use crate::protocol::{Action, EntityKind, Message};

/// Error type handlers may return.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type of a handler invocation.
pub type HandlerResult = std::result::Result<(), HandlerError>;

type Handler<C> = Box<dyn Fn(&mut C, &Message) -> HandlerResult + Send + Sync>;

/// The routing key of a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DispatchKey {
    /// Message action.
    pub action: Action,
    /// Message entity kind.
    pub kind: EntityKind,
}

impl DispatchKey {
    /// Create a key.
    pub fn new(action: Action, kind: impl Into<EntityKind>) -> Self {
        Self {
            action,
            kind: kind.into(),
        }
    }

    /// The key a message is routed by.
    pub fn of(message: &Message) -> Self {
        Self {
            action: message.action,
            kind: message.kind.clone(),
        }
    }
}

impl fmt::Display for DispatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.kind)
    }
}

/// Outcome of a single dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers that completed successfully.
    pub delivered: usize,
    /// Handlers that returned an error or panicked.
    pub failed: usize,
    /// Failures that only rejected bad input (a subset of `failed`).
    pub dropped: usize,
}

impl DispatchReport {
    /// No handler was bound to the message's key.
    pub fn is_unmatched(&self) -> bool {
        self.delivered == 0 && self.failed == 0
    }
}

/// Routes messages to the handlers bound to their key.
pub struct Dispatcher<C> {
    handlers: HashMap<DispatchKey, Vec<Handler<C>>>,
}

impl<C> Default for Dispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Dispatcher<C> {
    /// Create a dispatcher with no handlers.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Bind a handler to `(action, kind)`.
    ///
    /// Handlers for the same key run in the order they were bound. Binding the
    /// same function twice delivers twice.
    pub fn bind<F>(&mut self, action: Action, kind: impl Into<EntityKind>, handler: F) -> &mut Self
    where
        F: Fn(&mut C, &Message) -> HandlerResult + Send + Sync + 'static,
    {
        let key = DispatchKey::new(action, kind);
        tracing::trace!(target: targets::DISPATCHER, %key, "binding handler");
        self.handlers.entry(key).or_default().push(Box::new(handler));
        self
    }

    /// Deliver `message` to every handler bound to its key.
    ///
    /// Unmatched keys are not an error; the returned report is empty.
    #[tracing::instrument(skip_all, target = "topoview_core::dispatcher", level = "trace")]
    pub fn dispatch(&self, ctx: &mut C, message: &Message) -> DispatchReport {
        let mut report = DispatchReport::default();
        let key = DispatchKey::of(message);

        let Some(handlers) = self.handlers.get(&key) else {
            tracing::trace!(target: targets::DISPATCHER, %key, "no handler bound");
            return report;
        };

        tracing::trace!(target: targets::DISPATCHER, %key, handler_count = handlers.len(), "dispatching");

        for (index, handler) in handlers.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| handler(ctx, message))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(err)) => {
                    report.failed += 1;
                    if err.downcast_ref::<CoreError>().is_some_and(CoreError::is_droppable) {
                        report.dropped += 1;
                        tracing::warn!(target: targets::DISPATCHER, %key, index, error = %err, "handler dropped input");
                    } else {
                        tracing::error!(target: targets::DISPATCHER, %key, index, error = %err, "handler failed");
                    }
                }
                Err(panic) => {
                    report.failed += 1;
                    tracing::warn!(
                        target: targets::DISPATCHER,
                        %key,
                        index,
                        panic = panic_message(panic.as_ref()),
                        "handler panicked"
                    );
                }
            }
        }

        report
    }

    /// Number of handlers bound to `(action, kind)`.
    pub fn handler_count(&self, action: Action, kind: impl Into<EntityKind>) -> usize {
        self.handlers
            .get(&DispatchKey::new(action, kind))
            .map_or(0, Vec::len)
    }

    /// Number of distinct keys with at least one handler.
    pub fn key_count(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is bound.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<C> fmt::Debug for Dispatcher<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("keys", &self.handlers.len())
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "<non-string panic>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tag: &'static str) -> impl Fn(&mut Vec<&'static str>, &Message) -> HandlerResult {
        move |log: &mut Vec<&'static str>, _: &Message| {
            log.push(tag);
            Ok(())
        }
    }

    #[test]
    fn test_registration_order_is_delivery_order() {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .bind(Action::Insert, "node", record("h1"))
            .bind(Action::Insert, "node", record("h2"))
            .bind(Action::Insert, "node", record("h3"));

        let mut log = Vec::new();
        let report = dispatcher.dispatch(&mut log, &Message::new(Action::Insert, "node"));

        assert_eq!(log, vec!["h1", "h2", "h3"]);
        assert_eq!(report, DispatchReport { delivered: 3, failed: 0, dropped: 0 });
    }

    #[test]
    fn test_only_exact_key_matches() {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .bind(Action::Insert, "node", record("insert-node"))
            .bind(Action::Update, "node", record("update-node"))
            .bind(Action::Insert, "channel", record("insert-channel"))
            .bind(Action::Insert, "Node", record("insert-Node"));

        let mut log = Vec::new();
        dispatcher.dispatch(&mut log, &Message::new(Action::Insert, "node"));
        assert_eq!(log, vec!["insert-node"]);
    }

    #[test]
    fn test_unmatched_key_is_noop() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.bind(Action::Insert, "node", record("h"));

        let mut log = Vec::new();
        let report = dispatcher.dispatch(&mut log, &Message::new(Action::Delete, "node"));
        assert!(report.is_unmatched());
        assert!(log.is_empty());
    }

    #[test]
    fn test_no_deduplication() {
        let mut dispatcher = Dispatcher::new();
        let handler = |log: &mut Vec<&'static str>, _: &Message| -> HandlerResult {
            log.push("same");
            Ok(())
        };
        dispatcher
            .bind(Action::Update, "channel", handler)
            .bind(Action::Update, "channel", handler);

        assert_eq!(dispatcher.handler_count(Action::Update, "channel"), 2);
        let mut log = Vec::new();
        dispatcher.dispatch(&mut log, &Message::new(Action::Update, "channel"));
        assert_eq!(log, vec!["same", "same"]);
    }

    #[test]
    fn test_failing_handler_does_not_block_later_handlers() {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .bind(Action::Insert, "node", |_: &mut Vec<&'static str>, _| {
                Err("broken handler".into())
            })
            .bind(Action::Insert, "node", record("after-error"));

        let mut log = Vec::new();
        let report = dispatcher.dispatch(&mut log, &Message::new(Action::Insert, "node"));
        assert_eq!(log, vec!["after-error"]);
        assert_eq!(report, DispatchReport { delivered: 1, failed: 1, dropped: 0 });
    }

    #[test]
    fn test_droppable_errors_are_reported_separately() {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .bind(Action::Update, "node", |_: &mut Vec<&'static str>, _| {
                Err(CoreError::malformed("bad params").into())
            })
            .bind(Action::Update, "node", |_: &mut Vec<&'static str>, _| {
                Err(CoreError::Encode("broken".into()).into())
            });

        let report = dispatcher.dispatch(&mut Vec::new(), &Message::new(Action::Update, "node"));
        assert_eq!(report, DispatchReport { delivered: 0, failed: 2, dropped: 1 });
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .bind(Action::Insert, "node", record("before"))
            .bind(Action::Insert, "node", |_: &mut Vec<&'static str>, _| {
                panic!("handler exploded")
            })
            .bind(Action::Insert, "node", record("after-panic"));

        let mut log = Vec::new();
        let report = dispatcher.dispatch(&mut log, &Message::new(Action::Insert, "node"));
        assert_eq!(log, vec!["before", "after-panic"]);
        assert_eq!(report.failed, 1);
        assert_eq!(report.delivered, 2);

        // The dispatcher keeps working afterwards.
        log.clear();
        dispatcher.dispatch(&mut log, &Message::new(Action::Insert, "node"));
        assert_eq!(log, vec!["before", "after-panic"]);
    }

    #[test]
    fn test_key_count() {
        let mut dispatcher: Dispatcher<()> = Dispatcher::new();
        assert!(dispatcher.is_empty());
        dispatcher
            .bind(Action::Insert, "node", |_, _| Ok(()))
            .bind(Action::Insert, "node", |_, _| Ok(()))
            .bind(Action::Delete, "local.connection", |_, _| Ok(()));
        assert_eq!(dispatcher.key_count(), 2);
        assert_eq!(dispatcher.handler_count(Action::Delete, EntityKind::Connection), 1);
    }
}
