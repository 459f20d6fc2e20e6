//! The query/event protocol spoken with the source.
//!
//! Outbound, the client sends [`Query`] values projected to their
//! [`WireQuery`] form. Inbound, every frame carries the same shape and is
//! decoded into a [`Message`]:
//!
//! ```text
//! {"action": "insert", "object_name": "node", "params": {...},
//!  "filter": [["id", "==", 5]], "last": false}
//! ```

mod action;
mod filter;
mod message;
mod query;

pub use action::{Action, CONNECTION_KIND, EntityKind};
pub use filter::{Filter, Operator, Predicate};
pub use message::Message;
pub use query::{Query, WireQuery};
