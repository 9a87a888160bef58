//! docsync: the CRDT core of a collaborative document engine.
//!
//! Every event carries a [`Ticket`](time::Ticket). Elements live in an arena
//! keyed by their creation ticket ([`crdt::Root`]), operations address them
//! by ticket, and the [`Executor`](executor::Executor) applies a stream of
//! operations so that replicas seeing the same set converge.

pub mod codec;
pub mod crdt;
pub mod document;
pub mod error;
pub mod executor;
pub mod operation;
pub mod time;

pub use crdt::{Element, ElementValue, Primitive, Root, SimpleElement, TextPos};
pub use document::{ChangeContext, Document};
pub use error::{ApplyError, Transience, UpdateError};
pub use executor::{Applied, ApplySummary, Executor};
pub use operation::{Change, Operation};
pub use time::{ActorId, ChangeId, LogicalClock, Ticket, INITIAL_TICKET, MAX_TICKET};
