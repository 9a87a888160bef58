//! The operation family as a single closed enum.
//!
//! An operation is immutable once built. `executed_at` is the ticket of the
//! event itself; for `Set` and `Add` it is distinct from the `created_at` of
//! the element the operation carries, although local edits stamp both with
//! the same ticket.

pub mod change;

use std::fmt;

use crate::crdt::{LatestByActor, Root, SimpleElement, TextPos};
use crate::error::ApplyError;
use crate::time::{ActorId, Ticket};

pub use change::Change;

// ── Operation ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Set `key` of an object to a fresh element.
    Set {
        parent_created_at: Ticket,
        key: String,
        value: SimpleElement,
        executed_at: Ticket,
    },
    /// Insert a fresh element into an array after `prev_created_at`.
    Add {
        parent_created_at: Ticket,
        prev_created_at: Ticket,
        value: SimpleElement,
        executed_at: Ticket,
    },
    /// Re-link an array element after `prev_created_at`.
    Move {
        parent_created_at: Ticket,
        prev_created_at: Ticket,
        created_at: Ticket,
        executed_at: Ticket,
    },
    /// Tombstone a child of an object or array.
    Remove {
        parent_created_at: Ticket,
        created_at: Ticket,
        executed_at: Ticket,
    },
    /// Replace a range of a text element.
    Edit {
        parent_created_at: Ticket,
        from: TextPos,
        to: TextPos,
        /// What the editor had seen per actor; `None` means everything.
        latest_created_at_by_actor: Option<LatestByActor>,
        content: String,
        executed_at: Ticket,
    },
}

impl Operation {
    pub fn executed_at(&self) -> Ticket {
        match self {
            Operation::Set { executed_at, .. }
            | Operation::Add { executed_at, .. }
            | Operation::Move { executed_at, .. }
            | Operation::Remove { executed_at, .. }
            | Operation::Edit { executed_at, .. } => *executed_at,
        }
    }

    pub fn parent_created_at(&self) -> Ticket {
        match self {
            Operation::Set {
                parent_created_at, ..
            }
            | Operation::Add {
                parent_created_at, ..
            }
            | Operation::Move {
                parent_created_at, ..
            }
            | Operation::Remove {
                parent_created_at, ..
            }
            | Operation::Edit {
                parent_created_at, ..
            } => *parent_created_at,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Set { .. } => "set",
            Operation::Add { .. } => "add",
            Operation::Move { .. } => "move",
            Operation::Remove { .. } => "remove",
            Operation::Edit { .. } => "edit",
        }
    }

    /// Apply to `root`. On error the root is untouched.
    pub fn execute(&self, root: &mut Root) -> Result<(), ApplyError> {
        match self {
            Operation::Set {
                parent_created_at,
                key,
                value,
                executed_at,
            } => root.set_member(parent_created_at, key, value, executed_at),
            Operation::Add {
                parent_created_at,
                prev_created_at,
                value,
                executed_at,
            } => root.insert_after(parent_created_at, prev_created_at, value, executed_at),
            Operation::Move {
                parent_created_at,
                prev_created_at,
                created_at,
                executed_at,
            } => root
                .move_after(parent_created_at, prev_created_at, created_at, executed_at)
                .map(drop),
            Operation::Remove {
                parent_created_at,
                created_at,
                executed_at,
            } => root
                .remove(parent_created_at, created_at, executed_at)
                .map(drop),
            Operation::Edit {
                parent_created_at,
                from,
                to,
                latest_created_at_by_actor,
                content,
                executed_at,
            } => root
                .edit_text(
                    parent_created_at,
                    from,
                    to,
                    content,
                    executed_at,
                    latest_created_at_by_actor.as_ref(),
                )
                .map(drop),
        }
    }

    /// Re-stamp the operation for `actor_id`.
    ///
    /// Every ticket issued before the actor was assigned takes the new
    /// actor, including references to elements created by earlier
    /// unassigned changes. Tickets of other actors and head anchors are left
    /// alone.
    #[must_use]
    pub fn set_actor(&self, actor_id: ActorId) -> Operation {
        let re = |t: &Ticket| t.assign_actor(actor_id);
        let re_pos = |p: &TextPos| TextPos::new(re(&p.created_at), p.offset);
        match self {
            Operation::Set {
                parent_created_at,
                key,
                value,
                executed_at,
            } => Operation::Set {
                parent_created_at: re(parent_created_at),
                key: key.clone(),
                value: value.set_actor(actor_id),
                executed_at: re(executed_at),
            },
            Operation::Add {
                parent_created_at,
                prev_created_at,
                value,
                executed_at,
            } => Operation::Add {
                parent_created_at: re(parent_created_at),
                prev_created_at: re(prev_created_at),
                value: value.set_actor(actor_id),
                executed_at: re(executed_at),
            },
            Operation::Move {
                parent_created_at,
                prev_created_at,
                created_at,
                executed_at,
            } => Operation::Move {
                parent_created_at: re(parent_created_at),
                prev_created_at: re(prev_created_at),
                created_at: re(created_at),
                executed_at: re(executed_at),
            },
            Operation::Remove {
                parent_created_at,
                created_at,
                executed_at,
            } => Operation::Remove {
                parent_created_at: re(parent_created_at),
                created_at: re(created_at),
                executed_at: re(executed_at),
            },
            Operation::Edit {
                parent_created_at,
                from,
                to,
                latest_created_at_by_actor,
                content,
                executed_at,
            } => Operation::Edit {
                parent_created_at: re(parent_created_at),
                from: re_pos(from),
                to: re_pos(to),
                latest_created_at_by_actor: latest_created_at_by_actor.as_ref().map(|latest| {
                    latest
                        .values()
                        .map(|t| {
                            let t = re(t);
                            (t.actor_id(), t)
                        })
                        .collect()
                }),
                content: content.clone(),
                executed_at: re(executed_at),
            },
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}, parent = {}", self.name(), self.executed_at(), self.parent_created_at())?;
        match self {
            Operation::Set { key, value, .. } => write!(f, " {{ {:?} ← {} }}", key, value.created_at),
            Operation::Add {
                prev_created_at,
                value,
                ..
            } => write!(f, " {{ {} ← {} }}", prev_created_at, value.created_at),
            Operation::Move {
                prev_created_at,
                created_at,
                ..
            } => write!(f, " {{ {} ← {} }}", prev_created_at, created_at),
            Operation::Remove { created_at, .. } => write!(f, " {{ {} }}", created_at),
            Operation::Edit {
                from, to, content, ..
            } => write!(
                f,
                " {{ {}+{}..{}+{} ← {:?} }}",
                from.created_at, from.offset, to.created_at, to.offset, content
            ),
        }
    }
}
