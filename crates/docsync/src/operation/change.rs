//! A change: the operations of one local edit transaction.

use crate::operation::Operation;
use crate::time::{ActorId, ChangeId};

#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub id: ChangeId,
    pub message: Option<String>,
    pub operations: Vec<Operation>,
}

impl Change {
    pub fn new(id: ChangeId, message: Option<String>, operations: Vec<Operation>) -> Self {
        Self {
            id,
            message,
            operations,
        }
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Copy of this change stamped for `actor_id`. Only a change made
    /// before an actor was assigned is affected.
    #[must_use]
    pub fn set_actor(&self, actor_id: ActorId) -> Change {
        let id = if self.id.actor_id == ActorId::INITIAL {
            self.id.set_actor(actor_id)
        } else {
            self.id
        };
        Change {
            id,
            message: self.message.clone(),
            operations: self.operations.iter().map(|op| op.set_actor(actor_id)).collect(),
        }
    }
}
