//! A replica of one document: root, clock and executor together.
//!
//! Local edits go through [`Document::update`], which hands the caller a
//! [`ChangeContext`] and returns the resulting [`Change`] for shipping to
//! peers. Remote changes come back in through [`Document::apply_changes`].

use serde_json::Value;
use tracing::{debug, debug_span, Span};

use crate::crdt::{ArrayElement, Element, ElementValue, ObjectElement, RgaList, Root, SimpleElement, TextElement};
use crate::error::{ApplyError, UpdateError};
use crate::executor::{ApplySummary, Executor};
use crate::operation::{Change, Operation};
use crate::time::{ActorId, ChangeId, LogicalClock, Ticket};

#[derive(Debug)]
pub struct Document {
    key: String,
    root: Root,
    clock: LogicalClock,
    executor: Executor,
    /// Changes applied while the actor is unassigned, in order, replayed by
    /// [`Document::set_actor`].
    unassigned: Vec<Change>,
}

impl Document {
    pub fn new(key: impl Into<String>, actor_id: ActorId) -> Self {
        let key = key.into();
        let span = debug_span!("document", key = %key);
        Self::with_span(key, actor_id, span)
    }

    /// Document whose executor logs inside `span`.
    pub fn with_span(key: impl Into<String>, actor_id: ActorId, span: Span) -> Self {
        Self {
            key: key.into(),
            root: Root::new(),
            clock: LogicalClock::new(actor_id),
            executor: Executor::new(span),
            unassigned: Vec::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn actor_id(&self) -> ActorId {
        self.clock.actor_id()
    }

    pub fn lamport(&self) -> u64 {
        self.clock.lamport()
    }

    pub fn root(&self) -> &Root {
        &self.root
    }

    pub fn view(&self) -> Value {
        self.root.view()
    }

    pub fn pending_len(&self) -> usize {
        self.executor.pending_len()
    }

    pub fn is_halted(&self) -> bool {
        self.executor.is_halted()
    }

    /// Adopt an actor id assigned after creation.
    ///
    /// Local changes made while unassigned are re-stamped with
    /// [`Change::set_actor`] and the root is rebuilt from them, so the local
    /// identities match what peers see once those changes are shipped.
    /// Changes made from now on carry the new actor.
    pub fn set_actor(&mut self, actor_id: ActorId) -> Result<(), ApplyError> {
        if self.unassigned.iter().any(|c| c.id.actor_id == ActorId::INITIAL) {
            let mut root = Root::new();
            let mut executor = Executor::new(self.executor.span().clone());
            for change in &self.unassigned {
                executor.apply_all(change.set_actor(actor_id).operations, &mut root)?;
            }
            let replayed = self.unassigned.len();
            executor
                .span()
                .in_scope(|| debug!(changes = replayed, %actor_id, "replayed unassigned changes"));
            self.root = root;
            self.executor = executor;
        }
        self.unassigned.clear();
        self.clock.set_actor(actor_id);
        Ok(())
    }

    fn is_unassigned(&self) -> bool {
        self.clock.actor_id() == ActorId::INITIAL
    }

    /// Run a local edit transaction.
    ///
    /// Every operation the closure issues is executed immediately. If the
    /// closure fails, the document is restored to its state before the call
    /// and nothing is recorded.
    pub fn update<F>(&mut self, message: Option<&str>, f: F) -> Result<Change, UpdateError>
    where
        F: FnOnce(&mut ChangeContext<'_>) -> Result<(), UpdateError>,
    {
        if self.executor.is_halted() {
            return Err(ApplyError::Halted.into());
        }
        let root_backup = self.root.clone();
        let clock_backup = self.clock.clone();

        let id = self.clock.tick();
        let mut ctx = ChangeContext {
            id,
            root: &mut self.root,
            clock: &mut self.clock,
            operations: Vec::new(),
        };
        let outcome = f(&mut ctx);
        let operations = ctx.operations;

        match outcome {
            Ok(()) => {
                for op in &operations {
                    self.executor.mark_applied(op.executed_at());
                }
                let _guard = self.executor.span().enter();
                debug!(lamport = id.lamport, ops = operations.len(), "local change");
                let change = Change::new(id, message.map(str::to_string), operations);
                if self.is_unassigned() {
                    self.unassigned.push(change.clone());
                }
                Ok(change)
            }
            Err(err) => {
                self.root = root_backup;
                self.clock = clock_backup;
                Err(err)
            }
        }
    }

    /// Integrate changes from peers. Each change's lamport is folded into
    /// the local clock before its operations are applied.
    pub fn apply_changes(
        &mut self,
        changes: impl IntoIterator<Item = Change>,
    ) -> Result<ApplySummary, ApplyError> {
        let mut summary = ApplySummary::default();
        for change in changes {
            if self.is_unassigned() {
                self.unassigned.push(change.clone());
            }
            self.clock.merge_lamport(change.id.lamport);
            summary.merge(self.executor.apply_all(change.operations, &mut self.root)?);
        }
        Ok(summary)
    }

    /// See [`Root::garbage_collect`].
    pub fn garbage_collect(&mut self, ticket: &Ticket) -> usize {
        self.root.garbage_collect(ticket)
    }
}

// ── ChangeContext ──────────────────────────────────────────────────────────

/// Handle passed to the closure of [`Document::update`].
pub struct ChangeContext<'a> {
    id: ChangeId,
    root: &'a mut Root,
    clock: &'a mut LogicalClock,
    operations: Vec<Operation>,
}

impl ChangeContext<'_> {
    pub fn id(&self) -> ChangeId {
        self.id
    }

    /// Identity of the top-level object.
    pub fn root_created_at(&self) -> Ticket {
        self.root.root_created_at()
    }

    pub fn root(&self) -> &Root {
        &*self.root
    }

    fn issue(&mut self, op: Operation) -> Result<(), UpdateError> {
        op.execute(self.root)?;
        self.operations.push(op);
        Ok(())
    }

    fn element(&self, target: &Ticket) -> Result<&Element, UpdateError> {
        self.root
            .find_by_created_at(target)
            .ok_or_else(|| ApplyError::NotFound(*target).into())
    }

    fn mismatch(op: &'static str, expected: &'static str, found: &Element) -> UpdateError {
        ApplyError::TypeMismatch {
            op,
            expected,
            found: found.kind(),
            target: found.created_at(),
        }
        .into()
    }

    fn object(&self, target: &Ticket) -> Result<&ObjectElement, UpdateError> {
        let e = self.element(target)?;
        e.as_object().ok_or_else(|| Self::mismatch("set", "object", e))
    }

    fn array(&self, target: &Ticket) -> Result<&ArrayElement, UpdateError> {
        let e = self.element(target)?;
        e.as_array().ok_or_else(|| Self::mismatch("add", "array", e))
    }

    fn text(&self, target: &Ticket) -> Result<&TextElement, UpdateError> {
        let e = self.element(target)?;
        e.as_text().ok_or_else(|| Self::mismatch("edit", "text", e))
    }

    /// Set `key` of `object`. Returns the new element's identity.
    pub fn set(
        &mut self,
        object: Ticket,
        key: &str,
        value: impl Into<ElementValue>,
    ) -> Result<Ticket, UpdateError> {
        let at = self.clock.next();
        self.issue(Operation::Set {
            parent_created_at: object,
            key: key.to_string(),
            value: SimpleElement::new(at, value),
            executed_at: at,
        })?;
        Ok(at)
    }

    /// Insert after `prev` in `array` (use [`RgaList::head`] for the front).
    pub fn insert_after(
        &mut self,
        array: Ticket,
        prev: Ticket,
        value: impl Into<ElementValue>,
    ) -> Result<Ticket, UpdateError> {
        let at = self.clock.next();
        self.issue(Operation::Add {
            parent_created_at: array,
            prev_created_at: prev,
            value: SimpleElement::new(at, value),
            executed_at: at,
        })?;
        Ok(at)
    }

    /// Insert so the new element ends up at visible position `index`.
    pub fn insert_at(
        &mut self,
        array: Ticket,
        index: usize,
        value: impl Into<ElementValue>,
    ) -> Result<Ticket, UpdateError> {
        let prev = {
            let a = self.array(&array)?;
            let len = a.len(self.root.index());
            if index > len {
                return Err(UpdateError::IndexOutOfRange { index, len });
            }
            match index {
                0 => RgaList::head(),
                i => a
                    .created_at_at(i - 1, self.root.index())
                    .ok_or(UpdateError::IndexOutOfRange { index, len })?,
            }
        };
        self.insert_after(array, prev, value)
    }

    /// Append after the last node of `array`.
    pub fn push(&mut self, array: Ticket, value: impl Into<ElementValue>) -> Result<Ticket, UpdateError> {
        let prev = self.array(&array)?.elements.last_created_at();
        self.insert_after(array, prev, value)
    }

    pub fn move_after(&mut self, array: Ticket, prev: Ticket, target: Ticket) -> Result<(), UpdateError> {
        let at = self.clock.next();
        self.issue(Operation::Move {
            parent_created_at: array,
            prev_created_at: prev,
            created_at: target,
            executed_at: at,
        })
    }

    /// Tombstone the child `target` of `parent`.
    pub fn remove(&mut self, parent: Ticket, target: Ticket) -> Result<(), UpdateError> {
        let at = self.clock.next();
        self.issue(Operation::Remove {
            parent_created_at: parent,
            created_at: target,
            executed_at: at,
        })
    }

    /// Remove the visible value under `key`.
    pub fn remove_key(&mut self, object: Ticket, key: &str) -> Result<(), UpdateError> {
        let target = self
            .object(&object)?
            .get(key, self.root.index())
            .map(Element::created_at)
            .ok_or_else(|| UpdateError::KeyNotFound(key.to_string()))?;
        self.remove(object, target)
    }

    /// Remove the visible element at `index`.
    pub fn remove_at(&mut self, array: Ticket, index: usize) -> Result<(), UpdateError> {
        let a = self.array(&array)?;
        let target = a
            .created_at_at(index, self.root.index())
            .ok_or_else(|| UpdateError::IndexOutOfRange {
                index,
                len: a.len(self.root.index()),
            })?;
        self.remove(array, target)
    }

    /// Replace visible characters `from..to` of `text` with `content`.
    pub fn edit(&mut self, text: Ticket, from: usize, to: usize, content: &str) -> Result<(), UpdateError> {
        let (from_pos, to_pos) = {
            let rga = &self.text(&text)?.rga;
            let len = rga.len();
            if from > to {
                return Err(UpdateError::IndexOutOfRange { index: from, len });
            }
            match (rga.pos_at(from), rga.pos_at(to)) {
                (Some(f), Some(t)) => (f, t),
                _ => return Err(UpdateError::IndexOutOfRange { index: to, len }),
            }
        };
        let at = self.clock.next();
        let latest = self.root.edit_text(&text, &from_pos, &to_pos, content, &at, None)?;
        self.operations.push(Operation::Edit {
            parent_created_at: text,
            from: from_pos,
            to: to_pos,
            latest_created_at_by_actor: Some(latest),
            content: content.to_string(),
            executed_at: at,
        });
        Ok(())
    }
}
