//! Applies a stream of operations to one [`Root`].
//!
//! The executor is the single write path for a document. It gives the
//! stream three properties the bare [`Operation::execute`] lacks:
//!
//! - idempotence: an operation whose `executed_at` was already applied is a
//!   no-op;
//! - causal buffering: an operation whose dependency is missing is parked
//!   and retried after every successful apply;
//! - fail-stop: an invariant violation halts the executor for good.

use std::collections::HashSet;

use tracing::{debug, error, trace, warn, Span};

use crate::crdt::Root;
use crate::error::{ApplyError, Transience};
use crate::operation::Operation;
use crate::time::Ticket;

/// Outcome of [`Executor::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Executed,
    /// Already applied or already buffered.
    Duplicate,
    /// Parked until a missing dependency arrives.
    Buffered,
}

/// Counters returned by [`Executor::apply_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub executed: usize,
    pub duplicates: usize,
    pub buffered: usize,
    pub rejected: usize,
}

impl ApplySummary {
    fn record(&mut self, applied: Applied) {
        match applied {
            Applied::Executed => self.executed += 1,
            Applied::Duplicate => self.duplicates += 1,
            Applied::Buffered => self.buffered += 1,
        }
    }

    pub fn merge(&mut self, other: ApplySummary) {
        self.executed += other.executed;
        self.duplicates += other.duplicates;
        self.buffered += other.buffered;
        self.rejected += other.rejected;
    }
}

#[derive(Debug)]
pub struct Executor {
    applied: HashSet<Ticket>,
    pending: Vec<Operation>,
    halted: bool,
    span: Span,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(Span::none())
    }
}

impl Executor {
    /// Executor logging inside `span`, which its owner provides.
    pub fn new(span: Span) -> Self {
        Self {
            applied: HashSet::new(),
            pending: Vec::new(),
            halted: false,
            span,
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Number of operations waiting for a dependency.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_applied(&self, executed_at: &Ticket) -> bool {
        self.applied.contains(executed_at)
    }

    /// Record an operation that was executed against the root outside the
    /// executor (local edits that need the execution result).
    pub fn mark_applied(&mut self, executed_at: Ticket) {
        self.applied.insert(executed_at);
    }

    pub fn apply(&mut self, op: Operation, root: &mut Root) -> Result<Applied, ApplyError> {
        let span = self.span.clone();
        let _guard = span.enter();

        if self.halted {
            return Err(ApplyError::Halted);
        }
        let executed_at = op.executed_at();
        if self.applied.contains(&executed_at)
            || self.pending.iter().any(|p| p.executed_at() == executed_at)
        {
            trace!(op = %op, "duplicate delivery");
            return Ok(Applied::Duplicate);
        }

        match op.execute(root) {
            Ok(()) => {
                trace!(op = %op, "executed");
                self.applied.insert(executed_at);
                self.drain_pending(root);
                Ok(Applied::Executed)
            }
            Err(err) => match err.transience() {
                Transience::Retryable => {
                    debug!(op = %op, %err, "buffering until dependency arrives");
                    self.pending.push(op);
                    Ok(Applied::Buffered)
                }
                Transience::Permanent => {
                    warn!(op = %op, %err, "operation rejected");
                    Err(err)
                }
                Transience::Fatal => {
                    error!(op = %op, %err, "invariant violated, halting document");
                    self.halted = true;
                    Err(err)
                }
            },
        }
    }

    /// Apply each operation in order. Rejected operations are counted and
    /// skipped; a fatal error stops the batch.
    pub fn apply_all(
        &mut self,
        ops: impl IntoIterator<Item = Operation>,
        root: &mut Root,
    ) -> Result<ApplySummary, ApplyError> {
        let mut summary = ApplySummary::default();
        for op in ops {
            match self.apply(op, root) {
                Ok(applied) => summary.record(applied),
                Err(err) if err.transience() == Transience::Permanent => summary.rejected += 1,
                Err(err) => return Err(err),
            }
        }
        Ok(summary)
    }

    /// Retry parked operations until a full pass makes no progress.
    fn drain_pending(&mut self, root: &mut Root) {
        loop {
            let mut progressed = false;
            let parked = std::mem::take(&mut self.pending);
            for op in parked {
                if self.halted {
                    self.pending.push(op);
                    continue;
                }
                match op.execute(root) {
                    Ok(()) => {
                        trace!(op = %op, "buffered operation executed");
                        self.applied.insert(op.executed_at());
                        progressed = true;
                    }
                    Err(err) => match err.transience() {
                        Transience::Retryable => self.pending.push(op),
                        Transience::Permanent => warn!(op = %op, %err, "buffered operation rejected"),
                        Transience::Fatal => {
                            error!(op = %op, %err, "invariant violated, halting document");
                            self.halted = true;
                        }
                    },
                }
            }
            if !progressed || self.pending.is_empty() {
                break;
            }
        }
    }
}
