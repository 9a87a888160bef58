//! One worker thread per document.
//!
//! Each document key gets a thread that owns its [`Document`] and a channel
//! of [`DocCommand`]s, so applies to one document are serialized while
//! different documents progress in parallel. Callers block on a reply
//! channel carried inside the command.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use docsync::time::ACTOR_ID_LEN;
use docsync::{ActorId, ApplyError, ApplySummary, Change, Document};
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, info_span, warn};

/// Receives the view of a document after each batch that changed it.
pub trait SnapshotSink: Send + Sync {
    fn store(&self, key: &str, view: &Value);
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Apply(#[from] ApplyError),
    #[error("document {0:?} is closed")]
    Closed(String),
    #[error("no document {0:?}")]
    UnknownDocument(String),
    #[error("failed to spawn document worker: {0}")]
    Spawn(#[from] std::io::Error),
}

// ── ActorAllocator ─────────────────────────────────────────────────────────

/// Hands out distinct actor ids for the documents of this process: a random
/// 4-byte prefix followed by a big-endian counter.
#[derive(Debug)]
pub struct ActorAllocator {
    prefix: [u8; 4],
    counter: AtomicU64,
}

impl Default for ActorAllocator {
    fn default() -> Self {
        Self::with_prefix(rand::random())
    }
}

impl ActorAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: [u8; 4]) -> Self {
        Self {
            prefix,
            counter: AtomicU64::new(1),
        }
    }

    pub fn next(&self) -> ActorId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let mut bytes = [0u8; ACTOR_ID_LEN];
        bytes[..4].copy_from_slice(&self.prefix);
        bytes[4..].copy_from_slice(&n.to_be_bytes());
        ActorId::new(bytes)
    }
}

// ── Commands ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub key: String,
    pub view: Value,
    pub lamport: u64,
    pub pending: usize,
}

pub enum DocCommand {
    Push {
        changes: Vec<Change>,
        respond: Sender<Result<ApplySummary, SchedulerError>>,
    },
    Snapshot {
        respond: Sender<DocumentSnapshot>,
    },
    Shutdown,
}

struct Worker {
    tx: Sender<DocCommand>,
    handle: Option<JoinHandle<()>>,
}

// ── DocumentScheduler ──────────────────────────────────────────────────────

pub struct DocumentScheduler {
    workers: Mutex<HashMap<String, Worker>>,
    allocator: ActorAllocator,
    sink: Option<Arc<dyn SnapshotSink>>,
    closed: AtomicBool,
}

impl Default for DocumentScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentScheduler {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Scheduler that reports every changed document to `sink`.
    pub fn with_sink(sink: Arc<dyn SnapshotSink>) -> Self {
        Self::build(Some(sink))
    }

    fn build(sink: Option<Arc<dyn SnapshotSink>>) -> Self {
        Self {
            workers: Mutex::new(HashMap::new()),
            allocator: ActorAllocator::new(),
            sink,
            closed: AtomicBool::new(false),
        }
    }

    /// Apply `changes` to the document at `key`, starting its worker on
    /// first use. Blocks until the worker has applied them.
    pub fn push(&self, key: &str, changes: Vec<Change>) -> Result<ApplySummary, SchedulerError> {
        let tx = self.sender_for(key)?;
        let (respond, reply) = bounded(1);
        tx.send(DocCommand::Push { changes, respond })
            .map_err(|_| SchedulerError::Closed(key.to_string()))?;
        reply
            .recv()
            .map_err(|_| SchedulerError::Closed(key.to_string()))?
    }

    pub fn snapshot(&self, key: &str) -> Result<DocumentSnapshot, SchedulerError> {
        let tx = self
            .workers
            .lock()
            .get(key)
            .map(|w| w.tx.clone())
            .ok_or_else(|| SchedulerError::UnknownDocument(key.to_string()))?;
        let (respond, reply) = bounded(1);
        tx.send(DocCommand::Snapshot { respond })
            .map_err(|_| SchedulerError::Closed(key.to_string()))?;
        reply
            .recv()
            .map_err(|_| SchedulerError::Closed(key.to_string()))
    }

    /// Keys of every document with a running worker, sorted.
    pub fn document_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.workers.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Stop every worker after its in-flight batch and wait for it. Later
    /// pushes fail with [`SchedulerError::Closed`].
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let workers: Vec<(String, Worker)> = self.workers.lock().drain().collect();
        for (key, worker) in &workers {
            if worker.tx.send(DocCommand::Shutdown).is_err() {
                debug!(key = %key, "worker already gone");
            }
        }
        for (key, mut worker) in workers {
            if let Some(handle) = worker.handle.take() {
                if handle.join().is_err() {
                    warn!(key = %key, "document worker panicked");
                }
            }
        }
    }

    fn sender_for(&self, key: &str) -> Result<Sender<DocCommand>, SchedulerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SchedulerError::Closed(key.to_string()));
        }
        let mut workers = self.workers.lock();
        if let Some(worker) = workers.get(key) {
            return Ok(worker.tx.clone());
        }

        let actor_id = self.allocator.next();
        let span = info_span!("document", key = %key, actor = %actor_id);
        let document = Document::with_span(key, actor_id, span);
        let (tx, rx) = unbounded();
        let sink = self.sink.clone();
        let handle = thread::Builder::new()
            .name(format!("doc-{key}"))
            .spawn(move || run_document_loop(document, rx, sink))?;
        info!(key = %key, actor = %actor_id, "document worker started");

        workers.insert(
            key.to_string(),
            Worker {
                tx: tx.clone(),
                handle: Some(handle),
            },
        );
        Ok(tx)
    }
}

impl Drop for DocumentScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ── Worker loop ────────────────────────────────────────────────────────────

type PushReply = Sender<Result<ApplySummary, SchedulerError>>;

fn run_document_loop(mut doc: Document, rx: Receiver<DocCommand>, sink: Option<Arc<dyn SnapshotSink>>) {
    while let Ok(cmd) = rx.recv() {
        match cmd {
            DocCommand::Push { changes, respond } => {
                let mut batch = vec![(changes, respond)];
                let mut next = None;
                // Coalesce pushes already waiting; stop at anything else so
                // commands keep their order.
                while let Ok(queued) = rx.try_recv() {
                    match queued {
                        DocCommand::Push { changes, respond } => batch.push((changes, respond)),
                        other => {
                            next = Some(other);
                            break;
                        }
                    }
                }
                apply_batch(&mut doc, batch, sink.as_deref());
                match next {
                    Some(DocCommand::Shutdown) => break,
                    Some(DocCommand::Snapshot { respond }) => {
                        let _ = respond.send(snapshot_of(&doc));
                    }
                    Some(DocCommand::Push { .. }) | None => {}
                }
            }
            DocCommand::Snapshot { respond } => {
                let _ = respond.send(snapshot_of(&doc));
            }
            DocCommand::Shutdown => break,
        }
    }
    debug!(key = %doc.key(), "document worker stopped");
}

/// Apply one batch. Changes from different pushes are interleaved by
/// `(lamport, actor)`; the sort is stable so each push keeps its own order
/// among equal keys.
fn apply_batch(doc: &mut Document, batch: Vec<(Vec<Change>, PushReply)>, sink: Option<&dyn SnapshotSink>) {
    let mut replies: Vec<(PushReply, Result<ApplySummary, ApplyError>)> = Vec::with_capacity(batch.len());
    let mut queue = Vec::new();
    for (source, (changes, respond)) in batch.into_iter().enumerate() {
        queue.extend(changes.into_iter().map(|change| (source, change)));
        replies.push((respond, Ok(ApplySummary::default())));
    }
    queue.sort_by_key(|(_, change)| (change.id.lamport, change.id.actor_id));

    let mut executed = 0;
    for (source, change) in queue {
        let slot = &mut replies[source].1;
        if slot.is_err() {
            continue;
        }
        match doc.apply_changes(std::iter::once(change)) {
            Ok(summary) => {
                executed += summary.executed;
                if let Ok(total) = slot {
                    total.merge(summary);
                }
            }
            Err(err) => {
                warn!(key = %doc.key(), %err, "push failed");
                *slot = Err(err);
            }
        }
    }

    if executed > 0 {
        if let Some(sink) = sink {
            sink.store(doc.key(), &doc.view());
        }
    }
    for (respond, result) in replies {
        let _ = respond.send(result.map_err(SchedulerError::from));
    }
}

fn snapshot_of(doc: &Document) -> DocumentSnapshot {
    DocumentSnapshot {
        key: doc.key().to_string(),
        view: doc.view(),
        lamport: doc.lamport(),
        pending: doc.pending_len(),
    }
}
