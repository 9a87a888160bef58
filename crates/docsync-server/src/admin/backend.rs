//! Storage behind the admin surface.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;

use super::types::{now_millis, DocumentSummary, Project};
use crate::scheduler::SnapshotSink;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Failures reported by a backend. The admin surface passes them through
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl BackendError {
    pub fn code(&self) -> &'static str {
        match self {
            BackendError::NotFound(_) => "not_found",
            BackendError::AlreadyExists(_) => "already_exists",
            BackendError::InvalidArgument(_) => "invalid_argument",
        }
    }
}

pub trait AdminBackend: Send + Sync {
    fn create_project(&self, name: &str) -> Result<Project, BackendError>;

    /// All projects in creation order.
    fn list_projects(&self) -> Result<Vec<Project>, BackendError>;

    fn update_project(&self, project: Project) -> Result<(), BackendError>;

    /// One page of document summaries ordered by id.
    ///
    /// Forward pages hold ids strictly after `previous_id` ascending,
    /// backward pages ids strictly before it descending. An empty
    /// `previous_id` starts from the matching end; `page_size == 0` means
    /// [`DEFAULT_PAGE_SIZE`].
    fn list_document_summaries(
        &self,
        previous_id: &str,
        page_size: u32,
        is_forward: bool,
    ) -> Result<Vec<DocumentSummary>, BackendError>;
}

// ── MemoryBackend ──────────────────────────────────────────────────────────

#[derive(Default)]
struct MemoryState {
    projects: Vec<Project>,
    documents: BTreeMap<String, DocumentSummary>,
    ids_by_key: HashMap<String, String>,
    next_document: u64,
}

/// In-process backend. Also records document snapshots pushed by the
/// scheduler, so `list_document_summaries` reflects live documents.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn validate_name(name: &str) -> Result<(), BackendError> {
        if name.trim().is_empty() {
            return Err(BackendError::InvalidArgument(
                "project name must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn new_project_id() -> String {
    rand::random::<[u8; 12]>()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

impl AdminBackend for MemoryBackend {
    fn create_project(&self, name: &str) -> Result<Project, BackendError> {
        Self::validate_name(name)?;
        let mut state = self.state.lock();
        if state.projects.iter().any(|p| p.name == name) {
            return Err(BackendError::AlreadyExists(format!("project {name:?}")));
        }
        let project = Project {
            id: new_project_id(),
            name: name.to_string(),
            auth_webhook_url: None,
            created_at: now_millis(),
        };
        state.projects.push(project.clone());
        Ok(project)
    }

    fn list_projects(&self) -> Result<Vec<Project>, BackendError> {
        Ok(self.state.lock().projects.clone())
    }

    fn update_project(&self, project: Project) -> Result<(), BackendError> {
        Self::validate_name(&project.name)?;
        let mut state = self.state.lock();
        let Some(pos) = state.projects.iter().position(|p| p.id == project.id) else {
            return Err(BackendError::NotFound(format!("project {}", project.id)));
        };
        if state
            .projects
            .iter()
            .any(|p| p.name == project.name && p.id != project.id)
        {
            return Err(BackendError::AlreadyExists(format!("project {:?}", project.name)));
        }
        let existing = &mut state.projects[pos];
        existing.name = project.name;
        existing.auth_webhook_url = project.auth_webhook_url;
        Ok(())
    }

    fn list_document_summaries(
        &self,
        previous_id: &str,
        page_size: u32,
        is_forward: bool,
    ) -> Result<Vec<DocumentSummary>, BackendError> {
        let limit = if page_size == 0 { DEFAULT_PAGE_SIZE } else { page_size } as usize;
        let state = self.state.lock();
        let docs = &state.documents;
        let page = match (is_forward, previous_id.is_empty()) {
            (true, true) => docs.values().take(limit).cloned().collect(),
            (true, false) => docs
                .range::<str, _>((Bound::Excluded(previous_id), Bound::Unbounded))
                .map(|(_, d)| d.clone())
                .take(limit)
                .collect(),
            (false, true) => docs.values().rev().take(limit).cloned().collect(),
            (false, false) => docs
                .range::<str, _>((Bound::Unbounded, Bound::Excluded(previous_id)))
                .rev()
                .map(|(_, d)| d.clone())
                .take(limit)
                .collect(),
        };
        Ok(page)
    }
}

impl SnapshotSink for MemoryBackend {
    fn store(&self, key: &str, view: &Value) {
        let mut state = self.state.lock();
        let existing = state.ids_by_key.get(key).cloned();
        let id = match existing {
            Some(id) => id,
            None => {
                state.next_document += 1;
                let id = format!("{:024x}", state.next_document);
                state.ids_by_key.insert(key.to_string(), id.clone());
                id
            }
        };
        let summary = DocumentSummary {
            id: id.clone(),
            key: key.to_string(),
            snapshot: view.to_string(),
            updated_at: now_millis(),
        };
        state.documents.insert(id, summary);
    }
}
