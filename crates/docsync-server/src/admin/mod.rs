//! Admin management surface: project lifecycle and document listing.
//!
//! Requests and responses are JSON objects, one per line, over TCP:
//!
//! ```text
//! → {"method":"create_project","name":"alpha"}
//! ← {"ok":{"project":{"id":"…","name":"alpha","created_at":1700000000000}}}
//! → {"method":"update_project","project":{"id":"nope","name":"x","created_at":0}}
//! ← {"error":{"code":"not_found","message":"project nope not found"}}
//! ```

mod backend;
mod types;

pub use backend::{AdminBackend, BackendError, MemoryBackend, DEFAULT_PAGE_SIZE};
pub use types::{DocumentSummary, Project};

use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::AdminConfig;
use crate::error::Result;

const ACCEPT_POLL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum AdminRequest {
    CreateProject {
        name: String,
    },
    ListProjects,
    UpdateProject {
        project: Project,
    },
    ListDocuments {
        #[serde(default)]
        previous_id: String,
        #[serde(default)]
        page_size: u32,
        #[serde(default = "forward")]
        is_forward: bool,
    },
}

fn forward() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminResponse {
    Ok(AdminReply),
    Error(ErrorBody),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminReply {
    Project(Project),
    Projects(Vec<Project>),
    Documents(Vec<DocumentSummary>),
    Ack,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl From<BackendError> for AdminResponse {
    fn from(err: BackendError) -> Self {
        AdminResponse::Error(ErrorBody {
            code: err.code().to_string(),
            message: err.to_string(),
        })
    }
}

// ── AdminServer ────────────────────────────────────────────────────────────

pub struct AdminServer {
    config: AdminConfig,
    backend: Arc<dyn AdminBackend>,
    shutdown: Arc<AtomicBool>,
    local_addr: Option<SocketAddr>,
    accept_thread: Option<JoinHandle<()>>,
}

impl AdminServer {
    pub fn new(config: AdminConfig, backend: Arc<dyn AdminBackend>) -> Self {
        Self {
            config,
            backend,
            shutdown: Arc::new(AtomicBool::new(false)),
            local_addr: None,
            accept_thread: None,
        }
    }

    /// Answer one request against the backend.
    pub fn handle(&self, request: AdminRequest) -> AdminResponse {
        dispatch(self.backend.as_ref(), request)
    }

    /// Validate the port, bind, and serve on a background thread.
    ///
    /// An out-of-range port fails here, before any socket is opened.
    pub fn start(&mut self) -> Result<SocketAddr> {
        let port = self.config.validate()?;
        let listener = TcpListener::bind((self.config.host.as_str(), port))?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;
        info!("serving admin on {}", addr.port());

        let backend = Arc::clone(&self.backend);
        let shutdown = Arc::clone(&self.shutdown);
        let handle = thread::Builder::new()
            .name("admin-accept".into())
            .spawn(move || accept_loop(listener, backend, shutdown))?;
        self.local_addr = Some(addr);
        self.accept_thread = Some(handle);
        Ok(addr)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Stop accepting connections. Open connections finish their current
    /// request and close when the peer does.
    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.accept_thread.take() {
            if handle.join().is_err() {
                warn!("admin accept thread panicked");
            }
        }
    }
}

impl Drop for AdminServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn dispatch(backend: &dyn AdminBackend, request: AdminRequest) -> AdminResponse {
    let result = match request {
        AdminRequest::CreateProject { name } => backend.create_project(&name).map(AdminReply::Project),
        AdminRequest::ListProjects => backend.list_projects().map(AdminReply::Projects),
        AdminRequest::UpdateProject { project } => backend.update_project(project).map(|()| AdminReply::Ack),
        AdminRequest::ListDocuments {
            previous_id,
            page_size,
            is_forward,
        } => backend
            .list_document_summaries(&previous_id, page_size, is_forward)
            .map(AdminReply::Documents),
    };
    match result {
        Ok(reply) => AdminResponse::Ok(reply),
        Err(err) => err.into(),
    }
}

fn accept_loop(listener: TcpListener, backend: Arc<dyn AdminBackend>, shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                debug!(%peer, "admin connection");
                let backend = Arc::clone(&backend);
                let spawned = thread::Builder::new()
                    .name("admin-conn".into())
                    .spawn(move || {
                        if let Err(err) = serve_connection(stream, backend.as_ref()) {
                            debug!(%peer, %err, "admin connection closed");
                        }
                    });
                if let Err(err) = spawned {
                    warn!(%err, "failed to spawn admin connection thread");
                }
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(err) => {
                warn!(%err, "admin accept failed");
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
    debug!("admin accept loop stopped");
}

fn serve_connection(stream: TcpStream, backend: &dyn AdminBackend) -> io::Result<()> {
    stream.set_nonblocking(false)?;
    let reader = BufReader::new(stream.try_clone()?);
    let mut writer = BufWriter::new(stream);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<AdminRequest>(&line) {
            Ok(request) => dispatch(backend, request),
            Err(err) => AdminResponse::Error(ErrorBody {
                code: "invalid_request".into(),
                message: err.to_string(),
            }),
        };
        serde_json::to_writer(&mut writer, &response)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_wire_shape() {
        let req: AdminRequest = serde_json::from_value(json!({ "method": "list_documents" })).unwrap();
        assert_eq!(
            req,
            AdminRequest::ListDocuments {
                previous_id: String::new(),
                page_size: 0,
                is_forward: true,
            }
        );
        let req: AdminRequest =
            serde_json::from_value(json!({ "method": "create_project", "name": "p" })).unwrap();
        assert_eq!(req, AdminRequest::CreateProject { name: "p".into() });
    }

    #[test]
    fn response_wire_shape() {
        let ack = serde_json::to_value(AdminResponse::Ok(AdminReply::Ack)).unwrap();
        assert_eq!(ack, json!({ "ok": "ack" }));
        let err: AdminResponse = BackendError::NotFound("project x".into()).into();
        assert_eq!(
            serde_json::to_value(err).unwrap(),
            json!({ "error": { "code": "not_found", "message": "project x not found" } })
        );
    }
}
