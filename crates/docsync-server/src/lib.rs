//! Server process around the docsync core.
//!
//! - [`config`]: TOML configuration and its validation.
//! - [`telemetry`]: the process-wide tracing subscriber.
//! - [`scheduler`]: one serialized worker per document.
//! - [`admin`]: project and document management over JSON lines.

pub mod admin;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod telemetry;

pub use admin::{AdminBackend, AdminRequest, AdminResponse, AdminServer, MemoryBackend};
pub use config::{AdminConfig, Config, ConfigError, LoggingConfig};
pub use error::{Error, Result};
pub use scheduler::{ActorAllocator, DocumentScheduler, SchedulerError, SnapshotSink};
