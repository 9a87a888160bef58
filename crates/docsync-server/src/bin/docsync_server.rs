//! docsync server: admin surface plus per-document workers.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{ArgAction, Parser};
use tracing::{error, info, warn};

use docsync_server::{telemetry, AdminServer, Config, DocumentScheduler, MemoryBackend};

#[derive(Parser, Debug)]
#[command(name = "docsync-server", version, about)]
struct Args {
    /// TOML configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Overrides `[admin] port`.
    #[arg(long, value_name = "PORT", allow_negative_numbers = true)]
    admin_port: Option<i64>,
    /// Raise log verbosity (-v info, -vv debug).
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
}

const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match Config::load_or_default(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("docsync-server: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(port) = args.admin_port {
        config.admin.port = port;
    }
    if args.verbose > 0 {
        config.logging.verbosity = args.verbose;
    }

    if let Err(err) = telemetry::init(&config.logging) {
        eprintln!("docsync-server: failed to install logger: {err}");
    }
    if let Err(err) = config.validate() {
        error!(%err, "invalid configuration");
        eprintln!("docsync-server: {err}");
        return ExitCode::FAILURE;
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGTERM, signal_hook::consts::SIGINT] {
        if let Err(err) = signal_hook::flag::register(signal, Arc::clone(&shutdown)) {
            warn!(%err, signal, "failed to register signal handler");
        }
    }

    // Sync transports attach to the scheduler; the binary owns its lifetime.
    let backend = Arc::new(MemoryBackend::new());
    let scheduler = DocumentScheduler::with_sink(backend.clone());
    let mut admin = AdminServer::new(config.admin.clone(), backend);
    match admin.start() {
        Ok(addr) => info!(%addr, "docsync server ready"),
        Err(err) => {
            error!(%err, "admin surface failed to start");
            eprintln!("docsync-server: {err}");
            return ExitCode::FAILURE;
        }
    }

    while !shutdown.load(Ordering::Relaxed) {
        thread::sleep(SHUTDOWN_POLL);
    }
    info!("shutdown signal received");
    admin.shutdown();
    scheduler.shutdown();
    info!("docsync server stopped");
    ExitCode::SUCCESS
}
