//! Process-wide tracing subscriber, installed once by the binary.
//!
//! Library code never touches this; documents log through the span their
//! scheduler hands them.

use tracing::metadata::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Environment variable holding `EnvFilter` directives.
pub const LOG_ENV_VAR: &str = "DOCSYNC_LOG";

pub fn init(config: &LoggingConfig) -> Result<(), TryInitError> {
    let filter = build_filter(config);
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
}

fn build_filter(config: &LoggingConfig) -> EnvFilter {
    if let Some(directives) = config.filter.as_deref() {
        if let Ok(filter) = EnvFilter::try_new(directives) {
            return filter;
        }
    }
    EnvFilter::builder()
        .with_default_directive(level_from_verbosity(config.verbosity).into())
        .with_env_var(LOG_ENV_VAR)
        .from_env_lossy()
}

fn level_from_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::ERROR,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(level_from_verbosity(0), LevelFilter::ERROR);
        assert_eq!(level_from_verbosity(1), LevelFilter::INFO);
        assert_eq!(level_from_verbosity(5), LevelFilter::DEBUG);
    }

    #[test]
    fn explicit_filter_wins() {
        let config = LoggingConfig {
            verbosity: 0,
            filter: Some("docsync=trace".into()),
        };
        assert_eq!(build_filter(&config).to_string(), "docsync=trace");
    }
}
