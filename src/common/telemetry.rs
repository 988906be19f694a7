use tracing_subscriber::EnvFilter;

use crate::common::config::LoggingConfig;

const LOG_ENV_VAR: &str = "OBCAST_LOG";

/// Installs the global fmt subscriber. `OBCAST_LOG` wins over the configured filter.
pub fn init(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(&logging.filter));

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();

    if let Err(err) = result {
        tracing::debug!("tracing subscriber already installed: {err}");
    }
}
