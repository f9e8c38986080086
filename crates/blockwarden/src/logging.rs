//! Tracing subscriber setup for the binary.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::BlockwardenError;

/// Installs the global subscriber.
///
/// `RUST_LOG`, when set, wins over `level`. `json` switches to one JSON
/// object per event for log shippers.
pub fn init(level: &str, json: bool) -> Result<(), BlockwardenError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).map_err(|e| {
            BlockwardenError::Config(format!("invalid log level {level:?}: {e}"))
        })?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if json {
        registry
            .with(fmt::layer().json().with_file(false).with_line_number(false).with_target(true))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_file(false).with_line_number(false).with_target(true))
            .try_init()
    };

    installed.map_err(|e| BlockwardenError::Config(format!("logging already initialized: {e}")))
}
