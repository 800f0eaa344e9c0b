//! Structured logging initialization.

use crate::error::{TelemetryError, TelemetryResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default directives when neither `IBX_LOG` nor `RUST_LOG` is set.
///
/// The link and session layers log at debug so reconnects and
/// correlation anomalies are visible; tungstenite is noisy at debug
/// and stays at warn.
const DEFAULT_DIRECTIVES: &str =
    "info,ibx_gateway=debug,ibx_session=debug,ibx_orders=debug,tungstenite=warn";

/// Initialize structured logging.
///
/// JSON output when `RUST_ENV=production`, compact single-line output
/// otherwise (the interactive loop shares stdout with log lines, so
/// multi-line formats are avoided). Filter directives come from
/// `IBX_LOG`, then `RUST_LOG`, then the defaults.
pub fn init_logging() -> TelemetryResult<()> {
    let env_filter = std::env::var("IBX_LOG")
        .map(EnvFilter::new)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let is_production = std::env::var("RUST_ENV")
        .map(|v| v == "production")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);
    let init = if is_production {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init()
    } else {
        registry
            .with(fmt::layer().compact().with_target(true))
            .try_init()
    };

    init.map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}
