//! Log output for the `lifeos` binary
//!
//! Everything goes to stderr so `--json` command output on stdout stays
//! machine-readable. Debug builds print pretty multi-line events, release
//! builds print one JSON object per event with the active span attached.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset. The engine and the HTTP access log
/// follow `log_level`; sqlx only speaks up for warnings because it logs
/// every statement at info.
pub fn default_directives(log_level: &str) -> String {
    format!(
        "{level},lifeos_engine={level},tower_http={level},sqlx=warn",
        level = log_level
    )
}

/// Install the global subscriber. `RUST_LOG` replaces the computed filter
/// entirely. A second call is a no-op.
pub fn init_telemetry_with_level(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(log_level)));
    let registry = tracing_subscriber::registry().with(filter);

    #[cfg(debug_assertions)]
    let installed = registry
        .with(fmt::layer().pretty().with_target(false).with_writer(std::io::stderr))
        .try_init();

    #[cfg(not(debug_assertions))]
    let installed = registry
        .with(
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_writer(std::io::stderr),
        )
        .try_init();

    if installed.is_err() {
        tracing::debug!("Log subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives_follow_level() {
        assert_eq!(
            default_directives("debug"),
            "debug,lifeos_engine=debug,tower_http=debug,sqlx=warn"
        );
    }

    #[test]
    fn test_directives_parse() {
        for level in ["error", "warn", "info", "debug", "trace"] {
            assert!(EnvFilter::try_new(default_directives(level)).is_ok(), "{}", level);
        }
    }

    #[test]
    fn test_repeated_init_is_harmless() {
        init_telemetry_with_level("info");
        init_telemetry_with_level("debug");
    }
}
