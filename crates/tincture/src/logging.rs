//! Subscriber setup for the binary.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::LogFormat;

/// Environment variable holding the filter directives.
pub const LOG_ENV: &str = "TINCTURE_LOG";
pub const DEFAULT_FILTER: &str = "tincture=info,warn";

/// `explicit` wins over `TINCTURE_LOG`, which wins over the default.
pub fn build_filter(explicit: Option<&str>) -> EnvFilter {
    if let Some(directives) = explicit {
        if let Ok(filter) = EnvFilter::try_new(directives) {
            return filter;
        }
    }
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Log lines go to stderr so stdout stays
/// free for command output. Returns `false` if a subscriber was already set.
pub fn init(format: LogFormat, explicit: Option<&str>) -> bool {
    let filter = build_filter(explicit);
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Fmt => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .is_ok(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_directives_take_precedence() {
        let filter = build_filter(Some("tincture_broker=trace"));
        assert_eq!(filter.to_string(), "tincture_broker=trace");
    }

    #[test]
    fn unparsable_directives_fall_back() {
        let filter = build_filter(Some("tincture=loud"));
        assert_ne!(filter.to_string(), "tincture=loud");
    }
}
