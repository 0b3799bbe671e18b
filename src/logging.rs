//! Tracing setup shared by the binary entry points.
//!
//! Queries should stay quiet unless asked: the default filter is `warn`,
//! raised per module through `[logging.modules]` in the config file or
//! globally through `RUST_LOG`, which wins over anything configured.
//!
//! ```toml
//! [logging]
//! default = "warn"
//!
//! [logging.modules]
//! outline = "debug"   # show section detection while tuning a new extract
//! ```
//!
//! ```bash
//! RUST_LOG=debug ng12-retrieval ingest guideline.txt
//! RUST_LOG=outline=debug,index=trace ng12-retrieval query "haemoptysis"
//! ```

use std::sync::Once;

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Wall-clock `HH:MM:SS.mmm`; the date and zone would only add noise to
/// interactive runs.
fn compact_time(w: &mut Writer<'_>) -> std::fmt::Result {
    write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
}

/// Install the global subscriber from the logging config.
///
/// Idempotent; only the first call in a process takes effect. `RUST_LOG`
/// replaces the configured levels entirely when set.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
            Ok(directives) => EnvFilter::new(directives),
            Err(_) => EnvFilter::new(filter_directives(config)),
        };

        let timer: fn(&mut Writer<'_>) -> std::fmt::Result = compact_time;
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_timer(timer)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).init();
    });
}

/// Install the global subscriber with the default levels (`warn`).
pub fn init() {
    init_with_config(&LoggingConfig::default());
}

/// Flatten the config into an `EnvFilter` directive string: base level
/// first, then per-module overrides in name order so the result is stable
/// across runs.
fn filter_directives(config: &LoggingConfig) -> String {
    let mut overrides: Vec<_> = config.modules.iter().collect();
    overrides.sort();

    let mut directives = vec![config.default.clone()];
    directives.extend(
        overrides
            .into_iter()
            .map(|(module, level)| format!("{module}={level}")),
    );
    directives.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_directives_from_default_config() {
        assert_eq!(filter_directives(&LoggingConfig::default()), "warn");
    }

    #[test]
    fn test_module_overrides_sorted_after_base_level() {
        let config = LoggingConfig {
            default: "info".to_string(),
            modules: HashMap::from([
                ("outline".to_string(), "debug".to_string()),
                ("index".to_string(), "trace".to_string()),
            ]),
        };
        assert_eq!(filter_directives(&config), "info,index=trace,outline=debug");
    }
}
