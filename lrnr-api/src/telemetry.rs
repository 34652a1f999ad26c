/// Tracing subscriber setup
///
/// `RUST_LOG` takes precedence; otherwise the filter comes from `LOG_LEVEL`
/// via [`LoggingConfig`]. `LOG_FORMAT=json` switches to one JSON object per line.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Installs the global subscriber
///
/// # Errors
///
/// Fails if a global subscriber is already set.
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(&config.level)));

    let registry = tracing_subscriber::registry().with(filter);

    if config.json {
        registry.with(fmt::layer().json()).try_init()?;
    } else {
        registry.with(fmt::layer()).try_init()?;
    }

    Ok(())
}

/// Our crates at the configured level, tower-http request spans included
fn default_directive(level: &str) -> String {
    format!(
        "{level},lrnr_api={level},lrnr_shared={level},tower_http={level}",
        level = level
    )
}
