use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `level` when set. Calling this again after a
/// subscriber is installed leaves the existing one in place.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_level(true))
        .try_init();

    if result.is_err() {
        tracing::debug!("Global tracing subscriber already initialized");
    } else {
        tracing::info!(level = %level, "Logging initialized");
    }
}
