use tracing_subscriber::EnvFilter;

pub const LOG_FILTER_ENV: &str = "STAGEHAND_LOG";

/// Target used for captured child process output.
pub const CHILD_OUTPUT_TARGET: &str = "stagehand::child";

/// Installs the global fmt subscriber. Safe to call from every test; only the
/// first call wins.
///
/// The filter comes from `STAGEHAND_LOG`, then `RUST_LOG`, then `info`.
pub fn init_tracing() {
    let filter = std::env::var(LOG_FILTER_ENV)
        .ok()
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
