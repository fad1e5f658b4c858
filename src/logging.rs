//! Optional log output for the client's own diagnostics.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber that shows this crate's events at `level` and above.
///
/// Does nothing if the application already installed a global subscriber.
pub(crate) fn init(level: Level) {
    let directive = format!(
        "{}={}",
        env!("CARGO_CRATE_NAME"),
        level.as_str().to_ascii_lowercase()
    );

    let installed = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directive))
        .with_target(false)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!("Log output enabled at {} level", level);
    }
}
