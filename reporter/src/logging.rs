use color_eyre::{eyre::Context as _, Result};
use tracing::Level;

/// Logs go to stderr, stdout is reserved for the reports themselves.
pub fn register_logging(level: Option<Level>) -> Result<()> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(level.unwrap_or(Level::INFO))
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}
