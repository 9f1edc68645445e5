use anyhow::Result;
use taskpilot::bridge::{BridgeLayer, SinkRegistry};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::configuration::LoggingSettings;

/// Install the global subscriber: stderr output filtered by `RUST_LOG`, plus the bridge
/// layer that feeds chat transcripts, filtered by `logging.bridge_filter`.
pub fn init(settings: &LoggingSettings, registry: &SinkRegistry) -> Result<()> {
    let stderr_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let bridge_filter = EnvFilter::try_new(&settings.bridge_filter)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(stderr_filter),
        )
        .with(BridgeLayer::new(registry.clone()).with_filter(bridge_filter))
        .try_init()?;
    Ok(())
}
