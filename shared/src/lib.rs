pub mod config;

/// Installs the global tracing subscriber.
///
/// Honors `RUST_LOG`, falling back to `info`.
#[macro_export]
macro_rules! init_tracing {
    () => {
        $crate::init_tracing_with_default("info")
    };
}

pub fn init_tracing_with_default(default_filter: &str) -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}
