//! Tracing subscriber setup for applications embedding the sync layer.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError};

/// Installs a global subscriber with an env filter and a formatting layer.
///
/// `RUST_LOG` wins when set; otherwise `default_directive` is used, e.g.
/// `"finsync=debug"`. Fails if a global subscriber is already installed.
pub fn init_tracing(default_directive: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}

/// Same as [`init_tracing`] but emits one JSON object per event.
pub fn init_json_tracing(default_directive: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()
}
