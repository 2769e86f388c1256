//! pwsafe-telemetry - tracing setup for hosts embedding the provider

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
}

/// Initialise human-readable tracing output.
///
/// `RUST_LOG` wins over `log_level` when set. Panics if a global subscriber
/// is already installed; use [`try_init_tracing`] when that can happen.
pub fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(filter(log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialise JSON tracing output (production)
pub fn init_tracing_json(log_level: &str) {
    tracing_subscriber::registry()
        .with(filter(log_level))
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Like [`init_tracing`], but returns `false` instead of panicking when a
/// subscriber is already installed. Output goes through the test writer so
/// it is captured by `cargo test`.
pub fn try_init_tracing(log_level: &str) -> bool {
    tracing_subscriber::registry()
        .with(filter(log_level))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init()
        .is_ok()
}
