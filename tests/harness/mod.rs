//! Shared utilities for the integration tests.

pub mod server;

use std::sync::Once;

static INIT: Once = Once::new();

/// Install a test subscriber once per process. Honors `RUST_LOG`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "tetherws=debug".into()),
            )
            .with_test_writer()
            .try_init();
    });
}
