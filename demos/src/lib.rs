//! Shared setup for the PoolNet demo binaries.

pub mod backend;

use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter};

/// Installs a compact `fmt` subscriber. `RUST_LOG` overrides the default `INFO` level.
pub fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true).compact())
        .init();
}
