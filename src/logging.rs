//! Log output for binaries and tests embedding the engine

use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

use crate::error::{Result, WalletError};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "wallet_engine=info";

/// Install a global fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter`. Fails if a global subscriber is already set.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let subscriber = Registry::default()
        .with(env_filter)
        .with(fmt::layer().with_target(true));
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| WalletError::StateInvariant(format!("logging already initialized: {}", e)))?;
    tracing::debug!("Logging initialized");
    Ok(())
}
