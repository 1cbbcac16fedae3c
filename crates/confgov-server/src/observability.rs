//! Tracing setup: a fmt subscriber behind a reloadable `EnvFilter`.
//!
//! Tracing starts at [`DEFAULT_LEVEL`] before the configuration file is read;
//! [`apply_logging_level`] then swaps in the configured level. `RUST_LOG`
//! overrides both.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

/// Level used until the configuration has been loaded.
pub const DEFAULT_LEVEL: &str = "info";

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

fn rust_log_set() -> bool {
    std::env::var_os("RUST_LOG").is_some()
}

/// Install the global subscriber. Later calls do nothing.
pub fn init_tracing() {
    let filter = rust_log_set()
        .then(|| EnvFilter::try_from_default_env().ok())
        .flatten()
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LEVEL));

    let (filter_layer, handle) = reload::Layer::new(filter);
    if FILTER_HANDLE.set(handle).is_err() {
        return;
    }

    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer())
        .try_init();
}

/// Switch the active filter to `level`, unless `RUST_LOG` is set.
///
/// Returns `true` if the filter was replaced.
pub fn apply_logging_level(level: &str) -> bool {
    if rust_log_set() {
        return false;
    }
    FILTER_HANDLE.get().is_some_and(|handle| {
        handle
            .modify(|filter| *filter = EnvFilter::new(level))
            .is_ok()
    })
}
