// Tracing setup for binaries and tests embedding the notification core.
use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, tracing_subscriber::Registry>> =
    OnceLock::new();

pub fn init_tracing() {
    init_tracing_with_level("info");
}

/// Install a global subscriber. `RUST_LOG` wins over `level` when set.
///
/// Safe to call more than once; only the first call installs anything.
pub fn init_tracing_with_level(level: &str) {
    let base_filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(level));

    let (reload_layer, handle) = reload::Layer::new(base_filter);

    if tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt::layer())
        .try_init()
        .is_ok()
    {
        let _ = LOG_RELOAD_HANDLE.set(handle);
    }
}

/// Change the log filter at runtime. Returns false if tracing was not
/// initialised through this module or the directive does not parse.
pub fn set_log_level(level: &str) -> bool {
    let Some(handle) = LOG_RELOAD_HANDLE.get() else {
        return false;
    };
    let Ok(filter) = EnvFilter::try_new(level) else {
        return false;
    };
    handle.modify(|f| *f = filter).is_ok()
}
