//! Log file setup
//!
//! Everything goes to `dxpipe.log` next to the host; the host has no console.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use dxpipe_core::CoreConfig;

/// Default directive when `RUST_LOG` is unset
pub fn default_directive(config: &CoreConfig) -> &'static str {
    if config.debug {
        "debug"
    } else {
        "info"
    }
}

/// Install the global subscriber
///
/// Returns whether this call installed it; later calls leave the first one in
/// place.
pub fn init(config: &CoreConfig, path: &Path) -> std::io::Result<bool> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .with_thread_ids(true);

    let installed = if config.log_timestamps {
        builder.try_init()
    } else {
        builder.without_time().try_init()
    };
    match installed {
        Ok(()) => {
            tracing::debug!("Logging to {}", path.display());
            Ok(true)
        }
        Err(e) => {
            tracing::debug!("Subscriber already set, keeping it: {}", e);
            Ok(false)
        }
    }
}
