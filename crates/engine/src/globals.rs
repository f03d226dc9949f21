//! Global engine state
//!
//! Set once at process attach when interception is enabled.
//! Access is thread-safe via OnceLock.

use std::path::PathBuf;
use std::sync::OnceLock;
use std::thread::ThreadId;
use std::time::Instant;

use crate::error::LoadError;
use crate::loader::RealExports;

/// Process-wide state established at attach
pub struct EngineGlobals {
    /// Real implementations of the intercepted entry points
    pub exports: RealExports,

    /// File name of the host executable
    pub host_executable: String,

    /// Directory holding the host executable (config and log live here)
    pub base_dir: PathBuf,

    /// Thread that ran process attach
    pub attach_thread_id: ThreadId,

    attached_at: Instant,
}

/// Global engine state storage
static ENGINE: OnceLock<EngineGlobals> = OnceLock::new();

/// Initialize engine globals
///
/// Called once during process attach. Returns error if already initialized.
pub fn init_engine(globals: EngineGlobals) -> Result<(), LoadError> {
    ENGINE.set(globals).map_err(|_| LoadError::AlreadyInitialized)
}

/// Try to get engine globals
pub fn try_engine() -> Option<&'static EngineGlobals> {
    ENGINE.get()
}

/// Check if engine is initialized
pub fn is_engine_initialized() -> bool {
    ENGINE.get().is_some()
}

impl EngineGlobals {
    pub fn new(exports: RealExports, host_executable: String, base_dir: PathBuf) -> Self {
        Self {
            exports,
            host_executable,
            base_dir,
            attach_thread_id: std::thread::current().id(),
            attached_at: Instant::now(),
        }
    }

    /// Time since process attach
    pub fn uptime(&self) -> std::time::Duration {
        self.attached_at.elapsed()
    }
}
