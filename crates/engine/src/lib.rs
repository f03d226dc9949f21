//! dxpipe engine - real library loading and global storage
//!
//! This crate handles:
//! - Locating the real d3d11/dxgi libraries in the system directory
//! - Resolving the intercepted entry points
//! - Storing the resolved state in a thread-safe global
//!
//! # Architecture
//!
//! Entry points are resolved once during process attach via
//! [`loader::load_exports`] and stored in [`globals::EngineGlobals`].
//! Every intercepted export is required: a missing one means the
//! interception layer stays inert and the host runs untouched.

pub mod error;
pub mod globals;
pub mod loader;
#[cfg(windows)]
pub mod system;

pub use error::LoadError;
pub use globals::{init_engine, is_engine_initialized, try_engine, EngineGlobals};
pub use loader::{load_exports, EntryPoint, ExportResolver, RealExports};
#[cfg(windows)]
pub use system::SystemLibraries;
