//! dxpipe interception library
//!
//! Loaded into the host process from its directory. At process
//! attach it checks the host, resolves the real graphics entry points, wires
//! the capture hub to the D3D11 backend and Win32 pipes, and patches the
//! entry points. Everything outside Windows compiles to an empty library.

#[cfg(windows)]
pub mod backend;
#[cfg(windows)]
pub mod ffi;
#[cfg(windows)]
pub mod launcher;
#[cfg(windows)]
pub mod logging;
#[cfg(windows)]
pub mod pipes;
