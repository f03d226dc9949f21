//! dxpipe SDK - D3D11/DXGI ABI definitions
//!
//! This crate contains the raw, binary-level view of the graphics API that the
//! interception layer needs. It has no dependencies and compiles quickly,
//! allowing parallel compilation of dependent crates.
//!
//! # Modules
//!
//! - [`com`] - GUIDs, HRESULTs and raw IUnknown helpers
//! - [`iids`] - Interface identifiers of the wrapped interface families
//! - [`interfaces`] - Vtable slot indices and method signatures
//! - [`desc`] - Raw texture/adapter descriptions and pixel formats
//! - [`exports`] - Entry point names and signatures
//! - [`wire`] - Pipe names and the descriptor record sent to the consumer

pub mod com;
pub mod desc;
pub mod exports;
pub mod iids;
pub mod interfaces;
pub mod wire;

pub use com::{failed, succeeded, Guid, HRESULT, E_FAIL, E_NOINTERFACE, E_POINTER, S_OK};
pub use desc::{AdapterDesc, Format, SampleDesc, Texture2dDesc};
pub use wire::TextureInfo;
