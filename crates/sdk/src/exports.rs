//! Intercepted entry points
//!
//! Signatures must match the real exports exactly, the redirection jumps
//! straight into our replacements with the caller's frame intact.

use std::ffi::c_void;

use crate::com::{Guid, HRESULT};

pub const D3D11_MODULE: &str = "d3d11.dll";
pub const DXGI_MODULE: &str = "dxgi.dll";

pub const D3D11_CREATE_DEVICE: &[u8] = b"D3D11CreateDevice\0";
pub const CREATE_DXGI_FACTORY: &[u8] = b"CreateDXGIFactory\0";
pub const CREATE_DXGI_FACTORY1: &[u8] = b"CreateDXGIFactory1\0";
pub const CREATE_DXGI_FACTORY2: &[u8] = b"CreateDXGIFactory2\0";

pub type D3D11CreateDeviceFn = unsafe extern "system" fn(
    adapter: *mut c_void,
    driver_type: i32,
    software: *mut c_void,
    flags: u32,
    feature_levels: *const i32,
    feature_level_count: u32,
    sdk_version: u32,
    device: *mut *mut c_void,
    feature_level: *mut i32,
    immediate_context: *mut *mut c_void,
) -> HRESULT;

/// `CreateDXGIFactory` and `CreateDXGIFactory1`
pub type CreateDXGIFactoryFn =
    unsafe extern "system" fn(riid: *const Guid, factory: *mut *mut c_void) -> HRESULT;

pub type CreateDXGIFactory2Fn =
    unsafe extern "system" fn(flags: u32, riid: *const Guid, factory: *mut *mut c_void) -> HRESULT;

/// Collected entry points for iteration: (module, export)
pub const ENTRY_POINTS: &[(&str, &[u8])] = &[
    (D3D11_MODULE, D3D11_CREATE_DEVICE),
    (DXGI_MODULE, CREATE_DXGI_FACTORY),
    (DXGI_MODULE, CREATE_DXGI_FACTORY1),
    (DXGI_MODULE, CREATE_DXGI_FACTORY2),
];
