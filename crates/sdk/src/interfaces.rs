//! Vtable layouts of the wrapped interfaces
//!
//! Slot indices count from the start of the vtable, inherited methods
//! included. Only the methods the proxies intercept or call get a signature.

use std::ffi::c_void;

use crate::com::{Guid, HRESULT};
use crate::desc::{AdapterDesc, Texture2dDesc};

pub mod unknown {
    pub const QUERY_INTERFACE: usize = 0;
    pub const ADD_REF: usize = 1;
    pub const RELEASE: usize = 2;
    pub const SLOT_COUNT: usize = 3;
}

/// ID3D11Device
pub mod device {
    pub const CREATE_TEXTURE_2D: usize = 5;
    pub const GET_IMMEDIATE_CONTEXT: usize = 40;
    pub const SLOT_COUNT: usize = 43;
}

/// ID3D11DeviceContext
pub mod device_context {
    pub const COPY_RESOURCE: usize = 47;
    pub const SLOT_COUNT: usize = 115;
}

/// ID3D11Texture2D
pub mod texture2d {
    pub const GET_DESC: usize = 10;
    pub const SLOT_COUNT: usize = 11;
}

/// IDXGIObject, the root of every DXGI interface
pub mod dxgi_object {
    pub const GET_PARENT: usize = 6;
    pub const SLOT_COUNT: usize = 7;
}

/// IDXGIDevice / IDXGIDevice1 / IDXGIDevice2
pub mod dxgi_device {
    pub const GET_ADAPTER: usize = 7;
    pub const SLOT_COUNT: usize = 12;
    pub const SLOT_COUNT_1: usize = 14;
    pub const SLOT_COUNT_2: usize = 17;
}

/// IDXGIAdapter / IDXGIAdapter1
pub mod adapter {
    pub const GET_DESC: usize = 8;
    pub const SLOT_COUNT: usize = 10;
    pub const SLOT_COUNT_1: usize = 11;
}

/// IDXGIFactory / IDXGIFactory1 / IDXGIFactory2
pub mod factory {
    pub const CREATE_SWAP_CHAIN: usize = 10;
    pub const SLOT_COUNT: usize = 12;
    pub const SLOT_COUNT_1: usize = 14;
    pub const CREATE_SWAP_CHAIN_FOR_HWND: usize = 15;
    pub const CREATE_SWAP_CHAIN_FOR_CORE_WINDOW: usize = 16;
    pub const CREATE_SWAP_CHAIN_FOR_COMPOSITION: usize = 24;
    pub const SLOT_COUNT_2: usize = 25;
    pub const SLOT_COUNT_3: usize = 26;
    pub const SLOT_COUNT_4: usize = 28;
    pub const SLOT_COUNT_5: usize = 29;
    pub const SLOT_COUNT_6: usize = 30;
    pub const SLOT_COUNT_7: usize = 32;
}

/// IDXGISwapChain / IDXGISwapChain1 / IDXGISwapChain2
pub mod swap_chain {
    pub const PRESENT: usize = 8;
    pub const GET_BUFFER: usize = 9;
    pub const RESIZE_BUFFERS: usize = 13;
    pub const SLOT_COUNT: usize = 18;
    pub const SLOT_COUNT_1: usize = 29;
    pub const SLOT_COUNT_2: usize = 36;
}

/// IDXGIResource
pub mod resource {
    pub const GET_SHARED_HANDLE: usize = 8;
}

pub type CreateTexture2DFn = unsafe extern "system" fn(
    this: *mut c_void,
    desc: *const Texture2dDesc,
    initial_data: *const c_void,
    texture: *mut *mut c_void,
) -> HRESULT;

pub type GetTexture2DDescFn = unsafe extern "system" fn(this: *mut c_void, desc: *mut Texture2dDesc);

pub type GetParentFn =
    unsafe extern "system" fn(this: *mut c_void, riid: *const Guid, parent: *mut *mut c_void) -> HRESULT;

pub type GetAdapterFn = unsafe extern "system" fn(this: *mut c_void, adapter: *mut *mut c_void) -> HRESULT;

pub type GetAdapterDescFn = unsafe extern "system" fn(this: *mut c_void, desc: *mut AdapterDesc) -> HRESULT;

pub type CreateSwapChainFn = unsafe extern "system" fn(
    this: *mut c_void,
    device: *mut c_void,
    desc: *mut c_void,
    swap_chain: *mut *mut c_void,
) -> HRESULT;

pub type CreateSwapChainForHwndFn = unsafe extern "system" fn(
    this: *mut c_void,
    device: *mut c_void,
    hwnd: *mut c_void,
    desc: *const c_void,
    fullscreen_desc: *const c_void,
    restrict_to_output: *mut c_void,
    swap_chain: *mut *mut c_void,
) -> HRESULT;

pub type CreateSwapChainForCoreWindowFn = unsafe extern "system" fn(
    this: *mut c_void,
    device: *mut c_void,
    window: *mut c_void,
    desc: *const c_void,
    restrict_to_output: *mut c_void,
    swap_chain: *mut *mut c_void,
) -> HRESULT;

pub type CreateSwapChainForCompositionFn = unsafe extern "system" fn(
    this: *mut c_void,
    device: *mut c_void,
    desc: *const c_void,
    restrict_to_output: *mut c_void,
    swap_chain: *mut *mut c_void,
) -> HRESULT;

pub type PresentFn = unsafe extern "system" fn(this: *mut c_void, sync_interval: u32, flags: u32) -> HRESULT;

pub type GetBufferFn = unsafe extern "system" fn(
    this: *mut c_void,
    buffer: u32,
    riid: *const Guid,
    surface: *mut *mut c_void,
) -> HRESULT;

pub type ResizeBuffersFn = unsafe extern "system" fn(
    this: *mut c_void,
    buffer_count: u32,
    width: u32,
    height: u32,
    format: u32,
    flags: u32,
) -> HRESULT;
