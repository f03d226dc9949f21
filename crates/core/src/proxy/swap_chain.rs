//! IDXGISwapChain intercepts
//!
//! Present drives the per-frame export before the real present. GetBuffer(0)
//! and ResizeBuffers keep the tracked back buffer current. The application
//! always gets the real return value.

use std::ffi::c_void;

use dxpipe_sdk::com;
use dxpipe_sdk::iids::IID_ID3D11_TEXTURE2D;
use dxpipe_sdk::interfaces::{swap_chain, GetBufferFn, PresentFn, ResizeBuffersFn};
use dxpipe_sdk::{succeeded, Guid, HRESULT};

use super::Proxy;

pub(super) fn intercepts() -> Vec<(usize, *const c_void)> {
    vec![
        (swap_chain::PRESENT, present as PresentFn as *const c_void),
        (swap_chain::GET_BUFFER, get_buffer as GetBufferFn as *const c_void),
        (
            swap_chain::RESIZE_BUFFERS,
            resize_buffers as ResizeBuffersFn as *const c_void,
        ),
    ]
}

unsafe extern "system" fn present(this: *mut c_void, sync_interval: u32, flags: u32) -> HRESULT {
    let proxy = Proxy::from_this(this);
    if let Some(sink) = proxy.sink() {
        sink.present();
    }
    let present: PresentFn = proxy.real_method(swap_chain::PRESENT);
    present(proxy.real(), sync_interval, flags)
}

unsafe extern "system" fn get_buffer(
    this: *mut c_void,
    buffer: u32,
    riid: *const Guid,
    surface: *mut *mut c_void,
) -> HRESULT {
    let proxy = Proxy::from_this(this);
    let get: GetBufferFn = proxy.real_method(swap_chain::GET_BUFFER);
    let hr = get(proxy.real(), buffer, riid, surface);

    let is_back_buffer = buffer == 0 && !riid.is_null() && *riid == IID_ID3D11_TEXTURE2D;
    if succeeded(hr) && is_back_buffer && !surface.is_null() && !(*surface).is_null() {
        if let Some(sink) = proxy.sink() {
            sink.back_buffer(*surface);
        }
    }
    hr
}

unsafe extern "system" fn resize_buffers(
    this: *mut c_void,
    buffer_count: u32,
    width: u32,
    height: u32,
    format: u32,
    flags: u32,
) -> HRESULT {
    let proxy = Proxy::from_this(this);

    // References on the old back buffer must be gone before the real resize
    if let Some(sink) = proxy.sink() {
        sink.resize_begin(width, height);
    }

    let resize: ResizeBuffersFn = proxy.real_method(swap_chain::RESIZE_BUFFERS);
    let hr = resize(proxy.real(), buffer_count, width, height, format, flags);

    if let Some(sink) = proxy.sink() {
        if succeeded(hr) {
            let get: GetBufferFn = proxy.real_method(swap_chain::GET_BUFFER);
            let mut back_buffer = std::ptr::null_mut();
            if succeeded(get(proxy.real(), 0, &IID_ID3D11_TEXTURE2D, &mut back_buffer))
                && !back_buffer.is_null()
            {
                sink.back_buffer(back_buffer);
                com::release(back_buffer);
            }
        }
        sink.resize_end(hr);
    }
    hr
}
