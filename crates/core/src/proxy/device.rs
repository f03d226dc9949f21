//! ID3D11Device intercepts
//!
//! Texture creation feeds the depth capture; the immediate context is handed
//! out wrapped so the context proxy is the only one the application sees.

use std::ffi::c_void;

use dxpipe_sdk::interfaces::{device, CreateTexture2DFn};
use dxpipe_sdk::{succeeded, Texture2dDesc, HRESULT};

use super::{Proxy, ProxyKind};

type GetImmediateContextFn = unsafe extern "system" fn(this: *mut c_void, context: *mut *mut c_void);

pub(super) fn intercepts() -> Vec<(usize, *const c_void)> {
    vec![
        (
            device::CREATE_TEXTURE_2D,
            create_texture_2d as CreateTexture2DFn as *const c_void,
        ),
        (
            device::GET_IMMEDIATE_CONTEXT,
            get_immediate_context as GetImmediateContextFn as *const c_void,
        ),
    ]
}

unsafe extern "system" fn create_texture_2d(
    this: *mut c_void,
    desc: *const Texture2dDesc,
    initial_data: *const c_void,
    texture: *mut *mut c_void,
) -> HRESULT {
    let proxy = Proxy::from_this(this);
    let create: CreateTexture2DFn = proxy.real_method(device::CREATE_TEXTURE_2D);
    let hr = create(proxy.real(), desc, initial_data, texture);

    if succeeded(hr) && !desc.is_null() && !texture.is_null() && !(*texture).is_null() {
        if let Some(sink) = proxy.sink() {
            sink.texture_created(&*desc, *texture);
        }
    }
    hr
}

unsafe extern "system" fn get_immediate_context(this: *mut c_void, context: *mut *mut c_void) {
    let proxy = Proxy::from_this(this);
    let get: GetImmediateContextFn = proxy.real_method(device::GET_IMMEDIATE_CONTEXT);
    get(proxy.real(), context);
    Proxy::wrap_out(ProxyKind::DeviceContext, context, proxy.sink().cloned());
}
