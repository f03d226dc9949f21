//! DXGI relationship intercepts
//!
//! Following device -> adapter -> factory -> swap chain always lands on
//! another proxy, so a swap chain created through any reachable factory is
//! still observed.

use std::ffi::c_void;

use dxpipe_sdk::interfaces::{
    dxgi_device, dxgi_object, factory, CreateSwapChainFn, CreateSwapChainForCompositionFn,
    CreateSwapChainForCoreWindowFn, CreateSwapChainForHwndFn, GetAdapterFn, GetParentFn,
};
use dxpipe_sdk::{succeeded, Guid, HRESULT};

use super::{Proxy, ProxyKind};

pub(super) fn device_intercepts() -> Vec<(usize, *const c_void)> {
    vec![(dxgi_device::GET_ADAPTER, get_adapter as GetAdapterFn as *const c_void)]
}

pub(super) fn adapter_intercepts() -> Vec<(usize, *const c_void)> {
    vec![(dxgi_object::GET_PARENT, adapter_get_parent as GetParentFn as *const c_void)]
}

pub(super) fn factory_intercepts() -> Vec<(usize, *const c_void)> {
    vec![
        (
            factory::CREATE_SWAP_CHAIN,
            create_swap_chain as CreateSwapChainFn as *const c_void,
        ),
        (
            factory::CREATE_SWAP_CHAIN_FOR_HWND,
            create_swap_chain_for_hwnd as CreateSwapChainForHwndFn as *const c_void,
        ),
        (
            factory::CREATE_SWAP_CHAIN_FOR_CORE_WINDOW,
            create_swap_chain_for_core_window as CreateSwapChainForCoreWindowFn as *const c_void,
        ),
        (
            factory::CREATE_SWAP_CHAIN_FOR_COMPOSITION,
            create_swap_chain_for_composition as CreateSwapChainForCompositionFn as *const c_void,
        ),
    ]
}

unsafe extern "system" fn get_adapter(this: *mut c_void, adapter: *mut *mut c_void) -> HRESULT {
    let proxy = Proxy::from_this(this);
    let get: GetAdapterFn = proxy.real_method(dxgi_device::GET_ADAPTER);
    let hr = get(proxy.real(), adapter);
    if succeeded(hr) {
        Proxy::wrap_out(ProxyKind::Adapter, adapter, proxy.sink().cloned());
    }
    hr
}

unsafe extern "system" fn adapter_get_parent(
    this: *mut c_void,
    riid: *const Guid,
    parent: *mut *mut c_void,
) -> HRESULT {
    let proxy = Proxy::from_this(this);
    let get: GetParentFn = proxy.real_method(dxgi_object::GET_PARENT);
    let hr = get(proxy.real(), riid, parent);
    if succeeded(hr) && !riid.is_null() && ProxyKind::Factory.wraps_request(&*riid) {
        Proxy::wrap_out(ProxyKind::Factory, parent, proxy.sink().cloned());
    }
    hr
}

unsafe fn wrap_swap_chain(proxy: &Proxy, hr: HRESULT, swap_chain: *mut *mut c_void) -> HRESULT {
    if succeeded(hr) {
        Proxy::wrap_out(ProxyKind::SwapChain, swap_chain, proxy.sink().cloned());
    }
    hr
}

unsafe extern "system" fn create_swap_chain(
    this: *mut c_void,
    device: *mut c_void,
    desc: *mut c_void,
    swap_chain: *mut *mut c_void,
) -> HRESULT {
    let proxy = Proxy::from_this(this);
    let create: CreateSwapChainFn = proxy.real_method(factory::CREATE_SWAP_CHAIN);
    let hr = create(proxy.real(), device, desc, swap_chain);
    wrap_swap_chain(proxy, hr, swap_chain)
}

unsafe extern "system" fn create_swap_chain_for_hwnd(
    this: *mut c_void,
    device: *mut c_void,
    hwnd: *mut c_void,
    desc: *const c_void,
    fullscreen_desc: *const c_void,
    restrict_to_output: *mut c_void,
    swap_chain: *mut *mut c_void,
) -> HRESULT {
    let proxy = Proxy::from_this(this);
    let create: CreateSwapChainForHwndFn = proxy.real_method(factory::CREATE_SWAP_CHAIN_FOR_HWND);
    let hr = create(
        proxy.real(),
        device,
        hwnd,
        desc,
        fullscreen_desc,
        restrict_to_output,
        swap_chain,
    );
    wrap_swap_chain(proxy, hr, swap_chain)
}

unsafe extern "system" fn create_swap_chain_for_core_window(
    this: *mut c_void,
    device: *mut c_void,
    window: *mut c_void,
    desc: *const c_void,
    restrict_to_output: *mut c_void,
    swap_chain: *mut *mut c_void,
) -> HRESULT {
    let proxy = Proxy::from_this(this);
    let create: CreateSwapChainForCoreWindowFn =
        proxy.real_method(factory::CREATE_SWAP_CHAIN_FOR_CORE_WINDOW);
    let hr = create(proxy.real(), device, window, desc, restrict_to_output, swap_chain);
    wrap_swap_chain(proxy, hr, swap_chain)
}

unsafe extern "system" fn create_swap_chain_for_composition(
    this: *mut c_void,
    device: *mut c_void,
    desc: *const c_void,
    restrict_to_output: *mut c_void,
    swap_chain: *mut *mut c_void,
) -> HRESULT {
    let proxy = Proxy::from_this(this);
    let create: CreateSwapChainForCompositionFn =
        proxy.real_method(factory::CREATE_SWAP_CHAIN_FOR_COMPOSITION);
    let hr = create(proxy.real(), device, desc, restrict_to_output, swap_chain);
    wrap_swap_chain(proxy, hr, swap_chain)
}
