//! Forwarding proxies for the device/DXGI object graph
//!
//! A proxy is a heap object laid out like a COM object: a vtable pointer
//! followed by the one real object it owns a reference on. Its vtable is built
//! once per [`ProxyKind`]:
//!
//! - slots 0-2 are the proxy's own IUnknown
//! - intercepted slots point at the `extern "system"` functions in the
//!   per-family modules
//! - every other slot is a shared forwarding thunk that re-dispatches on the
//!   real object (see [`crate::hooks::thunk`])
//!
//! Relationship accessors always wrap fresh. Two paths to the same real object
//! may hand out two distinct proxies, each owning its own reference.

mod device;
mod dxgi;
mod swap_chain;

#[cfg(test)]
pub(crate) mod fake;

use std::ffi::c_void;
use std::fmt;
use std::sync::atomic::{fence, AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

use dxpipe_sdk::com::{self, QueryInterfaceFn};
use dxpipe_sdk::iids::*;
use dxpipe_sdk::interfaces::{
    adapter, device as device_slots, device_context, dxgi_device, factory,
    swap_chain as swap_chain_slots, unknown,
};
use dxpipe_sdk::{Guid, HRESULT, E_POINTER, S_OK};

use crate::capture::CaptureSink;
use crate::hooks::{forwarding_thunk, HookError};

/// Interface families that get wrapped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyKind {
    Device,
    DeviceContext,
    DxgiDevice,
    Adapter,
    Factory,
    SwapChain,
}

/// One version of an interface family
#[derive(Debug, Clone, Copy)]
pub struct InterfaceLevel {
    pub iid: Guid,
    /// Vtable length of this version, inherited slots included
    pub slots: usize,
}

const fn level(iid: Guid, slots: usize) -> InterfaceLevel {
    InterfaceLevel { iid, slots }
}

const DEVICE_FAMILY: &[InterfaceLevel] = &[level(IID_ID3D11_DEVICE, device_slots::SLOT_COUNT)];

const CONTEXT_FAMILY: &[InterfaceLevel] =
    &[level(IID_ID3D11_DEVICE_CONTEXT, device_context::SLOT_COUNT)];

const DXGI_DEVICE_LEVELS: &[InterfaceLevel] = &[
    level(IID_IDXGI_DEVICE, dxgi_device::SLOT_COUNT),
    level(IID_IDXGI_DEVICE1, dxgi_device::SLOT_COUNT_1),
    level(IID_IDXGI_DEVICE2, dxgi_device::SLOT_COUNT_2),
];

const ADAPTER_LEVELS: &[InterfaceLevel] = &[
    level(IID_IDXGI_ADAPTER, adapter::SLOT_COUNT),
    level(IID_IDXGI_ADAPTER1, adapter::SLOT_COUNT_1),
];

const FACTORY_LEVELS: &[InterfaceLevel] = &[
    level(IID_IDXGI_FACTORY, factory::SLOT_COUNT),
    level(IID_IDXGI_FACTORY1, factory::SLOT_COUNT_1),
    level(IID_IDXGI_FACTORY2, factory::SLOT_COUNT_2),
    level(IID_IDXGI_FACTORY3, factory::SLOT_COUNT_3),
    level(IID_IDXGI_FACTORY4, factory::SLOT_COUNT_4),
    level(IID_IDXGI_FACTORY5, factory::SLOT_COUNT_5),
    level(IID_IDXGI_FACTORY6, factory::SLOT_COUNT_6),
    level(IID_IDXGI_FACTORY7, factory::SLOT_COUNT_7),
];

const SWAP_CHAIN_LEVELS: &[InterfaceLevel] = &[
    level(IID_IDXGI_SWAP_CHAIN, swap_chain_slots::SLOT_COUNT),
    level(IID_IDXGI_SWAP_CHAIN1, swap_chain_slots::SLOT_COUNT_1),
    level(IID_IDXGI_SWAP_CHAIN2, swap_chain_slots::SLOT_COUNT_2),
];

impl ProxyKind {
    pub const ALL: [ProxyKind; 6] = [
        ProxyKind::Device,
        ProxyKind::DeviceContext,
        ProxyKind::DxgiDevice,
        ProxyKind::Adapter,
        ProxyKind::Factory,
        ProxyKind::SwapChain,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ProxyKind::Device => "ID3D11Device",
            ProxyKind::DeviceContext => "ID3D11DeviceContext",
            ProxyKind::DxgiDevice => "IDXGIDevice",
            ProxyKind::Adapter => "IDXGIAdapter",
            ProxyKind::Factory => "IDXGIFactory",
            ProxyKind::SwapChain => "IDXGISwapChain",
        }
    }

    /// Versions this family can stand in for, base first
    pub fn family(self) -> &'static [InterfaceLevel] {
        match self {
            ProxyKind::Device => DEVICE_FAMILY,
            ProxyKind::DeviceContext => CONTEXT_FAMILY,
            ProxyKind::DxgiDevice => DXGI_DEVICE_LEVELS,
            ProxyKind::Adapter => ADAPTER_LEVELS,
            ProxyKind::Factory => FACTORY_LEVELS,
            ProxyKind::SwapChain => SWAP_CHAIN_LEVELS,
        }
    }

    /// Whether a request for `iid` can be answered by this family
    pub fn covers(self, iid: &Guid) -> bool {
        self.family().iter().any(|level| level.iid == *iid)
    }

    /// Whether an object handed out for `iid` should come back as this proxy
    ///
    /// `IUnknown` counts: the proxy binds the most-derived level it can and
    /// answers for `IUnknown` itself.
    pub fn wraps_request(self, iid: &Guid) -> bool {
        *iid == IID_IUNKNOWN || self.covers(iid)
    }

    fn index(self) -> usize {
        self as usize
    }

    fn slot_count(self) -> usize {
        self.family().iter().map(|level| level.slots).max().unwrap_or(unknown::SLOT_COUNT)
    }

    fn intercepts(self) -> Vec<(usize, *const c_void)> {
        match self {
            ProxyKind::Device => device::intercepts(),
            ProxyKind::DeviceContext => Vec::new(),
            ProxyKind::DxgiDevice => dxgi::device_intercepts(),
            ProxyKind::Adapter => dxgi::adapter_intercepts(),
            ProxyKind::Factory => dxgi::factory_intercepts(),
            ProxyKind::SwapChain => swap_chain::intercepts(),
        }
    }

    /// Family that a query for `iid` on this family is re-wrapped into
    fn query_relationship(self, iid: &Guid) -> Option<ProxyKind> {
        match self {
            ProxyKind::Device if ProxyKind::DxgiDevice.covers(iid) => Some(ProxyKind::DxgiDevice),
            _ => None,
        }
    }
}

impl fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error type for wrapping
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Cannot wrap a null object")]
    Null,

    #[error("Object is already a proxy")]
    AlreadyWrapped,

    #[error("Object supports no {0} interface")]
    Unsupported(ProxyKind),

    #[error("Vtable generation failed: {0}")]
    Hook(#[from] HookError),
}

/// A wrapper around exactly one real object
#[repr(C)]
pub struct Proxy {
    vtbl: *const *const c_void,
    real: *mut c_void,
    refs: AtomicU32,
    kind: ProxyKind,
    level: usize,
    sink: Option<Arc<dyn CaptureSink>>,
}

/// Byte offset of the real-object pointer, read by the forwarding thunks
const REAL_OFFSET: usize = std::mem::offset_of!(Proxy, real);

struct VTable(Box<[*const c_void]>);

// SAFETY: Vtables are immutable after construction and only hold code addresses
unsafe impl Send for VTable {}
unsafe impl Sync for VTable {}

static VTABLES: [OnceLock<VTable>; 6] = [const { OnceLock::new() }; 6];

fn build_vtable(kind: ProxyKind) -> Result<VTable, HookError> {
    let count = kind.slot_count();
    let mut slots = Vec::with_capacity(count);

    slots.push(query_interface as QueryInterfaceFn as *const c_void);
    slots.push(add_ref as com::AddRefFn as *const c_void);
    slots.push(release as com::ReleaseFn as *const c_void);
    for slot in unknown::SLOT_COUNT..count {
        slots.push(forwarding_thunk(slot, REAL_OFFSET)?);
    }
    for (slot, function) in kind.intercepts() {
        slots[slot] = function;
    }

    tracing::debug!("Built {} proxy vtable ({} slots)", kind, count);
    Ok(VTable(slots.into_boxed_slice()))
}

fn vtable(kind: ProxyKind) -> Result<*const *const c_void, ProxyError> {
    let cell = &VTABLES[kind.index()];
    if cell.get().is_none() {
        // A lost race simply drops the second table
        let _ = cell.set(build_vtable(kind)?);
    }
    cell.get()
        .map(|table| table.0.as_ptr())
        .ok_or(ProxyError::Unsupported(kind))
}

impl Proxy {
    /// Wrap `real` in a new proxy
    ///
    /// The proxy binds the most-derived version of the family that `real`
    /// supports and holds its own reference on that interface. The caller's
    /// reference is untouched. The returned pointer carries one reference.
    ///
    /// # Safety
    /// `real` must be a live COM object.
    pub unsafe fn wrap(
        kind: ProxyKind,
        real: *mut c_void,
        sink: Option<Arc<dyn CaptureSink>>,
    ) -> Result<*mut c_void, ProxyError> {
        if real.is_null() {
            return Err(ProxyError::Null);
        }
        if Proxy::is_proxy(real) {
            return Err(ProxyError::AlreadyWrapped);
        }

        let vtbl = vtable(kind)?;
        let (level, bound) = kind
            .family()
            .iter()
            .enumerate()
            .rev()
            .find_map(|(index, level)| com::query_interface(real, &level.iid).ok().map(|p| (index, p)))
            .ok_or(ProxyError::Unsupported(kind))?;

        let proxy = Box::new(Proxy {
            vtbl,
            real: bound,
            refs: AtomicU32::new(1),
            kind,
            level,
            sink,
        });
        let this = Box::into_raw(proxy) as *mut c_void;
        tracing::debug!(
            "Wrapped {} {:p} as {:p} (level {})",
            kind,
            bound,
            this,
            level
        );
        Ok(this)
    }

    /// Swap the object in an out-parameter for a proxy around it
    ///
    /// On success the caller's reference moves into the proxy. On failure the
    /// out-parameter keeps the real object and the error is logged.
    ///
    /// # Safety
    /// `out` must be null or point to a null or live COM object pointer that
    /// the caller owns a reference on.
    pub unsafe fn wrap_out(
        kind: ProxyKind,
        out: *mut *mut c_void,
        sink: Option<Arc<dyn CaptureSink>>,
    ) -> bool {
        if out.is_null() || (*out).is_null() {
            return false;
        }
        let real = *out;
        match Proxy::wrap(kind, real, sink) {
            Ok(proxy) => {
                com::release(real);
                *out = proxy;
                true
            }
            Err(e) => {
                tracing::warn!("Leaving {} unwrapped: {}", kind, e);
                false
            }
        }
    }

    /// Whether `object` is one of our proxies
    ///
    /// # Safety
    /// `object` must be a live COM object.
    pub unsafe fn is_proxy(object: *mut c_void) -> bool {
        if object.is_null() {
            return false;
        }
        let vtbl = *(object as *const *const *const c_void);
        VTABLES
            .iter()
            .any(|cell| cell.get().is_some_and(|table| table.0.as_ptr() == vtbl))
    }

    /// Borrow the proxy behind a `this` pointer
    ///
    /// # Safety
    /// `this` must be a live proxy created by [`Proxy::wrap`].
    pub unsafe fn from_this<'a>(this: *mut c_void) -> &'a Proxy {
        &*(this as *const Proxy)
    }

    pub fn real(&self) -> *mut c_void {
        self.real
    }

    pub fn kind(&self) -> ProxyKind {
        self.kind
    }

    pub fn ref_count(&self) -> u32 {
        self.refs.load(Ordering::Acquire)
    }

    pub fn sink(&self) -> Option<&Arc<dyn CaptureSink>> {
        self.sink.as_ref()
    }

    /// Interface version bound on the real object
    pub fn bound_level(&self) -> InterfaceLevel {
        self.kind.family()[self.level]
    }

    /// Whether the proxy answers a query for `iid` as itself
    pub fn represents(&self, iid: &Guid) -> bool {
        *iid == IID_IUNKNOWN || self.kind.family()[..=self.level].iter().any(|l| l.iid == *iid)
    }

    /// Typed method of the real object
    ///
    /// # Safety
    /// `F` must be the exact signature of `slot` on the bound interface.
    pub(crate) unsafe fn real_method<F: Copy>(&self, slot: usize) -> F {
        com::method(self.real, slot)
    }
}

unsafe extern "system" fn query_interface(
    this: *mut c_void,
    riid: *const Guid,
    out: *mut *mut c_void,
) -> HRESULT {
    let proxy = Proxy::from_this(this);
    let real_query: QueryInterfaceFn = proxy.real_method(unknown::QUERY_INTERFACE);

    if riid.is_null() {
        return real_query(proxy.real, riid, out);
    }
    if out.is_null() {
        return E_POINTER;
    }

    let iid = &*riid;
    if proxy.represents(iid) {
        add_ref(this);
        *out = this;
        return S_OK;
    }

    let hr = real_query(proxy.real, riid, out);
    if let Some(related) = proxy.kind.query_relationship(iid) {
        if com::succeeded(hr) {
            Proxy::wrap_out(related, out, proxy.sink().cloned());
        }
    }
    hr
}

unsafe extern "system" fn add_ref(this: *mut c_void) -> u32 {
    let proxy = Proxy::from_this(this);
    proxy.refs.fetch_add(1, Ordering::Relaxed) + 1
}

unsafe extern "system" fn release(this: *mut c_void) -> u32 {
    let proxy = Proxy::from_this(this);
    let previous = proxy.refs.fetch_sub(1, Ordering::Release);
    if previous == 1 {
        fence(Ordering::Acquire);
        let proxy = Box::from_raw(this as *mut Proxy);
        tracing::trace!("Releasing {} proxy {:p}", proxy.kind, this);
        com::release(proxy.real);
        drop(proxy);
    }
    previous.wrapping_sub(1)
}
