//! Entry point replacements
//!
//! `D3D11CreateDevice` and the three `CreateDXGIFactory*` exports are patched
//! to jump into the detours below. Every detour takes its own patch out of the
//! way, calls the real export, and puts the patch back before touching the
//! result. Only the primary device is wrapped; anything else created later is
//! handed back exactly as the real export produced it.

use std::ffi::c_void;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use dxpipe_engine::{EntryPoint, RealExports};
use dxpipe_sdk::com;
use dxpipe_sdk::iids::IID_IDXGI_DEVICE;
use dxpipe_sdk::interfaces::{adapter, dxgi_device, GetAdapterDescFn, GetAdapterFn};
use dxpipe_sdk::{failed, succeeded, AdapterDesc, Guid, E_FAIL, HRESULT};

use crate::capture::CaptureSink;
use crate::hooks::{CodeMemory, HookError, HookTable, InlineHookKey, ProcessMemory};
use crate::proxy::{Proxy, ProxyKind};

/// Which created device counts as the primary render device
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DevicePolicy {
    /// The first device that is created successfully
    #[default]
    First,
    /// The first device whose adapter description contains this text,
    /// compared case-insensitively
    AdapterMatch(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRole {
    Primary,
    Secondary,
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceRole::Primary => f.write_str("primary"),
            DeviceRole::Secondary => f.write_str("secondary"),
        }
    }
}

/// Primary-device state machine: unclaimed until the policy accepts a device
#[derive(Debug)]
pub struct DeviceGate {
    policy: DevicePolicy,
    claimed: bool,
}

impl DeviceGate {
    pub fn new(policy: DevicePolicy) -> Self {
        Self {
            policy,
            claimed: false,
        }
    }

    pub fn policy(&self) -> &DevicePolicy {
        &self.policy
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed
    }

    /// Classify a successfully created device, claiming the primary slot if
    /// the policy accepts it
    pub fn classify(&mut self, adapter: Option<&str>) -> DeviceRole {
        if self.claimed {
            return DeviceRole::Secondary;
        }
        let accepted = match &self.policy {
            DevicePolicy::First => true,
            DevicePolicy::AdapterMatch(needle) => adapter.is_some_and(|name| {
                name.to_lowercase().contains(&needle.to_lowercase())
            }),
        };
        if accepted {
            self.claimed = true;
            DeviceRole::Primary
        } else {
            DeviceRole::Secondary
        }
    }
}

/// Hooks plus everything the detours need
pub struct Interceptor<M: CodeMemory = ProcessMemory> {
    hooks: HookTable<M>,
    keys: [InlineHookKey; 4],
    exports: RealExports,
    sink: Option<Arc<dyn CaptureSink>>,
    gate: Mutex<DeviceGate>,
    adapter_name: Mutex<Option<String>>,
}

fn entry_index(entry: EntryPoint) -> usize {
    match entry {
        EntryPoint::D3D11CreateDevice => 0,
        EntryPoint::CreateDXGIFactory => 1,
        EntryPoint::CreateDXGIFactory1 => 2,
        EntryPoint::CreateDXGIFactory2 => 3,
    }
}

/// Address of the detour for an entry point
pub fn detour_address(entry: EntryPoint) -> usize {
    match entry {
        EntryPoint::D3D11CreateDevice => {
            d3d11_create_device as dxpipe_sdk::exports::D3D11CreateDeviceFn as usize
        }
        EntryPoint::CreateDXGIFactory => {
            create_dxgi_factory as dxpipe_sdk::exports::CreateDXGIFactoryFn as usize
        }
        EntryPoint::CreateDXGIFactory1 => {
            create_dxgi_factory1 as dxpipe_sdk::exports::CreateDXGIFactoryFn as usize
        }
        EntryPoint::CreateDXGIFactory2 => {
            create_dxgi_factory2 as dxpipe_sdk::exports::CreateDXGIFactory2Fn as usize
        }
    }
}

impl<M: CodeMemory> Interceptor<M> {
    /// Register a hook per entry point without patching anything yet
    pub fn new(
        memory: M,
        exports: RealExports,
        sink: Option<Arc<dyn CaptureSink>>,
        policy: DevicePolicy,
    ) -> Result<Self, HookError> {
        let hooks = HookTable::new(memory);
        let mut keys = [InlineHookKey::default(); 4];
        for entry in EntryPoint::ALL {
            keys[entry_index(entry)] =
                hooks.register(entry.name(), exports.address(entry), detour_address(entry))?;
        }
        Ok(Self {
            hooks,
            keys,
            exports,
            sink,
            gate: Mutex::new(DeviceGate::new(policy)),
            adapter_name: Mutex::new(None),
        })
    }

    pub fn hooks(&self) -> &HookTable<M> {
        &self.hooks
    }

    pub fn key(&self, entry: EntryPoint) -> InlineHookKey {
        self.keys[entry_index(entry)]
    }

    /// Adapter of the primary device, once there is one
    pub fn adapter_name(&self) -> Option<String> {
        self.adapter_name.lock().clone()
    }

    pub fn primary_claimed(&self) -> bool {
        self.gate.lock().is_claimed()
    }

    /// Body of the `D3D11CreateDevice` detour
    ///
    /// # Safety
    /// Arguments must be valid for the real `D3D11CreateDevice`.
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn create_device(
        &self,
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
    ) -> HRESULT {
        let hr = {
            let _suspended = self.hooks.suspend(self.key(EntryPoint::D3D11CreateDevice));
            (self.exports.d3d11_create_device)(
                adapter,
                driver_type,
                software,
                flags,
                feature_levels,
                feature_level_count,
                sdk_version,
                device,
                feature_level,
                immediate_context,
            )
        };

        if failed(hr) {
            tracing::warn!("D3D11CreateDevice failed: {:#010x}", hr);
            return hr;
        }
        if device.is_null() || (*device).is_null() {
            return hr;
        }

        let adapter_name = query_adapter_name(*device);
        let role = self.gate.lock().classify(adapter_name.as_deref());
        tracing::info!(
            adapter = adapter_name.as_deref().unwrap_or("<unknown>"),
            %role,
            "D3D11CreateDevice succeeded"
        );
        if role == DeviceRole::Secondary {
            return hr;
        }

        *self.adapter_name.lock() = adapter_name;
        if let Some(sink) = &self.sink {
            sink.device_created(*device);
        }
        Proxy::wrap_out(ProxyKind::DeviceContext, immediate_context, self.sink.clone());
        Proxy::wrap_out(ProxyKind::Device, device, self.sink.clone());
        hr
    }

    /// Shared body of the factory detours
    unsafe fn call_factory(
        &self,
        entry: EntryPoint,
        riid: *const Guid,
        factory: *mut *mut c_void,
        call: impl FnOnce() -> HRESULT,
    ) -> HRESULT {
        let hr = {
            let _suspended = self.hooks.suspend(self.key(entry));
            call()
        };

        if succeeded(hr) && !riid.is_null() && ProxyKind::Factory.wraps_request(&*riid) {
            tracing::debug!("{} returned {}", entry, *riid);
            Proxy::wrap_out(ProxyKind::Factory, factory, self.sink.clone());
        }
        hr
    }

    /// # Safety
    /// Arguments must be valid for the real `CreateDXGIFactory`.
    pub unsafe fn create_factory(&self, riid: *const Guid, factory: *mut *mut c_void) -> HRESULT {
        let real = self.exports.create_dxgi_factory;
        self.call_factory(EntryPoint::CreateDXGIFactory, riid, factory, || real(riid, factory))
    }

    /// # Safety
    /// Arguments must be valid for the real `CreateDXGIFactory1`.
    pub unsafe fn create_factory1(&self, riid: *const Guid, factory: *mut *mut c_void) -> HRESULT {
        let real = self.exports.create_dxgi_factory1;
        self.call_factory(EntryPoint::CreateDXGIFactory1, riid, factory, || real(riid, factory))
    }

    /// # Safety
    /// Arguments must be valid for the real `CreateDXGIFactory2`.
    pub unsafe fn create_factory2(
        &self,
        flags: u32,
        riid: *const Guid,
        factory: *mut *mut c_void,
    ) -> HRESULT {
        let real = self.exports.create_dxgi_factory2;
        self.call_factory(EntryPoint::CreateDXGIFactory2, riid, factory, || {
            real(flags, riid, factory)
        })
    }
}

/// Description string of the adapter behind a device
unsafe fn query_adapter_name(device: *mut c_void) -> Option<String> {
    let dxgi = com::query_interface(device, &IID_IDXGI_DEVICE).ok()?;
    let get_adapter: GetAdapterFn = com::method(dxgi, dxgi_device::GET_ADAPTER);
    let mut found = std::ptr::null_mut();
    let hr = get_adapter(dxgi, &mut found);
    com::release(dxgi);
    if failed(hr) || found.is_null() {
        return None;
    }

    let get_desc: GetAdapterDescFn = com::method(found, adapter::GET_DESC);
    let mut desc = AdapterDesc::default();
    let hr = get_desc(found, &mut desc);
    com::release(found);
    succeeded(hr).then(|| desc.name())
}

static INTERCEPTOR: OnceLock<Interceptor> = OnceLock::new();

/// The installed interceptor, if any
pub fn interceptor() -> Option<&'static Interceptor> {
    INTERCEPTOR.get()
}

/// Patch all four entry points
///
/// Either every hook is installed or none is.
pub fn install(
    exports: RealExports,
    sink: Option<Arc<dyn CaptureSink>>,
    policy: DevicePolicy,
) -> Result<&'static Interceptor, HookError> {
    let interceptor = Interceptor::new(ProcessMemory, exports, sink, policy)?;
    if INTERCEPTOR.set(interceptor).is_err() {
        return Err(HookError::Unsupported("interceptor already installed"));
    }
    let interceptor = INTERCEPTOR
        .get()
        .ok_or(HookError::Unsupported("interceptor unavailable"))?;

    if let Err(e) = interceptor.hooks.install_all() {
        interceptor.hooks.remove_all();
        return Err(e);
    }
    Ok(interceptor)
}

/// Restore every patched entry point
pub fn uninstall() {
    if let Some(interceptor) = INTERCEPTOR.get() {
        interceptor.hooks.remove_all();
        tracing::info!("Entry point hooks removed");
    }
}

#[allow(clippy::too_many_arguments)]
unsafe extern "system" fn d3d11_create_device(
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
) -> HRESULT {
    match INTERCEPTOR.get() {
        Some(interceptor) => interceptor.create_device(
            adapter,
            driver_type,
            software,
            flags,
            feature_levels,
            feature_level_count,
            sdk_version,
            device,
            feature_level,
            immediate_context,
        ),
        None => E_FAIL,
    }
}

unsafe extern "system" fn create_dxgi_factory(riid: *const Guid, factory: *mut *mut c_void) -> HRESULT {
    match INTERCEPTOR.get() {
        Some(interceptor) => interceptor.create_factory(riid, factory),
        None => E_FAIL,
    }
}

unsafe extern "system" fn create_dxgi_factory1(riid: *const Guid, factory: *mut *mut c_void) -> HRESULT {
    match INTERCEPTOR.get() {
        Some(interceptor) => interceptor.create_factory1(riid, factory),
        None => E_FAIL,
    }
}

unsafe extern "system" fn create_dxgi_factory2(
    flags: u32,
    riid: *const Guid,
    factory: *mut *mut c_void,
) -> HRESULT {
    match INTERCEPTOR.get() {
        Some(interceptor) => interceptor.create_factory2(flags, riid, factory),
        None => E_FAIL,
    }
}
