//! Real entry point resolution
//!
//! The four intercepted exports are resolved once at attach. All of them are
//! required; a missing one aborts interception entirely.

use std::ffi::{c_void, CStr};
use std::fmt;
use std::ptr::NonNull;

use dxpipe_sdk::exports::{
    self, CreateDXGIFactory2Fn, CreateDXGIFactoryFn, D3D11CreateDeviceFn, D3D11_MODULE, DXGI_MODULE,
};

use crate::error::LoadError;

/// One of the intercepted exports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryPoint {
    D3D11CreateDevice,
    CreateDXGIFactory,
    CreateDXGIFactory1,
    CreateDXGIFactory2,
}

impl EntryPoint {
    pub const ALL: [EntryPoint; 4] = [
        EntryPoint::D3D11CreateDevice,
        EntryPoint::CreateDXGIFactory,
        EntryPoint::CreateDXGIFactory1,
        EntryPoint::CreateDXGIFactory2,
    ];

    /// Module that exports this entry point
    pub fn module(self) -> &'static str {
        match self {
            EntryPoint::D3D11CreateDevice => D3D11_MODULE,
            _ => DXGI_MODULE,
        }
    }

    /// Null-terminated export name
    pub fn export(self) -> &'static CStr {
        let bytes = match self {
            EntryPoint::D3D11CreateDevice => exports::D3D11_CREATE_DEVICE,
            EntryPoint::CreateDXGIFactory => exports::CREATE_DXGI_FACTORY,
            EntryPoint::CreateDXGIFactory1 => exports::CREATE_DXGI_FACTORY1,
            EntryPoint::CreateDXGIFactory2 => exports::CREATE_DXGI_FACTORY2,
        };
        // The export table only holds NUL-terminated literals
        CStr::from_bytes_with_nul(bytes).unwrap_or_default()
    }

    pub fn name(self) -> &'static str {
        match self {
            EntryPoint::D3D11CreateDevice => "D3D11CreateDevice",
            EntryPoint::CreateDXGIFactory => "CreateDXGIFactory",
            EntryPoint::CreateDXGIFactory1 => "CreateDXGIFactory1",
            EntryPoint::CreateDXGIFactory2 => "CreateDXGIFactory2",
        }
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Something that can look up exports by module and name
pub trait ExportResolver {
    fn resolve(&self, module: &str, export: &CStr) -> Option<NonNull<c_void>>;
}

/// Addresses of the real implementations
#[derive(Clone, Copy)]
pub struct RealExports {
    pub d3d11_create_device: D3D11CreateDeviceFn,
    pub create_dxgi_factory: CreateDXGIFactoryFn,
    pub create_dxgi_factory1: CreateDXGIFactoryFn,
    pub create_dxgi_factory2: CreateDXGIFactory2Fn,
}

impl RealExports {
    /// Code address of an entry point, i.e. where its patch goes
    pub fn address(&self, entry: EntryPoint) -> usize {
        match entry {
            EntryPoint::D3D11CreateDevice => self.d3d11_create_device as usize,
            EntryPoint::CreateDXGIFactory => self.create_dxgi_factory as usize,
            EntryPoint::CreateDXGIFactory1 => self.create_dxgi_factory1 as usize,
            EntryPoint::CreateDXGIFactory2 => self.create_dxgi_factory2 as usize,
        }
    }
}

impl fmt::Debug for RealExports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for entry in EntryPoint::ALL {
            map.entry(&entry.name(), &format_args!("{:#x}", self.address(entry)));
        }
        map.finish()
    }
}

fn resolve_required(
    resolver: &impl ExportResolver,
    entry: EntryPoint,
) -> Result<NonNull<c_void>, LoadError> {
    let ptr = resolver
        .resolve(entry.module(), entry.export())
        .ok_or_else(|| LoadError::MissingExport {
            module: entry.module(),
            export: entry.name().to_string(),
        })?;
    tracing::info!("{}: {:p}", entry, ptr.as_ptr());
    Ok(ptr)
}

/// Resolve all intercepted entry points
///
/// # Safety
/// The resolver must return addresses of functions with the documented
/// signatures for each export.
#[tracing::instrument(skip_all)]
pub unsafe fn load_exports(resolver: &impl ExportResolver) -> Result<RealExports, LoadError> {
    let device = resolve_required(resolver, EntryPoint::D3D11CreateDevice)?;
    let factory = resolve_required(resolver, EntryPoint::CreateDXGIFactory)?;
    let factory1 = resolve_required(resolver, EntryPoint::CreateDXGIFactory1)?;
    let factory2 = resolve_required(resolver, EntryPoint::CreateDXGIFactory2)?;

    Ok(RealExports {
        d3d11_create_device: std::mem::transmute::<*mut c_void, D3D11CreateDeviceFn>(device.as_ptr()),
        create_dxgi_factory: std::mem::transmute::<*mut c_void, CreateDXGIFactoryFn>(factory.as_ptr()),
        create_dxgi_factory1: std::mem::transmute::<*mut c_void, CreateDXGIFactoryFn>(factory1.as_ptr()),
        create_dxgi_factory2: std::mem::transmute::<*mut c_void, CreateDXGIFactory2Fn>(factory2.as_ptr()),
    })
}
