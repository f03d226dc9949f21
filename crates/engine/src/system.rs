//! Real graphics libraries from the system directory
//!
//! Loading by absolute path means the interception library can sit next to
//! the host under the same file name without shadowing the real one.

use std::ffi::{c_void, CStr, OsString};
use std::os::windows::ffi::OsStringExt;
use std::path::PathBuf;
use std::ptr::NonNull;

use windows::core::{HSTRING, PCSTR};
use windows::Win32::Foundation::HMODULE;
use windows::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW};
use windows::Win32::System::SystemInformation::GetSystemDirectoryW;

use dxpipe_sdk::exports::{D3D11_MODULE, DXGI_MODULE};

use crate::error::LoadError;
use crate::loader::ExportResolver;

/// Handles to the real d3d11 and dxgi modules
///
/// The modules are never freed, they stay mapped for the life of the process.
pub struct SystemLibraries {
    d3d11: HMODULE,
    dxgi: HMODULE,
}

impl SystemLibraries {
    #[tracing::instrument(skip_all)]
    pub fn load() -> Result<Self, LoadError> {
        let dir = system_directory()?;
        let d3d11 = load_library(dir.join(D3D11_MODULE))?;
        let dxgi = load_library(dir.join(DXGI_MODULE))?;
        Ok(Self { d3d11, dxgi })
    }
}

impl ExportResolver for SystemLibraries {
    fn resolve(&self, module: &str, export: &CStr) -> Option<NonNull<c_void>> {
        let handle = if module.eq_ignore_ascii_case(D3D11_MODULE) {
            self.d3d11
        } else if module.eq_ignore_ascii_case(DXGI_MODULE) {
            self.dxgi
        } else {
            return None;
        };
        let proc = unsafe { GetProcAddress(handle, PCSTR(export.as_ptr() as *const u8)) }?;
        NonNull::new(proc as *mut c_void)
    }
}

/// `%SystemRoot%\System32`
pub fn system_directory() -> Result<PathBuf, LoadError> {
    let mut buf = [0u16; 260];
    let len = unsafe { GetSystemDirectoryW(Some(&mut buf)) } as usize;
    if len == 0 || len > buf.len() {
        return Err(LoadError::SystemDirectory);
    }
    Ok(PathBuf::from(OsString::from_wide(&buf[..len])))
}

fn load_library(path: PathBuf) -> Result<HMODULE, LoadError> {
    let module = unsafe { LoadLibraryW(&HSTRING::from(path.as_path())) }.map_err(|e| {
        LoadError::Library {
            module: path.display().to_string(),
            reason: e.message().to_string(),
        }
    })?;
    tracing::info!("Loaded {} at {:p}", path.display(), module.0);
    Ok(module)
}
