//! Minimal COM ABI
//!
//! Only what the proxies need to talk to real objects through their vtables.
//! Every object starts with a pointer to its vtable and the first three slots
//! are always QueryInterface, AddRef and Release.

use std::ffi::c_void;
use std::fmt;

/// COM result code
#[allow(clippy::upper_case_acronyms)]
pub type HRESULT = i32;

pub const S_OK: HRESULT = 0;
pub const E_NOINTERFACE: HRESULT = 0x8000_4002_u32 as i32;
pub const E_POINTER: HRESULT = 0x8000_4003_u32 as i32;
pub const E_FAIL: HRESULT = 0x8000_4005_u32 as i32;

#[inline]
pub fn succeeded(hr: HRESULT) -> bool {
    hr >= 0
}

#[inline]
pub fn failed(hr: HRESULT) -> bool {
    hr < 0
}

/// Binary GUID layout as used by REFIID parameters
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    /// Build a GUID from its canonical 128-bit big-endian form
    pub const fn from_u128(value: u128) -> Self {
        Self {
            data1: (value >> 96) as u32,
            data2: (value >> 80) as u16,
            data3: (value >> 64) as u16,
            data4: (value as u64).to_be_bytes(),
        }
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-",
            self.data1, self.data2, self.data3, self.data4[0], self.data4[1]
        )?;
        for byte in &self.data4[2..] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

pub type QueryInterfaceFn =
    unsafe extern "system" fn(this: *mut c_void, riid: *const Guid, out: *mut *mut c_void) -> HRESULT;
pub type AddRefFn = unsafe extern "system" fn(this: *mut c_void) -> u32;
pub type ReleaseFn = unsafe extern "system" fn(this: *mut c_void) -> u32;

/// Read a method pointer out of an object's vtable
///
/// # Safety
/// `this` must point to a live COM object whose vtable has more than `slot` entries.
#[inline]
pub unsafe fn vtable_slot(this: *mut c_void, slot: usize) -> *const c_void {
    let vtbl = *(this as *const *const *const c_void);
    *vtbl.add(slot)
}

/// Read a method pointer and reinterpret it as a typed function pointer
///
/// # Safety
/// Same as [`vtable_slot`], and `F` must be the method's exact signature.
#[inline]
pub unsafe fn method<F: Copy>(this: *mut c_void, slot: usize) -> F {
    debug_assert_eq!(std::mem::size_of::<F>(), std::mem::size_of::<*const c_void>());
    let ptr = vtable_slot(this, slot);
    std::mem::transmute_copy(&ptr)
}

/// `IUnknown::QueryInterface`
///
/// # Safety
/// `this` must be a live COM object.
pub unsafe fn query_interface(this: *mut c_void, iid: &Guid) -> Result<*mut c_void, HRESULT> {
    let qi: QueryInterfaceFn = method(this, 0);
    let mut out = std::ptr::null_mut();
    let hr = qi(this, iid, &mut out);
    if succeeded(hr) && !out.is_null() {
        Ok(out)
    } else if succeeded(hr) {
        Err(E_POINTER)
    } else {
        Err(hr)
    }
}

/// `IUnknown::AddRef`
///
/// # Safety
/// `this` must be a live COM object.
pub unsafe fn add_ref(this: *mut c_void) -> u32 {
    let f: AddRefFn = method(this, 1);
    f(this)
}

/// `IUnknown::Release`
///
/// # Safety
/// `this` must be a live COM object and the caller must own the reference being released.
pub unsafe fn release(this: *mut c_void) -> u32 {
    let f: ReleaseFn = method(this, 2);
    f(this)
}
