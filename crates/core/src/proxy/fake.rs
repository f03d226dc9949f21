//! Hand-built COM objects for proxy and interceptor tests
//!
//! Every slot defaults to [`echo`], which returns `this + arg` so a test can
//! tell which object a forwarded call landed on. Relationship getters hand
//! out the configured child with a new reference.

use std::ffi::c_void;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, AtomicU32, Ordering};

use parking_lot::Mutex;

use dxpipe_sdk::com::{self, AddRefFn, QueryInterfaceFn, ReleaseFn};
use dxpipe_sdk::iids::IID_IUNKNOWN;
use dxpipe_sdk::{AdapterDesc, Guid, Texture2dDesc, E_NOINTERFACE, E_POINTER, HRESULT, S_OK};

use crate::capture::CaptureSink;

pub type EchoFn = unsafe extern "system" fn(this: *mut c_void, arg: usize) -> usize;

#[repr(C)]
struct FakeObject {
    vtbl: *const *const c_void,
    refs: AtomicU32,
    calls: AtomicU32,
    slots: Box<[*const c_void]>,
    iids: Vec<Guid>,
    child: AtomicPtr<c_void>,
    label: String,
}

/// Owner of one fake object; frees it on drop regardless of its count
pub struct Fake(NonNull<FakeObject>);

impl Fake {
    pub fn new(iids: &[Guid], slot_count: usize) -> Self {
        let mut slots = vec![echo as EchoFn as *const c_void; slot_count.max(3)].into_boxed_slice();
        slots[0] = fake_query_interface as QueryInterfaceFn as *const c_void;
        slots[1] = fake_add_ref as AddRefFn as *const c_void;
        slots[2] = fake_release as ReleaseFn as *const c_void;

        let object = Box::new(FakeObject {
            vtbl: slots.as_ptr(),
            refs: AtomicU32::new(1),
            calls: AtomicU32::new(0),
            slots,
            iids: iids.to_vec(),
            child: AtomicPtr::new(ptr::null_mut()),
            label: String::new(),
        });
        Fake(NonNull::from(Box::leak(object)))
    }

    fn object(&self) -> &FakeObject {
        unsafe { self.0.as_ref() }
    }

    pub fn ptr(&self) -> *mut c_void {
        self.0.as_ptr() as *mut c_void
    }

    pub fn refs(&self) -> u32 {
        self.object().refs.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> u32 {
        self.object().calls.load(Ordering::SeqCst)
    }

    /// Must be called before the object is shared
    pub fn set_slot(&mut self, slot: usize, function: *const c_void) {
        unsafe { self.0.as_mut().slots[slot] = function };
    }

    pub fn set_child(&self, child: &Fake) {
        self.object().child.store(child.ptr(), Ordering::SeqCst);
    }

    pub fn set_label(&mut self, label: &str) {
        unsafe { self.0.as_mut().label = label.to_string() };
    }
}

impl Drop for Fake {
    fn drop(&mut self) {
        unsafe { drop(Box::from_raw(self.0.as_ptr())) };
    }
}

unsafe fn object<'a>(this: *mut c_void) -> &'a FakeObject {
    &*(this as *const FakeObject)
}

unsafe extern "system" fn fake_query_interface(
    this: *mut c_void,
    riid: *const Guid,
    out: *mut *mut c_void,
) -> HRESULT {
    if riid.is_null() || out.is_null() {
        return E_POINTER;
    }
    let fake = object(this);
    if *riid == IID_IUNKNOWN || fake.iids.contains(&*riid) {
        fake.refs.fetch_add(1, Ordering::SeqCst);
        *out = this;
        S_OK
    } else {
        *out = ptr::null_mut();
        E_NOINTERFACE
    }
}

unsafe extern "system" fn fake_add_ref(this: *mut c_void) -> u32 {
    object(this).refs.fetch_add(1, Ordering::SeqCst) + 1
}

unsafe extern "system" fn fake_release(this: *mut c_void) -> u32 {
    object(this).refs.fetch_sub(1, Ordering::SeqCst) - 1
}

pub unsafe extern "system" fn echo(this: *mut c_void, arg: usize) -> usize {
    object(this).calls.fetch_add(1, Ordering::SeqCst);
    this as usize + arg
}

unsafe fn hand_out_child(this: *mut c_void, riid: Option<&Guid>, out: *mut *mut c_void) -> HRESULT {
    if out.is_null() {
        return E_POINTER;
    }
    let fake = object(this);
    fake.calls.fetch_add(1, Ordering::SeqCst);
    let child = fake.child.load(Ordering::SeqCst);
    if child.is_null() {
        *out = ptr::null_mut();
        return E_NOINTERFACE;
    }
    match riid {
        Some(iid) => match com::query_interface(child, iid) {
            Ok(p) => {
                *out = p;
                S_OK
            }
            Err(hr) => {
                *out = ptr::null_mut();
                hr
            }
        },
        None => {
            com::add_ref(child);
            *out = child;
            S_OK
        }
    }
}

pub unsafe extern "system" fn get_child(this: *mut c_void, out: *mut *mut c_void) -> HRESULT {
    hand_out_child(this, None, out)
}

pub unsafe extern "system" fn get_child_void(this: *mut c_void, out: *mut *mut c_void) {
    hand_out_child(this, None, out);
}

pub unsafe extern "system" fn query_child(
    this: *mut c_void,
    riid: *const Guid,
    out: *mut *mut c_void,
) -> HRESULT {
    hand_out_child(this, riid.as_ref(), out)
}

pub unsafe extern "system" fn get_buffer(
    this: *mut c_void,
    _buffer: u32,
    riid: *const Guid,
    out: *mut *mut c_void,
) -> HRESULT {
    hand_out_child(this, riid.as_ref(), out)
}

pub unsafe extern "system" fn create_texture(
    this: *mut c_void,
    _desc: *const Texture2dDesc,
    _initial_data: *const c_void,
    out: *mut *mut c_void,
) -> HRESULT {
    hand_out_child(this, None, out)
}

pub unsafe extern "system" fn create_swap_chain(
    this: *mut c_void,
    _device: *mut c_void,
    _desc: *mut c_void,
    out: *mut *mut c_void,
) -> HRESULT {
    hand_out_child(this, None, out)
}

pub unsafe extern "system" fn adapter_desc(this: *mut c_void, desc: *mut AdapterDesc) -> HRESULT {
    if desc.is_null() {
        return E_POINTER;
    }
    let mut out = AdapterDesc::default();
    for (slot, unit) in out.description.iter_mut().zip(object(this).label.encode_utf16()) {
        *slot = unit;
    }
    *desc = out;
    S_OK
}

pub unsafe extern "system" fn present(this: *mut c_void, _sync: u32, _flags: u32) -> HRESULT {
    object(this).calls.fetch_add(1, Ordering::SeqCst);
    S_OK
}

pub unsafe extern "system" fn resize_buffers(
    this: *mut c_void,
    _count: u32,
    _width: u32,
    _height: u32,
    _format: u32,
    _flags: u32,
) -> HRESULT {
    object(this).calls.fetch_add(1, Ordering::SeqCst);
    S_OK
}

/// Everything a sink was told, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    DeviceCreated(usize),
    TextureCreated { width: u32, height: u32, texture: usize },
    BackBuffer(usize),
    Present,
    ResizeBegin(u32, u32),
    ResizeEnd(HRESULT),
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().clone()
    }

    fn push(&self, event: SinkEvent) {
        self.events.lock().push(event);
    }
}

impl CaptureSink for RecordingSink {
    unsafe fn device_created(&self, device: *mut c_void) {
        self.push(SinkEvent::DeviceCreated(device as usize));
    }

    unsafe fn texture_created(&self, desc: &Texture2dDesc, texture: *mut c_void) {
        self.push(SinkEvent::TextureCreated {
            width: desc.width,
            height: desc.height,
            texture: texture as usize,
        });
    }

    unsafe fn back_buffer(&self, texture: *mut c_void) {
        self.push(SinkEvent::BackBuffer(texture as usize));
    }

    fn present(&self) {
        self.push(SinkEvent::Present);
    }

    fn resize_begin(&self, width: u32, height: u32) {
        self.push(SinkEvent::ResizeBegin(width, height));
    }

    fn resize_end(&self, result: HRESULT) {
        self.push(SinkEvent::ResizeEnd(result));
    }
}
