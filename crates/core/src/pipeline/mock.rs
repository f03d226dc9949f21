//! In-memory [`GraphicsDevice`] for pipeline tests

use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::{DeviceError, GpuTexture, GraphicsDevice};
use crate::texture::{SharedHandle, TextureDesc};

#[derive(Debug)]
struct TextureInner {
    id: usize,
    desc: TextureDesc,
}

/// Reference-counted fake texture; `Arc` counts stand in for COM references
#[derive(Debug, Clone)]
pub struct MockTexture(Arc<TextureInner>);

impl MockTexture {
    pub fn id(&self) -> usize {
        self.0.id
    }

    pub fn same(&self, other: &MockTexture) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn refs(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl GpuTexture for MockTexture {
    fn desc(&self) -> TextureDesc {
        self.0.desc
    }
}

#[derive(Debug, Default)]
struct DeviceState {
    next_id: AtomicUsize,
    created: AtomicUsize,
    copies: AtomicUsize,
    fail_create: AtomicBool,
    fail_shared: AtomicBool,
}

/// Cloning shares the counters
#[derive(Debug, Clone, Default)]
pub struct MockDevice(Arc<DeviceState>);

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// A texture as the application would have created it
    pub fn texture(&self, desc: TextureDesc) -> MockTexture {
        let id = self.0.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        MockTexture(Arc::new(TextureInner { id, desc }))
    }

    /// Number of successful `create_texture` calls
    pub fn created(&self) -> usize {
        self.0.created.load(Ordering::Relaxed)
    }

    pub fn copies(&self) -> usize {
        self.0.copies.load(Ordering::Relaxed)
    }

    pub fn fail_creates(&self, fail: bool) {
        self.0.fail_create.store(fail, Ordering::Relaxed);
    }

    pub fn fail_shared_handles(&self, fail: bool) {
        self.0.fail_shared.store(fail, Ordering::Relaxed);
    }
}

impl GraphicsDevice for MockDevice {
    type Texture = MockTexture;

    fn create_texture(&self, desc: &TextureDesc) -> Result<MockTexture, DeviceError> {
        if self.0.fail_create.load(Ordering::Relaxed) {
            return Err(DeviceError::CreateTexture(0x8007_000Eu32 as i32));
        }
        self.0.created.fetch_add(1, Ordering::Relaxed);
        Ok(self.texture(*desc))
    }

    fn shared_handle(&self, texture: &MockTexture) -> Result<SharedHandle, DeviceError> {
        if self.0.fail_shared.load(Ordering::Relaxed) {
            return Err(DeviceError::SharedHandle(0x8000_4005u32 as i32));
        }
        Ok(SharedHandle(0x1000 + texture.id() * 4))
    }

    fn copy_texture(&self, _dst: &MockTexture, _src: &MockTexture) {
        self.0.copies.fetch_add(1, Ordering::Relaxed);
    }

    unsafe fn from_raw_device(device: *mut c_void) -> Option<Self> {
        (!device.is_null()).then(MockDevice::new)
    }

    unsafe fn texture_from_raw(texture: *mut c_void) -> Option<MockTexture> {
        if texture.is_null() {
            return None;
        }
        // Tests pass a pointer to a `TextureDesc`
        let desc = *(texture as *const TextureDesc);
        Some(MockTexture(Arc::new(TextureInner {
            id: texture as usize,
            desc,
        })))
    }
}
