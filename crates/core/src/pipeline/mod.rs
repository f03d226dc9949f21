//! Per-frame export pipeline
//!
//! [`RenderContext`] owns everything the frame loop mutates: the primary
//! device, tracked dimensions, both tracked textures with their copies, and
//! the handoff state. [`CaptureHub`] puts it behind a lock and feeds it from
//! the proxies.
//!
//! The GPU side is abstracted by [`GraphicsDevice`] so the pipeline runs
//! against a mock in tests and against D3D11 in the plugin.

mod context;
mod hub;

#[cfg(test)]
pub(crate) mod mock;

pub use context::{CopyReport, FrameReport, RenderContext};
pub use hub::CaptureHub;

use std::ffi::c_void;

use thiserror::Error;

use crate::texture::{SharedHandle, TextureDesc};

/// Errors from the graphics backend
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("texture creation failed: {0:#010x}")]
    CreateTexture(i32),

    #[error("shared handle unavailable: {0:#010x}")]
    SharedHandle(i32),

    #[error("no device")]
    Unavailable,
}

/// A reference-counted GPU texture; dropping it releases the reference
pub trait GpuTexture: Clone + Send {
    fn desc(&self) -> TextureDesc;
}

/// The operations the pipeline needs from the primary device
pub trait GraphicsDevice: Send + Sized {
    type Texture: GpuTexture;

    fn create_texture(&self, desc: &TextureDesc) -> Result<Self::Texture, DeviceError>;

    /// OS handle another process can open the texture with
    fn shared_handle(&self, texture: &Self::Texture) -> Result<SharedHandle, DeviceError>;

    /// Full-resource copy on the immediate context
    fn copy_texture(&self, dst: &Self::Texture, src: &Self::Texture);

    /// Take a reference on a raw `ID3D11Device`
    ///
    /// # Safety
    /// `device` must be null or a live `ID3D11Device`.
    unsafe fn from_raw_device(device: *mut c_void) -> Option<Self>;

    /// Take a reference on a raw `ID3D11Texture2D`
    ///
    /// # Safety
    /// `texture` must be null or a live `ID3D11Texture2D`.
    unsafe fn texture_from_raw(texture: *mut c_void) -> Option<Self::Texture>;
}
