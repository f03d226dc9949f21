//! Consumer-facing wire format
//!
//! One fixed-size record per texture, written as raw bytes in native layout.
//! The consumer reads it with the same `#[repr(C)]` definition.

use crate::desc::Format;

/// Prefix of every named pipe path
pub const PIPE_NAMESPACE: &str = r"\\.\pipe\";

pub const BACKBUFFER_PIPE: &str = "dxpipe_backbuffer";
pub const DEPTHBUFFER_PIPE: &str = "dxpipe_depthbuffer";
pub const CONFIRMATION_PIPE: &str = "dxpipe_confirmation";

/// Inbound buffer of the confirmation pipe
pub const CONFIRMATION_BUFFER_SIZE: u32 = 4;

/// Shareable-handle descriptor sent to the consumer
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextureInfo {
    pub handle: usize,
    pub width: u32,
    pub height: u32,
    pub format: u32,
}

impl TextureInfo {
    pub const SIZE: usize = std::mem::size_of::<TextureInfo>();

    pub fn new(handle: usize, width: u32, height: u32, format: Format) -> Self {
        Self {
            handle,
            width,
            height,
            format: format.0,
        }
    }

    /// Native-layout bytes, padding zeroed
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        let handle = self.handle.to_ne_bytes();
        let h = handle.len();
        out[..h].copy_from_slice(&handle);
        out[h..h + 4].copy_from_slice(&self.width.to_ne_bytes());
        out[h + 4..h + 8].copy_from_slice(&self.height.to_ne_bytes());
        out[h + 8..h + 12].copy_from_slice(&self.format.to_ne_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        let h = std::mem::size_of::<usize>();
        let u32_at = |at: usize| u32::from_ne_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        Some(Self {
            handle: usize::from_ne_bytes(bytes[..h].try_into().ok()?),
            width: u32_at(h),
            height: u32_at(h + 4),
            format: u32_at(h + 8),
        })
    }
}
