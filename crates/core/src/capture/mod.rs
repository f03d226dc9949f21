//! Resource capture
//!
//! The proxies report texture creation, back-buffer retrieval, presents and
//! resizes to a [`CaptureSink`]. The matching rules that decide which
//! textures are tracked live here too.

mod tracked;

pub use tracked::{SharedCopy, TextureRole, TrackedTexture};

use std::ffi::c_void;

use dxpipe_sdk::{Format, Texture2dDesc, HRESULT};

use crate::texture::TextureDesc;

/// Receiver of everything the proxies observe
///
/// Implementations must never fail visibly: the application keeps getting
/// the real results no matter what happens here.
pub trait CaptureSink: Send + Sync {
    /// The primary device was created
    ///
    /// # Safety
    /// `device` is a live, unwrapped `ID3D11Device`, borrowed for the call.
    unsafe fn device_created(&self, device: *mut c_void);

    /// A texture was created through the device proxy
    ///
    /// # Safety
    /// `texture` is a live `ID3D11Texture2D`, borrowed for the call.
    unsafe fn texture_created(&self, desc: &Texture2dDesc, texture: *mut c_void);

    /// The swap chain returned buffer 0 as a texture
    ///
    /// # Safety
    /// `texture` is a live `ID3D11Texture2D`, borrowed for the call.
    unsafe fn back_buffer(&self, texture: *mut c_void);

    /// Called before every real present
    fn present(&self);

    /// Called before a real resize with the requested size
    fn resize_begin(&self, width: u32, height: u32);

    /// Called after a real resize with its result
    fn resize_end(&self, result: HRESULT);
}

/// Process-wide render size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_set(&self) -> bool {
        self.width != 0 && self.height != 0
    }
}

/// What a depth buffer looks like at creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthProfile {
    pub format: Format,
    /// Required sample count; `None` accepts any
    pub sample_count: Option<u32>,
}

impl Default for DepthProfile {
    fn default() -> Self {
        Self {
            format: Format::R32_TYPELESS,
            sample_count: None,
        }
    }
}

impl DepthProfile {
    /// Whether a texture creation request is the depth buffer
    pub fn matches(&self, desc: &TextureDesc, dimensions: Dimensions) -> bool {
        dimensions.is_set()
            && desc.width == dimensions.width
            && desc.height == dimensions.height
            && desc.format == self.format
            && self.sample_count.map_or(true, |count| desc.sample_count == count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(width: u32, height: u32, format: Format) -> TextureDesc {
        TextureDesc {
            width,
            height,
            format,
            ..TextureDesc::default()
        }
    }

    #[test]
    fn test_depth_profile_matches_exact_request() {
        let profile = DepthProfile::default();
        let dims = Dimensions::new(1920, 1080);
        assert!(profile.matches(&request(1920, 1080, Format::R32_TYPELESS), dims));
    }

    #[test]
    fn test_depth_profile_rejects_mismatches() {
        let profile = DepthProfile::default();
        let dims = Dimensions::new(1920, 1080);
        assert!(!profile.matches(&request(1280, 1080, Format::R32_TYPELESS), dims));
        assert!(!profile.matches(&request(1920, 720, Format::R32_TYPELESS), dims));
        assert!(!profile.matches(&request(1920, 1080, Format::R24G8_TYPELESS), dims));
    }

    #[test]
    fn test_multisampled_depth_buffer_matches() {
        let dims = Dimensions::new(1920, 1080);
        let multisampled = TextureDesc {
            sample_count: 4,
            ..request(1920, 1080, Format::R32_TYPELESS)
        };
        assert!(DepthProfile::default().matches(&multisampled, dims));

        let single_sampled_only = DepthProfile {
            sample_count: Some(1),
            ..DepthProfile::default()
        };
        assert!(!single_sampled_only.matches(&multisampled, dims));
        assert!(single_sampled_only.matches(&request(1920, 1080, Format::R32_TYPELESS), dims));
    }

    #[test]
    fn test_depth_profile_needs_dimensions() {
        let profile = DepthProfile::default();
        assert!(!profile.matches(&request(0, 0, Format::R32_TYPELESS), Dimensions::default()));
    }

    #[test]
    fn test_custom_depth_format() {
        let profile = DepthProfile {
            format: Format::R24G8_TYPELESS,
            sample_count: None,
        };
        let dims = Dimensions::new(800, 600);
        assert!(profile.matches(&request(800, 600, Format::R24G8_TYPELESS), dims));
        assert!(!profile.matches(&request(800, 600, Format::R32_TYPELESS), dims));
    }
}
