//! Tracked textures and their derived copies

use std::fmt;

use dxpipe_sdk::wire::{BACKBUFFER_PIPE, DEPTHBUFFER_PIPE};
use dxpipe_sdk::TextureInfo;

use crate::texture::{SharedHandle, TextureDesc};

/// Which of the two exported textures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureRole {
    Color,
    Depth,
}

impl TextureRole {
    pub const ALL: [TextureRole; 2] = [TextureRole::Color, TextureRole::Depth];

    pub fn name(self) -> &'static str {
        match self {
            TextureRole::Color => "color",
            TextureRole::Depth => "depth",
        }
    }

    /// Default pipe name the role's descriptor travels over
    pub fn default_pipe(self) -> &'static str {
        match self {
            TextureRole::Color => BACKBUFFER_PIPE,
            TextureRole::Depth => DEPTHBUFFER_PIPE,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for TextureRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// GPU-shareable copy together with its OS handle
#[derive(Debug, Clone)]
pub struct SharedCopy<T> {
    pub texture: T,
    pub handle: SharedHandle,
    pub desc: TextureDesc,
}

impl<T> SharedCopy<T> {
    pub fn descriptor(&self) -> TextureInfo {
        TextureInfo::new(self.handle.0, self.desc.width, self.desc.height, self.desc.format)
    }
}

/// A live texture plus the copies derived from it
///
/// Dropping a reference here releases it on the GPU side, so replacing or
/// clearing a slot is all the cleanup there is.
#[derive(Debug)]
pub struct TrackedTexture<T> {
    role: TextureRole,
    live: Option<T>,
    staging: Option<T>,
    shared: Option<SharedCopy<T>>,
}

impl<T> TrackedTexture<T> {
    pub fn new(role: TextureRole) -> Self {
        Self {
            role,
            live: None,
            staging: None,
            shared: None,
        }
    }

    pub fn role(&self) -> TextureRole {
        self.role
    }

    pub fn live(&self) -> Option<&T> {
        self.live.as_ref()
    }

    pub fn staging(&self) -> Option<&T> {
        self.staging.as_ref()
    }

    pub fn shared(&self) -> Option<&SharedCopy<T>> {
        self.shared.as_ref()
    }

    /// Replace the live reference, releasing the previous one
    pub fn set_live(&mut self, texture: T) {
        self.live = Some(texture);
    }

    pub fn clear_live(&mut self) {
        self.live = None;
    }

    pub fn set_staging(&mut self, staging: Option<T>) {
        self.staging = staging;
    }

    pub fn set_shared(&mut self, shared: SharedCopy<T>) {
        self.shared = Some(shared);
    }

    /// Release staging and shareable copies; the handle goes with them
    pub fn release_copies(&mut self) {
        self.staging = None;
        self.shared = None;
    }

    pub fn has_copies(&self) -> bool {
        self.staging.is_some() || self.shared.is_some()
    }

    /// Descriptor the consumer needs to open the shareable copy
    pub fn descriptor(&self) -> Option<TextureInfo> {
        self.shared.as_ref().map(SharedCopy::descriptor)
    }
}
