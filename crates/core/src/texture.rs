//! Texture descriptions
//!
//! A typed view of `D3D11_TEXTURE2D_DESC` shared by the capture rules, the
//! export pipeline and the graphics backend.

use bitflags::bitflags;

use dxpipe_sdk::desc::usage;
use dxpipe_sdk::{Format, SampleDesc, Texture2dDesc};

bitflags! {
    /// `D3D11_BIND_FLAG`
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct BindFlags: u32 {
        const VERTEX_BUFFER = 0x1;
        const INDEX_BUFFER = 0x2;
        const CONSTANT_BUFFER = 0x4;
        const SHADER_RESOURCE = 0x8;
        const STREAM_OUTPUT = 0x10;
        const RENDER_TARGET = 0x20;
        const DEPTH_STENCIL = 0x40;
        const UNORDERED_ACCESS = 0x80;
    }
}

bitflags! {
    /// `D3D11_CPU_ACCESS_FLAG`
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct CpuAccess: u32 {
        const WRITE = 0x1_0000;
        const READ = 0x2_0000;
    }
}

bitflags! {
    /// `D3D11_RESOURCE_MISC_FLAG`, only the bits this crate sets or inspects
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct MiscFlags: u32 {
        const GENERATE_MIPS = 0x1;
        const SHARED = 0x2;
        const TEXTURECUBE = 0x4;
        const SHARED_KEYEDMUTEX = 0x100;
        const SHARED_NTHANDLE = 0x800;
    }
}

/// `D3D11_USAGE`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Usage {
    #[default]
    Default,
    Immutable,
    Dynamic,
    Staging,
}

impl Usage {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            usage::IMMUTABLE => Usage::Immutable,
            usage::DYNAMIC => Usage::Dynamic,
            usage::STAGING => Usage::Staging,
            _ => Usage::Default,
        }
    }

    pub fn to_raw(self) -> u32 {
        match self {
            Usage::Default => usage::DEFAULT,
            Usage::Immutable => usage::IMMUTABLE,
            Usage::Dynamic => usage::DYNAMIC,
            Usage::Staging => usage::STAGING,
        }
    }
}

/// OS-level handle that another process can open to reach the same GPU memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SharedHandle(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub array_size: u32,
    pub format: Format,
    pub sample_count: u32,
    pub sample_quality: u32,
    pub usage: Usage,
    pub bind: BindFlags,
    pub cpu_access: CpuAccess,
    pub misc: MiscFlags,
}

impl Default for TextureDesc {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            mip_levels: 1,
            array_size: 1,
            format: Format::UNKNOWN,
            sample_count: 1,
            sample_quality: 0,
            usage: Usage::Default,
            bind: BindFlags::empty(),
            cpu_access: CpuAccess::empty(),
            misc: MiscFlags::empty(),
        }
    }
}

impl TextureDesc {
    /// Width, height and format all agree
    pub fn same_geometry(&self, other: &TextureDesc) -> bool {
        self.width == other.width && self.height == other.height && self.format == other.format
    }

    /// CPU-readable duplicate of a texture with this description
    pub fn staging_copy(&self) -> TextureDesc {
        TextureDesc {
            mip_levels: 1,
            array_size: 1,
            usage: Usage::Staging,
            bind: BindFlags::empty(),
            cpu_access: CpuAccess::READ,
            misc: MiscFlags::empty(),
            ..*self
        }
    }

    /// GPU-shareable duplicate of a texture with this description
    pub fn shared_copy(&self) -> TextureDesc {
        TextureDesc {
            width: self.width,
            height: self.height,
            format: self.format,
            usage: Usage::Default,
            bind: BindFlags::SHADER_RESOURCE,
            misc: MiscFlags::SHARED,
            ..TextureDesc::default()
        }
    }
}

impl From<&Texture2dDesc> for TextureDesc {
    fn from(raw: &Texture2dDesc) -> Self {
        Self {
            width: raw.width,
            height: raw.height,
            mip_levels: raw.mip_levels,
            array_size: raw.array_size,
            format: raw.format,
            sample_count: raw.sample_desc.count,
            sample_quality: raw.sample_desc.quality,
            usage: Usage::from_raw(raw.usage),
            bind: BindFlags::from_bits_retain(raw.bind_flags),
            cpu_access: CpuAccess::from_bits_retain(raw.cpu_access_flags),
            misc: MiscFlags::from_bits_retain(raw.misc_flags),
        }
    }
}

impl From<&TextureDesc> for Texture2dDesc {
    fn from(desc: &TextureDesc) -> Self {
        Self {
            width: desc.width,
            height: desc.height,
            mip_levels: desc.mip_levels,
            array_size: desc.array_size,
            format: desc.format,
            sample_desc: SampleDesc {
                count: desc.sample_count,
                quality: desc.sample_quality,
            },
            usage: desc.usage.to_raw(),
            bind_flags: desc.bind.bits(),
            cpu_access_flags: desc.cpu_access.bits(),
            misc_flags: desc.misc.bits(),
        }
    }
}
