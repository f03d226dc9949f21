//! Raw resource descriptions
//!
//! Binary-compatible with `D3D11_TEXTURE2D_DESC`, `DXGI_ADAPTER_DESC` and
//! `DXGI_FORMAT`. Flag fields stay as plain integers here; typed views live
//! in the core crate.

use std::fmt;

/// `DXGI_SAMPLE_DESC`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleDesc {
    pub count: u32,
    pub quality: u32,
}

/// `D3D11_TEXTURE2D_DESC`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Texture2dDesc {
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub array_size: u32,
    pub format: Format,
    pub sample_desc: SampleDesc,
    pub usage: u32,
    pub bind_flags: u32,
    pub cpu_access_flags: u32,
    pub misc_flags: u32,
}

/// `D3D11_USAGE` values
pub mod usage {
    pub const DEFAULT: u32 = 0;
    pub const IMMUTABLE: u32 = 1;
    pub const DYNAMIC: u32 = 2;
    pub const STAGING: u32 = 3;
}

/// `LUID`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Luid {
    pub low_part: u32,
    pub high_part: i32,
}

/// `DXGI_ADAPTER_DESC`
#[repr(C)]
#[derive(Clone, Copy)]
pub struct AdapterDesc {
    pub description: [u16; 128],
    pub vendor_id: u32,
    pub device_id: u32,
    pub sub_sys_id: u32,
    pub revision: u32,
    pub dedicated_video_memory: usize,
    pub dedicated_system_memory: usize,
    pub shared_system_memory: usize,
    pub adapter_luid: Luid,
}

impl Default for AdapterDesc {
    fn default() -> Self {
        Self {
            description: [0; 128],
            vendor_id: 0,
            device_id: 0,
            sub_sys_id: 0,
            revision: 0,
            dedicated_video_memory: 0,
            dedicated_system_memory: 0,
            shared_system_memory: 0,
            adapter_luid: Luid::default(),
        }
    }
}

impl AdapterDesc {
    /// The adapter's description string, up to the first NUL
    pub fn name(&self) -> String {
        let len = self
            .description
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(self.description.len());
        String::from_utf16_lossy(&self.description[..len])
    }
}

/// `DXGI_FORMAT`
#[repr(transparent)]
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Format(pub u32);

macro_rules! formats {
    ($($name:ident = $value:literal),* $(,)?) => {
        impl Format {
            $(pub const $name: Format = Format($value);)*

            /// Symbolic name of a known format
            pub fn name(self) -> Option<&'static str> {
                match self.0 {
                    $($value => Some(stringify!($name)),)*
                    _ => None,
                }
            }

            /// Parse a symbolic name, with or without the `DXGI_FORMAT_` prefix
            pub fn from_name(name: &str) -> Option<Format> {
                let name = name.trim();
                let name = name.strip_prefix("DXGI_FORMAT_").unwrap_or(name);
                let name = name.to_ascii_uppercase();
                $(
                    if name == stringify!($name) {
                        return Some(Format::$name);
                    }
                )*
                None
            }
        }
    };
}

formats! {
    UNKNOWN = 0,
    R16G16B16A16_FLOAT = 10,
    R10G10B10A2_UNORM = 24,
    R8G8B8A8_TYPELESS = 27,
    R8G8B8A8_UNORM = 28,
    R8G8B8A8_UNORM_SRGB = 29,
    R32_TYPELESS = 39,
    D32_FLOAT = 40,
    R32_FLOAT = 41,
    R24G8_TYPELESS = 44,
    D24_UNORM_S8_UINT = 45,
    R16_TYPELESS = 53,
    D16_UNORM = 55,
    B8G8R8A8_UNORM = 87,
    B8G8R8A8_TYPELESS = 90,
    B8G8R8A8_UNORM_SRGB = 91,
}

impl fmt::Debug for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}({})", name, self.0),
            None => write!(f, "Format({})", self.0),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.0),
        }
    }
}
