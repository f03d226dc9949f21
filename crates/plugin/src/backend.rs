//! D3D11 implementation of the pipeline's graphics device
//!
//! Both types hold the real objects, never proxies: the hub is handed raw
//! pointers from inside the intercepted calls, before anything is wrapped.

use std::ffi::c_void;

use windows::core::Interface;
use windows::Win32::Graphics::Direct3D11::{
    ID3D11Device, ID3D11DeviceContext, ID3D11Texture2D, D3D11_TEXTURE2D_DESC, D3D11_USAGE,
};
use windows::Win32::Graphics::Dxgi::Common::{DXGI_FORMAT, DXGI_SAMPLE_DESC};
use windows::Win32::Graphics::Dxgi::IDXGIResource;

use dxpipe_core::pipeline::{DeviceError, GpuTexture, GraphicsDevice};
use dxpipe_core::{SharedHandle, TextureDesc};
use dxpipe_sdk::desc::{SampleDesc, Texture2dDesc};
use dxpipe_sdk::Format;

/// The primary device and its immediate context
pub struct D3d11Device {
    device: ID3D11Device,
    context: ID3D11DeviceContext,
}

// SAFETY: every use goes through the hub's lock, one thread at a time.
unsafe impl Send for D3d11Device {}

#[derive(Clone)]
pub struct D3d11Texture(ID3D11Texture2D);

// SAFETY: D3D11 resources are free-threaded.
unsafe impl Send for D3d11Texture {}

impl GpuTexture for D3d11Texture {
    fn desc(&self) -> TextureDesc {
        let mut raw = D3D11_TEXTURE2D_DESC::default();
        unsafe { self.0.GetDesc(&mut raw) };
        TextureDesc::from(&from_native(&raw))
    }
}

impl GraphicsDevice for D3d11Device {
    type Texture = D3d11Texture;

    fn create_texture(&self, desc: &TextureDesc) -> Result<D3d11Texture, DeviceError> {
        let native = to_native(&Texture2dDesc::from(desc));
        let mut texture = None;
        unsafe { self.device.CreateTexture2D(&native, None, Some(&mut texture)) }
            .map_err(|e| DeviceError::CreateTexture(e.code().0))?;
        texture
            .map(D3d11Texture)
            .ok_or(DeviceError::CreateTexture(0))
    }

    fn shared_handle(&self, texture: &D3d11Texture) -> Result<SharedHandle, DeviceError> {
        let resource: IDXGIResource = texture
            .0
            .cast()
            .map_err(|e| DeviceError::SharedHandle(e.code().0))?;
        let handle = unsafe { resource.GetSharedHandle() }
            .map_err(|e| DeviceError::SharedHandle(e.code().0))?;
        if handle.is_invalid() {
            return Err(DeviceError::SharedHandle(0));
        }
        Ok(SharedHandle(handle.0 as usize))
    }

    fn copy_texture(&self, dst: &D3d11Texture, src: &D3d11Texture) {
        unsafe { self.context.CopyResource(&dst.0, &src.0) };
    }

    unsafe fn from_raw_device(device: *mut c_void) -> Option<Self> {
        let device = ID3D11Device::from_raw_borrowed(&device)?.clone();
        let context = match device.GetImmediateContext() {
            Ok(context) => context,
            Err(e) => {
                tracing::warn!("GetImmediateContext failed: {}", e);
                return None;
            }
        };
        Some(Self { device, context })
    }

    unsafe fn texture_from_raw(texture: *mut c_void) -> Option<D3d11Texture> {
        ID3D11Texture2D::from_raw_borrowed(&texture)
            .cloned()
            .map(D3d11Texture)
    }
}

fn to_native(desc: &Texture2dDesc) -> D3D11_TEXTURE2D_DESC {
    D3D11_TEXTURE2D_DESC {
        Width: desc.width,
        Height: desc.height,
        MipLevels: desc.mip_levels,
        ArraySize: desc.array_size,
        Format: DXGI_FORMAT(desc.format.0 as i32),
        SampleDesc: DXGI_SAMPLE_DESC {
            Count: desc.sample_desc.count,
            Quality: desc.sample_desc.quality,
        },
        Usage: D3D11_USAGE(desc.usage as i32),
        BindFlags: desc.bind_flags,
        CPUAccessFlags: desc.cpu_access_flags,
        MiscFlags: desc.misc_flags,
    }
}

fn from_native(desc: &D3D11_TEXTURE2D_DESC) -> Texture2dDesc {
    Texture2dDesc {
        width: desc.Width,
        height: desc.Height,
        mip_levels: desc.MipLevels,
        array_size: desc.ArraySize,
        format: Format(desc.Format.0 as u32),
        sample_desc: SampleDesc {
            count: desc.SampleDesc.Count,
            quality: desc.SampleDesc.Quality,
        },
        usage: desc.Usage.0 as u32,
        bind_flags: desc.BindFlags,
        cpu_access_flags: desc.CPUAccessFlags,
        misc_flags: desc.MiscFlags,
    }
}
