use dxpipe_sdk::{failed, HRESULT};

use super::{GpuTexture, GraphicsDevice};
use crate::capture::{DepthProfile, Dimensions, SharedCopy, TextureRole, TrackedTexture};
use crate::handoff::{Handoff, HandoffStatus, HandoffTransport};
use crate::texture::TextureDesc;

/// Which copies of one texture were recreated this frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyReport {
    pub staging_recreated: bool,
    pub shared_recreated: bool,
    pub copied: bool,
}

/// Result of one present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub frame: u64,
    pub dimensions: Dimensions,
    /// Indexed by [`TextureRole`]
    pub copies: [CopyReport; 2],
    pub handoff: HandoffStatus,
}

impl FrameReport {
    pub fn copy(&self, role: TextureRole) -> CopyReport {
        self.copies[role.index()]
    }
}

/// Render-thread state of the capture pipeline
pub struct RenderContext<D: GraphicsDevice, T: HandoffTransport> {
    device: Option<D>,
    dimensions: Dimensions,
    profile: DepthProfile,
    color: TrackedTexture<D::Texture>,
    depth: TrackedTexture<D::Texture>,
    handoff: Handoff<T>,
    frames: u64,
}

impl<D: GraphicsDevice, T: HandoffTransport> RenderContext<D, T> {
    pub fn new(profile: DepthProfile, handoff: Handoff<T>) -> Self {
        Self {
            device: None,
            dimensions: Dimensions::default(),
            profile,
            color: TrackedTexture::new(TextureRole::Color),
            depth: TrackedTexture::new(TextureRole::Depth),
            handoff,
            frames: 0,
        }
    }

    pub fn set_device(&mut self, device: D) {
        if self.device.is_some() {
            tracing::warn!("Replacing primary device; tracked textures dropped");
            self.color = TrackedTexture::new(TextureRole::Color);
            self.depth = TrackedTexture::new(TextureRole::Depth);
        }
        self.device = Some(device);
    }

    pub fn has_device(&self) -> bool {
        self.device.is_some()
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn profile(&self) -> DepthProfile {
        self.profile
    }

    pub fn tracked(&self, role: TextureRole) -> &TrackedTexture<D::Texture> {
        match role {
            TextureRole::Color => &self.color,
            TextureRole::Depth => &self.depth,
        }
    }

    pub fn handoff(&self) -> &Handoff<T> {
        &self.handoff
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Whether a creation request with this description is the depth buffer
    pub fn wants_depth(&self, desc: &TextureDesc) -> bool {
        self.profile.matches(desc, self.dimensions)
    }

    /// Track a freshly created depth texture, releasing the previous one
    pub fn capture_depth(&mut self, texture: D::Texture) {
        let desc = texture.desc();
        tracing::info!(
            width = desc.width,
            height = desc.height,
            format = %desc.format,
            "Captured depth texture"
        );
        self.depth.set_live(texture);
    }

    /// Track the swap chain's buffer 0 and take its size as authoritative
    pub fn capture_back_buffer(&mut self, texture: D::Texture) {
        let desc = texture.desc();
        tracing::debug!(
            width = desc.width,
            height = desc.height,
            format = %desc.format,
            "Captured back buffer"
        );
        self.color.set_live(texture);
        self.refresh_dimensions();
    }

    fn refresh_dimensions(&mut self) {
        let Some(live) = self.color.live() else { return };
        let desc = live.desc();
        let current = Dimensions::new(desc.width, desc.height);
        if current.is_set() && current != self.dimensions {
            tracing::info!(width = current.width, height = current.height, "Render size changed");
            self.dimensions = current;
        }
    }

    /// Everything that happens before a real present
    pub fn present(&mut self) -> FrameReport {
        self.frames += 1;
        self.refresh_dimensions();

        let mut copies = [CopyReport::default(); 2];
        if let Some(device) = self.device.as_ref() {
            copies[TextureRole::Color.index()] = sync_copies(device, &mut self.color);
            copies[TextureRole::Depth.index()] = sync_copies(device, &mut self.depth);
        }

        let handoff = self
            .handoff
            .cycle([self.color.descriptor(), self.depth.descriptor()]);

        FrameReport {
            frame: self.frames,
            dimensions: self.dimensions,
            copies,
            handoff,
        }
    }

    /// Drop everything tied to the old swap-chain buffers
    ///
    /// A zero width or height means the window size is used, which is only
    /// known once the new back buffer is reacquired.
    pub fn begin_resize(&mut self, width: u32, height: u32) {
        tracing::info!(width, height, "Swap chain resize");
        self.color.clear_live();
        self.color.release_copies();
        self.depth.release_copies();

        let requested = Dimensions::new(width, height);
        if requested.is_set() {
            self.dimensions = requested;
        }
    }

    pub fn finish_resize(&mut self, result: HRESULT) {
        if failed(result) {
            tracing::warn!("ResizeBuffers failed: {:#010x}", result);
        } else if self.color.live().is_none() {
            tracing::warn!("No back buffer after resize");
        }
    }
}

/// Bring one texture's staging and shareable copies in line with its live
/// texture, then copy into them
fn sync_copies<D: GraphicsDevice>(device: &D, tracked: &mut TrackedTexture<D::Texture>) -> CopyReport {
    let mut report = CopyReport::default();
    let Some(live) = tracked.live().cloned() else {
        return report;
    };
    let source = live.desc();
    let role = tracked.role();

    let staging_stale = tracked
        .staging()
        .map_or(true, |staging| !staging.desc().same_geometry(&source));
    if staging_stale {
        tracked.set_staging(None);
        match device.create_texture(&source.staging_copy()) {
            Ok(staging) => {
                tracing::debug!(%role, width = source.width, height = source.height, "Created staging copy");
                tracked.set_staging(Some(staging));
                report.staging_recreated = true;
            }
            Err(e) => tracing::warn!(%role, "Staging copy failed: {}", e),
        }
    }
    if let Some(staging) = tracked.staging() {
        device.copy_texture(staging, &live);
        report.copied = true;
    }

    let shared_stale = tracked
        .shared()
        .map_or(true, |shared| !shared.desc.same_geometry(&source));
    if shared_stale {
        match create_shared(device, &source) {
            Ok(shared) => {
                tracing::info!(
                    %role,
                    width = source.width,
                    height = source.height,
                    handle = format_args!("{:#x}", shared.handle.0),
                    "Created shareable copy"
                );
                tracked.set_shared(shared);
                report.shared_recreated = true;
            }
            Err(e) => tracing::warn!(%role, "Shareable copy failed: {}", e),
        }
    }
    if let Some(shared) = tracked.shared() {
        // A stale copy kept after a failed recreation cannot take the new size
        if shared.desc.same_geometry(&source) {
            device.copy_texture(&shared.texture, &live);
            report.copied = true;
        }
    }

    report
}

fn create_shared<D: GraphicsDevice>(
    device: &D,
    source: &TextureDesc,
) -> Result<SharedCopy<D::Texture>, super::DeviceError> {
    let desc = source.shared_copy();
    let texture = device.create_texture(&desc)?;
    let handle = device.shared_handle(&texture)?;
    Ok(SharedCopy {
        texture,
        handle,
        desc,
    })
}
