use std::ffi::c_void;

use parking_lot::Mutex;

use dxpipe_sdk::{Texture2dDesc, HRESULT};

use super::{FrameReport, GraphicsDevice, RenderContext};
use crate::capture::CaptureSink;
use crate::handoff::{HandoffStatus, HandoffTransport};
use crate::texture::TextureDesc;

/// [`CaptureSink`] that feeds a locked [`RenderContext`]
///
/// The lock is only contended when the application touches the device from
/// a second thread while the render thread presents. The backend works on
/// the real objects, so nothing here re-enters a proxy.
pub struct CaptureHub<D: GraphicsDevice, T: HandoffTransport> {
    context: Mutex<RenderContext<D, T>>,
}

impl<D: GraphicsDevice, T: HandoffTransport> CaptureHub<D, T> {
    pub fn new(context: RenderContext<D, T>) -> Self {
        Self {
            context: Mutex::new(context),
        }
    }

    /// Run `f` with the context locked
    pub fn with<R>(&self, f: impl FnOnce(&mut RenderContext<D, T>) -> R) -> R {
        f(&mut self.context.lock())
    }

    fn log_frame(report: &FrameReport) {
        match report.handoff {
            HandoffStatus::CoolingDown | HandoffStatus::Idle => {
                tracing::trace!(frame = report.frame, "Frame exported")
            }
            status => tracing::debug!(
                frame = report.frame,
                width = report.dimensions.width,
                height = report.dimensions.height,
                %status,
                "Handoff cycle"
            ),
        }
    }
}

impl<D: GraphicsDevice, T: HandoffTransport> CaptureSink for CaptureHub<D, T> {
    unsafe fn device_created(&self, device: *mut c_void) {
        match D::from_raw_device(device) {
            Some(device) => self.context.lock().set_device(device),
            None => tracing::warn!("Primary device could not be retained"),
        }
    }

    unsafe fn texture_created(&self, desc: &Texture2dDesc, texture: *mut c_void) {
        let request = TextureDesc::from(desc);
        let mut context = self.context.lock();
        if !context.wants_depth(&request) {
            return;
        }
        if let Some(texture) = D::texture_from_raw(texture) {
            context.capture_depth(texture);
        }
    }

    unsafe fn back_buffer(&self, texture: *mut c_void) {
        if let Some(texture) = D::texture_from_raw(texture) {
            self.context.lock().capture_back_buffer(texture);
        }
    }

    fn present(&self) {
        let report = self.context.lock().present();
        Self::log_frame(&report);
    }

    fn resize_begin(&self, width: u32, height: u32) {
        self.context.lock().begin_resize(width, height);
    }

    fn resize_end(&self, result: HRESULT) {
        self.context.lock().finish_resize(result);
    }
}
