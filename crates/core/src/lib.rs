//! dxpipe core
//!
//! Interception and export logic, platform-neutral where it can be:
//!
//! - [`hooks`]: entry point patches and proxy forwarding thunks
//! - [`proxy`]: forwarding proxies over the device/DXGI object graph
//! - [`interceptor`]: the entry point replacements and primary-device policy
//! - [`capture`]: what the proxies report and which textures are tracked
//! - [`pipeline`]: per-present staging/shareable copies
//! - [`handoff`]: delivering shareable handles to the consumer process
//! - [`config`]: `dxpipe.toml`
//!
//! The Windows-specific pieces (graphics backend, named pipes, process
//! discovery) implement the traits in [`pipeline`] and [`handoff`] and live in
//! the plugin crate.
//!
//! # Re-exports
//!
//! - [`sdk`] - ABI definitions
//! - [`engine`] - real library loading and globals

pub use dxpipe_engine as engine;
pub use dxpipe_sdk as sdk;

pub mod capture;
pub mod config;
pub mod handoff;
pub mod hooks;
pub mod interceptor;
pub mod pipeline;
pub mod proxy;
pub mod texture;

pub use capture::{CaptureSink, DepthProfile, Dimensions, TextureRole};
pub use config::{ConfigError, ConfigResult, CoreConfig};
pub use handoff::{Handoff, HandoffConfig, HandoffStatus, HandoffTransport, PipeDirection, PipeEndpoint};
pub use hooks::{HookError, HookTable, InlineHookKey};
pub use interceptor::{DevicePolicy, DeviceRole, Interceptor};
pub use pipeline::{CaptureHub, DeviceError, FrameReport, GpuTexture, GraphicsDevice, RenderContext};
pub use proxy::{Proxy, ProxyError, ProxyKind};
pub use texture::{SharedHandle, TextureDesc};
