//! `DllMain` and process bootstrap
//!
//! Attach order: config, logging, host gate, real libraries, capture hub,
//! entry point hooks, consumer launch, globals. Any failure leaves the
//! library inert and the host running untouched, so `DllMain` always
//! reports success.

use std::error::Error;
use std::ffi::c_void;
use std::sync::Arc;

use windows::core::BOOL;
use windows::Win32::Foundation::HMODULE;
use windows::Win32::System::LibraryLoader::DisableThreadLibraryCalls;
use windows::Win32::System::SystemServices::{DLL_PROCESS_ATTACH, DLL_PROCESS_DETACH};

use dxpipe_core::config::{dxpipe_base_dir, host_executable_name, log_path};
use dxpipe_core::{interceptor, CaptureHub, CaptureSink, CoreConfig, Handoff, RenderContext};
use dxpipe_engine::{init_engine, load_exports, EngineGlobals, SystemLibraries};

use crate::backend::D3d11Device;
use crate::pipes::Win32Transport;
use crate::{launcher, logging};

type Hub = CaptureHub<D3d11Device, Win32Transport>;

/// # Safety
/// Called by the Windows loader only.
#[no_mangle]
pub unsafe extern "system" fn DllMain(module: HMODULE, reason: u32, reserved: *mut c_void) -> BOOL {
    match reason {
        DLL_PROCESS_ATTACH => {
            let thread_calls = DisableThreadLibraryCalls(module);
            if std::panic::catch_unwind(attach).is_err() {
                tracing::error!("Panic during attach");
            }
            if let Err(e) = thread_calls {
                tracing::debug!("DisableThreadLibraryCalls failed: {}", e);
            }
        }
        // A non-null reserved pointer means the process is exiting; leave
        // the patches alone then
        DLL_PROCESS_DETACH if reserved.is_null() => detach(),
        _ => {}
    }
    BOOL::from(true)
}

fn attach() {
    let (config, config_error) = match CoreConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (CoreConfig::default(), Some(e)),
    };

    match log_path() {
        Ok(path) => match logging::init(&config, &path) {
            Ok(true) => {}
            Ok(false) => tracing::debug!("Logging already configured by the host"),
            Err(e) => eprintln!("dxpipe: cannot open {}: {}", path.display(), e),
        },
        Err(e) => eprintln!("dxpipe: no log location: {}", e),
    }
    if let Some(e) = config_error {
        tracing::warn!("Config unreadable, using defaults: {}", e);
    }

    let host = match host_executable_name() {
        Ok(host) => host,
        Err(e) => {
            tracing::error!("Cannot determine host executable: {}", e);
            return;
        }
    };
    if !config.is_host(&host) {
        tracing::info!("Host is {}, not {}; staying inert", host, config.host_executable);
        return;
    }

    tracing::info!("dxpipe attaching to {}", host);
    match bootstrap(&config, host) {
        Ok(()) => tracing::info!("dxpipe ready"),
        Err(e) => tracing::error!("dxpipe disabled: {}", e),
    }
}

fn bootstrap(config: &CoreConfig, host: String) -> Result<(), Box<dyn Error>> {
    let libraries = SystemLibraries::load()?;
    let exports = unsafe { load_exports(&libraries)? };

    let handoff = Handoff::new(Win32Transport, config.handoff_config());
    let hub: Arc<dyn CaptureSink> = Arc::new(Hub::new(RenderContext::new(
        config.depth_profile(),
        handoff,
    )));

    interceptor::install(exports, Some(hub), config.device_policy())?;
    launcher::launch(config);

    init_engine(EngineGlobals::new(exports, host, dxpipe_base_dir()?))?;
    Ok(())
}

fn detach() {
    tracing::info!("dxpipe detaching");
    interceptor::uninstall();
}
