//! Starts the consumer process at attach
//!
//! The consumer is fully detached: no console, not in the host's job, no
//! inherited handles. The child handle is dropped right away.

use std::os::windows::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use windows::Win32::System::Threading::{
    CREATE_BREAKAWAY_FROM_JOB, CREATE_NO_WINDOW, DETACHED_PROCESS,
};

use dxpipe_core::CoreConfig;

const CREATION_FLAGS: u32 = DETACHED_PROCESS.0 | CREATE_NO_WINDOW.0 | CREATE_BREAKAWAY_FROM_JOB.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub program: PathBuf,
    pub working_dir: PathBuf,
}

/// What to start, or `None` when the launcher is off or nothing is installed
pub fn plan(config: &CoreConfig) -> Option<LaunchPlan> {
    if !config.launcher.enabled {
        return None;
    }
    let program = config.consumer_path()?;
    if !program.is_file() {
        tracing::info!("Consumer not installed at {}", program.display());
        return None;
    }
    let working_dir = program
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    Some(LaunchPlan {
        program,
        working_dir,
    })
}

pub fn launch(config: &CoreConfig) {
    let Some(plan) = plan(config) else {
        return;
    };

    let spawned = Command::new(&plan.program)
        .current_dir(&plan.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .creation_flags(CREATION_FLAGS)
        .spawn();

    match spawned {
        Ok(child) => tracing::info!(pid = child.id(), "Started {}", plan.program.display()),
        Err(e) => tracing::warn!("Failed to start {}: {}", plan.program.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(path: &Path, enabled: bool) -> CoreConfig {
        let mut config = CoreConfig::default();
        config.launcher.enabled = enabled;
        config.launcher.consumer_path = path.display().to_string();
        config
    }

    #[test]
    fn test_disabled_launcher_plans_nothing() {
        let exe = std::env::current_exe().unwrap();
        assert_eq!(plan(&config_with(&exe, false)), None);
    }

    #[test]
    fn test_missing_consumer_plans_nothing() {
        let missing = std::env::temp_dir().join("dxpipe-missing-consumer.exe");
        assert_eq!(plan(&config_with(&missing, true)), None);
    }

    #[test]
    fn test_plan_runs_from_consumer_directory() {
        let exe = std::env::current_exe().unwrap();
        let plan = plan(&config_with(&exe, true)).unwrap();
        assert_eq!(plan.program, exe);
        assert_eq!(Some(plan.working_dir.as_path()), exe.parent());
    }

    #[test]
    fn test_flags_detach_fully() {
        assert_eq!(CREATION_FLAGS, 0x0000_0008 | 0x0800_0000 | 0x0100_0000);
    }
}
