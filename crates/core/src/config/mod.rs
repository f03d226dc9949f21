//! Configuration
//!
//! One TOML file, `dxpipe.toml`, next to the host executable:
//!
//! ```toml
//! version = 1
//! debug = false
//! log_timestamps = true
//! host_executable = "RobloxPlayerBeta.exe"
//!
//! [capture]
//! depth_format = "R32_TYPELESS"
//! depth_sample_count = 0
//! primary_adapter = ""
//!
//! [handoff]
//! consumer_executable = "bloxshade.exe"
//! confirmation_timeout_ms = 2000
//! idle_interval_frames = 30
//! retry_interval_frames = 5
//! backbuffer_pipe = "dxpipe_backbuffer"
//! depthbuffer_pipe = "dxpipe_depthbuffer"
//! confirmation_pipe = "dxpipe_confirmation"
//!
//! [launcher]
//! enabled = true
//! consumer_path = ""
//! ```
//!
//! Every table is `#[serde(default)]`, so a partial file is fine. Values that
//! parse but make no sense fall back to their defaults with a warning when
//! the typed settings are derived.

mod loader;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use dxpipe_sdk::wire::{BACKBUFFER_PIPE, CONFIRMATION_PIPE, DEPTHBUFFER_PIPE};
use dxpipe_sdk::Format;

use crate::capture::DepthProfile;
use crate::handoff::HandoffConfig;
use crate::interceptor::DevicePolicy;

pub use loader::{
    config_path, default_consumer_path, dxpipe_base_dir, host_executable_name, log_path,
    CONFIG_FILE, LOG_FILE,
};

/// Configuration system errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read or write config file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML content
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config to TOML
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Could not determine the host executable's directory
    #[error("Config directory not available - could not resolve host executable path")]
    NoConfigDirectory,
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Config version for future migration support
    pub version: u32,

    /// Enable debug logging
    pub debug: bool,

    /// Prefix log lines with timestamps
    pub log_timestamps: bool,

    /// Interception only activates inside this executable
    pub host_executable: String,

    pub capture: CaptureConfig,
    pub handoff: HandoffSettings,
    pub launcher: LauncherConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Pixel format name of the depth buffer, with or without `DXGI_FORMAT_`
    pub depth_format: String,
    /// Required sample count of the depth buffer; 0 accepts any
    pub depth_sample_count: u32,
    /// Substring of the primary adapter's description; empty for first-device
    pub primary_adapter: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandoffSettings {
    pub consumer_executable: String,
    pub confirmation_timeout_ms: u64,
    pub idle_interval_frames: u32,
    pub retry_interval_frames: u32,
    pub backbuffer_pipe: String,
    pub depthbuffer_pipe: String,
    pub confirmation_pipe: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    pub enabled: bool,
    /// Full path of the consumer; empty for the default install location
    pub consumer_path: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            version: 1,
            debug: false,
            log_timestamps: true,
            host_executable: "RobloxPlayerBeta.exe".to_string(),
            capture: CaptureConfig::default(),
            handoff: HandoffSettings::default(),
            launcher: LauncherConfig::default(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            depth_format: "R32_TYPELESS".to_string(),
            depth_sample_count: 0,
            primary_adapter: String::new(),
        }
    }
}

impl Default for HandoffSettings {
    fn default() -> Self {
        Self {
            consumer_executable: "bloxshade.exe".to_string(),
            confirmation_timeout_ms: 2000,
            idle_interval_frames: 30,
            retry_interval_frames: 5,
            backbuffer_pipe: BACKBUFFER_PIPE.to_string(),
            depthbuffer_pipe: DEPTHBUFFER_PIPE.to_string(),
            confirmation_pipe: CONFIRMATION_PIPE.to_string(),
        }
    }
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            consumer_path: String::new(),
        }
    }
}

impl CoreConfig {
    /// Load from `dxpipe.toml` next to the host, creating it if missing
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&config_path()?)
    }

    /// Load from a specific file, creating it with defaults if missing
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            tracing::debug!("Loaded config from {:?}", path);
            Ok(config)
        } else {
            let default = Self::default();
            default.save_to(path)?;
            tracing::info!("Created default config at {:?}", path);
            Ok(default)
        }
    }

    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::debug!("Saved config to {:?}", path);
        Ok(())
    }

    /// Re-read the file, replacing every value
    pub fn reload(&mut self) -> ConfigResult<()> {
        self.reload_from(&config_path()?)
    }

    pub fn reload_from(&mut self, path: &Path) -> ConfigResult<()> {
        let content = std::fs::read_to_string(path)?;
        *self = toml::from_str(&content)?;
        tracing::debug!("Reloaded config from {:?}", path);
        Ok(())
    }

    /// Whether `executable` is the configured host, ignoring case
    pub fn is_host(&self, executable: &str) -> bool {
        executable.eq_ignore_ascii_case(&self.host_executable)
    }

    pub fn depth_profile(&self) -> DepthProfile {
        let default = DepthProfile::default();
        let format = match Format::from_name(&self.capture.depth_format) {
            Some(format) => format,
            None => {
                tracing::warn!(
                    "Unknown depth format '{}', using {}",
                    self.capture.depth_format,
                    default.format
                );
                default.format
            }
        };
        let sample_count = match self.capture.depth_sample_count {
            0 => None,
            count => Some(count),
        };
        DepthProfile {
            format,
            sample_count,
        }
    }

    pub fn device_policy(&self) -> DevicePolicy {
        let adapter = self.capture.primary_adapter.trim();
        if adapter.is_empty() {
            DevicePolicy::First
        } else {
            DevicePolicy::AdapterMatch(adapter.to_string())
        }
    }

    pub fn handoff_config(&self) -> HandoffConfig {
        let defaults = HandoffConfig::default();
        let settings = &self.handoff;

        let interval = |value: u32, fallback: u32, name: &str| {
            if value == 0 {
                tracing::warn!("{} must be at least 1, using {}", name, fallback);
                fallback
            } else {
                value
            }
        };
        let text = |value: &str, fallback: &str, name: &str| {
            if value.trim().is_empty() {
                tracing::warn!("{} is empty, using '{}'", name, fallback);
                fallback.to_string()
            } else {
                value.trim().to_string()
            }
        };

        let confirmation_timeout = if settings.confirmation_timeout_ms == 0 {
            tracing::warn!(
                "confirmation_timeout_ms must be positive, using {:?}",
                defaults.confirmation_timeout
            );
            defaults.confirmation_timeout
        } else {
            Duration::from_millis(settings.confirmation_timeout_ms)
        };

        HandoffConfig {
            consumer_executable: text(
                &settings.consumer_executable,
                &defaults.consumer_executable,
                "consumer_executable",
            ),
            confirmation_timeout,
            idle_interval: interval(
                settings.idle_interval_frames,
                defaults.idle_interval,
                "idle_interval_frames",
            ),
            retry_interval: interval(
                settings.retry_interval_frames,
                defaults.retry_interval,
                "retry_interval_frames",
            ),
            backbuffer_pipe: text(&settings.backbuffer_pipe, &defaults.backbuffer_pipe, "backbuffer_pipe"),
            depthbuffer_pipe: text(
                &settings.depthbuffer_pipe,
                &defaults.depthbuffer_pipe,
                "depthbuffer_pipe",
            ),
            confirmation_pipe: text(
                &settings.confirmation_pipe,
                &defaults.confirmation_pipe,
                "confirmation_pipe",
            ),
        }
    }

    /// Where the consumer executable is expected, if anywhere
    pub fn consumer_path(&self) -> Option<PathBuf> {
        let configured = self.launcher.consumer_path.trim();
        if configured.is_empty() {
            default_consumer_path(&self.handoff.consumer_executable)
        } else {
            Some(PathBuf::from(configured))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_config_default() {
        let config = CoreConfig::default();
        assert_eq!(config.version, 1);
        assert!(!config.debug);
        assert_eq!(config.host_executable, "RobloxPlayerBeta.exe");
        assert_eq!(config.depth_profile(), DepthProfile::default());
        assert_eq!(config.device_policy(), DevicePolicy::First);
        assert_eq!(config.handoff_config(), HandoffConfig::default());
    }

    #[test]
    fn test_core_config_roundtrip() {
        let mut config = CoreConfig::default();
        config.debug = true;
        config.capture.primary_adapter = "GeForce".to_string();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("debug = true"));
        assert!(toml_str.contains("[capture]"));
        let parsed: CoreConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: CoreConfig = toml::from_str(
            r#"
            debug = true

            [handoff]
            retry_interval_frames = 2
            "#,
        )
        .unwrap();
        assert!(parsed.debug);
        assert_eq!(parsed.handoff.retry_interval_frames, 2);
        assert_eq!(parsed.handoff.idle_interval_frames, 30);
        assert_eq!(parsed.capture, CaptureConfig::default());
        assert_eq!(parsed.handoff_config().retry_interval, 2);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let mut config = CoreConfig::default();
        config.capture.depth_format = "NOT_A_FORMAT".to_string();
        config.handoff.idle_interval_frames = 0;
        config.handoff.confirmation_timeout_ms = 0;
        config.handoff.backbuffer_pipe = "  ".to_string();

        assert_eq!(config.depth_profile(), DepthProfile::default());
        let handoff = config.handoff_config();
        assert_eq!(handoff.idle_interval, 30);
        assert_eq!(handoff.confirmation_timeout, Duration::from_millis(2000));
        assert_eq!(handoff.backbuffer_pipe, "dxpipe_backbuffer");
    }

    #[test]
    fn test_depth_format_by_name() {
        let mut config = CoreConfig::default();
        config.capture.depth_format = "DXGI_FORMAT_R24G8_TYPELESS".to_string();
        assert_eq!(config.depth_profile().format, Format::R24G8_TYPELESS);
        assert_eq!(config.depth_profile().sample_count, None);

        config.capture.depth_sample_count = 4;
        assert_eq!(config.depth_profile().sample_count, Some(4));
    }

    #[test]
    fn test_adapter_policy() {
        let mut config = CoreConfig::default();
        config.capture.primary_adapter = " NVIDIA ".to_string();
        assert_eq!(config.device_policy(), DevicePolicy::AdapterMatch("NVIDIA".into()));
    }

    #[test]
    fn test_host_gate_ignores_case() {
        let config = CoreConfig::default();
        assert!(config.is_host("robloxplayerbeta.exe"));
        assert!(!config.is_host("notepad.exe"));
    }

    #[test]
    fn test_explicit_consumer_path() {
        let mut config = CoreConfig::default();
        config.launcher.consumer_path = r"D:\Tools\bloxshade.exe".to_string();
        assert_eq!(config.consumer_path(), Some(PathBuf::from(r"D:\Tools\bloxshade.exe")));
    }

    #[test]
    fn test_load_creates_then_reads_file() {
        let dir = std::env::temp_dir().join(format!("dxpipe-config-{}", std::process::id()));
        let path = dir.join(CONFIG_FILE);
        let _ = std::fs::remove_file(&path);

        let created = CoreConfig::load_from(&path).unwrap();
        assert_eq!(created, CoreConfig::default());
        assert!(path.exists());

        std::fs::write(&path, "debug = true\n").unwrap();
        let mut reloaded = created.clone();
        reloaded.reload_from(&path).unwrap();
        assert!(reloaded.debug);
        assert_eq!(CoreConfig::load_from(&path).unwrap(), reloaded);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
