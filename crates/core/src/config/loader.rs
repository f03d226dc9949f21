//! Config path resolution
//!
//! Everything lives next to the host executable, since the interception
//! library is dropped into the host's directory.

use std::path::{Path, PathBuf};

use super::{ConfigError, ConfigResult};

pub const CONFIG_FILE: &str = "dxpipe.toml";
pub const LOG_FILE: &str = "dxpipe.log";

/// Directory holding the host executable
pub fn dxpipe_base_dir() -> ConfigResult<PathBuf> {
    let exe = std::env::current_exe().map_err(ConfigError::IoError)?;
    exe.parent()
        .map(PathBuf::from)
        .ok_or(ConfigError::NoConfigDirectory)
}

/// File name of the host executable
pub fn host_executable_name() -> ConfigResult<String> {
    let exe = std::env::current_exe().map_err(ConfigError::IoError)?;
    exe.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or(ConfigError::NoConfigDirectory)
}

/// Path: `<host dir>/dxpipe.toml`
pub fn config_path() -> ConfigResult<PathBuf> {
    Ok(dxpipe_base_dir()?.join(CONFIG_FILE))
}

/// Path: `<host dir>/dxpipe.log`
pub fn log_path() -> ConfigResult<PathBuf> {
    Ok(dxpipe_base_dir()?.join(LOG_FILE))
}

/// Default consumer location: `%APPDATA%\Bloxshade\<executable>`
pub fn default_consumer_path(executable: &str) -> Option<PathBuf> {
    let appdata = std::env::var_os("APPDATA")?;
    Some(Path::new(&appdata).join("Bloxshade").join(executable))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_share_base_dir() {
        let config = config_path().unwrap();
        let log = log_path().unwrap();
        assert_eq!(config.parent(), log.parent());
        assert!(config.ends_with(CONFIG_FILE));
        assert!(log.ends_with(LOG_FILE));
    }

    #[test]
    fn test_host_name_has_no_directory() {
        let name = host_executable_name().unwrap();
        assert!(!name.contains('/') && !name.contains('\\'));
    }
}
