//! XDG Base Directory paths for anyrun.
//!
//! The launcher uses XDG paths on every platform rather than platform-native
//! locations, so a config directory copied between machines keeps working.

use std::path::PathBuf;

/// Get the anyrun config directory.
///
/// Returns `$XDG_CONFIG_HOME/anyrun` if set, otherwise `~/.config/anyrun`.
/// This is where `config.toml` and per-plugin config files live.
///
/// # Examples
///
/// ```
/// use anyrun_paths::config_dir;
///
/// let config = config_dir();
/// let main_config = config.join("config.toml");
/// ```
pub fn config_dir() -> PathBuf {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config).join("anyrun")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".config/anyrun")
    } else {
        PathBuf::from(".config/anyrun")
    }
}

/// Directory holding per-plugin config files (`<config_dir>/plugins`).
///
/// A plugin named `shell` reads `<config_dir>/plugins/shell.toml`.
pub fn plugin_config_dir() -> PathBuf {
    config_dir().join("plugins")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_dir_ends_with_anyrun() {
        let path = config_dir();
        assert!(
            path.ends_with("anyrun"),
            "config_dir should end with 'anyrun'"
        );
    }

    #[test]
    #[serial]
    fn test_config_dir_respects_xdg_env() {
        unsafe {
            std::env::set_var("XDG_CONFIG_HOME", "/tmp/test-config");
        }
        let path = config_dir();
        assert_eq!(path, PathBuf::from("/tmp/test-config/anyrun"));
        assert_eq!(
            plugin_config_dir(),
            PathBuf::from("/tmp/test-config/anyrun/plugins")
        );
        unsafe {
            std::env::remove_var("XDG_CONFIG_HOME");
        }
    }
}
