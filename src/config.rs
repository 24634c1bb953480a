//! Configuration loading and defaults for compositor-busd.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Well-known bus name claimed by default.
pub const DEFAULT_BUS_NAME: &str = "org.wayland.compositor";

/// Main configuration for compositor-busd.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Well-known D-Bus name to claim on the session bus.
    pub bus_name: String,

    /// Compositor socket path override.
    /// If unset, discovered from $COMPOSITOR_SOCKET.
    pub socket: Option<PathBuf>,

    /// Whether view geometry changes are published (default: false).
    /// Toggleable at runtime via the "geometry-signal" setting.
    pub geometry_signal: bool,

    /// Whether a released pointer button also resolves and publishes the
    /// view under the cursor (default: false).
    pub find_view_under_cursor: bool,

    /// Shell command run once through the host after the bus is acquired.
    /// Empty string disables it.
    pub startup_notify: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bus_name: DEFAULT_BUS_NAME.to_string(),
            socket: None,
            geometry_signal: false,
            find_view_under_cursor: false,
            startup_notify: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from the default path, or return defaults if not found.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load(p);
        }

        // Try default config path
        if let Some(config_dir) = dirs::config_dir() {
            let default_path = config_dir.join("compositor-busd").join("config.toml");
            if default_path.exists() {
                return Self::load(&default_path);
            }
        }

        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bus_name, "org.wayland.compositor");
        assert!(config.socket.is_none());
        assert!(!config.geometry_signal);
        assert!(!config.find_view_under_cursor);
        assert!(config.startup_notify.is_empty());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            bus_name = "org.example.compositor"
            geometry_signal = true
            find_view_under_cursor = true
            startup_notify = "notify-send 'compositor up'"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.bus_name, "org.example.compositor");
        assert!(config.geometry_signal);
        assert!(config.find_view_under_cursor);
        assert_eq!(config.startup_notify, "notify-send 'compositor up'");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "geometry_signal = true").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert!(config.geometry_signal);
        // Unspecified fields fall back to defaults
        assert_eq!(config.bus_name, "org.wayland.compositor");
    }

    #[test]
    fn test_load_missing_file_is_error() {
        assert!(Config::load(Path::new("/nonexistent/config.toml")).is_err());
    }
}
