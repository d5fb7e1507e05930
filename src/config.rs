//! Engine Configuration Module
//!
//! Config is stored in `~/.config/adcs/engine.toml`.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Environment variables (`ADCS_MAX_CONCURRENT_CALLS`, `ADCS_NODE_TIMEOUT_MS`)
//! 2. Config file (`~/.config/adcs/engine.toml`)
//! 3. Defaults

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AdcsError, Result};
use crate::util::{DEFAULT_MAX_CONCURRENT_CALLS, DEFAULT_NODE_TIMEOUT};

/// Engine-wide execution settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on in-flight provider and model calls per invocation
    pub max_concurrent_calls: usize,

    /// Timeout for nodes that do not declare their own
    pub default_node_timeout_ms: u64,

    /// Embed node outputs in events and trace records
    pub trace_outputs: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_calls: DEFAULT_MAX_CONCURRENT_CALLS,
            default_node_timeout_ms: DEFAULT_NODE_TIMEOUT.as_millis() as u64,
            trace_outputs: true,
        }
    }
}

impl EngineConfig {
    /// Returns `~/.config/adcs/` on Unix, `%APPDATA%/adcs/` on Windows
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("adcs")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("engine.toml")
    }

    /// Load from the default location
    ///
    /// Returns defaults if the file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::from_path(Self::config_path())
    }

    /// Load from an explicit file; defaults if it doesn't exist
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let load_error = |reason: String| AdcsError::ConfigLoad {
            path: path.display().to_string(),
            reason,
        };

        let content = fs::read_to_string(path)
            .map_err(|e| load_error(format!("Failed to read config file: {}", e)))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| load_error(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Write to an explicit file, creating parent directories
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let save_error = |reason: String| AdcsError::ConfigLoad {
            path: path.display().to_string(),
            reason,
        };

        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)
                    .map_err(|e| save_error(format!("Failed to create config directory: {}", e)))?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| save_error(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content).map_err(|e| save_error(format!("Failed to write config file: {}", e)))
    }

    /// Merge with environment variables
    ///
    /// Unparseable values are reported rather than ignored.
    pub fn with_env(mut self) -> Result<Self> {
        if let Some(calls) = env_number("ADCS_MAX_CONCURRENT_CALLS", "max_concurrent_calls")? {
            self.max_concurrent_calls = calls as usize;
        }
        if let Some(timeout) = env_number("ADCS_NODE_TIMEOUT_MS", "default_node_timeout_ms")? {
            self.default_node_timeout_ms = timeout;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_calls == 0 {
            return Err(AdcsError::ConfigInvalid {
                field: "max_concurrent_calls",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.default_node_timeout_ms == 0 {
            return Err(AdcsError::ConfigInvalid {
                field: "default_node_timeout_ms",
                reason: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn default_node_timeout(&self) -> Duration {
        Duration::from_millis(self.default_node_timeout_ms)
    }

    pub fn with_max_concurrent_calls(mut self, calls: usize) -> Self {
        self.max_concurrent_calls = calls;
        self
    }

    pub fn with_default_node_timeout(mut self, timeout: Duration) -> Self {
        self.default_node_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn without_trace_outputs(mut self) -> Self {
        self.trace_outputs = false;
        self
    }
}

fn env_number(var: &str, field: &'static str) -> Result<Option<u64>> {
    match std::env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| AdcsError::ConfigInvalid {
                field,
                reason: format!("{}='{}': {}", var, raw, e),
            }),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_config_path_contains_adcs() {
        let path = EngineConfig::config_path();
        assert!(path.to_string_lossy().contains("adcs"));
        assert!(path.to_string_lossy().ends_with("engine.toml"));
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_concurrent_calls, 8);
        assert_eq!(config.default_node_timeout(), Duration::from_secs(30));
        assert!(config.trace_outputs);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::from_path(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine.toml");
        fs::write(&path, "max_concurrent_calls = 2\n").unwrap();

        let config = EngineConfig::from_path(&path).unwrap();
        assert_eq!(config.max_concurrent_calls, 2);
        assert_eq!(config.default_node_timeout_ms, 30_000);
    }

    #[test]
    fn test_malformed_file_is_load_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine.toml");
        fs::write(&path, "max_concurrent_calls = \"many\"").unwrap();

        let err = EngineConfig::from_path(&path).unwrap_err();
        assert_eq!(err.code(), "ADCS-091");
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine.toml");
        fs::write(&path, "max_concurrent_calls = 0").unwrap();

        let err = EngineConfig::from_path(&path).unwrap_err();
        assert_eq!(err.code(), "ADCS-090");
        assert!(err.to_string().contains("max_concurrent_calls"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("engine.toml");
        let config = EngineConfig::default()
            .with_max_concurrent_calls(3)
            .without_trace_outputs();

        config.save_to(&path).unwrap();
        assert_eq!(EngineConfig::from_path(&path).unwrap(), config);
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        env::set_var("ADCS_MAX_CONCURRENT_CALLS", "16");
        env::set_var("ADCS_NODE_TIMEOUT_MS", "1500");

        let config = EngineConfig::default().with_env().unwrap();
        assert_eq!(config.max_concurrent_calls, 16);
        assert_eq!(config.default_node_timeout_ms, 1500);

        env::remove_var("ADCS_MAX_CONCURRENT_CALLS");
        env::remove_var("ADCS_NODE_TIMEOUT_MS");
    }

    #[test]
    #[serial]
    fn test_env_garbage_is_reported() {
        env::set_var("ADCS_NODE_TIMEOUT_MS", "soon");
        let err = EngineConfig::default().with_env().unwrap_err();
        env::remove_var("ADCS_NODE_TIMEOUT_MS");

        assert_eq!(err.code(), "ADCS-090");
    }

    #[test]
    #[serial]
    fn test_empty_env_is_ignored() {
        env::set_var("ADCS_MAX_CONCURRENT_CALLS", "");
        let config = EngineConfig::default().with_env().unwrap();
        env::remove_var("ADCS_MAX_CONCURRENT_CALLS");

        assert_eq!(config.max_concurrent_calls, 8);
    }
}
