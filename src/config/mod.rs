//! Configuration module for modelctl
//!
//! Loads config from `$XDG_CONFIG_HOME/modelctl/config.toml` or `~/.config/modelctl/config.toml`.
//! Falls back to embedded defaults if file doesn't exist.
//! Partial configs are merged with defaults using serde's default attributes.
//!
//! # Example
//!
//! ```no_run
//! use modelctl::config::Config;
//!
//! let config = Config::load().expect("Failed to load config");
//! println!("Registry: {}", config.registry.base_url);
//! println!("Inventory TTL: {}s", config.cache.ttl_secs);
//! ```

pub mod schema;

use crate::error::{LifecycleError, Result};
pub use schema::{CacheConfig, Config, GenerationParameters, RegistryConfig, UploadConfig};
use std::fs;
use std::path::{Path, PathBuf};

impl Config {
    /// Load config from the default location, or defaults if absent
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Load config from an explicit path, or defaults if absent
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            LifecycleError::Config(format!("Failed to parse {}: {e}", path.display()))
        })
    }

    /// Save config atomically (tmp + rename)
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_str = toml::to_string_pretty(self)
            .map_err(|e| LifecycleError::Config(format!("Failed to serialize config: {e}")))?;

        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, toml_str)?;
        fs::rename(&tmp_path, path)?;

        Ok(())
    }
}

/// Get config file path
pub fn config_path() -> Result<PathBuf> {
    let config_dir = if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config)
    } else {
        dirs::config_dir()
            .ok_or_else(|| LifecycleError::Config("Cannot determine config directory".to_string()))?
    };

    Ok(config_dir.join("modelctl").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.registry.base_url, "http://localhost:11434");
        assert_eq!(config.registry.timeout_secs, 10);
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.upload.extension, "gguf");
        assert_eq!(config.upload.parameters.num_ctx, 4096);
    }

    #[test]
    fn test_partial_config_merges_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            [registry]
            base_url = "http://gpu-box:11434"

            [upload.parameters]
            temperature = 0.2
            "#,
        )
        .unwrap();

        assert_eq!(config.registry.base_url, "http://gpu-box:11434");
        assert_eq!(config.registry.timeout_secs, 10);
        assert_eq!(config.cache.ttl_secs, 60);
        assert!((config.upload.parameters.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.upload.parameters.top_k, 40);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_from(&temp_dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[cache\nttl_secs = ").unwrap();

        let result = Config::load_from(&path);
        assert!(matches!(result, Err(LifecycleError::Config(_))));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/config.toml");

        let mut config = Config::default();
        config.cache.ttl_secs = 5;
        config.save_to(&path).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    #[serial]
    fn test_config_path_honours_xdg() {
        let original = std::env::var("XDG_CONFIG_HOME").ok();
        std::env::set_var("XDG_CONFIG_HOME", "/tmp/modelctl-xdg");

        let path = config_path().unwrap();
        assert_eq!(path, PathBuf::from("/tmp/modelctl-xdg/modelctl/config.toml"));

        match original {
            Some(val) => std::env::set_var("XDG_CONFIG_HOME", val),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
    }
}
