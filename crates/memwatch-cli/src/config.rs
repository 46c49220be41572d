//! Configuration file for the memwatch CLI.

use anyhow::{Context, Result};
use memwatch_core::GameVersion;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: GameVersion,
    /// Emulator executable name.
    pub process: String,
    /// Process address where emulated RAM begins.
    #[serde(with = "memwatch_core::hex::opt_u64", skip_serializing_if = "Option::is_none")]
    pub ram_start: Option<u64>,
    pub poll_interval_ms: u64,
    pub drop_failed_locks: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: GameVersion::Us,
            process: "Project64.exe".to_string(),
            ram_start: None,
            poll_interval_ms: 33,
            drop_failed_locks: false,
            profile: None,
        }
    }
}

impl Config {
    /// Default config location.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("memwatch");

        Ok(config_dir.join("config.toml"))
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("No config at {}, using defaults", path.display());
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    #[cfg(test)]
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory at {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "version = \"jp\"\nram_start = \"0xDFE40000\"\ndrop_failed_locks = true\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.version, GameVersion::Jp);
        assert_eq!(config.ram_start, Some(0xDFE4_0000));
        assert!(config.drop_failed_locks);
        assert_eq!(config.poll_interval_ms, 33);
        assert_eq!(config.process, "Project64.exe");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            version: GameVersion::Pal,
            process: "mupen64plus".to_string(),
            ram_start: Some(0x7F00_1000_0000),
            poll_interval_ms: 16,
            drop_failed_locks: true,
            profile: Some(PathBuf::from("sm64.json")),
        };
        config.save(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("ram_start = \"0x7F0010000000\""));
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "poll_interval_ms = \"fast\"").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
