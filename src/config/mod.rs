use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Streaming player tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MusicSettings {
    /// Bytes decoded and written per buffer cycle
    pub chunk_bytes: usize,
    /// Capacity requested for the output line
    pub line_buffer_bytes: usize,
    /// Sleep between command polls while idle or paused
    pub idle_poll_ms: u64,
}

impl Default for MusicSettings {
    fn default() -> Self {
        Self {
            chunk_bytes: 16 * 1024,
            line_buffer_bytes: 16 * 1024,
            idle_poll_ms: 10,
        }
    }
}

impl MusicSettings {
    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms.max(1))
    }
}

/// Sound effect engine tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectSettings {
    /// Bytes per line write while playing an effect
    pub chunk_bytes: usize,
    /// Capacity requested for each effect line
    pub line_buffer_bytes: usize,
    /// Read size used while decoding an effect into memory
    pub load_chunk_bytes: usize,
    /// How long destroy waits for in-flight effects
    pub shutdown_timeout_secs: u64,
    /// Upper bound on concurrently playing effect tasks
    pub max_threads: usize,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            chunk_bytes: 2 * 1024,
            line_buffer_bytes: 8 * 1024,
            load_chunk_bytes: 1024,
            shutdown_timeout_secs: 3,
            max_threads: 512,
        }
    }
}

impl EffectSettings {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Player configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub music: MusicSettings,
    pub effects: EffectSettings,
    pub preferred_device: Option<String>,
    /// Master gain applied when a track starts, in decibels
    pub initial_gain_db: Option<f32>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            music: MusicSettings::default(),
            effects: EffectSettings::default(),
            preferred_device: None,
            initial_gain_db: None,
        }
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    config: PlayerConfig,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path()?;
        Self::with_path(config_path)
    }

    /// Manager backed by an explicit file; defaults when the file is absent
    pub fn with_path(config_path: PathBuf) -> Result<Self, ConfigError> {
        let config = Self::load_config(&config_path)?;

        Ok(Self {
            config,
            config_path,
        })
    }

    pub fn get_config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn update_config<F>(&mut self, updater: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut PlayerConfig),
    {
        updater(&mut self.config);
        self.save_config()
    }

    pub fn set_preferred_device(&mut self, device: Option<String>) -> Result<(), ConfigError> {
        self.config.preferred_device = device;
        self.save_config()
    }

    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.config = PlayerConfig::default();
        self.save_config()
    }

    fn get_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::home_dir()
            .ok_or(ConfigError::ConfigDirNotFound)?
            .join(".config")
            .join("cadence");

        std::fs::create_dir_all(&config_dir)?;

        Ok(config_dir.join("config.toml"))
    }

    fn load_config(path: &Path) -> Result<PlayerConfig, ConfigError> {
        if !path.exists() {
            return Ok(PlayerConfig::default());
        }

        let config_content = std::fs::read_to_string(path)?;
        let config: PlayerConfig = toml::from_str(&config_content)?;

        Ok(config)
    }

    fn save_config(&self) -> Result<(), ConfigError> {
        // Ensure the parent directory exists
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let config_content = toml::to_string_pretty(&self.config)?;
        std::fs::write(&self.config_path, config_content)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let config_manager = ConfigManager::with_path(config_path).unwrap();

        (config_manager, temp_dir)
    }

    #[test]
    fn test_player_config_default() {
        let config = PlayerConfig::default();

        assert_eq!(config.music.chunk_bytes, 16 * 1024);
        assert_eq!(config.music.line_buffer_bytes, 16 * 1024);
        assert_eq!(config.music.idle_poll(), Duration::from_millis(10));
        assert_eq!(config.effects.chunk_bytes, 2 * 1024);
        assert_eq!(config.effects.line_buffer_bytes, 8 * 1024);
        assert_eq!(config.effects.shutdown_timeout(), Duration::from_secs(3));
        assert_eq!(config.preferred_device, None);
        assert_eq!(config.initial_gain_db, None);
    }

    #[test]
    fn test_config_serialization() {
        let mut config = PlayerConfig::default();
        config.music.chunk_bytes = 4096;
        config.effects.max_threads = 8;
        config.preferred_device = Some("Test Device".to_string());
        config.initial_gain_db = Some(-6.0);

        let serialized = toml::to_string(&config).unwrap();
        let deserialized: PlayerConfig = toml::from_str(&serialized).unwrap();

        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: PlayerConfig = toml::from_str("[music]\nidle_poll_ms = 25\n").unwrap();

        assert_eq!(config.music.idle_poll_ms, 25);
        assert_eq!(config.music.chunk_bytes, 16 * 1024);
        assert_eq!(config.effects, EffectSettings::default());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let (config_manager, _temp_dir) = create_test_config_manager();
        assert_eq!(config_manager.get_config(), &PlayerConfig::default());
        assert!(!config_manager.config_path().exists());
    }

    #[test]
    fn test_save_and_reload() {
        let (mut config_manager, _temp_dir) = create_test_config_manager();

        config_manager
            .update_config(|config| {
                config.music.line_buffer_bytes = 32 * 1024;
                config.effects.shutdown_timeout_secs = 1;
            })
            .unwrap();
        config_manager.set_preferred_device(Some("USB DAC".to_string())).unwrap();

        let reloaded = ConfigManager::with_path(config_manager.config_path().to_path_buf()).unwrap();
        assert_eq!(reloaded.get_config().music.line_buffer_bytes, 32 * 1024);
        assert_eq!(reloaded.get_config().effects.shutdown_timeout_secs, 1);
        assert_eq!(reloaded.get_config().preferred_device.as_deref(), Some("USB DAC"));
    }

    #[test]
    fn test_reset_to_defaults() {
        let (mut config_manager, _temp_dir) = create_test_config_manager();
        config_manager.set_preferred_device(Some("Other".to_string())).unwrap();
        config_manager.reset_to_defaults().unwrap();

        let content = fs::read_to_string(config_manager.config_path()).unwrap();
        let on_disk: PlayerConfig = toml::from_str(&content).unwrap();
        assert_eq!(on_disk, PlayerConfig::default());
    }

    #[test]
    fn test_corrupted_file_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "music = [not valid").unwrap();

        let result = ConfigManager::with_path(config_path);
        assert!(matches!(result, Err(ConfigError::DeserializationError(_))));
    }
}
