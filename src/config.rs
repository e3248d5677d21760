use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_channels")]
    pub channels: u16,

    #[serde(default = "default_record_key")]
    pub record_key: String,

    #[serde(default = "default_play_key")]
    pub play_key: String,

    #[serde(default = "default_delete_key")]
    pub delete_key: String,

    #[serde(default = "default_quit_key")]
    pub quit_key: String,
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_channels() -> u16 {
    1
}

fn default_record_key() -> String {
    "r".to_string()
}

fn default_play_key() -> String {
    "p".to_string()
}

fn default_delete_key() -> String {
    "d".to_string()
}

fn default_quit_key() -> String {
    "q".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            record_key: default_record_key(),
            play_key: default_play_key(),
            delete_key: default_delete_key(),
            quit_key: default_quit_key(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.config/voxpad/config.json)
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            tracing::info!(
                "Config file not found at {:?}, creating default config",
                config_path
            );
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        tracing::info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        tracing::info!("Saved config to {:?}", config_path);
        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(dir)
        } else {
            let home = std::env::var("HOME").context("HOME environment variable not set")?;
            PathBuf::from(home).join(".config")
        };

        Ok(config_dir.join("voxpad").join("config.json"))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(anyhow::anyhow!("sample_rate must be greater than zero"));
        }

        if !(1..=2).contains(&self.channels) {
            return Err(anyhow::anyhow!("channels must be 1 or 2"));
        }

        let keys = [
            &self.record_key,
            &self.play_key,
            &self.delete_key,
            &self.quit_key,
        ];
        if keys.iter().any(|k| k.is_empty()) {
            return Err(anyhow::anyhow!("key bindings cannot be empty"));
        }
        for (i, a) in keys.iter().enumerate() {
            if keys[i + 1..].contains(a) {
                return Err(anyhow::anyhow!("key bindings must be distinct (got {})", a));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn empty_json_fills_in_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.sample_rate, 16000);
        assert_eq!(config.channels, 1);
        assert_eq!(config.record_key, "r");
    }

    #[test]
    fn rejects_zero_sample_rate() {
        let config = Config {
            sample_rate: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_key_bindings() {
        let config = Config {
            play_key: "r".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
