use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::logging::LogConfig;
use crate::recovery::RecoveryConfig;
use crate::thresholds::ThresholdConfig;
use crate::volume::VolumeConfig;

/// Engine configuration, stored as TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub metadata: ConfigMetadata,

    /// Battery decay and capacity parameters
    #[serde(default)]
    pub recovery: RecoveryConfig,

    /// Volume counting mode and muscle family matching
    #[serde(default)]
    pub volume: VolumeConfig,

    /// Reference range overrides
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    #[serde(default)]
    pub logging: LogConfig,
}

/// Configuration metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let now = Utc::now();

        EngineConfig {
            metadata: ConfigMetadata {
                version: "1.0".to_string(),
                created_at: now,
                updated_at: now,
            },
            recovery: RecoveryConfig::default(),
            volume: VolumeConfig::default(),
            thresholds: ThresholdConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: EngineConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let toml_content =
            toml::to_string_pretty(self).with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// `~/.liftrs/config.toml`
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".liftrs")
            .join("config.toml")
    }

    /// Load from the default location, falling back to defaults
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        if !config_path.exists() {
            return Self::default();
        }
        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring config at {}: {:#}", config_path.display(), e);
                Self::default()
            }
        }
    }

    /// Reject values that would break the decay math
    pub fn validate(&self) -> Result<()> {
        let systems = [
            ("cns", &self.recovery.cns),
            ("muscular", &self.recovery.muscular),
            ("spinal", &self.recovery.spinal),
        ];
        for (name, system) in systems {
            if !(system.half_life_hours > 0.0) || !(system.capacity > 0.0) {
                anyhow::bail!(
                    "recovery.{}: half_life_hours and capacity must be positive (got {} / {})",
                    name,
                    system.half_life_hours,
                    system.capacity
                );
            }
        }

        let profiles = &self.recovery.recovery_profiles;
        if [profiles.fast, profiles.medium, profiles.slow, profiles.heavy]
            .iter()
            .any(|h| !(*h > 0.0))
        {
            anyhow::bail!("recovery.recovery_profiles: every window must be positive");
        }

        if self.recovery.history_window_days == 0 {
            anyhow::bail!("recovery.history_window_days must be at least 1");
        }

        Ok(())
    }
}
