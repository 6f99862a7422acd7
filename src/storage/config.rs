//! Engine configuration loading from TOML.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Application version
    pub version: String,
    /// Data directory path
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Producer name stamped on event envelopes
    pub producer: String,
    /// Scoring settings
    pub scoring: ScoringSettings,
    /// Reward settings
    pub rewards: RewardSettings,
    /// Leaderboard settings
    pub leaderboards: LeaderboardSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            data_dir: PathBuf::new(),
            producer: "haulscore".to_string(),
            scoring: ScoringSettings::default(),
            rewards: RewardSettings::default(),
            leaderboards: LeaderboardSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Path of the SQLite database under the data directory.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("haulscore.db")
    }
}

/// Scoring-related settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringSettings {
    /// Total-score milestones that trigger milestone events when crossed
    pub milestones: Vec<f64>,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            milestones: vec![50.0, 75.0, 90.0, 95.0, 100.0],
        }
    }
}

/// Reward-related settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardSettings {
    /// Base payout multiplied by the zone multiplier on a traversal bonus
    pub zone_base_bonus: f64,
}

impl Default for RewardSettings {
    fn default() -> Self {
        Self {
            zone_base_bonus: 25.0,
        }
    }
}

/// Leaderboard-related settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardSettings {
    /// Days before period end at which the rollover job picks a board up
    pub rollover_days_threshold: i64,
}

impl Default for LeaderboardSettings {
    fn default() -> Self {
        Self {
            rollover_days_threshold: 1,
        }
    }
}

/// Get the application data directory.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "haulscore", "HaulScore")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration file path.
pub fn get_config_path() -> PathBuf {
    directories::ProjectDirs::from("com", "haulscore", "HaulScore")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

/// Load engine configuration from file, falling back to defaults.
pub fn load_config() -> Result<EngineConfig, ConfigError> {
    let path = get_config_path();

    if !path.exists() {
        let config = EngineConfig {
            data_dir: get_data_dir(),
            ..Default::default()
        };
        return Ok(config);
    }

    let content =
        std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError(e.to_string()))?;

    let mut config: EngineConfig =
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    config.data_dir = get_data_dir();

    Ok(config)
}

/// Save engine configuration to file.
pub fn save_config(config: &EngineConfig) -> Result<(), ConfigError> {
    let path = get_config_path();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
