//! # Configuration
//!
//! TOML configuration for the `armory` binary, organized into sections:
//!
//! - [`StorageConfig`] - where the sled database lives
//! - [`LoggingConfig`] - level and optional log files
//! - [`CharacterConfig`] - starting stats for new characters
//! - [`GamblingConfig`] - win probability for `gamble`
//! - [`SecurityConfig`] - session lifetime and Argon2 parameters
//!
//! ```toml
//! [storage]
//! data_dir = "./data/armory"
//!
//! [characters]
//! starting_health = 500
//! starting_power = 100
//!
//! [gambling]
//! win_probability = 0.5
//!
//! [security]
//! session_ttl_minutes = 60
//! ```
//!
//! Precedence: CLI args > environment (`ARMORY_BETTING_ODDS`) > file > defaults.
//! Earn amount and sell ratio are fixed and deliberately absent here.

use anyhow::{anyhow, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::economy::types::{DEFAULT_STARTING_HEALTH, DEFAULT_STARTING_POWER};

/// Environment variable overriding `[gambling] win_probability`.
pub const BETTING_ODDS_ENV: &str = "ARMORY_BETTING_ODDS";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub characters: CharacterConfig,
    #[serde(default)]
    pub gambling: GamblingConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    #[serde(default)]
    pub security_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterConfig {
    #[serde(default = "default_starting_health")]
    pub starting_health: i64,
    #[serde(default = "default_starting_power")]
    pub starting_power: i64,
}

fn default_starting_health() -> i64 {
    DEFAULT_STARTING_HEALTH
}

fn default_starting_power() -> i64 {
    DEFAULT_STARTING_POWER
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            starting_health: DEFAULT_STARTING_HEALTH,
            starting_power: DEFAULT_STARTING_POWER,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamblingConfig {
    /// A draw strictly below this value wins. 0.0 never wins, 1.0 always does.
    #[serde(default = "default_win_probability")]
    pub win_probability: f64,
}

fn default_win_probability() -> f64 {
    0.5
}

impl Default for GamblingConfig {
    fn default() -> Self {
        Self {
            win_probability: default_win_probability(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Argon2Config {
    #[serde(default)]
    pub memory_kib: Option<u32>,
    #[serde(default)]
    pub time_cost: Option<u32>,
    #[serde(default)]
    pub parallelism: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_session_ttl_minutes")]
    pub session_ttl_minutes: u32,
    #[serde(default)]
    pub argon2: Option<Argon2Config>,
}

fn default_session_ttl_minutes() -> u32 {
    60
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            session_ttl_minutes: default_session_ttl_minutes(),
            argon2: None,
        }
    }
}

impl Config {
    /// Load configuration from a file, apply environment overrides and validate.
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let mut config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Apply `ARMORY_BETTING_ODDS` if set.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(raw) = std::env::var(BETTING_ODDS_ENV) {
            self.apply_betting_odds(&raw)?;
        }
        Ok(())
    }

    fn apply_betting_odds(&mut self, raw: &str) -> Result<()> {
        let odds: f64 = raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{} must be a number in [0, 1]: {}", BETTING_ODDS_ENV, e))?;
        if (odds - self.gambling.win_probability).abs() > f64::EPSILON {
            warn!(
                "{} overrides configured win probability {} with {}",
                BETTING_ODDS_ENV, self.gambling.win_probability, odds
            );
        }
        self.gambling.win_probability = odds;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.data_dir.trim().is_empty() {
            return Err(anyhow!("storage.data_dir must not be empty"));
        }
        let p = self.gambling.win_probability;
        if !p.is_finite() || !(0.0..=1.0).contains(&p) {
            return Err(anyhow!(
                "gambling.win_probability must lie in [0, 1], got {}",
                p
            ));
        }
        if self.security.session_ttl_minutes == 0 {
            return Err(anyhow!("security.session_ttl_minutes must be positive"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage: StorageConfig {
                data_dir: "./data/armory".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("armory.log".to_string()),
                security_file: Some("armory-security.log".to_string()),
            },
            characters: CharacterConfig::default(),
            gambling: GamblingConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}
