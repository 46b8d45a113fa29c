use crate::mining::difficulty::DifficultyTarget;
use crate::mining::pow::DEFAULT_MAX_NONCE;
use crate::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub mining: MiningConfig,
    pub consensus: ConsensusConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningConfig {
    pub difficulty: u32,
    pub max_nonce: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusConfig {
    pub coinbase_reward: u64,
    pub genesis_data: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                data_dir: PathBuf::from("./tmp/blocks"),
            },
            mining: MiningConfig {
                difficulty: 18,
                max_nonce: DEFAULT_MAX_NONCE,
            },
            consensus: ConsensusConfig {
                coinbase_reward: 100,
                genesis_data: "First Block in the Chain - Genesis".to_string(),
            },
        }
    }
}

impl Config {
    /// Load the user config, writing the defaults on first use.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        DifficultyTarget::from_difficulty(self.mining.difficulty)?;

        if self.consensus.coinbase_reward == 0 {
            return Err(LedgerError::InvalidInput(
                "Coinbase reward must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    fn config_path() -> PathBuf {
        let home_dir = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home_dir).join(".hashledger").join("config.json")
    }
}
