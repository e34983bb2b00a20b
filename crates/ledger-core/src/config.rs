use crate::constants::{BLOCK_REWARD, DEFAULT_DIFFICULTY, MAX_DIFFICULTY};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Where the miner's reward lands relative to the nonce search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardPolicy {
    /// Reward is appended after the nonce is found, so the stored block's
    /// fingerprint generally no longer meets the difficulty target and
    /// `Ledger::verify` rejects the chain.
    #[default]
    Historical,
    /// Reward is part of the hashed transaction list; mined chains verify.
    Strict,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Leading zero hex symbols a block fingerprint needs.
    pub difficulty: u32,
    pub reward: u64,
    pub reward_policy: RewardPolicy,
    /// Use the rayon nonce search instead of the sequential one.
    pub parallel: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            reward: BLOCK_REWARD,
            reward_policy: RewardPolicy::default(),
            parallel: false,
        }
    }
}

impl LedgerConfig {
    pub fn with_difficulty(difficulty: u32) -> Self {
        Self {
            difficulty,
            ..Self::default()
        }
    }

    pub fn strict(mut self) -> Self {
        self.reward_policy = RewardPolicy::Strict;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.difficulty == 0 || self.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::Difficulty(self.difficulty));
        }
        Ok(())
    }
}
