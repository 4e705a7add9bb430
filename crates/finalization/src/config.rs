//! # Finalization Parameters
//!
//! Chain-wide constants of the finalization state machine and the height to
//! epoch arithmetic derived from `epoch_length`.
//!
//! ```text
//! epoch 0   height 0 (genesis only)
//! epoch e   heights (e-1)*L+1 ..= e*L, checkpoint at e*L
//! ```

use crate::domain::admin::AdminKeySet;
use crate::domain::{Epoch, Ufp64};
use serde::{Deserialize, Serialize};
use shared_types::{Amount, Height, UNIT};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Epoch length must be positive")]
    ZeroEpochLength,

    #[error("Minimum deposit size must be positive")]
    ZeroMinDeposit,

    #[error("Dynasty logout delay must be positive")]
    ZeroLogoutDelay,

    #[error("Base interest factor must be positive")]
    ZeroInterestFactor,

    #[error("Invalid parameters document: {0}")]
    Parse(String),
}

/// Finalization constants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizationParams {
    /// Blocks per epoch
    pub epoch_length: u32,
    /// Smallest accepted deposit, in coins
    pub min_deposit_size: Amount,
    /// Dynasties between a logout and leaving the validator set
    pub dynasty_logout_delay: u32,
    /// Epochs between leaving the validator set and withdrawal
    pub withdrawal_epoch_delay: u32,
    /// Multiplier on the recently slashed fraction
    pub slash_fraction_multiplier: u64,
    pub base_interest_factor: Ufp64,
    pub base_penalty_factor: Ufp64,
}

impl Default for FinalizationParams {
    fn default() -> Self {
        Self {
            epoch_length: 50,
            min_deposit_size: 10_000 * UNIT,
            dynasty_logout_delay: 700,
            withdrawal_epoch_delay: 15,
            slash_fraction_multiplier: 3,
            base_interest_factor: Ufp64::from_uint(7),
            base_penalty_factor: Ufp64::from_ratio(2, 10_000),
        }
    }
}

impl FinalizationParams {
    /// Short epochs and delays for local test networks.
    pub fn regtest() -> Self {
        Self {
            epoch_length: 5,
            min_deposit_size: 1_500 * UNIT,
            dynasty_logout_delay: 2,
            withdrawal_epoch_delay: 5,
            ..Self::default()
        }
    }

    pub fn testnet() -> Self {
        Self {
            dynasty_logout_delay: 5,
            withdrawal_epoch_delay: 10,
            ..Self::default()
        }
    }

    /// Load parameters from a JSON document and validate them.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let params: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.epoch_length == 0 {
            return Err(ConfigError::ZeroEpochLength);
        }
        if self.min_deposit_size == 0 {
            return Err(ConfigError::ZeroMinDeposit);
        }
        if self.dynasty_logout_delay == 0 {
            return Err(ConfigError::ZeroLogoutDelay);
        }
        if self.base_interest_factor.is_zero() {
            return Err(ConfigError::ZeroInterestFactor);
        }
        Ok(())
    }

    /// Epoch containing `height`.
    pub fn epoch_of(&self, height: Height) -> Epoch {
        if height == 0 {
            0
        } else {
            (height - 1) / self.epoch_length + 1
        }
    }

    /// First block of an epoch.
    pub fn is_epoch_start(&self, height: Height) -> bool {
        height > 0 && (height - 1) % self.epoch_length == 0
    }

    /// Last block of an epoch. Genesis is the checkpoint of epoch 0.
    pub fn is_checkpoint(&self, height: Height) -> bool {
        height % self.epoch_length == 0
    }

    pub fn epoch_start_height(&self, epoch: Epoch) -> Height {
        match epoch {
            0 => 0,
            e => (e - 1) * self.epoch_length + 1,
        }
    }

    pub fn epoch_checkpoint_height(&self, epoch: Epoch) -> Height {
        epoch * self.epoch_length
    }
}

/// Initial permissioning setup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminParams {
    /// Initial admin key set. `None` disables permissioning from genesis.
    pub admin_keys: Option<AdminKeySet>,
}

impl AdminParams {
    pub fn with_keys(admin_keys: AdminKeySet) -> Self {
        Self {
            admin_keys: Some(admin_keys),
        }
    }
}
