//! Operator-managed reserves.
//!
//! The yield-asset and carbon-credit figures are accounting counters only;
//! no tokens move when they change.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StakingError};
use crate::ledger::{AccountId, Amount};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssetPool {
    owner: AccountId,
    total_assets: Amount,
    total_carbon_credits: Amount,
}

impl AssetPool {
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner,
            total_assets: 0,
            total_carbon_credits: 0,
        }
    }

    pub(crate) fn from_parts(
        owner: AccountId,
        total_assets: Amount,
        total_carbon_credits: Amount,
    ) -> Self {
        Self {
            owner,
            total_assets,
            total_carbon_credits,
        }
    }

    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    pub fn total_assets(&self) -> Amount {
        self.total_assets
    }

    pub fn total_carbon_credits(&self) -> Amount {
        self.total_carbon_credits
    }

    fn ensure_owner(&self, caller: &str) -> Result<()> {
        if caller != self.owner {
            return Err(StakingError::Unauthorized {
                caller: caller.to_string(),
            });
        }
        Ok(())
    }

    pub fn add_assets(&mut self, caller: &str, amount: Amount) -> Result<()> {
        self.ensure_owner(caller)?;
        self.total_assets = credit_counter(self.total_assets, amount)?;
        Ok(())
    }

    pub fn remove_assets(&mut self, caller: &str, amount: Amount) -> Result<()> {
        self.ensure_owner(caller)?;
        if amount == 0 {
            return Err(StakingError::InvalidAmount);
        }
        if amount > self.total_assets {
            return Err(StakingError::InsufficientReserve {
                reserve: self.total_assets,
                requested: amount,
            });
        }
        self.total_assets -= amount;
        Ok(())
    }

    pub fn add_carbon_credits(&mut self, caller: &str, amount: Amount) -> Result<()> {
        self.ensure_owner(caller)?;
        self.total_carbon_credits = credit_counter(self.total_carbon_credits, amount)?;
        Ok(())
    }
}

fn credit_counter(current: Amount, amount: Amount) -> Result<Amount> {
    if amount == 0 {
        return Err(StakingError::InvalidAmount);
    }
    current
        .checked_add(amount)
        .ok_or(StakingError::ArithmeticOverflow)
}
