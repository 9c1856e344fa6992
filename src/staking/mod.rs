//! Validator registry, bonding, and slashing. Validators are kept in
//! a `BTreeMap` so every iteration over the registry — committee sampling's
//! "sorted active set", epoch finalization, query projections — is
//! deterministic without a separate sort step.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::bank::{Bank, BankError};

pub const TREASURY_ACCOUNT: &str = "treasury";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StakingError {
    #[error("validator {0} is not registered")]
    UnknownValidator(String),
    #[error("validator {0} attempted to re-register with a different public key")]
    KeyRotationAttempted(String),
    #[error(transparent)]
    Bank(#[from] BankError),
    #[error("bond amount overflow for validator {0}")]
    BondOverflow(String),
    #[error("validator {0} bond is jailed and ineligible for committee sampling")]
    Jailed(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidatorStatus {
    Active,
    Jailed,
}

#[derive(Clone, Debug)]
pub struct Validator {
    pub id: String,
    pub public_key: [u8; 32],
    pub bond: u64,
    pub power: u64,
    pub status: ValidatorStatus,
    pub slash_counter: u64,
}

#[derive(Clone, Debug, Default)]
pub struct Staking {
    validators: BTreeMap<String, Validator>,
}

impl Staking {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Validator> {
        self.validators.get(id)
    }

    pub fn iter_sorted(&self) -> impl Iterator<Item = &Validator> {
        self.validators.values()
    }

    /// Active, unjailed, bonded validators in ascending id order — the
    /// "sorted active set" committee sampling draws from.
    pub fn active_sorted(&self) -> Vec<&Validator> {
        self.validators
            .values()
            .filter(|v| v.status == ValidatorStatus::Active && v.bond > 0)
            .collect()
    }

    /// Idempotent registration: a second call with the same key succeeds
    /// silently; a different key is rejected.
    pub fn register(
        &mut self,
        id: &str,
        public_key: [u8; 32],
        power: u64,
    ) -> Result<(), StakingError> {
        match self.validators.get(id) {
            None => {
                self.validators.insert(
                    id.to_string(),
                    Validator {
                        id: id.to_string(),
                        public_key,
                        bond: 0,
                        power,
                        status: ValidatorStatus::Active,
                        slash_counter: 0,
                    },
                );
                Ok(())
            }
            Some(existing) if existing.public_key == public_key => Ok(()),
            Some(_) => Err(StakingError::KeyRotationAttempted(id.to_string())),
        }
    }

    /// Moves `amount` from the validator's own bank account into its bond.
    pub fn bond(&mut self, bank: &mut Bank, id: &str, amount: u64) -> Result<(), StakingError> {
        let validator = self
            .validators
            .get_mut(id)
            .ok_or_else(|| StakingError::UnknownValidator(id.to_string()))?;
        bank.debit(id, amount)?;
        validator.bond = validator
            .bond
            .checked_add(amount)
            .ok_or_else(|| StakingError::BondOverflow(id.to_string()))?;
        Ok(())
    }

    /// Returns `amount` from the bond back to the validator's bank account.
    pub fn unbond(&mut self, bank: &mut Bank, id: &str, amount: u64) -> Result<(), StakingError> {
        let validator = self
            .validators
            .get_mut(id)
            .ok_or_else(|| StakingError::UnknownValidator(id.to_string()))?;
        if validator.bond < amount {
            return Err(StakingError::Bank(BankError::InsufficientBalance(
                id.to_string(),
            )));
        }
        validator.bond -= amount;
        bank.credit(id, amount)?;
        Ok(())
    }

    pub fn unjail(&mut self, id: &str) -> Result<(), StakingError> {
        let validator = self
            .validators
            .get_mut(id)
            .ok_or_else(|| StakingError::UnknownValidator(id.to_string()))?;
        validator.status = ValidatorStatus::Active;
        Ok(())
    }

    /// Slashes `ceil(bond * bps / 10000)` from the validator's bond,
    /// transfers it to the treasury, jails the validator, and bumps its
    /// slash counter. Uses a 128-bit intermediate so `bond * bps` cannot
    /// overflow a u64 even at the maximum bond and basis points.
    pub fn slash(&mut self, bank: &mut Bank, id: &str, bps: u32) -> Result<u64, StakingError> {
        let validator = self
            .validators
            .get_mut(id)
            .ok_or_else(|| StakingError::UnknownValidator(id.to_string()))?;

        let product = (validator.bond as u128) * (bps as u128);
        let slashed = product.div_ceil(10_000) as u64;
        let slashed = slashed.min(validator.bond);

        validator.bond -= slashed;
        validator.status = ValidatorStatus::Jailed;
        validator.slash_counter += 1;

        bank.credit(TREASURY_ACCOUNT, slashed)?;
        Ok(slashed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_computes_ceiling_basis_points() {
        let mut staking = Staking::new();
        let mut bank = Bank::new();
        staking.register("v1", [1u8; 32], 10).unwrap();
        bank.credit("v1", 100).unwrap();
        staking.bond(&mut bank, "v1", 100).unwrap();

        let slashed = staking.slash(&mut bank, "v1", 5_000).unwrap();
        assert_eq!(slashed, 50);
        assert_eq!(staking.get("v1").unwrap().bond, 50);
        assert_eq!(bank.balance(TREASURY_ACCOUNT), 50);
        assert_eq!(staking.get("v1").unwrap().status, ValidatorStatus::Jailed);
        assert_eq!(staking.get("v1").unwrap().slash_counter, 1);
    }

    #[test]
    fn slash_rounds_up_on_nonexact_division() {
        let mut staking = Staking::new();
        let mut bank = Bank::new();
        staking.register("v1", [1u8; 32], 10).unwrap();
        bank.credit("v1", 3).unwrap();
        staking.bond(&mut bank, "v1", 3).unwrap();

        // 3 * 3333 / 10000 = 0.9999 -> ceil = 1
        let slashed = staking.slash(&mut bank, "v1", 3_333).unwrap();
        assert_eq!(slashed, 1);
    }

    #[test]
    fn register_rejects_key_rotation() {
        let mut staking = Staking::new();
        staking.register("v1", [1u8; 32], 10).unwrap();
        assert!(staking.register("v1", [1u8; 32], 10).is_ok());
        assert_eq!(
            staking.register("v1", [2u8; 32], 10),
            Err(StakingError::KeyRotationAttempted("v1".to_string()))
        );
    }

    #[test]
    fn active_sorted_excludes_jailed_and_unbonded() {
        let mut staking = Staking::new();
        let mut bank = Bank::new();
        staking.register("v2", [2u8; 32], 1).unwrap();
        staking.register("v1", [1u8; 32], 1).unwrap();
        bank.credit("v1", 10).unwrap();
        staking.bond(&mut bank, "v1", 10).unwrap();

        let active = staking.active_sorted();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "v1");
    }
}
