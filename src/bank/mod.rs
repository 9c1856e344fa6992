//! Account balances. Every addition that touches a balance is checked; a
//! transfer validates the credit side before the debit is applied so a
//! failing transfer leaves both accounts untouched.

use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BankError {
    #[error("account {0} has insufficient balance")]
    InsufficientBalance(String),
    #[error("credit would overflow account {0}'s balance")]
    Overflow(String),
}

#[derive(Clone, Debug, Default)]
pub struct Account {
    pub balance: u64,
    pub public_key: Option<[u8; 32]>,
}

/// Account ledger. Accounts spring into existence on first credit; a lookup
/// before that returns a zero balance without creating an entry, so
/// `debit`/read paths never allocate.
#[derive(Clone, Debug, Default)]
pub struct Bank {
    accounts: BTreeMap<String, Account>,
}

impl Bank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, id: &str) -> u64 {
        self.accounts.get(id).map(|a| a.balance).unwrap_or(0)
    }

    pub fn account(&self, id: &str) -> Option<&Account> {
        self.accounts.get(id)
    }

    pub fn iter_sorted(&self) -> impl Iterator<Item = (&String, &Account)> {
        self.accounts.iter()
    }

    /// Credits `amount` to `to`, creating the account if needed. Fails
    /// without mutating on overflow.
    pub fn credit(&mut self, to: &str, amount: u64) -> Result<(), BankError> {
        let entry = self.accounts.entry(to.to_string()).or_default();
        entry.balance = entry
            .balance
            .checked_add(amount)
            .ok_or_else(|| BankError::Overflow(to.to_string()))?;
        Ok(())
    }

    /// Debits `amount` from `from`; fails without mutating if the balance
    /// is insufficient. Does not create the account if absent.
    pub fn debit(&mut self, from: &str, amount: u64) -> Result<(), BankError> {
        let entry = self
            .accounts
            .get_mut(from)
            .filter(|a| a.balance >= amount)
            .ok_or_else(|| BankError::InsufficientBalance(from.to_string()))?;
        entry.balance -= amount;
        Ok(())
    }

    /// `debit(from)` then `credit(to)`. The credit's overflow check is
    /// evaluated before any mutation so a transfer that would overflow the
    /// recipient never touches the sender's balance.
    pub fn transfer(&mut self, from: &str, to: &str, amount: u64) -> Result<(), BankError> {
        let sender_balance = self
            .accounts
            .get(from)
            .map(|a| a.balance)
            .unwrap_or(0);
        if sender_balance < amount {
            return Err(BankError::InsufficientBalance(from.to_string()));
        }
        let recipient_balance = self.balance(to);
        recipient_balance
            .checked_add(amount)
            .ok_or_else(|| BankError::Overflow(to.to_string()))?;

        self.debit(from, amount)?;
        self.credit(to, amount).expect("overflow already checked above");
        Ok(())
    }

    pub fn total_balance(&self) -> u128 {
        self.accounts.values().map(|a| a.balance as u128).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credit_then_debit_round_trips() {
        let mut bank = Bank::new();
        bank.credit("alice", 100).unwrap();
        assert_eq!(bank.balance("alice"), 100);
        bank.debit("alice", 40).unwrap();
        assert_eq!(bank.balance("alice"), 60);
    }

    #[test]
    fn debit_rejects_insufficient_balance() {
        let mut bank = Bank::new();
        bank.credit("alice", 10).unwrap();
        assert_eq!(
            bank.debit("alice", 11),
            Err(BankError::InsufficientBalance("alice".to_string()))
        );
        assert_eq!(bank.balance("alice"), 10);
    }

    #[test]
    fn transfer_failure_does_not_touch_sender() {
        let mut bank = Bank::new();
        bank.credit("alice", 50).unwrap();
        bank.credit("bob", u64::MAX).unwrap();
        let result = bank.transfer("alice", "bob", 10);
        assert_eq!(result, Err(BankError::Overflow("bob".to_string())));
        assert_eq!(bank.balance("alice"), 50);
        assert_eq!(bank.balance("bob"), u64::MAX);
    }

    #[test]
    fn credit_overflow_is_rejected() {
        let mut bank = Bank::new();
        bank.credit("alice", u64::MAX).unwrap();
        assert_eq!(
            bank.credit("alice", 1),
            Err(BankError::Overflow("alice".to_string()))
        );
    }
}
