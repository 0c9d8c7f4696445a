//! Escrow custody
//!
//! Fares are held per trip code from request until exactly one of
//! [`EscrowVault::release`] (to the driver) or [`EscrowVault::refund`] (to the
//! customer). Paid-out value is credited to per-account balances.

use std::collections::{BTreeMap, HashMap};
use ethers::types::Address;
use log::debug;
use serde::{Serialize, Deserialize};

use crate::error::{CoreError, Result};
use crate::models::{Amount, TripCode};

/// Fare held for one trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowEntry {
    /// Account that deposited the fare
    pub depositor: Address,

    /// Deposited amount
    pub amount: Amount,
}

/// Escrowed deposits and settled balances
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowVault {
    /// Deposits still held, by trip code
    held: BTreeMap<TripCode, EscrowEntry>,

    /// Value paid out or refunded to each account
    balances: HashMap<Address, Amount>,

    /// Total ever released to drivers
    total_released: Amount,

    /// Total ever refunded to customers
    total_refunded: Amount,
}

impl EscrowVault {
    /// Create an empty vault
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold `amount` for `code`
    pub fn deposit(&mut self, code: TripCode, depositor: Address, amount: Amount) -> Result<()> {
        if amount == 0 {
            return Err(CoreError::ZeroFare);
        }
        if self.held.contains_key(&code) {
            return Err(CoreError::Escrow(format!("trip {} already has a deposit", code)));
        }
        self.total_held()
            .checked_add(amount)
            .ok_or_else(|| CoreError::Escrow("escrow total overflow".to_string()))?;

        self.held.insert(code, EscrowEntry { depositor, amount });
        debug!("Escrowed {} for trip {}", amount, code);
        Ok(())
    }

    /// Pay the deposit for `code` to `payee`
    pub fn release(&mut self, code: TripCode, payee: Address) -> Result<Amount> {
        let entry = self.take(code, payee)?;
        self.total_released = self.total_released.saturating_add(entry.amount);
        debug!("Released {} from trip {} to {:?}", entry.amount, code, payee);
        Ok(entry.amount)
    }

    /// Return the deposit for `code` to its depositor
    pub fn refund(&mut self, code: TripCode) -> Result<EscrowEntry> {
        let depositor = self
            .held
            .get(&code)
            .map(|entry| entry.depositor)
            .ok_or_else(|| CoreError::Escrow(format!("no deposit held for trip {}", code)))?;
        let entry = self.take(code, depositor)?;
        self.total_refunded = self.total_refunded.saturating_add(entry.amount);
        debug!("Refunded {} from trip {} to {:?}", entry.amount, code, depositor);
        Ok(entry)
    }

    // Balance is checked before the entry is removed so a failure leaves the vault unchanged.
    fn take(&mut self, code: TripCode, to: Address) -> Result<EscrowEntry> {
        let entry = *self
            .held
            .get(&code)
            .ok_or_else(|| CoreError::Escrow(format!("no deposit held for trip {}", code)))?;
        let credited = self
            .balance_of(&to)
            .checked_add(entry.amount)
            .ok_or_else(|| CoreError::Escrow(format!("balance overflow for {:?}", to)))?;

        self.held.remove(&code);
        self.balances.insert(to, credited);
        Ok(entry)
    }

    /// Deposit held for `code`
    pub fn held_for(&self, code: TripCode) -> Option<&EscrowEntry> {
        self.held.get(&code)
    }

    /// Sum of all deposits currently held
    pub fn total_held(&self) -> Amount {
        self.held.values().map(|entry| entry.amount).sum()
    }

    /// Value credited to `account`
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Total ever released to drivers
    pub fn total_released(&self) -> Amount {
        self.total_released
    }

    /// Total ever refunded to customers
    pub fn total_refunded(&self) -> Amount {
        self.total_refunded
    }

    /// Codes with a held deposit
    pub fn held_codes(&self) -> impl Iterator<Item = TripCode> + '_ {
        self.held.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUSTOMER: [u8; 20] = [2; 20];
    const DRIVER: [u8; 20] = [1; 20];

    #[test]
    fn test_release_exactly_once() {
        let mut vault = EscrowVault::new();
        vault.deposit(1000, Address::from(CUSTOMER), 250).unwrap();
        assert_eq!(vault.total_held(), 250);

        assert_eq!(vault.release(1000, Address::from(DRIVER)).unwrap(), 250);
        assert_eq!(vault.balance_of(&Address::from(DRIVER)), 250);
        assert_eq!(vault.total_held(), 0);
        assert_eq!(vault.total_released(), 250);

        assert!(matches!(vault.release(1000, Address::from(DRIVER)), Err(CoreError::Escrow(_))));
        assert_eq!(vault.balance_of(&Address::from(DRIVER)), 250);
    }

    #[test]
    fn test_refund_goes_to_depositor() {
        let mut vault = EscrowVault::new();
        vault.deposit(1000, Address::from(CUSTOMER), 40).unwrap();

        let entry = vault.refund(1000).unwrap();
        assert_eq!(entry.depositor, Address::from(CUSTOMER));
        assert_eq!(vault.balance_of(&Address::from(CUSTOMER)), 40);
        assert_eq!(vault.total_refunded(), 40);
        assert!(vault.held_for(1000).is_none());
    }

    #[test]
    fn test_deposit_guards() {
        let mut vault = EscrowVault::new();

        assert!(matches!(vault.deposit(1000, Address::from(CUSTOMER), 0), Err(CoreError::ZeroFare)));

        vault.deposit(1000, Address::from(CUSTOMER), 1).unwrap();
        assert!(matches!(vault.deposit(1000, Address::from(CUSTOMER), 1), Err(CoreError::Escrow(_))));
        assert_eq!(vault.held_for(1000).unwrap().amount, 1);
    }

    #[test]
    fn test_balance_overflow_leaves_deposit_held() {
        let mut vault = EscrowVault::new();
        vault.deposit(1000, Address::from(CUSTOMER), Amount::MAX).unwrap();
        vault.release(1000, Address::from(DRIVER)).unwrap();

        vault.deposit(1001, Address::from(CUSTOMER), 1).unwrap();
        assert!(matches!(vault.release(1001, Address::from(DRIVER)), Err(CoreError::Escrow(_))));
        assert_eq!(vault.held_for(1001).unwrap().amount, 1);
    }
}
