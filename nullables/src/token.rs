//! Nullable stake token: in-memory balances and allowances.

use qvote_types::{Credits, Identity, StakeToken, TokenError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// What one faucet call mints.
pub const FAUCET_AMOUNT: Credits = Credits::new(1_000);

#[derive(Default)]
struct Book {
    balances: HashMap<Identity, Credits>,
    allowances: HashMap<(Identity, Identity), Credits>,
}

/// An in-memory ERC-20-like token for testing.
#[derive(Default)]
pub struct NullToken {
    book: Mutex<Book>,
    unavailable: AtomicBool,
}

impl NullToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint [`FAUCET_AMOUNT`] to `owner`.
    pub fn faucet(&self, owner: &Identity) -> Credits {
        self.mint(owner, FAUCET_AMOUNT)
    }

    /// Mint `amount` to `owner`; returns the new balance.
    pub fn mint(&self, owner: &Identity, amount: Credits) -> Credits {
        let mut book = self.book.lock().unwrap();
        let balance = book.balances.entry(owner.clone()).or_default();
        *balance = *balance + amount;
        *balance
    }

    /// While set, every call fails with `TokenError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn total_supply(&self) -> Credits {
        self.book
            .lock()
            .unwrap()
            .balances
            .values()
            .fold(Credits::ZERO, |acc, b| acc + *b)
    }

    fn check_available(&self) -> Result<(), TokenError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TokenError::Unavailable("null token switched off".into()));
        }
        Ok(())
    }
}

impl StakeToken for NullToken {
    fn balance_of(&self, owner: &Identity) -> Result<Credits, TokenError> {
        self.check_available()?;
        Ok(self.book.lock().unwrap().balances.get(owner).copied().unwrap_or_default())
    }

    fn allowance(&self, owner: &Identity, spender: &Identity) -> Result<Credits, TokenError> {
        self.check_available()?;
        Ok(self
            .book
            .lock()
            .unwrap()
            .allowances
            .get(&(owner.clone(), spender.clone()))
            .copied()
            .unwrap_or_default())
    }

    fn approve(&self, owner: &Identity, spender: &Identity, amount: Credits) -> Result<(), TokenError> {
        self.check_available()?;
        self.book
            .lock()
            .unwrap()
            .allowances
            .insert((owner.clone(), spender.clone()), amount);
        Ok(())
    }

    fn transfer_from(&self, owner: &Identity, spender: &Identity, amount: Credits) -> Result<(), TokenError> {
        self.check_available()?;
        let mut book = self.book.lock().unwrap();
        let key = (owner.clone(), spender.clone());
        let granted = book.allowances.get(&key).copied().unwrap_or_default();
        if granted < amount {
            return Err(TokenError::InsufficientAllowance {
                needed: amount.raw(),
                granted: granted.raw(),
            });
        }
        let available = book.balances.get(owner).copied().unwrap_or_default();
        let remaining = available.checked_sub(amount).ok_or(TokenError::InsufficientBalance {
            needed: amount.raw(),
            available: available.raw(),
        })?;
        let credited = book
            .balances
            .get(spender)
            .copied()
            .unwrap_or_default()
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;

        book.balances.insert(owner.clone(), remaining);
        book.balances.insert(spender.clone(), credited);
        book.allowances.insert(key, granted.saturating_sub(amount));
        Ok(())
    }

    fn transfer(&self, from: &Identity, to: &Identity, amount: Credits) -> Result<(), TokenError> {
        self.check_available()?;
        let mut book = self.book.lock().unwrap();
        let available = book.balances.get(from).copied().unwrap_or_default();
        let remaining = available.checked_sub(amount).ok_or(TokenError::InsufficientBalance {
            needed: amount.raw(),
            available: available.raw(),
        })?;
        let credited = book
            .balances
            .get(to)
            .copied()
            .unwrap_or_default()
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;
        book.balances.insert(from.clone(), remaining);
        book.balances.insert(to.clone(), credited);
        Ok(())
    }
}
