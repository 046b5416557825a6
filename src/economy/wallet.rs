//! Money wallet. Balances are unsigned, so no path can drive them below zero.

use crate::economy::types::{Character, CharacterId, Money};
use crate::errors::EngineError;
use crate::store::Tx;

/// Running balance for one unit of work, opened from the character snapshot.
#[derive(Debug)]
pub struct Wallet {
    id: CharacterId,
    opening: Money,
    balance: Money,
}

impl Wallet {
    pub fn open(character: &Character) -> Self {
        Self {
            id: character.id.clone(),
            opening: character.money,
            balance: character.money,
        }
    }

    pub fn balance(&self) -> Money {
        self.balance
    }

    pub fn debit(&mut self, amount: Money) -> Result<(), EngineError> {
        if self.balance < amount {
            return Err(EngineError::InsufficientFunds {
                needed: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        Ok(())
    }

    pub fn credit(&mut self, amount: Money) -> Result<(), EngineError> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| EngineError::invalid("balance would overflow"))?;
        Ok(())
    }

    /// Persist the final balance. Returns it.
    pub fn settle(self, tx: &mut dyn Tx) -> Result<Money, EngineError> {
        if self.balance != self.opening {
            tx.set_money(&self.id, self.balance)?;
        }
        Ok(self.balance)
    }
}
