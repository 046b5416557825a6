//! Per-character mutual exclusion.
//!
//! Units of work on the same character run one at a time. Different characters
//! never wait on each other. Account keys serialize character creation so two
//! concurrent creates cannot hand out the same sequence number.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex};

use crate::economy::types::{AccountId, CharacterId};
use crate::errors::{EngineError, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockKey {
    Character(CharacterId),
    Account(AccountId),
}

#[derive(Debug, Default)]
pub struct CharacterLocks {
    held: Mutex<HashSet<LockKey>>,
    released: Condvar,
}

impl CharacterLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `key` is free, then hold it until the guard drops.
    pub fn acquire(&self, key: LockKey) -> Result<LockGuard<'_>, EngineError> {
        let mut held = self
            .held
            .lock()
            .map_err(|_| StoreError::Poisoned("character locks"))?;
        while held.contains(&key) {
            held = self
                .released
                .wait(held)
                .map_err(|_| StoreError::Poisoned("character locks"))?;
        }
        held.insert(key.clone());
        Ok(LockGuard { locks: self, key })
    }

    pub fn is_held(&self, key: &LockKey) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(key))
            .unwrap_or(false)
    }
}

#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a> {
    locks: &'a CharacterLocks,
    key: LockKey,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        let mut held = match self.locks.held.lock() {
            Ok(held) => held,
            Err(poisoned) => poisoned.into_inner(),
        };
        held.remove(&self.key);
        drop(held);
        self.locks.released.notify_all();
    }
}
