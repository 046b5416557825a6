//! Store interface for the economy engine.
//!
//! Every economic action runs as one [`TransactionScript`]: a named unit of work
//! with declared table reads and writes, executed by an [`EconomyStore`] as a
//! single all-or-nothing transaction. Scripts talk to the store only through the
//! field-level commands on [`Tx`] ("adjust stats by delta", "set money to
//! value"), never by rewriting whole records.
//!
//! Two backends are provided:
//! - [`MemoryStore`]: read-committed in-memory fake with fault injection, for tests
//! - [`SledStore`]: persistent multi-tree sled transactions

pub mod memory;
pub mod sled_store;

use log::debug;

use crate::auth::{Account, NewAccount, Session};
use crate::economy::types::{
    AccountId, Character, CharacterId, EquippedItem, InventoryEntry, Item, ItemCode, Money,
    Occupant, Slot, StatDelta,
};
use crate::errors::{EngineError, StoreError};

pub use memory::MemoryStore;
pub use sled_store::{SledStore, SledStoreBuilder};

/// Tables a unit of work may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Characters,
    Inventory,
    Equipment,
    Items,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Characters => "characters",
            Table::Inventory => "inventory",
            Table::Equipment => "equipment",
            Table::Items => "items",
        }
    }
}

/// Reads and field-level writes available inside one unit of work.
///
/// Writes are only visible to other units of work once the enclosing
/// transaction commits. Any error returned from a script discards them all.
pub trait Tx {
    fn character(&mut self, id: &CharacterId) -> Result<Option<Character>, EngineError>;

    fn item(&mut self, code: ItemCode) -> Result<Option<Item>, EngineError>;

    fn inventory_count(
        &mut self,
        id: &CharacterId,
        code: ItemCode,
    ) -> Result<Option<u32>, EngineError>;

    /// Set the ledger count for `(id, code)`. `count` must be > 0.
    fn put_inventory_count(
        &mut self,
        id: &CharacterId,
        code: ItemCode,
        count: u32,
    ) -> Result<(), EngineError>;

    fn delete_inventory(&mut self, id: &CharacterId, code: ItemCode) -> Result<(), EngineError>;

    fn occupant(&mut self, id: &CharacterId, slot: Slot) -> Result<Option<Occupant>, EngineError>;

    fn put_occupant(
        &mut self,
        id: &CharacterId,
        slot: Slot,
        occupant: Occupant,
    ) -> Result<(), EngineError>;

    fn clear_occupant(&mut self, id: &CharacterId, slot: Slot) -> Result<(), EngineError>;

    /// Add `delta` to the character's live health and power.
    fn adjust_stats(&mut self, id: &CharacterId, delta: StatDelta) -> Result<(), EngineError>;

    fn set_money(&mut self, id: &CharacterId, money: Money) -> Result<(), EngineError>;
}

/// A fixed, named unit of work with declared table access.
pub trait TransactionScript {
    type Output;

    const NAME: &'static str;
    const READS: &'static [Table];
    const WRITES: &'static [Table];

    fn run(&self, tx: &mut dyn Tx) -> Result<Self::Output, EngineError>;
}

/// Persistent home of characters, ledgers and equipment.
pub trait EconomyStore: ItemCatalog + AccountStore + Send + Sync {
    /// Run `script` as one atomic transaction: commit everything it wrote on
    /// `Ok`, nothing on `Err`.
    fn execute<S: TransactionScript>(&self, script: &S) -> Result<S::Output, EngineError>;

    /// Insert a new character. Conflict if the id or the name is taken.
    fn insert_character(&self, character: &Character) -> Result<(), EngineError>;

    fn character(&self, id: &CharacterId) -> Result<Option<Character>, EngineError>;

    fn characters_for(&self, account: AccountId) -> Result<Vec<Character>, EngineError>;

    /// Remove a character along with its name, ledger entries and equipped items.
    /// Returns false if the character did not exist.
    fn remove_character(&self, id: &CharacterId) -> Result<bool, EngineError>;

    fn inventory_entries(&self, id: &CharacterId) -> Result<Vec<InventoryEntry>, EngineError>;

    fn equipped_items(&self, id: &CharacterId) -> Result<Vec<EquippedItem>, EngineError>;
}

/// Item catalog read path plus the authoring writes used by [`crate::catalog`].
pub trait ItemCatalog {
    fn get_item(&self, code: ItemCode) -> Result<Option<Item>, EngineError>;

    /// All items ordered by code.
    fn list_items(&self) -> Result<Vec<Item>, EngineError>;

    /// Conflict if the code or the name is already used.
    fn insert_item(&self, item: &Item) -> Result<(), EngineError>;

    /// Overwrite an existing item. NotFound if absent, Conflict if the new
    /// name belongs to another item.
    fn replace_item(&self, item: &Item) -> Result<(), EngineError>;
}

/// Accounts and sessions for the identity provider.
pub trait AccountStore {
    /// Allocate an id and store the account. Conflict if the user id is taken.
    fn insert_account(&self, account: NewAccount) -> Result<Account, EngineError>;

    fn account(&self, id: AccountId) -> Result<Option<Account>, EngineError>;

    fn account_by_user_id(&self, user_id: &str) -> Result<Option<Account>, EngineError>;

    fn put_session(&self, session: &Session) -> Result<(), EngineError>;

    fn session(&self, token: &str) -> Result<Option<Session>, EngineError>;

    fn remove_session(&self, token: &str) -> Result<(), EngineError>;
}

/// Run `script` against a backend transaction, rejecting access to any table
/// the script did not declare.
pub fn run_script<S: TransactionScript>(
    script: &S,
    tx: &mut dyn Tx,
) -> Result<S::Output, EngineError> {
    debug!(
        "unit of work {} opened (reads {:?}, writes {:?})",
        S::NAME,
        S::READS,
        S::WRITES
    );
    let mut audited = AuditedTx {
        script: S::NAME,
        reads: S::READS,
        writes: S::WRITES,
        inner: tx,
    };
    let result = script.run(&mut audited);
    match &result {
        Ok(_) => debug!("unit of work {} ready to commit", S::NAME),
        Err(e) => debug!("unit of work {} aborted: {}", S::NAME, e.kind()),
    }
    result
}

struct AuditedTx<'a> {
    script: &'static str,
    reads: &'static [Table],
    writes: &'static [Table],
    inner: &'a mut dyn Tx,
}

impl AuditedTx<'_> {
    fn check_read(&self, table: Table) -> Result<(), EngineError> {
        if self.reads.contains(&table) || self.writes.contains(&table) {
            Ok(())
        } else {
            Err(self.undeclared(table))
        }
    }

    fn check_write(&self, table: Table) -> Result<(), EngineError> {
        if self.writes.contains(&table) {
            Ok(())
        } else {
            Err(self.undeclared(table))
        }
    }

    fn undeclared(&self, table: Table) -> EngineError {
        StoreError::UndeclaredAccess {
            script: self.script,
            table: table.as_str(),
        }
        .into()
    }
}

impl Tx for AuditedTx<'_> {
    fn character(&mut self, id: &CharacterId) -> Result<Option<Character>, EngineError> {
        self.check_read(Table::Characters)?;
        self.inner.character(id)
    }

    fn item(&mut self, code: ItemCode) -> Result<Option<Item>, EngineError> {
        self.check_read(Table::Items)?;
        self.inner.item(code)
    }

    fn inventory_count(
        &mut self,
        id: &CharacterId,
        code: ItemCode,
    ) -> Result<Option<u32>, EngineError> {
        self.check_read(Table::Inventory)?;
        self.inner.inventory_count(id, code)
    }

    fn put_inventory_count(
        &mut self,
        id: &CharacterId,
        code: ItemCode,
        count: u32,
    ) -> Result<(), EngineError> {
        self.check_write(Table::Inventory)?;
        if count == 0 {
            return Err(StoreError::Invariant(format!(
                "zero count for item {} on {}",
                code, id
            ))
            .into());
        }
        self.inner.put_inventory_count(id, code, count)
    }

    fn delete_inventory(&mut self, id: &CharacterId, code: ItemCode) -> Result<(), EngineError> {
        self.check_write(Table::Inventory)?;
        self.inner.delete_inventory(id, code)
    }

    fn occupant(&mut self, id: &CharacterId, slot: Slot) -> Result<Option<Occupant>, EngineError> {
        self.check_read(Table::Equipment)?;
        self.inner.occupant(id, slot)
    }

    fn put_occupant(
        &mut self,
        id: &CharacterId,
        slot: Slot,
        occupant: Occupant,
    ) -> Result<(), EngineError> {
        self.check_write(Table::Equipment)?;
        self.inner.put_occupant(id, slot, occupant)
    }

    fn clear_occupant(&mut self, id: &CharacterId, slot: Slot) -> Result<(), EngineError> {
        self.check_write(Table::Equipment)?;
        self.inner.clear_occupant(id, slot)
    }

    fn adjust_stats(&mut self, id: &CharacterId, delta: StatDelta) -> Result<(), EngineError> {
        self.check_write(Table::Characters)?;
        self.inner.adjust_stats(id, delta)
    }

    fn set_money(&mut self, id: &CharacterId, money: Money) -> Result<(), EngineError> {
        self.check_write(Table::Characters)?;
        self.inner.set_money(id, money)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    struct PeekItems;

    impl TransactionScript for PeekItems {
        type Output = Option<Item>;
        const NAME: &'static str = "peek_items";
        const READS: &'static [Table] = &[Table::Characters];
        const WRITES: &'static [Table] = &[];

        fn run(&self, tx: &mut dyn Tx) -> Result<Self::Output, EngineError> {
            tx.item(1)
        }
    }

    struct ZeroWrite;

    impl TransactionScript for ZeroWrite {
        type Output = ();
        const NAME: &'static str = "zero_write";
        const READS: &'static [Table] = &[];
        const WRITES: &'static [Table] = &[Table::Inventory];

        fn run(&self, tx: &mut dyn Tx) -> Result<Self::Output, EngineError> {
            tx.put_inventory_count(&CharacterId::from("1-1"), 1, 0)
        }
    }

    #[test]
    fn undeclared_table_access_is_rejected() {
        let store = MemoryStore::new();
        let err = store.execute(&PeekItems).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn zero_counts_never_reach_the_store() {
        let store = MemoryStore::new();
        let err = store.execute(&ZeroWrite).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
