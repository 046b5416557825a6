//! Character economy and equipment transaction engine.
//!
//! Leaf components ([`ledger`], [`equipment`], [`stats`], [`wallet`],
//! [`gambling`]) operate on a [`crate::store::Tx`] inside one unit of work.
//! [`scripts`] bundles them into named units of work, and the [`Coordinator`]
//! runs each one under the target character's lock.

pub mod coordinator;
pub mod equipment;
pub mod gambling;
pub mod ledger;
pub mod locks;
pub mod roster;
pub mod scripts;
pub mod stats;
pub mod types;
pub mod wallet;

pub use coordinator::{Coordinator, StartingStats};
pub use gambling::{Dice, FixedDice, SeededDice, ThreadRngDice, WinProbability};
pub use roster::{CharacterDetail, CharacterSummary, EquipmentLine, InventoryLine};
pub use types::*;

#[cfg(test)]
pub(crate) mod testing {
    use std::marker::PhantomData;

    use super::types::{AccountId, Character, CharacterId, ItemCode, Money};
    use crate::errors::EngineError;
    use crate::store::{EconomyStore, MemoryStore, Table, TransactionScript, Tx};

    pub const HERO: &str = "1-1";

    /// Unit of work that may touch every table, for exercising leaf components.
    pub struct Probe<F, T>(F, PhantomData<fn() -> T>);

    impl<T, F> TransactionScript for Probe<F, T>
    where
        F: Fn(&mut dyn Tx) -> Result<T, EngineError>,
    {
        type Output = T;
        const NAME: &'static str = "probe";
        const READS: &'static [Table] = &[Table::Items];
        const WRITES: &'static [Table] = &[Table::Characters, Table::Inventory, Table::Equipment];

        fn run(&self, tx: &mut dyn Tx) -> Result<T, EngineError> {
            (self.0)(tx)
        }
    }

    pub fn probe<T, F>(store: &MemoryStore, f: F) -> Result<T, EngineError>
    where
        F: Fn(&mut dyn Tx) -> Result<T, EngineError>,
    {
        store.execute(&Probe(f, PhantomData))
    }

    /// Store holding one character, `1-1` "Ayla" of account 1.
    pub fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        let hero = Character::new(CharacterId::from(HERO), AccountId(1), "Ayla", 500, 100);
        store.insert_character(&hero).unwrap();
        store
    }

    pub fn hero(store: &MemoryStore) -> Character {
        store.character(&CharacterId::from(HERO)).unwrap().unwrap()
    }

    pub fn give(store: &MemoryStore, code: ItemCode, n: u32) {
        let id = CharacterId::from(HERO);
        probe(store, |tx| super::ledger::add(tx, &id, code, n)).unwrap();
    }

    pub fn fund(store: &MemoryStore, money: Money) {
        let id = CharacterId::from(HERO);
        probe(store, |tx| tx.set_money(&id, money)).unwrap();
    }
}
