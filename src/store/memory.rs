//! In-memory store with read-committed isolation.
//!
//! Reads inside a unit of work see committed state plus the unit's own staged
//! writes; nothing staged is visible elsewhere until commit, which applies the
//! whole write set under one exclusive lock. Two units of work on the same
//! character can therefore still interleave their read-modify-write sequences
//! here; keeping them apart is the coordinator's job.
//!
//! Faults can be injected per table to exercise rollback.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::auth::{Account, NewAccount, Session};
use crate::economy::types::{
    AccountId, Character, CharacterId, EquippedItem, InventoryEntry, Item, ItemCode, Money,
    Occupant, Slot, StatDelta,
};
use crate::errors::{EngineError, StoreError};
use crate::store::{
    run_script, AccountStore, EconomyStore, ItemCatalog, Table, TransactionScript, Tx,
};

#[derive(Debug, Default)]
struct Tables {
    characters: BTreeMap<CharacterId, Character>,
    character_names: HashMap<String, CharacterId>,
    inventory: BTreeMap<(CharacterId, ItemCode), u32>,
    equipment: BTreeMap<(CharacterId, Slot), Occupant>,
    items: BTreeMap<ItemCode, Item>,
    accounts: BTreeMap<AccountId, Account>,
    sessions: HashMap<String, Session>,
    next_account_id: u64,
}

/// Field-level changes staged against one character row.
#[derive(Debug, Default, Clone, Copy)]
struct CharacterPatch {
    stats: StatDelta,
    money: Option<Money>,
}

impl CharacterPatch {
    fn apply(&self, character: &mut Character) -> Result<(), EngineError> {
        character.adjust(self.stats)?;
        if let Some(money) = self.money {
            character.money = money;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct WriteSet {
    characters: BTreeMap<CharacterId, CharacterPatch>,
    inventory: BTreeMap<(CharacterId, ItemCode), Option<u32>>,
    equipment: BTreeMap<(CharacterId, Slot), Option<Occupant>>,
}

/// In-memory [`EconomyStore`] for tests and throwaway runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    faults: Mutex<Vec<Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next staged write to `table` fail with an internal error.
    pub fn fail_next_write(&self, table: Table) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.push(table);
        }
    }

    fn take_fault(&self, table: Table) -> Result<(), EngineError> {
        let mut faults = self
            .faults
            .lock()
            .map_err(|_| StoreError::Poisoned("memory faults"))?;
        if let Some(pos) = faults.iter().position(|t| *t == table) {
            faults.remove(pos);
            return Err(StoreError::Injected(table.as_str()).into());
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, EngineError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Poisoned("memory tables").into())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, EngineError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Poisoned("memory tables").into())
    }

    fn commit(&self, writes: WriteSet) -> Result<(), EngineError> {
        let mut tables = self.write()?;
        // Build every patched row before touching anything so a bad write set
        // leaves no trace.
        let mut patched = Vec::with_capacity(writes.characters.len());
        for (id, patch) in &writes.characters {
            let mut character = tables
                .characters
                .get(id)
                .cloned()
                .ok_or_else(|| StoreError::Invariant(format!("character {} vanished", id)))?;
            patch.apply(&mut character)?;
            character.touch();
            patched.push(character);
        }
        for character in patched {
            tables.characters.insert(character.id.clone(), character);
        }
        for (key, count) in writes.inventory {
            match count {
                Some(count) => tables.inventory.insert(key, count),
                None => tables.inventory.remove(&key),
            };
        }
        for (key, occupant) in writes.equipment {
            match occupant {
                Some(occupant) => tables.equipment.insert(key, occupant),
                None => tables.equipment.remove(&key),
            };
        }
        Ok(())
    }
}

struct MemoryTx<'a> {
    store: &'a MemoryStore,
    writes: WriteSet,
}

impl MemoryTx<'_> {
    fn staged_character(&mut self, id: &CharacterId) -> &mut CharacterPatch {
        self.writes.characters.entry(id.clone()).or_default()
    }
}

impl Tx for MemoryTx<'_> {
    fn character(&mut self, id: &CharacterId) -> Result<Option<Character>, EngineError> {
        let mut character = match self.store.read()?.characters.get(id) {
            Some(c) => c.clone(),
            None => return Ok(None),
        };
        if let Some(patch) = self.writes.characters.get(id) {
            patch.apply(&mut character)?;
        }
        Ok(Some(character))
    }

    fn item(&mut self, code: ItemCode) -> Result<Option<Item>, EngineError> {
        Ok(self.store.read()?.items.get(&code).cloned())
    }

    fn inventory_count(
        &mut self,
        id: &CharacterId,
        code: ItemCode,
    ) -> Result<Option<u32>, EngineError> {
        let key = (id.clone(), code);
        if let Some(staged) = self.writes.inventory.get(&key) {
            return Ok(*staged);
        }
        Ok(self.store.read()?.inventory.get(&key).copied())
    }

    fn put_inventory_count(
        &mut self,
        id: &CharacterId,
        code: ItemCode,
        count: u32,
    ) -> Result<(), EngineError> {
        self.store.take_fault(Table::Inventory)?;
        self.writes.inventory.insert((id.clone(), code), Some(count));
        Ok(())
    }

    fn delete_inventory(&mut self, id: &CharacterId, code: ItemCode) -> Result<(), EngineError> {
        self.store.take_fault(Table::Inventory)?;
        self.writes.inventory.insert((id.clone(), code), None);
        Ok(())
    }

    fn occupant(&mut self, id: &CharacterId, slot: Slot) -> Result<Option<Occupant>, EngineError> {
        let key = (id.clone(), slot);
        if let Some(staged) = self.writes.equipment.get(&key) {
            return Ok(*staged);
        }
        Ok(self.store.read()?.equipment.get(&key).copied())
    }

    fn put_occupant(
        &mut self,
        id: &CharacterId,
        slot: Slot,
        occupant: Occupant,
    ) -> Result<(), EngineError> {
        self.store.take_fault(Table::Equipment)?;
        self.writes.equipment.insert((id.clone(), slot), Some(occupant));
        Ok(())
    }

    fn clear_occupant(&mut self, id: &CharacterId, slot: Slot) -> Result<(), EngineError> {
        self.store.take_fault(Table::Equipment)?;
        self.writes.equipment.insert((id.clone(), slot), None);
        Ok(())
    }

    fn adjust_stats(&mut self, id: &CharacterId, delta: StatDelta) -> Result<(), EngineError> {
        self.store.take_fault(Table::Characters)?;
        let patch = self.staged_character(id);
        patch.stats = patch
            .stats
            .checked_add(delta)
            .ok_or_else(|| EngineError::invalid("stat adjustment out of range"))?;
        Ok(())
    }

    fn set_money(&mut self, id: &CharacterId, money: Money) -> Result<(), EngineError> {
        self.store.take_fault(Table::Characters)?;
        self.staged_character(id).money = Some(money);
        Ok(())
    }
}

impl EconomyStore for MemoryStore {
    fn execute<S: TransactionScript>(&self, script: &S) -> Result<S::Output, EngineError> {
        let mut tx = MemoryTx {
            store: self,
            writes: WriteSet::default(),
        };
        let output = run_script(script, &mut tx)?;
        self.commit(tx.writes)?;
        Ok(output)
    }

    fn insert_character(&self, character: &Character) -> Result<(), EngineError> {
        let mut tables = self.write()?;
        if tables.characters.contains_key(&character.id) {
            return Err(EngineError::conflict(format!(
                "character id {} already exists",
                character.id
            )));
        }
        if tables.character_names.contains_key(&character.name) {
            return Err(EngineError::conflict(format!(
                "character name '{}' is already taken",
                character.name
            )));
        }
        tables
            .character_names
            .insert(character.name.clone(), character.id.clone());
        tables
            .characters
            .insert(character.id.clone(), character.clone());
        Ok(())
    }

    fn character(&self, id: &CharacterId) -> Result<Option<Character>, EngineError> {
        Ok(self.read()?.characters.get(id).cloned())
    }

    fn characters_for(&self, account: AccountId) -> Result<Vec<Character>, EngineError> {
        Ok(self
            .read()?
            .characters
            .values()
            .filter(|c| c.account_id == account)
            .cloned()
            .collect())
    }

    fn remove_character(&self, id: &CharacterId) -> Result<bool, EngineError> {
        let mut tables = self.write()?;
        let Some(character) = tables.characters.remove(id) else {
            return Ok(false);
        };
        tables.character_names.remove(&character.name);
        tables.inventory.retain(|(owner, _), _| owner != id);
        tables.equipment.retain(|(owner, _), _| owner != id);
        Ok(true)
    }

    fn inventory_entries(&self, id: &CharacterId) -> Result<Vec<InventoryEntry>, EngineError> {
        Ok(self
            .read()?
            .inventory
            .iter()
            .filter(|((owner, _), _)| owner == id)
            .map(|((owner, code), count)| InventoryEntry {
                character_id: owner.clone(),
                item_code: *code,
                count: *count,
            })
            .collect())
    }

    fn equipped_items(&self, id: &CharacterId) -> Result<Vec<EquippedItem>, EngineError> {
        Ok(self
            .read()?
            .equipment
            .iter()
            .filter(|((owner, _), _)| owner == id)
            .map(|((owner, slot), occupant)| EquippedItem {
                character_id: owner.clone(),
                slot: *slot,
                item_code: occupant.item_code,
                stats: occupant.stats,
            })
            .collect())
    }
}

impl ItemCatalog for MemoryStore {
    fn get_item(&self, code: ItemCode) -> Result<Option<Item>, EngineError> {
        Ok(self.read()?.items.get(&code).cloned())
    }

    fn list_items(&self) -> Result<Vec<Item>, EngineError> {
        Ok(self.read()?.items.values().cloned().collect())
    }

    fn insert_item(&self, item: &Item) -> Result<(), EngineError> {
        let mut tables = self.write()?;
        if tables.items.contains_key(&item.code) {
            return Err(EngineError::conflict(format!(
                "item code {} already exists",
                item.code
            )));
        }
        if tables.items.values().any(|i| i.name == item.name) {
            return Err(EngineError::conflict(format!(
                "item name '{}' already exists",
                item.name
            )));
        }
        tables.items.insert(item.code, item.clone());
        Ok(())
    }

    fn replace_item(&self, item: &Item) -> Result<(), EngineError> {
        let mut tables = self.write()?;
        if !tables.items.contains_key(&item.code) {
            return Err(EngineError::not_found(format!("item {}", item.code)));
        }
        if tables
            .items
            .values()
            .any(|i| i.code != item.code && i.name == item.name)
        {
            return Err(EngineError::conflict(format!(
                "item name '{}' already exists",
                item.name
            )));
        }
        tables.items.insert(item.code, item.clone());
        Ok(())
    }
}

impl AccountStore for MemoryStore {
    fn insert_account(&self, account: NewAccount) -> Result<Account, EngineError> {
        let mut tables = self.write()?;
        if tables.accounts.values().any(|a| a.user_id == account.user_id) {
            return Err(EngineError::conflict(format!(
                "user id '{}' already exists",
                account.user_id
            )));
        }
        tables.next_account_id += 1;
        let account = account.into_account(AccountId(tables.next_account_id));
        tables.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    fn account(&self, id: AccountId) -> Result<Option<Account>, EngineError> {
        Ok(self.read()?.accounts.get(&id).cloned())
    }

    fn account_by_user_id(&self, user_id: &str) -> Result<Option<Account>, EngineError> {
        Ok(self
            .read()?
            .accounts
            .values()
            .find(|a| a.user_id == user_id)
            .cloned())
    }

    fn put_session(&self, session: &Session) -> Result<(), EngineError> {
        self.write()?
            .sessions
            .insert(session.token.clone(), session.clone());
        Ok(())
    }

    fn session(&self, token: &str) -> Result<Option<Session>, EngineError> {
        Ok(self.read()?.sessions.get(token).cloned())
    }

    fn remove_session(&self, token: &str) -> Result<(), EngineError> {
        self.write()?.sessions.remove(token);
        Ok(())
    }
}
