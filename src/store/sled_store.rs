use std::path::{Path, PathBuf};

use log::{debug, error};
use sled::transaction::{
    ConflictableTransactionError, TransactionError, TransactionalTree, UnabortableTransactionError,
};
use sled::{IVec, Transactional};

use crate::auth::{Account, NewAccount, Session};
use crate::economy::types::{
    AccountId, Character, CharacterId, EquippedItem, InventoryEntry, Item, ItemCode, Money,
    Occupant, Slot, StatDelta, CHARACTER_SCHEMA_VERSION, ITEM_SCHEMA_VERSION,
};
use crate::errors::{EngineError, StoreError};
use crate::store::{run_script, AccountStore, EconomyStore, ItemCatalog, TransactionScript, Tx};

const TREE_CHARACTERS: &str = "characters";
const TREE_CHARACTER_NAMES: &str = "character_names";
const TREE_INVENTORY: &str = "inventory";
const TREE_EQUIPMENT: &str = "equipment";
const TREE_ITEMS: &str = "items";
const TREE_ITEM_NAMES: &str = "item_names";
const TREE_ACCOUNTS: &str = "accounts";
const TREE_ACCOUNT_USER_IDS: &str = "account_user_ids";
const TREE_SESSIONS: &str = "sessions";

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct SledStoreBuilder {
    path: PathBuf,
    flush_on_commit: bool,
}

impl SledStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            flush_on_commit: true,
        }
    }

    /// Skip the fsync after each committed unit of work (useful for bulk tests).
    pub fn without_flush(mut self) -> Self {
        self.flush_on_commit = false;
        self
    }

    pub fn open(self) -> Result<SledStore, EngineError> {
        SledStore::open_with_options(self.path, self.flush_on_commit)
    }
}

/// Sled-backed persistence for characters, ledgers, equipment, catalog and accounts.
pub struct SledStore {
    db: sled::Db,
    characters: sled::Tree,
    character_names: sled::Tree,
    inventory: sled::Tree,
    equipment: sled::Tree,
    items: sled::Tree,
    item_names: sled::Tree,
    accounts: sled::Tree,
    account_user_ids: sled::Tree,
    sessions: sled::Tree,
    flush_on_commit: bool,
}

impl SledStore {
    /// Open (or create) the store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        Self::open_with_options(path, true)
    }

    fn open_with_options<P: AsRef<Path>>(
        path: P,
        flush_on_commit: bool,
    ) -> Result<Self, EngineError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let store = Self {
            characters: db.open_tree(TREE_CHARACTERS)?,
            character_names: db.open_tree(TREE_CHARACTER_NAMES)?,
            inventory: db.open_tree(TREE_INVENTORY)?,
            equipment: db.open_tree(TREE_EQUIPMENT)?,
            items: db.open_tree(TREE_ITEMS)?,
            item_names: db.open_tree(TREE_ITEM_NAMES)?,
            accounts: db.open_tree(TREE_ACCOUNTS)?,
            account_user_ids: db.open_tree(TREE_ACCOUNT_USER_IDS)?,
            sessions: db.open_tree(TREE_SESSIONS)?,
            db,
            flush_on_commit,
        };
        debug!("sled store opened at {}", path_ref.display());
        Ok(store)
    }

    /// Flush pending writes; call at shutdown.
    pub fn close(&self) -> Result<(), EngineError> {
        self.db.flush()?;
        Ok(())
    }

    fn flush(&self) -> Result<(), EngineError> {
        if self.flush_on_commit {
            self.db.flush()?;
        }
        Ok(())
    }

    fn character_key(id: &CharacterId) -> Vec<u8> {
        id.as_str().as_bytes().to_vec()
    }

    fn owned_prefix(id: &CharacterId) -> Vec<u8> {
        format!("{}:", id).into_bytes()
    }

    fn inventory_key(id: &CharacterId, code: ItemCode) -> Vec<u8> {
        format!("{}:{:010}", id, code).into_bytes()
    }

    fn equipment_key(id: &CharacterId, slot: Slot) -> Vec<u8> {
        format!("{}:{}", id, slot).into_bytes()
    }

    fn item_key(code: ItemCode) -> [u8; 4] {
        code.to_be_bytes()
    }

    fn account_key(id: AccountId) -> [u8; 8] {
        id.0.to_be_bytes()
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, EngineError> {
        Ok(bincode::serialize(value)?)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, EngineError> {
        Ok(bincode::deserialize::<T>(bytes)?)
    }

    fn decode_character(bytes: &[u8]) -> Result<Character, EngineError> {
        let record: Character = Self::deserialize(bytes)?;
        if record.schema_version != CHARACTER_SCHEMA_VERSION {
            return Err(StoreError::SchemaMismatch {
                entity: "character",
                expected: CHARACTER_SCHEMA_VERSION,
                found: record.schema_version,
            }
            .into());
        }
        Ok(record)
    }

    fn decode_item(bytes: &[u8]) -> Result<Item, EngineError> {
        let record: Item = Self::deserialize(bytes)?;
        if record.schema_version != ITEM_SCHEMA_VERSION {
            return Err(StoreError::SchemaMismatch {
                entity: "item",
                expected: ITEM_SCHEMA_VERSION,
                found: record.schema_version,
            }
            .into());
        }
        Ok(record)
    }

    fn decode_u32(bytes: &[u8]) -> Result<u32, EngineError> {
        let raw: [u8; 4] = bytes
            .try_into()
            .map_err(|_| StoreError::Invariant(format!("expected 4 bytes, got {}", bytes.len())))?;
        Ok(u32::from_be_bytes(raw))
    }

    fn decode_account_id(bytes: &[u8]) -> Result<AccountId, EngineError> {
        let raw: [u8; 8] = bytes
            .try_into()
            .map_err(|_| StoreError::Invariant(format!("expected 8 bytes, got {}", bytes.len())))?;
        Ok(AccountId(u64::from_be_bytes(raw)))
    }

    fn slot_from_key(key: &[u8]) -> Option<Slot> {
        let text = std::str::from_utf8(key).ok()?;
        text.rsplit_once(':')?.1.parse().ok()
    }

    fn code_from_key(key: &[u8]) -> Option<ItemCode> {
        let text = std::str::from_utf8(key).ok()?;
        text.rsplit_once(':')?.1.parse().ok()
    }
}

/// Collapse a sled transaction result into engine terms.
fn finish<T>(result: Result<T, TransactionError<EngineError>>) -> Result<T, EngineError> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(err)) => Err(err),
        Err(TransactionError::Storage(err)) => {
            error!("sled transaction failed: {}", err);
            Err(err.into())
        }
    }
}

fn abort<T>(err: EngineError) -> Result<T, ConflictableTransactionError<EngineError>> {
    Err(ConflictableTransactionError::Abort(err))
}

/// One sled multi-tree transaction seen through the [`Tx`] interface.
///
/// Conflicts and storage failures must reach sled untouched so it can replay or
/// abort the transaction; they are parked in `interrupted` while the script
/// unwinds with an internal error.
struct SledTx<'a> {
    characters: &'a TransactionalTree,
    inventory: &'a TransactionalTree,
    equipment: &'a TransactionalTree,
    items: &'a TransactionalTree,
    interrupted: Option<UnabortableTransactionError>,
}

impl SledTx<'_> {
    fn guard<T>(&mut self, result: Result<T, UnabortableTransactionError>) -> Result<T, EngineError> {
        result.map_err(|cause| {
            self.interrupted.get_or_insert(cause);
            EngineError::Internal(StoreError::Interrupted)
        })
    }

    fn load_character(&mut self, id: &CharacterId) -> Result<Option<Character>, EngineError> {
        let raw = self.characters.get(SledStore::character_key(id));
        match self.guard(raw)? {
            Some(bytes) => SledStore::decode_character(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn store_character(&mut self, character: &Character) -> Result<(), EngineError> {
        let bytes = SledStore::serialize(character)?;
        let raw = self
            .characters
            .insert(SledStore::character_key(&character.id), bytes);
        self.guard(raw)?;
        Ok(())
    }

    fn modify_character(
        &mut self,
        id: &CharacterId,
        change: impl FnOnce(&mut Character) -> Result<(), EngineError>,
    ) -> Result<(), EngineError> {
        let mut character = self
            .load_character(id)?
            .ok_or_else(|| StoreError::Invariant(format!("character {} vanished", id)))?;
        change(&mut character)?;
        character.touch();
        self.store_character(&character)
    }
}

impl Tx for SledTx<'_> {
    fn character(&mut self, id: &CharacterId) -> Result<Option<Character>, EngineError> {
        self.load_character(id)
    }

    fn item(&mut self, code: ItemCode) -> Result<Option<Item>, EngineError> {
        let raw = self.items.get(SledStore::item_key(code));
        match self.guard(raw)? {
            Some(bytes) => SledStore::decode_item(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn inventory_count(
        &mut self,
        id: &CharacterId,
        code: ItemCode,
    ) -> Result<Option<u32>, EngineError> {
        let raw = self.inventory.get(SledStore::inventory_key(id, code));
        match self.guard(raw)? {
            Some(bytes) => SledStore::decode_u32(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn put_inventory_count(
        &mut self,
        id: &CharacterId,
        code: ItemCode,
        count: u32,
    ) -> Result<(), EngineError> {
        let raw = self.inventory.insert(
            SledStore::inventory_key(id, code),
            count.to_be_bytes().to_vec(),
        );
        self.guard(raw)?;
        Ok(())
    }

    fn delete_inventory(&mut self, id: &CharacterId, code: ItemCode) -> Result<(), EngineError> {
        let raw = self.inventory.remove(SledStore::inventory_key(id, code));
        self.guard(raw)?;
        Ok(())
    }

    fn occupant(&mut self, id: &CharacterId, slot: Slot) -> Result<Option<Occupant>, EngineError> {
        let raw = self.equipment.get(SledStore::equipment_key(id, slot));
        match self.guard(raw)? {
            Some(bytes) => SledStore::deserialize(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn put_occupant(
        &mut self,
        id: &CharacterId,
        slot: Slot,
        occupant: Occupant,
    ) -> Result<(), EngineError> {
        let bytes = SledStore::serialize(&occupant)?;
        let raw = self.equipment.insert(SledStore::equipment_key(id, slot), bytes);
        self.guard(raw)?;
        Ok(())
    }

    fn clear_occupant(&mut self, id: &CharacterId, slot: Slot) -> Result<(), EngineError> {
        let raw = self.equipment.remove(SledStore::equipment_key(id, slot));
        self.guard(raw)?;
        Ok(())
    }

    fn adjust_stats(&mut self, id: &CharacterId, delta: StatDelta) -> Result<(), EngineError> {
        self.modify_character(id, |c| c.adjust(delta))
    }

    fn set_money(&mut self, id: &CharacterId, money: Money) -> Result<(), EngineError> {
        self.modify_character(id, |c| {
            c.money = money;
            Ok(())
        })
    }
}

impl EconomyStore for SledStore {
    fn execute<S: TransactionScript>(&self, script: &S) -> Result<S::Output, EngineError> {
        let trees = (&self.characters, &self.inventory, &self.equipment, &self.items);
        let result = trees.transaction(|(characters, inventory, equipment, items)| {
            let mut tx = SledTx {
                characters,
                inventory,
                equipment,
                items,
                interrupted: None,
            };
            match run_script(script, &mut tx) {
                Ok(output) => Ok(output),
                Err(err) => match tx.interrupted.take() {
                    Some(cause) => Err(cause.into()),
                    None => abort(err),
                },
            }
        });
        let output = finish(result)?;
        self.flush()?;
        Ok(output)
    }

    fn insert_character(&self, character: &Character) -> Result<(), EngineError> {
        let bytes = Self::serialize(character)?;
        let key = Self::character_key(&character.id);
        let result = (&self.characters, &self.character_names).transaction(|(chars, names)| {
            if chars.get(&key)?.is_some() {
                return abort(EngineError::conflict(format!(
                    "character id {} already exists",
                    character.id
                )));
            }
            if names.get(character.name.as_bytes())?.is_some() {
                return abort(EngineError::conflict(format!(
                    "character name '{}' is already taken",
                    character.name
                )));
            }
            names.insert(character.name.as_bytes(), key.clone())?;
            chars.insert(key.clone(), bytes.clone())?;
            Ok(())
        });
        finish(result)?;
        self.flush()
    }

    fn character(&self, id: &CharacterId) -> Result<Option<Character>, EngineError> {
        match self.characters.get(Self::character_key(id))? {
            Some(bytes) => Self::decode_character(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn characters_for(&self, account: AccountId) -> Result<Vec<Character>, EngineError> {
        let prefix = format!("{}-", account);
        let mut out = Vec::new();
        for entry in self.characters.scan_prefix(prefix.as_bytes()) {
            let (_, bytes) = entry?;
            let character = Self::decode_character(&bytes)?;
            if character.account_id == account {
                out.push(character);
            }
        }
        Ok(out)
    }

    fn remove_character(&self, id: &CharacterId) -> Result<bool, EngineError> {
        let Some(character) = EconomyStore::character(self, id)? else {
            return Ok(false);
        };
        let prefix = Self::owned_prefix(id);
        let ledger_keys: Vec<IVec> = self
            .inventory
            .scan_prefix(&prefix)
            .keys()
            .collect::<Result<_, _>>()?;
        let slot_keys: Vec<IVec> = self
            .equipment
            .scan_prefix(&prefix)
            .keys()
            .collect::<Result<_, _>>()?;
        let key = Self::character_key(id);
        let result = (
            &self.characters,
            &self.character_names,
            &self.inventory,
            &self.equipment,
        )
            .transaction(|(chars, names, inventory, equipment)| {
                chars.remove(key.clone())?;
                names.remove(character.name.as_bytes())?;
                for k in &ledger_keys {
                    inventory.remove(k.clone())?;
                }
                for k in &slot_keys {
                    equipment.remove(k.clone())?;
                }
                Ok::<_, ConflictableTransactionError<EngineError>>(())
            });
        finish(result)?;
        self.flush()?;
        Ok(true)
    }

    fn inventory_entries(&self, id: &CharacterId) -> Result<Vec<InventoryEntry>, EngineError> {
        let mut out = Vec::new();
        for entry in self.inventory.scan_prefix(Self::owned_prefix(id)) {
            let (key, value) = entry?;
            let item_code = Self::code_from_key(&key)
                .ok_or_else(|| StoreError::Invariant("malformed inventory key".into()))?;
            out.push(InventoryEntry {
                character_id: id.clone(),
                item_code,
                count: Self::decode_u32(&value)?,
            });
        }
        Ok(out)
    }

    fn equipped_items(&self, id: &CharacterId) -> Result<Vec<EquippedItem>, EngineError> {
        let mut out = Vec::new();
        for entry in self.equipment.scan_prefix(Self::owned_prefix(id)) {
            let (key, value) = entry?;
            let slot = Self::slot_from_key(&key)
                .ok_or_else(|| StoreError::Invariant("malformed equipment key".into()))?;
            let occupant: Occupant = Self::deserialize(&value)?;
            out.push(EquippedItem {
                character_id: id.clone(),
                slot,
                item_code: occupant.item_code,
                stats: occupant.stats,
            });
        }
        out.sort_by_key(|e| e.slot);
        Ok(out)
    }
}

impl ItemCatalog for SledStore {
    fn get_item(&self, code: ItemCode) -> Result<Option<Item>, EngineError> {
        match self.items.get(Self::item_key(code))? {
            Some(bytes) => Self::decode_item(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn list_items(&self) -> Result<Vec<Item>, EngineError> {
        let mut out = Vec::new();
        for entry in self.items.iter() {
            let (_, bytes) = entry?;
            out.push(Self::decode_item(&bytes)?);
        }
        Ok(out)
    }

    fn insert_item(&self, item: &Item) -> Result<(), EngineError> {
        let bytes = Self::serialize(item)?;
        let key = Self::item_key(item.code);
        let result = (&self.items, &self.item_names).transaction(|(items, names)| {
            if items.get(key)?.is_some() {
                return abort(EngineError::conflict(format!(
                    "item code {} already exists",
                    item.code
                )));
            }
            if names.get(item.name.as_bytes())?.is_some() {
                return abort(EngineError::conflict(format!(
                    "item name '{}' already exists",
                    item.name
                )));
            }
            names.insert(item.name.as_bytes(), key.to_vec())?;
            items.insert(key.to_vec(), bytes.clone())?;
            Ok(())
        });
        finish(result)?;
        self.flush()
    }

    fn replace_item(&self, item: &Item) -> Result<(), EngineError> {
        let bytes = Self::serialize(item)?;
        let key = Self::item_key(item.code);
        let result = (&self.items, &self.item_names).transaction(|(items, names)| {
            let Some(existing) = items.get(key)? else {
                return abort(EngineError::not_found(format!("item {}", item.code)));
            };
            let existing = match Self::decode_item(&existing) {
                Ok(existing) => existing,
                Err(err) => return abort(err),
            };
            if existing.name != item.name {
                if names.get(item.name.as_bytes())?.is_some() {
                    return abort(EngineError::conflict(format!(
                        "item name '{}' already exists",
                        item.name
                    )));
                }
                names.remove(existing.name.as_bytes())?;
                names.insert(item.name.as_bytes(), key.to_vec())?;
            }
            items.insert(key.to_vec(), bytes.clone())?;
            Ok(())
        });
        finish(result)?;
        self.flush()
    }
}

impl AccountStore for SledStore {
    fn insert_account(&self, account: NewAccount) -> Result<Account, EngineError> {
        let id = AccountId(self.db.generate_id()? + 1);
        let account = account.into_account(id);
        let bytes = Self::serialize(&account)?;
        let key = Self::account_key(id);
        let result = (&self.accounts, &self.account_user_ids).transaction(|(accounts, users)| {
            if users.get(account.user_id.as_bytes())?.is_some() {
                return abort(EngineError::conflict(format!(
                    "user id '{}' already exists",
                    account.user_id
                )));
            }
            users.insert(account.user_id.as_bytes(), key.to_vec())?;
            accounts.insert(key.to_vec(), bytes.clone())?;
            Ok(())
        });
        finish(result)?;
        self.flush()?;
        Ok(account)
    }

    fn account(&self, id: AccountId) -> Result<Option<Account>, EngineError> {
        match self.accounts.get(Self::account_key(id))? {
            Some(bytes) => Self::deserialize(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn account_by_user_id(&self, user_id: &str) -> Result<Option<Account>, EngineError> {
        match self.account_user_ids.get(user_id.as_bytes())? {
            Some(raw) => self.account(Self::decode_account_id(&raw)?),
            None => Ok(None),
        }
    }

    fn put_session(&self, session: &Session) -> Result<(), EngineError> {
        let bytes = Self::serialize(session)?;
        self.sessions.insert(session.token.as_bytes(), bytes)?;
        self.flush()
    }

    fn session(&self, token: &str) -> Result<Option<Session>, EngineError> {
        match self.sessions.get(token.as_bytes())? {
            Some(bytes) => Self::deserialize(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn remove_session(&self, token: &str) -> Result<(), EngineError> {
        self.sessions.remove(token.as_bytes())?;
        self.flush()
    }
}
