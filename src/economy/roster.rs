//! Character lifecycle and read views on top of the coordinator.

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;

use crate::auth::validation::validate_display_name;
use crate::economy::coordinator::Coordinator;
use crate::economy::locks::LockKey;
use crate::economy::types::{
    AccountContext, AccountId, Character, CharacterId, Item, ItemCode, Money, Slot,
};
use crate::errors::{EngineError, StoreError};
use crate::logutil::escape_log;
use crate::store::EconomyStore;

/// Roster entry: identity only, no money or stats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CharacterSummary {
    pub id: CharacterId,
    pub account_id: AccountId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CharacterDetail {
    pub id: CharacterId,
    pub account_id: AccountId,
    pub name: String,
    pub health: i64,
    pub power: i64,
    /// Present only when the viewer owns the character.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub money: Option<Money>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryLine {
    pub item_code: ItemCode,
    pub item_name: String,
    pub item_slot: Option<Slot>,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EquipmentLine {
    pub slot: Slot,
    pub item_code: ItemCode,
    pub item_name: String,
}

impl From<&Character> for CharacterSummary {
    fn from(c: &Character) -> Self {
        Self {
            id: c.id.clone(),
            account_id: c.account_id,
            name: c.name.clone(),
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

impl<S: EconomyStore> Coordinator<S> {
    /// Create a character with the configured starting stats and no money.
    pub fn create_character(
        &self,
        ctx: &AccountContext,
        name: &str,
    ) -> Result<CharacterSummary, EngineError> {
        let name = validate_display_name(name)?;
        let _guard = self.locks.acquire(LockKey::Account(ctx.account_id))?;

        let issued = self
            .store
            .characters_for(ctx.account_id)?
            .iter()
            .filter_map(|c| c.id.sequence())
            .max()
            .unwrap_or(0);
        let id = CharacterId::for_account(ctx.account_id, issued + 1);
        let character = Character::new(
            id,
            ctx.account_id,
            &name,
            self.starting.health,
            self.starting.power,
        );
        self.store.insert_character(&character)?;
        info!(
            "account {} created character {} '{}'",
            ctx.account_id,
            character.id,
            escape_log(&character.name)
        );
        Ok(CharacterSummary::from(&character))
    }

    /// The account's characters, newest first.
    pub fn list_characters(
        &self,
        ctx: &AccountContext,
    ) -> Result<Vec<CharacterSummary>, EngineError> {
        let mut characters = self.store.characters_for(ctx.account_id)?;
        characters.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.sequence().cmp(&a.id.sequence()))
        });
        Ok(characters.iter().map(CharacterSummary::from).collect())
    }

    pub fn character_detail(
        &self,
        viewer: Option<&AccountContext>,
        id: &CharacterId,
    ) -> Result<CharacterDetail, EngineError> {
        let c = self
            .store
            .character(id)?
            .ok_or_else(|| EngineError::not_found(format!("character {}", id)))?;
        let owned = viewer.is_some_and(|v| v.account_id == c.account_id);
        Ok(CharacterDetail {
            id: c.id,
            account_id: c.account_id,
            name: c.name,
            health: c.health,
            power: c.power,
            money: owned.then_some(c.money),
            created_at: c.created_at,
            updated_at: c.updated_at,
        })
    }

    /// Delete a character with its inventory and equipment.
    pub fn delete_character(&self, ctx: &AccountContext, id: &CharacterId) -> Result<(), EngineError> {
        let _guard = self.lock_character(id)?;
        let Some(character) = self.store.character(id)? else {
            return Err(EngineError::not_found(format!("character {}", id)));
        };
        if character.account_id != ctx.account_id {
            warn!(
                target: "security",
                "delete denied: account {} does not own character {}",
                ctx.account_id, id
            );
            return Err(EngineError::forbidden(format!(
                "character {} belongs to another account",
                id
            )));
        }
        if !self.store.remove_character(id)? {
            return Err(EngineError::not_found(format!("character {}", id)));
        }
        info!("account {} deleted character {}", ctx.account_id, id);
        Ok(())
    }

    /// Un-equipped holdings sorted by item code.
    pub fn inventory(
        &self,
        ctx: &AccountContext,
        id: &CharacterId,
    ) -> Result<Vec<InventoryLine>, EngineError> {
        self.owned(ctx, id)?;
        let mut entries = self.store.inventory_entries(id)?;
        entries.sort_by_key(|e| e.item_code);
        entries
            .into_iter()
            .map(|e| {
                let item = self.catalog_item(e.item_code)?;
                Ok(InventoryLine {
                    item_code: e.item_code,
                    item_name: item.name,
                    item_slot: item.slot,
                    count: e.count,
                })
            })
            .collect()
    }

    /// Equipped items in slot order.
    pub fn equipment(
        &self,
        ctx: &AccountContext,
        id: &CharacterId,
    ) -> Result<Vec<EquipmentLine>, EngineError> {
        self.owned(ctx, id)?;
        self.store
            .equipped_items(id)?
            .into_iter()
            .map(|e| {
                let item = self.catalog_item(e.item_code)?;
                Ok(EquipmentLine {
                    slot: e.slot,
                    item_code: e.item_code,
                    item_name: item.name,
                })
            })
            .collect()
    }

    fn owned(&self, ctx: &AccountContext, id: &CharacterId) -> Result<Character, EngineError> {
        match self.store.character(id)? {
            Some(c) if c.account_id == ctx.account_id => Ok(c),
            _ => {
                warn!(
                    target: "security",
                    "read denied: account {} does not own character {}",
                    ctx.account_id, id
                );
                Err(EngineError::forbidden(format!(
                    "character {} not found for account {}",
                    id, ctx.account_id
                )))
            }
        }
    }

    fn catalog_item(&self, code: ItemCode) -> Result<Item, EngineError> {
        self.store.get_item(code)?.ok_or_else(|| {
            StoreError::Invariant(format!("held item {} missing from catalog", code)).into()
        })
    }
}
