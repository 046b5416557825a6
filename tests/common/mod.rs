//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use armory::economy::{
    AccountContext, AccountId, CharacterId, Coordinator, Dice, FixedDice, Item, ItemCode, Money,
    Slot,
};
use armory::errors::EngineError;
use armory::store::{EconomyStore, ItemCatalog, MemoryStore, Table, TransactionScript, Tx};

/// Plain item, price 10.
pub const STICK: ItemCode = 1;
/// Weapon, power +10, price 40.
pub const SWORD_A: ItemCode = 2;
/// Weapon, power +5, price 25.
pub const SWORD_B: ItemCode = 3;
/// Top, health +20 and power -2, price 15.
pub const TUNIC: ItemCode = 4;
/// Plain item, price 50.
pub const BREAD: ItemCode = 5;

pub fn ctx(account: u64) -> AccountContext {
    AccountContext {
        account_id: AccountId(account),
        user_id: format!("user{}", account),
    }
}

pub fn catalog_items() -> Vec<Item> {
    vec![
        Item::new(STICK, "Stick", 10),
        Item::new(SWORD_A, "Sword A", 40)
            .with_slot(Slot::Weapon)
            .with_stats(0, 10),
        Item::new(SWORD_B, "Sword B", 25)
            .with_slot(Slot::Weapon)
            .with_stats(0, 5),
        Item::new(TUNIC, "Tunic", 15)
            .with_slot(Slot::Top)
            .with_stats(20, -2),
        Item::new(BREAD, "Bread", 50),
    ]
}

pub fn stock_catalog<S: ItemCatalog>(store: &S) {
    for item in catalog_items() {
        store.insert_item(&item).expect("insert item");
    }
}

/// Memory-backed coordinator with the test catalog and one character for account 1.
pub fn memory_world() -> (Coordinator<MemoryStore>, CharacterId) {
    world_with_dice(Arc::new(FixedDice::new(0.5)), 0.5)
}

pub fn world_with_dice(dice: Arc<dyn Dice>, p: f64) -> (Coordinator<MemoryStore>, CharacterId) {
    let store = Arc::new(MemoryStore::new());
    stock_catalog(store.as_ref());
    let coordinator = Coordinator::new(store)
        .with_dice(dice)
        .with_win_probability(p)
        .expect("probability");
    let hero = coordinator
        .create_character(&ctx(1), "Ayla")
        .expect("create character");
    (coordinator, hero.id)
}

/// Test-only unit of work that overwrites money and hands out items.
pub struct Grant {
    pub id: CharacterId,
    pub money: Option<Money>,
    pub items: Vec<(ItemCode, u32)>,
}

impl TransactionScript for Grant {
    type Output = ();
    const NAME: &'static str = "grant";
    const READS: &'static [Table] = &[];
    const WRITES: &'static [Table] = &[Table::Characters, Table::Inventory];

    fn run(&self, tx: &mut dyn Tx) -> Result<(), EngineError> {
        if let Some(money) = self.money {
            tx.set_money(&self.id, money)?;
        }
        for &(code, n) in &self.items {
            let held = tx.inventory_count(&self.id, code)?.unwrap_or(0);
            tx.put_inventory_count(&self.id, code, held + n)?;
        }
        Ok(())
    }
}

pub fn set_money<S: EconomyStore>(store: &S, id: &CharacterId, money: Money) {
    store
        .execute(&Grant {
            id: id.clone(),
            money: Some(money),
            items: Vec::new(),
        })
        .expect("grant money");
}

pub fn give<S: EconomyStore>(store: &S, id: &CharacterId, code: ItemCode, n: u32) {
    store
        .execute(&Grant {
            id: id.clone(),
            money: None,
            items: vec![(code, n)],
        })
        .expect("grant items");
}

/// Inventory count for `code` (0 when absent).
pub fn held<S: EconomyStore>(store: &S, id: &CharacterId, code: ItemCode) -> u32 {
    store
        .inventory_entries(id)
        .expect("inventory")
        .into_iter()
        .find(|e| e.item_code == code)
        .map(|e| e.count)
        .unwrap_or(0)
}

pub fn occupant<S: EconomyStore>(store: &S, id: &CharacterId, slot: Slot) -> Option<ItemCode> {
    store
        .equipped_items(id)
        .expect("equipment")
        .into_iter()
        .find(|e| e.slot == slot)
        .map(|e| e.item_code)
}

pub fn money<S: EconomyStore>(store: &S, id: &CharacterId) -> Money {
    store.character(id).expect("read").expect("character").money
}

pub fn stats<S: EconomyStore>(store: &S, id: &CharacterId) -> (i64, i64) {
    let c = store.character(id).expect("read").expect("character");
    (c.health, c.power)
}
