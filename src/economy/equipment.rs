//! Equipment slot manager.
//!
//! Moves one item at a time between the inventory ledger and a slot, keeping
//! live stats equal to baseline plus the deltas of everything equipped. Each
//! slot records the delta it applied, and that record is what gets reversed.

use log::debug;

use crate::economy::ledger;
use crate::economy::stats::StatAccumulator;
use crate::economy::types::{Character, ItemCode, Occupant, Slot, StatView};
use crate::errors::EngineError;
use crate::store::Tx;

/// Equip `code` from the character's inventory, swapping out any different
/// occupant of its slot.
pub fn equip(
    tx: &mut dyn Tx,
    character: &Character,
    code: ItemCode,
) -> Result<StatView, EngineError> {
    let item = tx
        .item(code)?
        .ok_or_else(|| EngineError::not_found(format!("item {}", code)))?;
    let Some(slot) = item.slot else {
        return Err(EngineError::invalid(format!(
            "item {} ({}) cannot be equipped",
            code, item.name
        )));
    };
    if tx.inventory_count(&character.id, code)?.is_none() {
        return Err(EngineError::not_found(format!(
            "item {} not in inventory",
            code
        )));
    }

    let mut stats = StatAccumulator::from_snapshot(character);
    match tx.occupant(&character.id, slot)? {
        Some(current) if current.item_code == code => {
            return Err(EngineError::conflict(format!(
                "item {} is already equipped in {}",
                code, slot
            )));
        }
        Some(current) => {
            ledger::add(tx, &character.id, current.item_code, 1)?;
            stats.reverse(current.stats)?;
            tx.clear_occupant(&character.id, slot)?;
            debug!(
                "{}: {} returns {} to inventory",
                character.id, slot, current.item_code
            );
        }
        None => {}
    }

    tx.put_occupant(
        &character.id,
        slot,
        Occupant {
            item_code: code,
            stats: item.stats,
        },
    )?;
    ledger::remove(tx, &character.id, code, 1)?;
    stats.apply(&item)?;
    stats.commit(tx)
}

/// Return the occupant of `slot` to the inventory.
pub fn unequip(
    tx: &mut dyn Tx,
    character: &Character,
    slot: Slot,
) -> Result<StatView, EngineError> {
    let Some(current) = tx.occupant(&character.id, slot)? else {
        return Err(EngineError::not_found(format!("nothing equipped in {}", slot)));
    };

    let mut stats = StatAccumulator::from_snapshot(character);
    stats.reverse(current.stats)?;
    tx.clear_occupant(&character.id, slot)?;
    ledger::add(tx, &character.id, current.item_code, 1)?;
    stats.commit(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economy::testing::{give, hero, probe, seeded_store, HERO};
    use crate::economy::types::{CharacterId, Item, StatDelta};
    use crate::errors::ErrorKind;
    use crate::store::{EconomyStore, ItemCatalog};

    const SWORD: ItemCode = 10;
    const POTION: ItemCode = 20;

    fn store_with_gear() -> crate::store::MemoryStore {
        let store = seeded_store();
        store
            .insert_item(&Item::new(SWORD, "Sword", 30).with_slot(Slot::Weapon).with_stats(0, 10))
            .unwrap();
        store.insert_item(&Item::new(POTION, "Potion", 5)).unwrap();
        store
    }

    #[test]
    fn equip_moves_item_out_of_inventory() {
        let store = store_with_gear();
        give(&store, SWORD, 1);
        let character = hero(&store);
        let view = probe(&store, |tx| equip(tx, &character, SWORD)).unwrap();
        assert_eq!(view.power, 110);

        let id = CharacterId::from(HERO);
        assert!(store.inventory_entries(&id).unwrap().is_empty());
        let equipped = &store.equipped_items(&id).unwrap()[0];
        assert_eq!(equipped.item_code, SWORD);
        assert_eq!(equipped.stats, StatDelta::new(0, 10));
    }

    #[test]
    fn unequip_reverses_the_recorded_delta() {
        let store = store_with_gear();
        give(&store, SWORD, 1);
        let character = hero(&store);
        probe(&store, |tx| equip(tx, &character, SWORD)).unwrap();

        let mut sword = store.get_item(SWORD).unwrap().unwrap();
        sword.stats = StatDelta::new(0, 50);
        store.replace_item(&sword).unwrap();

        let character = hero(&store);
        let view = probe(&store, |tx| unequip(tx, &character, Slot::Weapon)).unwrap();
        assert_eq!((view.health, view.power), (500, 100));
    }

    #[test]
    fn irreversible_delta_cannot_be_equipped() {
        let store = store_with_gear();
        store
            .insert_item(&Item::new(30, "Curse", 1).with_slot(Slot::Top).with_stats(i64::MIN, 0))
            .unwrap();
        give(&store, 30, 1);
        let character = hero(&store);
        let err = probe(&store, |tx| equip(tx, &character, 30)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(hero(&store).health, 500);
        assert!(store.equipped_items(&character.id).unwrap().is_empty());
    }
}
