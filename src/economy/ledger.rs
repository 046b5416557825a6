//! Inventory ledger: `(character, item) -> count` for un-equipped holdings.
//!
//! Counts are always positive. An entry that would reach zero is deleted.

use crate::economy::types::{CharacterId, ItemCode};
use crate::errors::EngineError;
use crate::store::Tx;

/// Units of `code` currently held in hand (0 when there is no entry).
pub fn held(tx: &mut dyn Tx, id: &CharacterId, code: ItemCode) -> Result<u32, EngineError> {
    Ok(tx.inventory_count(id, code)?.unwrap_or(0))
}

/// Increment-or-create. Returns the new count.
pub fn add(tx: &mut dyn Tx, id: &CharacterId, code: ItemCode, n: u32) -> Result<u32, EngineError> {
    if n == 0 {
        return Err(EngineError::invalid("cannot add zero items"));
    }
    let current = held(tx, id, code)?;
    let updated = current
        .checked_add(n)
        .ok_or_else(|| EngineError::invalid(format!("too many units of item {}", code)))?;
    tx.put_inventory_count(id, code, updated)?;
    Ok(updated)
}

/// Decrement, deleting the entry at zero. Returns the remaining count.
///
/// NotFound if the character holds none of `code`, InsufficientInventory if
/// it holds fewer than `n`.
pub fn remove(
    tx: &mut dyn Tx,
    id: &CharacterId,
    code: ItemCode,
    n: u32,
) -> Result<u32, EngineError> {
    if n == 0 {
        return Err(EngineError::invalid("cannot remove zero items"));
    }
    let Some(current) = tx.inventory_count(id, code)? else {
        return Err(EngineError::not_found(format!("item {} not in inventory", code)));
    };
    if current < n {
        return Err(EngineError::InsufficientInventory {
            item_code: code,
            requested: n,
            held: current,
        });
    }
    let remaining = current - n;
    if remaining == 0 {
        tx.delete_inventory(id, code)?;
    } else {
        tx.put_inventory_count(id, code, remaining)?;
    }
    Ok(remaining)
}
