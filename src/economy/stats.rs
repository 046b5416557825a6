//! Stat accumulator: keeps live health/power in lock-step with slot changes.
//!
//! All arithmetic starts from the character snapshot read when the unit of work
//! opened. Applied and reversed deltas are summed into one net delta that is
//! written with a single `adjust_stats` command, so the row is never re-read
//! mid-transaction.

use crate::economy::types::{Character, CharacterId, Item, StatDelta, StatView};
use crate::errors::EngineError;
use crate::store::Tx;

#[derive(Debug)]
pub struct StatAccumulator {
    id: CharacterId,
    snapshot: StatView,
    net: StatDelta,
}

impl StatAccumulator {
    pub fn from_snapshot(character: &Character) -> Self {
        Self {
            id: character.id.clone(),
            snapshot: character.stat_view(),
            net: StatDelta::ZERO,
        }
    }

    /// Add `item`'s deltas (item moved into a slot).
    pub fn apply(&mut self, item: &Item) -> Result<(), EngineError> {
        // whatever goes on must be able to come off again
        if item.stats.checked_neg().is_none() {
            return Err(EngineError::invalid(format!(
                "item {} has an irreversible stat delta",
                item.code
            )));
        }
        self.accumulate(item.stats)
    }

    /// Subtract the delta recorded when an item entered its slot.
    pub fn reverse(&mut self, applied: StatDelta) -> Result<(), EngineError> {
        let undo = applied
            .checked_neg()
            .ok_or_else(|| EngineError::invalid("stat adjustment out of range"))?;
        self.accumulate(undo)
    }

    pub fn net(&self) -> StatDelta {
        self.net
    }

    fn accumulate(&mut self, delta: StatDelta) -> Result<(), EngineError> {
        self.net = self
            .net
            .checked_add(delta)
            .ok_or_else(|| EngineError::invalid("stat adjustment out of range"))?;
        Ok(())
    }

    /// Write the net delta and return the resulting stat view.
    pub fn commit(self, tx: &mut dyn Tx) -> Result<StatView, EngineError> {
        let health = self.snapshot.health.checked_add(self.net.health);
        let power = self.snapshot.power.checked_add(self.net.power);
        let (Some(health), Some(power)) = (health, power) else {
            return Err(EngineError::invalid("stat adjustment out of range"));
        };
        if !self.net.is_zero() {
            tx.adjust_stats(&self.id, self.net)?;
        }
        Ok(StatView {
            name: self.snapshot.name,
            health,
            power,
        })
    }
}
