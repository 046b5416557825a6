use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::EngineError;

pub const CHARACTER_SCHEMA_VERSION: u8 = 1;
pub const ITEM_SCHEMA_VERSION: u8 = 1;

/// Fixed credit granted by `earn`.
pub const EARN_AMOUNT: Money = 100;
/// Shops buy back at this percentage of catalog price, floored per unit.
pub const SELL_RATIO_PERCENT: Money = 60;

pub const DEFAULT_STARTING_HEALTH: i64 = 500;
pub const DEFAULT_STARTING_POWER: i64 = 100;

/// Catalog item code.
pub type ItemCode = u32;
/// Non-negative money balance in whole units.
pub type Money = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Character ids are `"{account_id}-{sequence}"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CharacterId(String);

impl CharacterId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn for_account(account: AccountId, sequence: u32) -> Self {
        Self(format!("{}-{}", account.0, sequence))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Sequence number after the dash, if the id is well formed.
    pub fn sequence(&self) -> Option<u32> {
        self.0.rsplit_once('-')?.1.parse().ok()
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CharacterId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// The acting principal, as vouched for by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountContext {
    pub account_id: AccountId,
    pub user_id: String,
}

/// Closed set of equip locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Weapon,
    Top,
    Bottom,
    Shoes,
    Accessory,
}

impl Slot {
    pub const ALL: [Slot; 5] = [
        Slot::Weapon,
        Slot::Top,
        Slot::Bottom,
        Slot::Shoes,
        Slot::Accessory,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Slot::Weapon => "weapon",
            Slot::Top => "top",
            Slot::Bottom => "bottom",
            Slot::Shoes => "shoes",
            Slot::Accessory => "accessory",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Slot {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Slot::ALL
            .into_iter()
            .find(|slot| slot.as_str() == wanted)
            .ok_or_else(|| {
                EngineError::invalid(format!(
                    "unknown slot '{}' (expected one of: weapon, top, bottom, shoes, accessory)",
                    s.trim()
                ))
            })
    }
}

/// Health/power adjustment an item contributes while equipped. Absent fields are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatDelta {
    #[serde(default)]
    pub health: i64,
    #[serde(default)]
    pub power: i64,
}

impl StatDelta {
    pub const ZERO: StatDelta = StatDelta {
        health: 0,
        power: 0,
    };

    pub fn new(health: i64, power: i64) -> Self {
        Self { health, power }
    }

    pub fn is_zero(&self) -> bool {
        self.health == 0 && self.power == 0
    }

    /// Component-wise sum, `None` on overflow.
    pub fn checked_add(self, rhs: StatDelta) -> Option<StatDelta> {
        Some(StatDelta {
            health: self.health.checked_add(rhs.health)?,
            power: self.power.checked_add(rhs.power)?,
        })
    }

    /// The delta that undoes `self`, `None` when a component is `i64::MIN`.
    pub fn checked_neg(self) -> Option<StatDelta> {
        Some(StatDelta {
            health: self.health.checked_neg()?,
            power: self.power.checked_neg()?,
        })
    }
}

/// Catalog entry. Read-only to the economy engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub code: ItemCode,
    pub name: String,
    pub slot: Option<Slot>,
    pub stats: StatDelta,
    pub price: Money,
    pub schema_version: u8,
}

impl Item {
    pub fn new(code: ItemCode, name: &str, price: Money) -> Self {
        Self {
            code,
            name: name.to_string(),
            slot: None,
            stats: StatDelta::ZERO,
            price,
            schema_version: ITEM_SCHEMA_VERSION,
        }
    }

    pub fn with_slot(mut self, slot: Slot) -> Self {
        self.slot = Some(slot);
        self
    }

    pub fn with_stats(mut self, health: i64, power: i64) -> Self {
        self.stats = StatDelta::new(health, power);
        self
    }

    /// Per-unit buy-back price.
    pub fn sell_price(&self) -> Money {
        // floor(price * 60 / 100) without the intermediate product
        self.price / 100 * SELL_RATIO_PERCENT + self.price % 100 * SELL_RATIO_PERCENT / 100
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub account_id: AccountId,
    pub name: String,
    pub health: i64,
    pub power: i64,
    pub money: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl Character {
    pub fn new(id: CharacterId, account_id: AccountId, name: &str, health: i64, power: i64) -> Self {
        let now = Utc::now();
        Self {
            id,
            account_id,
            name: name.to_string(),
            health,
            power,
            money: 0,
            created_at: now,
            updated_at: now,
            schema_version: CHARACTER_SCHEMA_VERSION,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Add `delta` to live stats. On overflow nothing changes.
    pub fn adjust(&mut self, delta: StatDelta) -> Result<(), EngineError> {
        let (Some(health), Some(power)) = (
            self.health.checked_add(delta.health),
            self.power.checked_add(delta.power),
        ) else {
            return Err(EngineError::invalid("stat adjustment out of range"));
        };
        self.health = health;
        self.power = power;
        Ok(())
    }

    pub fn stat_view(&self) -> StatView {
        StatView {
            name: self.name.clone(),
            health: self.health,
            power: self.power,
        }
    }

    pub fn wallet_view(&self) -> WalletView {
        WalletView {
            name: self.name.clone(),
            money: self.money,
        }
    }
}

/// Un-equipped stackable holding. `count` is always > 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub character_id: CharacterId,
    pub item_code: ItemCode,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquippedItem {
    pub character_id: CharacterId,
    pub slot: Slot,
    pub item_code: ItemCode,
    /// Delta applied when the item went into the slot.
    pub stats: StatDelta,
}

/// Slot contents as stored. Unequipping reverses `stats`, not the item's
/// current catalog deltas, so later catalog edits cannot skew live stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupant {
    pub item_code: ItemCode,
    pub stats: StatDelta,
}

/// Filtered stat view returned by equip/unequip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatView {
    pub name: String,
    pub health: i64,
    pub power: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletView {
    pub name: String,
    pub money: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyReceipt {
    pub message: String,
    pub item_code: ItemCode,
    pub count: u32,
    pub total_price: Money,
    pub money: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellReceipt {
    pub item_code: ItemCode,
    pub count: u32,
    pub proceeds: Money,
    pub money: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GambleOutcome {
    Win,
    Loss,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GambleResult {
    pub name: String,
    pub money: Money,
    pub bet: Money,
    pub outcome: GambleOutcome,
}
