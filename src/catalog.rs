//! Item catalog authoring: create, update, list and seed items.
//!
//! The economy engine only ever reads the catalog. Items are added here (or
//! from a JSON seed file such as `data/seeds/items.json`) and never deleted.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::auth::validation::validate_display_name;
use crate::economy::types::{Item, ItemCode, Money, Slot, StatDelta};
use crate::errors::{EngineError, ErrorKind};
use crate::logutil::escape_log;
use crate::store::ItemCatalog;

/// Largest magnitude accepted for either stat delta.
pub const STAT_DELTA_LIMIT: i64 = 1_000_000_000;

/// Item creation request, also the seed file record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub code: ItemCode,
    pub name: String,
    #[serde(default)]
    pub slot: Option<Slot>,
    #[serde(default)]
    pub stats: StatDelta,
    pub price: Money,
}

/// Editable item fields. Price and slot are fixed once created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub stats: Option<StatDelta>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemSummary {
    pub code: ItemCode,
    pub name: String,
    pub price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemDetail {
    pub code: ItemCode,
    pub name: String,
    pub slot: Option<Slot>,
    pub stats: StatDelta,
    pub price: Money,
}

impl From<Item> for ItemDetail {
    fn from(item: Item) -> Self {
        Self {
            code: item.code,
            name: item.name,
            slot: item.slot,
            stats: item.stats,
            price: item.price,
        }
    }
}

/// Counts from a seed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub created: usize,
    pub skipped: usize,
}

pub struct Catalog<S> {
    store: Arc<S>,
}

impl<S: ItemCatalog> Catalog<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn create_item(&self, request: NewItem) -> Result<ItemDetail, EngineError> {
        let name = validate_display_name(&request.name)?;
        check_stats(request.stats)?;
        let mut item = Item::new(request.code, &name, request.price);
        item.slot = request.slot;
        item.stats = request.stats;
        self.store.insert_item(&item)?;
        info!("item {} '{}' added to catalog", item.code, escape_log(&item.name));
        Ok(item.into())
    }

    pub fn update_item(&self, code: ItemCode, patch: ItemPatch) -> Result<ItemDetail, EngineError> {
        if patch.name.is_none() && patch.stats.is_none() {
            return Err(EngineError::invalid("nothing to update: give a name or stats"));
        }
        let mut item = self
            .store
            .get_item(code)?
            .ok_or_else(|| EngineError::not_found(format!("item {}", code)))?;
        if let Some(name) = patch.name {
            item.name = validate_display_name(&name)?;
        }
        if let Some(stats) = patch.stats {
            check_stats(stats)?;
            item.stats = stats;
        }
        self.store.replace_item(&item)?;
        info!("item {} updated", code);
        Ok(item.into())
    }

    /// All items sorted by code.
    pub fn list_items(&self) -> Result<Vec<ItemSummary>, EngineError> {
        let mut items = self.store.list_items()?;
        items.sort_by_key(|i| i.code);
        Ok(items
            .into_iter()
            .map(|i| ItemSummary {
                code: i.code,
                name: i.name,
                price: i.price,
            })
            .collect())
    }

    pub fn item_detail(&self, code: ItemCode) -> Result<ItemDetail, EngineError> {
        self.store
            .get_item(code)?
            .map(ItemDetail::from)
            .ok_or_else(|| EngineError::not_found(format!("item {}", code)))
    }

    /// Create every seed item, skipping those whose code or name already exists.
    pub fn seed(&self, items: Vec<NewItem>) -> Result<SeedReport, EngineError> {
        let mut report = SeedReport::default();
        for item in items {
            let code = item.code;
            match self.create_item(item) {
                Ok(_) => report.created += 1,
                Err(e) if e.kind() == ErrorKind::Conflict => {
                    debug!("seed item {} skipped: {}", code, e);
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }
}

fn check_stats(stats: StatDelta) -> Result<(), EngineError> {
    let in_range = |v: i64| (-STAT_DELTA_LIMIT..=STAT_DELTA_LIMIT).contains(&v);
    if in_range(stats.health) && in_range(stats.power) {
        Ok(())
    } else {
        Err(EngineError::invalid(format!(
            "stat deltas must lie within +/-{}",
            STAT_DELTA_LIMIT
        )))
    }
}

/// Load seed items from a JSON array of [`NewItem`].
pub fn load_items_from_json<P: AsRef<Path>>(path: P) -> Result<Vec<NewItem>, EngineError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| EngineError::invalid(format!("failed to parse {}: {}", path.display(), e)))
}
