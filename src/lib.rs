//! # Armory - character economy and equipment transactions
//!
//! Armory is the backend for a persistent-character game economy. Accounts own
//! characters; characters hold money, health and power, an inventory of
//! stackable items and at most one equipped item per body slot.
//!
//! Every economic action (equip, unequip, buy, sell, earn, gamble) touches
//! several records at once. Armory runs each action as one named, all-or-nothing
//! unit of work and serializes actions on the same character, so no observer
//! ever sees a half-applied change.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use armory::economy::{AccountContext, AccountId, Coordinator};
//! use armory::store::SledStore;
//!
//! fn main() -> Result<(), armory::errors::EngineError> {
//!     let store = Arc::new(SledStore::open("./data/armory")?);
//!     let coordinator = Coordinator::new(store);
//!     let ctx = AccountContext { account_id: AccountId(1), user_id: "ayla".into() };
//!     let hero = coordinator.create_character(&ctx, "Ayla")?;
//!     let wallet = coordinator.earn(&ctx, &hero.id)?;
//!     println!("{} has {}", wallet.name, wallet.money);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`economy`] - the transaction engine: ledger, equipment, stats, wallet,
//!   gambling, units of work, per-character locks and the [`economy::Coordinator`]
//! - [`store`] - store interface plus in-memory and sled backends
//! - [`auth`] - accounts, password hashing and session tokens
//! - [`catalog`] - item catalog authoring and seeding
//! - [`config`] - TOML configuration
//! - [`errors`] - error taxonomy
//! - [`logutil`] - log line sanitizing

pub mod auth;
pub mod catalog;
pub mod config;
pub mod economy;
pub mod errors;
pub mod logutil;
pub mod store;
