//! Named units of work, one per economic action.
//!
//! Every script starts by re-reading the character by id *and* owning account.
//! A miss on either is Forbidden, whether or not the character exists for
//! somebody else.

use std::sync::OnceLock;

use crate::economy::gambling::{self, Dice, WinProbability};
use crate::economy::types::{
    AccountId, BuyReceipt, Character, CharacterId, GambleResult, ItemCode, Money, SellReceipt,
    Slot, StatView, WalletView, EARN_AMOUNT,
};
use crate::economy::wallet::Wallet;
use crate::economy::{equipment, ledger};
use crate::errors::EngineError;
use crate::store::{Table, TransactionScript, Tx};

/// Target of a script: which character, acting as which account.
#[derive(Debug, Clone)]
pub struct Target {
    pub account: AccountId,
    pub character: CharacterId,
}

impl Target {
    pub fn new(account: AccountId, character: CharacterId) -> Self {
        Self { account, character }
    }

    fn resolve(&self, tx: &mut dyn Tx) -> Result<Character, EngineError> {
        match tx.character(&self.character)? {
            Some(c) if c.account_id == self.account => Ok(c),
            _ => Err(EngineError::forbidden(format!(
                "character {} not found for account {}",
                self.character, self.account
            ))),
        }
    }
}

pub struct EquipScript {
    pub target: Target,
    pub item: ItemCode,
}

impl TransactionScript for EquipScript {
    type Output = StatView;
    const NAME: &'static str = "equip";
    const READS: &'static [Table] = &[Table::Items];
    const WRITES: &'static [Table] = &[Table::Characters, Table::Inventory, Table::Equipment];

    fn run(&self, tx: &mut dyn Tx) -> Result<StatView, EngineError> {
        let character = self.target.resolve(tx)?;
        equipment::equip(tx, &character, self.item)
    }
}

pub struct UnequipScript {
    pub target: Target,
    pub slot: Slot,
}

impl TransactionScript for UnequipScript {
    type Output = StatView;
    const NAME: &'static str = "unequip";
    const READS: &'static [Table] = &[Table::Items];
    const WRITES: &'static [Table] = &[Table::Characters, Table::Inventory, Table::Equipment];

    fn run(&self, tx: &mut dyn Tx) -> Result<StatView, EngineError> {
        let character = self.target.resolve(tx)?;
        equipment::unequip(tx, &character, self.slot)
    }
}

pub struct BuyScript {
    pub target: Target,
    pub item: ItemCode,
    pub count: u32,
}

impl TransactionScript for BuyScript {
    type Output = BuyReceipt;
    const NAME: &'static str = "buy";
    const READS: &'static [Table] = &[Table::Items];
    const WRITES: &'static [Table] = &[Table::Characters, Table::Inventory];

    fn run(&self, tx: &mut dyn Tx) -> Result<BuyReceipt, EngineError> {
        let character = self.target.resolve(tx)?;
        let item = tx
            .item(self.item)?
            .ok_or_else(|| EngineError::not_found(format!("item {}", self.item)))?;
        let total_price = item
            .price
            .checked_mul(Money::from(self.count))
            .ok_or_else(|| EngineError::invalid("total price out of range"))?;

        let mut wallet = Wallet::open(&character);
        wallet.debit(total_price)?;
        ledger::add(tx, &character.id, item.code, self.count)?;
        let money = wallet.settle(tx)?;

        Ok(BuyReceipt {
            message: format!("bought {} x {}", self.count, item.name),
            item_code: item.code,
            count: self.count,
            total_price,
            money,
        })
    }
}

pub struct SellScript {
    pub target: Target,
    pub item: ItemCode,
    pub count: u32,
}

impl TransactionScript for SellScript {
    type Output = SellReceipt;
    const NAME: &'static str = "sell";
    const READS: &'static [Table] = &[Table::Items];
    const WRITES: &'static [Table] = &[Table::Characters, Table::Inventory];

    fn run(&self, tx: &mut dyn Tx) -> Result<SellReceipt, EngineError> {
        let character = self.target.resolve(tx)?;
        ledger::remove(tx, &character.id, self.item, self.count)?;
        let item = tx
            .item(self.item)?
            .ok_or_else(|| EngineError::not_found(format!("item {}", self.item)))?;
        let proceeds = item
            .sell_price()
            .checked_mul(Money::from(self.count))
            .ok_or_else(|| EngineError::invalid("proceeds out of range"))?;

        let mut wallet = Wallet::open(&character);
        wallet.credit(proceeds)?;
        let money = wallet.settle(tx)?;

        Ok(SellReceipt {
            item_code: item.code,
            count: self.count,
            proceeds,
            money,
        })
    }
}

pub struct EarnScript {
    pub target: Target,
}

impl TransactionScript for EarnScript {
    type Output = WalletView;
    const NAME: &'static str = "earn";
    const READS: &'static [Table] = &[];
    const WRITES: &'static [Table] = &[Table::Characters];

    fn run(&self, tx: &mut dyn Tx) -> Result<WalletView, EngineError> {
        let character = self.target.resolve(tx)?;
        let mut wallet = Wallet::open(&character);
        wallet.credit(EARN_AMOUNT)?;
        let money = wallet.settle(tx)?;
        Ok(WalletView {
            name: character.name,
            money,
        })
    }
}

/// Debit the bet, draw once, pay out on a win.
///
/// The draw is memoized: if the store replays the unit of work, the replay
/// sees the same draw instead of rolling again.
pub struct GambleScript<'a> {
    pub target: Target,
    pub bet: Money,
    pub odds: WinProbability,
    dice: &'a dyn Dice,
    draw: OnceLock<f64>,
}

impl<'a> GambleScript<'a> {
    pub fn new(target: Target, bet: Money, odds: WinProbability, dice: &'a dyn Dice) -> Self {
        Self {
            target,
            bet,
            odds,
            dice,
            draw: OnceLock::new(),
        }
    }

    /// The draw made by the last run, if it got past the debit.
    pub fn draw(&self) -> Option<f64> {
        self.draw.get().copied()
    }
}

impl TransactionScript for GambleScript<'_> {
    type Output = GambleResult;
    const NAME: &'static str = "gamble";
    const READS: &'static [Table] = &[];
    const WRITES: &'static [Table] = &[Table::Characters];

    fn run(&self, tx: &mut dyn Tx) -> Result<GambleResult, EngineError> {
        let character = self.target.resolve(tx)?;
        let mut wallet = Wallet::open(&character);
        wallet.debit(self.bet)?;
        let draw = *self.draw.get_or_init(|| self.dice.roll());
        let outcome = gambling::settle(&mut wallet, self.bet, draw, self.odds)?;
        let money = wallet.settle(tx)?;
        Ok(GambleResult {
            name: character.name,
            money,
            bet: self.bet,
            outcome,
        })
    }
}
