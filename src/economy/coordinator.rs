use std::error::Error as _;
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::config::Config;
use crate::economy::gambling::{Dice, ThreadRngDice, WinProbability};
use crate::economy::locks::{CharacterLocks, LockGuard, LockKey};
use crate::economy::scripts::{
    BuyScript, EarnScript, EquipScript, GambleScript, SellScript, Target, UnequipScript,
};
use crate::economy::types::{
    AccountContext, BuyReceipt, CharacterId, GambleResult, ItemCode, Money, SellReceipt, Slot,
    StatView, WalletView, DEFAULT_STARTING_HEALTH, DEFAULT_STARTING_POWER,
};
use crate::errors::{EngineError, ErrorKind};
use crate::store::{EconomyStore, TransactionScript};

/// Baseline stats for newly created characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartingStats {
    pub health: i64,
    pub power: i64,
}

impl Default for StartingStats {
    fn default() -> Self {
        Self {
            health: DEFAULT_STARTING_HEALTH,
            power: DEFAULT_STARTING_POWER,
        }
    }
}

/// Entry point for every economic action.
///
/// Each call takes the target character's lock, runs one named unit of work
/// against the store and releases the lock once it has committed or aborted.
/// Nothing is retried here: a failed call leaves no trace and the caller may
/// re-issue it.
pub struct Coordinator<S> {
    pub(crate) store: Arc<S>,
    pub(crate) locks: CharacterLocks,
    dice: Arc<dyn Dice>,
    odds: WinProbability,
    pub(crate) starting: StartingStats,
}

impl<S: EconomyStore> Coordinator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            locks: CharacterLocks::new(),
            dice: Arc::new(ThreadRngDice),
            odds: WinProbability::default(),
            starting: StartingStats::default(),
        }
    }

    /// Build from the `[characters]` and `[gambling]` sections.
    pub fn from_config(store: Arc<S>, config: &Config) -> Result<Self, EngineError> {
        Ok(Self::new(store)
            .with_win_probability(config.gambling.win_probability)?
            .with_starting_stats(StartingStats {
                health: config.characters.starting_health,
                power: config.characters.starting_power,
            }))
    }

    pub fn with_dice(mut self, dice: Arc<dyn Dice>) -> Self {
        self.dice = dice;
        self
    }

    pub fn with_win_probability(mut self, p: f64) -> Result<Self, EngineError> {
        self.odds = WinProbability::new(p)?;
        Ok(self)
    }

    pub fn with_starting_stats(mut self, starting: StartingStats) -> Self {
        self.starting = starting;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn win_probability(&self) -> f64 {
        self.odds.value()
    }

    pub fn equip(
        &self,
        ctx: &AccountContext,
        id: &CharacterId,
        item: ItemCode,
    ) -> Result<StatView, EngineError> {
        let target = Target::new(ctx.account_id, id.clone());
        let view = self.run(&target, &EquipScript { target: target.clone(), item })?;
        info!(
            "{} equipped item {} (health {}, power {})",
            id, item, view.health, view.power
        );
        Ok(view)
    }

    pub fn unequip(
        &self,
        ctx: &AccountContext,
        id: &CharacterId,
        slot: Slot,
    ) -> Result<StatView, EngineError> {
        let target = Target::new(ctx.account_id, id.clone());
        let view = self.run(&target, &UnequipScript { target: target.clone(), slot })?;
        info!(
            "{} cleared {} (health {}, power {})",
            id, slot, view.health, view.power
        );
        Ok(view)
    }

    pub fn buy(
        &self,
        ctx: &AccountContext,
        id: &CharacterId,
        item: ItemCode,
        count: u32,
    ) -> Result<BuyReceipt, EngineError> {
        positive(count, "count")?;
        let target = Target::new(ctx.account_id, id.clone());
        let receipt = self.run(
            &target,
            &BuyScript {
                target: target.clone(),
                item,
                count,
            },
        )?;
        info!(
            "{} bought {} x item {} for {} (money {})",
            id, count, item, receipt.total_price, receipt.money
        );
        Ok(receipt)
    }

    pub fn sell(
        &self,
        ctx: &AccountContext,
        id: &CharacterId,
        item: ItemCode,
        count: u32,
    ) -> Result<SellReceipt, EngineError> {
        positive(count, "count")?;
        let target = Target::new(ctx.account_id, id.clone());
        let receipt = self.run(
            &target,
            &SellScript {
                target: target.clone(),
                item,
                count,
            },
        )?;
        info!(
            "{} sold {} x item {} for {} (money {})",
            id, count, item, receipt.proceeds, receipt.money
        );
        Ok(receipt)
    }

    pub fn earn(&self, ctx: &AccountContext, id: &CharacterId) -> Result<WalletView, EngineError> {
        let target = Target::new(ctx.account_id, id.clone());
        let view = self.run(&target, &EarnScript { target: target.clone() })?;
        info!("{} earned (money {})", id, view.money);
        Ok(view)
    }

    pub fn gamble(
        &self,
        ctx: &AccountContext,
        id: &CharacterId,
        bet: Money,
    ) -> Result<GambleResult, EngineError> {
        positive(bet, "bet")?;
        let target = Target::new(ctx.account_id, id.clone());
        let script = GambleScript::new(target.clone(), bet, self.odds, self.dice.as_ref());
        let result = self.run(&target, &script)?;
        info!(
            "{} gambled {}: {:?} (money {})",
            id, bet, result.outcome, result.money
        );
        Ok(result)
    }

    pub(crate) fn lock_character(&self, id: &CharacterId) -> Result<LockGuard<'_>, EngineError> {
        self.locks.acquire(LockKey::Character(id.clone()))
    }

    fn run<T: TransactionScript>(&self, target: &Target, script: &T) -> Result<T::Output, EngineError> {
        let _guard = self.lock_character(&target.character)?;
        debug!("{} on {} for account {}", T::NAME, target.character, target.account);
        self.store.execute(script).map_err(|err| {
            report(T::NAME, target, &err);
            err
        })
    }
}

fn positive<N: PartialEq + Default>(value: N, what: &str) -> Result<(), EngineError> {
    if value == N::default() {
        return Err(EngineError::invalid(format!("{} must be positive", what)));
    }
    Ok(())
}

fn report(action: &str, target: &Target, err: &EngineError) {
    match err.kind() {
        ErrorKind::Forbidden => warn!(
            target: "security",
            "{} denied: account {} does not own character {}",
            action, target.account, target.character
        ),
        ErrorKind::Internal => error!(
            "{} on {} failed: {}",
            action,
            target.character,
            err.source().map(|s| s.to_string()).unwrap_or_default()
        ),
        _ => debug!("{} on {} rejected: {}", action, target.character, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economy::gambling::FixedDice;
    use crate::economy::testing::{fund, seeded_store, HERO};
    use crate::economy::types::{AccountId, GambleOutcome};

    fn ctx(account: u64) -> AccountContext {
        AccountContext {
            account_id: AccountId(account),
            user_id: format!("user{}", account),
        }
    }

    #[test]
    fn zero_count_and_zero_bet_are_rejected_before_any_work() {
        let coordinator = Coordinator::new(Arc::new(seeded_store()));
        let id = CharacterId::from(HERO);
        // Shape errors win even over ownership.
        let err = coordinator.buy(&ctx(2), &id, 1, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        let err = coordinator.gamble(&ctx(2), &id, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn gamble_uses_configured_odds() {
        let store = Arc::new(seeded_store());
        fund(&store, 50);
        let dice = Arc::new(FixedDice::new(0.7));
        let coordinator = Coordinator::new(store)
            .with_dice(dice.clone())
            .with_win_probability(0.8)
            .unwrap();
        let result = coordinator.gamble(&ctx(1), &CharacterId::from(HERO), 50).unwrap();
        assert_eq!(result.outcome, GambleOutcome::Win);
        assert_eq!(result.money, 100);
        assert_eq!(dice.rolls(), 1);
    }

    #[test]
    fn lock_is_released_after_failure() {
        let coordinator = Coordinator::new(Arc::new(seeded_store()));
        let id = CharacterId::from(HERO);
        assert!(coordinator.earn(&ctx(2), &id).is_err());
        assert!(!coordinator.locks.is_held(&LockKey::Character(id.clone())));
        coordinator.earn(&ctx(1), &id).unwrap();
    }
}
