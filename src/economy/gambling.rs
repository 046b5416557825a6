//! Gambling engine: double-or-nothing on top of the wallet.
//!
//! Randomness comes from an injected [`Dice`] so tests can pin the draw.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::economy::types::{GambleOutcome, Money};
use crate::economy::wallet::Wallet;
use crate::errors::EngineError;

/// Source of uniform draws in `[0, 1)`.
pub trait Dice: Send + Sync {
    fn roll(&self) -> f64;
}

/// Production dice backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngDice;

impl Dice for ThreadRngDice {
    fn roll(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Reproducible dice for demos and replays.
#[derive(Debug)]
pub struct SeededDice {
    rng: Mutex<StdRng>,
}

impl SeededDice {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Dice for SeededDice {
    fn roll(&self) -> f64 {
        match self.rng.lock() {
            Ok(mut rng) => rng.gen::<f64>(),
            Err(poisoned) => poisoned.into_inner().gen::<f64>(),
        }
    }
}

/// Dice that always lands on the same value and counts how often it was rolled.
#[derive(Debug)]
pub struct FixedDice {
    value: f64,
    rolls: AtomicUsize,
}

impl FixedDice {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            rolls: AtomicUsize::new(0),
        }
    }

    pub fn rolls(&self) -> usize {
        self.rolls.load(Ordering::SeqCst)
    }
}

impl Dice for FixedDice {
    fn roll(&self) -> f64 {
        self.rolls.fetch_add(1, Ordering::SeqCst);
        self.value
    }
}

/// Win threshold in `[0, 1]`. A draw strictly below it wins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WinProbability(f64);

impl WinProbability {
    pub fn new(p: f64) -> Result<Self, EngineError> {
        if p.is_finite() && (0.0..=1.0).contains(&p) {
            Ok(Self(p))
        } else {
            Err(EngineError::invalid(format!(
                "win probability must lie in [0, 1], got {}",
                p
            )))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn wins(self, draw: f64) -> bool {
        draw < self.0
    }
}

impl Default for WinProbability {
    fn default() -> Self {
        Self(0.5)
    }
}

/// Settle a bet that has already been debited from `wallet`.
pub fn settle(
    wallet: &mut Wallet,
    bet: Money,
    draw: f64,
    odds: WinProbability,
) -> Result<GambleOutcome, EngineError> {
    if !odds.wins(draw) {
        return Ok(GambleOutcome::Loss);
    }
    let payout = bet
        .checked_mul(2)
        .ok_or_else(|| EngineError::invalid("payout would overflow"))?;
    wallet.credit(payout)?;
    Ok(GambleOutcome::Win)
}
