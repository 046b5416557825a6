/// End-to-end scenarios for buy, sell, equip, unequip, earn and gamble.
mod common;

use std::sync::Arc;

use armory::economy::{FixedDice, GambleOutcome, Slot, ThreadRngDice, EARN_AMOUNT};
use armory::errors::ErrorKind;
use armory::store::EconomyStore;
use common::*;

#[test]
fn buy_debits_and_stacks() {
    let (game, hero) = memory_world();
    set_money(game.store().as_ref(), &hero, 100);

    let receipt = game.buy(&ctx(1), &hero, STICK, 3).expect("buy");
    assert_eq!(receipt.total_price, 30);
    assert_eq!(receipt.money, 70);
    assert_eq!(money(game.store().as_ref(), &hero), 70);
    assert_eq!(held(game.store().as_ref(), &hero, STICK), 3);

    game.buy(&ctx(1), &hero, STICK, 1).expect("buy again");
    assert_eq!(held(game.store().as_ref(), &hero, STICK), 4);
}

#[test]
fn sell_pays_sixty_percent_per_unit() {
    let (game, hero) = memory_world();
    let store = game.store().as_ref();
    give(store, &hero, STICK, 3);
    set_money(store, &hero, 5);

    let receipt = game.sell(&ctx(1), &hero, STICK, 2).expect("sell");
    assert_eq!(receipt.proceeds, 12);
    assert_eq!(receipt.money, 17);
    assert_eq!(held(store, &hero, STICK), 1);

    game.sell(&ctx(1), &hero, STICK, 1).expect("sell last");
    assert!(store.inventory_entries(&hero).expect("inventory").is_empty());
}

#[test]
fn equip_into_empty_slot() {
    let (game, hero) = memory_world();
    let store = game.store().as_ref();
    give(store, &hero, SWORD_A, 1);

    let view = game.equip(&ctx(1), &hero, SWORD_A).expect("equip");
    assert_eq!((view.name.as_str(), view.health, view.power), ("Ayla", 500, 110));
    assert_eq!(occupant(store, &hero, Slot::Weapon), Some(SWORD_A));
    assert_eq!(held(store, &hero, SWORD_A), 0);
    assert_eq!(stats(store, &hero), (500, 110));
}

#[test]
fn equip_swaps_out_previous_occupant() {
    let (game, hero) = memory_world();
    let store = game.store().as_ref();
    give(store, &hero, SWORD_A, 1);
    give(store, &hero, SWORD_B, 1);
    game.equip(&ctx(1), &hero, SWORD_A).expect("equip A");

    let view = game.equip(&ctx(1), &hero, SWORD_B).expect("equip B");
    assert_eq!(view.power, 105);
    assert_eq!(occupant(store, &hero, Slot::Weapon), Some(SWORD_B));
    assert_eq!(held(store, &hero, SWORD_A), 1);
    assert_eq!(held(store, &hero, SWORD_B), 0);
}

#[test]
fn unequip_returns_item_and_reverses_stats() {
    let (game, hero) = memory_world();
    let store = game.store().as_ref();
    give(store, &hero, TUNIC, 2);
    game.equip(&ctx(1), &hero, TUNIC).expect("equip");
    assert_eq!(stats(store, &hero), (520, 98));

    let view = game.unequip(&ctx(1), &hero, Slot::Top).expect("unequip");
    assert_eq!((view.health, view.power), (500, 100));
    assert_eq!(held(store, &hero, TUNIC), 2);
    assert_eq!(occupant(store, &hero, Slot::Top), None);

    let err = game.unequip(&ctx(1), &hero, Slot::Top).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn gamble_loss_and_win_at_certain_odds() {
    let (losing, hero) = world_with_dice(Arc::new(FixedDice::new(0.0)), 0.0);
    set_money(losing.store().as_ref(), &hero, 50);
    let result = losing.gamble(&ctx(1), &hero, 50).expect("gamble");
    assert_eq!(result.outcome, GambleOutcome::Loss);
    assert_eq!(result.money, 0);

    let (winning, hero) = world_with_dice(Arc::new(FixedDice::new(0.999)), 1.0);
    set_money(winning.store().as_ref(), &hero, 50);
    let result = winning.gamble(&ctx(1), &hero, 50).expect("gamble");
    assert_eq!(result.outcome, GambleOutcome::Win);
    assert_eq!(result.money, 100);
}

#[test]
fn gamble_with_real_rng_honours_certain_odds() {
    let (never, hero) = world_with_dice(Arc::new(ThreadRngDice), 0.0);
    set_money(never.store().as_ref(), &hero, 1_000);
    for _ in 0..20 {
        assert_eq!(
            never.gamble(&ctx(1), &hero, 10).expect("gamble").outcome,
            GambleOutcome::Loss
        );
    }
    assert_eq!(money(never.store().as_ref(), &hero), 800);
}

#[test]
fn gamble_short_of_funds_draws_nothing() {
    let dice = Arc::new(FixedDice::new(0.0));
    let (game, hero) = world_with_dice(dice.clone(), 1.0);
    set_money(game.store().as_ref(), &hero, 10);
    let err = game.gamble(&ctx(1), &hero, 11).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    assert_eq!(dice.rolls(), 0);
    assert_eq!(money(game.store().as_ref(), &hero), 10);

    game.gamble(&ctx(1), &hero, 10).expect("gamble");
    assert_eq!(dice.rolls(), 1);
}

#[test]
fn earn_adds_fixed_amount() {
    let (game, hero) = memory_world();
    let view = game.earn(&ctx(1), &hero).expect("earn");
    assert_eq!(view.name, "Ayla");
    assert_eq!(view.money, EARN_AMOUNT);
}

#[test]
fn buy_without_funds_changes_nothing() {
    let (game, hero) = memory_world();
    set_money(game.store().as_ref(), &hero, 29);
    let err = game.buy(&ctx(1), &hero, STICK, 3).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    assert_eq!(money(game.store().as_ref(), &hero), 29);
    assert_eq!(held(game.store().as_ref(), &hero, STICK), 0);
}

#[test]
fn listings_join_catalog_names() {
    let (game, hero) = memory_world();
    let store = game.store().as_ref();
    give(store, &hero, TUNIC, 1);
    give(store, &hero, STICK, 4);
    give(store, &hero, SWORD_A, 1);
    game.equip(&ctx(1), &hero, SWORD_A).expect("equip");

    let inventory = game.inventory(&ctx(1), &hero).expect("inventory");
    let lines: Vec<(u32, &str, u32)> = inventory
        .iter()
        .map(|l| (l.item_code, l.item_name.as_str(), l.count))
        .collect();
    assert_eq!(lines, vec![(STICK, "Stick", 4), (TUNIC, "Tunic", 1)]);
    assert_eq!(inventory[1].item_slot, Some(Slot::Top));

    let equipment = game.equipment(&ctx(1), &hero).expect("equipment");
    assert_eq!(equipment.len(), 1);
    assert_eq!(equipment[0].slot, Slot::Weapon);
    assert_eq!(equipment[0].item_name, "Sword A");
}
