/// Serialization of concurrent actions on shared characters.
mod common;

use std::collections::HashSet;
use std::thread;

use armory::economy::Slot;
use armory::errors::ErrorKind;
use common::*;

#[test]
fn concurrent_equips_and_unequips_keep_one_consistent_state() {
    let (game, hero) = memory_world();
    let store = game.store().as_ref();
    give(store, &hero, SWORD_A, 1);
    give(store, &hero, SWORD_B, 1);

    thread::scope(|s| {
        for worker in 0..8 {
            let game = &game;
            let hero = &hero;
            s.spawn(move || {
                for round in 0..50 {
                    let _ = match (worker + round) % 3 {
                        0 => game.equip(&ctx(1), hero, SWORD_A),
                        1 => game.equip(&ctx(1), hero, SWORD_B),
                        _ => game.unequip(&ctx(1), hero, Slot::Weapon),
                    };
                }
            });
        }
    });

    let equipped = occupant(store, &hero, Slot::Weapon);
    let (health, power) = stats(store, &hero);
    assert_eq!(health, 500);
    match equipped {
        None => {
            assert_eq!(power, 100);
            assert_eq!((held(store, &hero, SWORD_A), held(store, &hero, SWORD_B)), (1, 1));
        }
        Some(SWORD_A) => {
            assert_eq!(power, 110);
            assert_eq!((held(store, &hero, SWORD_A), held(store, &hero, SWORD_B)), (0, 1));
        }
        Some(SWORD_B) => {
            assert_eq!(power, 105);
            assert_eq!((held(store, &hero, SWORD_A), held(store, &hero, SWORD_B)), (1, 0));
        }
        Some(other) => panic!("unexpected weapon {}", other),
    }
}

#[test]
fn concurrent_buys_never_overspend() {
    let (game, hero) = memory_world();
    let store = game.store().as_ref();
    set_money(store, &hero, 95);

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let game = &game;
                let hero = &hero;
                s.spawn(move || game.buy(&ctx(1), hero, STICK, 1))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("buyer thread"))
            .collect()
    });

    let bought = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(bought, 9);
    for failed in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(failed.kind(), ErrorKind::InsufficientFunds);
    }
    assert_eq!(held(store, &hero, STICK), 9);
    assert_eq!(money(store, &hero), 5);
}

#[test]
fn concurrent_earns_are_all_counted() {
    let (game, hero) = memory_world();
    thread::scope(|s| {
        for _ in 0..10 {
            let game = &game;
            let hero = &hero;
            s.spawn(move || {
                for _ in 0..10 {
                    game.earn(&ctx(1), hero).expect("earn");
                }
            });
        }
    });
    assert_eq!(money(game.store().as_ref(), &hero), 100 * 100);
}

#[test]
fn concurrent_creation_issues_unique_ids() {
    let (game, _) = memory_world();
    let ids: Vec<String> = thread::scope(|s| {
        let handles: Vec<_> = (0..12)
            .map(|n| {
                let game = &game;
                s.spawn(move || {
                    game.create_character(&ctx(7), &format!("Hero {}", n))
                        .expect("create")
                        .id
                        .as_str()
                        .to_string()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("creator thread"))
            .collect()
    });
    let unique: HashSet<&String> = ids.iter().collect();
    assert_eq!(unique.len(), 12);
    assert!(ids.iter().all(|id| id.starts_with("7-")));
    assert_eq!(game.list_characters(&ctx(7)).expect("list").len(), 12);
}

#[test]
fn different_characters_proceed_independently() {
    let (game, hero) = memory_world();
    let other = game
        .create_character(&ctx(2), "Brom")
        .expect("create")
        .id;

    thread::scope(|s| {
        for (account, id) in [(1, &hero), (2, &other)] {
            let game = &game;
            s.spawn(move || {
                for _ in 0..25 {
                    game.earn(&ctx(account), id).expect("earn");
                    game.buy(&ctx(account), id, STICK, 1).expect("buy");
                }
            });
        }
    });

    let store = game.store().as_ref();
    for id in [&hero, &other] {
        assert_eq!(held(store, id, STICK), 25);
        assert_eq!(money(store, id), 25 * 90);
    }
}
