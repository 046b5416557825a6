/// Sign-up through catalog seeding to trading, wired the way the binary does it.
mod common;

use std::sync::Arc;

use armory::auth::{AccountService, Authenticator, SignUp};
use armory::catalog::{load_items_from_json, Catalog, ItemPatch, NewItem};
use armory::config::{Argon2Config, Config};
use armory::economy::{Coordinator, Slot, StatDelta};
use armory::errors::ErrorKind;
use armory::store::SledStoreBuilder;
use tempfile::TempDir;

const SEED: &str = r#"[
    {"code": 1, "name": "Wooden Sword", "slot": "weapon", "stats": {"power": 4}, "price": 20},
    {"code": 2, "name": "Leather Cap", "slot": "top", "stats": {"health": 15}, "price": 12},
    {"code": 3, "name": "Apple", "price": 2}
]"#;

fn config(tmp: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.data_dir = tmp.path().join("db").display().to_string();
    config.characters.starting_health = 80;
    config.characters.starting_power = 8;
    config.security.argon2 = Some(Argon2Config {
        memory_kib: Some(256),
        time_cost: Some(1),
        parallelism: Some(1),
    });
    config
}

fn sign_up(user_id: &str) -> SignUp {
    SignUp {
        user_id: user_id.into(),
        password: "correct horse".into(),
        password_check: Some("correct horse".into()),
        name: "Player".into(),
        age: Some(21),
    }
}

#[test]
fn signed_in_player_trades_from_seeded_catalog() {
    let tmp = TempDir::new().expect("tempdir");
    let config = config(&tmp);
    let store = Arc::new(
        SledStoreBuilder::new(&config.storage.data_dir)
            .without_flush()
            .open()
            .expect("open"),
    );

    let seed_path = tmp.path().join("items.json");
    std::fs::write(&seed_path, SEED).expect("write seed");
    let catalog = Catalog::new(store.clone());
    let report = catalog
        .seed(load_items_from_json(&seed_path).expect("load seed"))
        .expect("seed");
    assert_eq!(report.created, 3);

    let auth = AccountService::new(store.clone(), &config.security).expect("auth");
    auth.sign_up(sign_up("ayla")).expect("sign up");
    let session = auth.sign_in("ayla", "correct horse").expect("sign in");
    let ctx = auth.authenticate(&session.token).expect("authenticate");

    let game = Coordinator::from_config(store, &config).expect("coordinator");
    let hero = game.create_character(&ctx, "Ayla").expect("create");
    let detail = game.character_detail(Some(&ctx), &hero.id).expect("detail");
    assert_eq!((detail.health, detail.power, detail.money), (80, 8, Some(0)));

    game.earn(&ctx, &hero.id).expect("earn");
    game.buy(&ctx, &hero.id, 1, 1).expect("buy sword");
    game.buy(&ctx, &hero.id, 2, 1).expect("buy cap");
    game.equip(&ctx, &hero.id, 1).expect("equip sword");
    let view = game.equip(&ctx, &hero.id, 2).expect("equip cap");
    assert_eq!((view.health, view.power), (95, 12));

    let equipment = game.equipment(&ctx, &hero.id).expect("equipment");
    let slots: Vec<Slot> = equipment.iter().map(|e| e.slot).collect();
    assert_eq!(slots.len(), 2);
    assert!(slots.contains(&Slot::Weapon) && slots.contains(&Slot::Top));
    assert!(game.inventory(&ctx, &hero.id).expect("inventory").is_empty());

    let receipt = game.buy(&ctx, &hero.id, 3, 10).expect("buy apples");
    assert_eq!(receipt.money, 100 - 20 - 12 - 20);
    let lines = game.inventory(&ctx, &hero.id).expect("inventory");
    assert_eq!(lines[0].item_name, "Apple");
    assert_eq!(lines[0].count, 10);
}

#[test]
fn other_accounts_cannot_touch_a_character() {
    let tmp = TempDir::new().expect("tempdir");
    let config = config(&tmp);
    let store = Arc::new(
        SledStoreBuilder::new(&config.storage.data_dir)
            .without_flush()
            .open()
            .expect("open"),
    );
    let auth = AccountService::new(store.clone(), &config.security).expect("auth");
    let ayla = auth.sign_up(sign_up("ayla")).expect("ayla");
    let brom = auth.sign_up(sign_up("brom")).expect("brom");
    assert_ne!(ayla.id, brom.id);

    let brom_ctx = auth
        .authenticate(&auth.sign_in("brom", "correct horse").expect("sign in").token)
        .expect("authenticate");
    let ayla_ctx = auth
        .authenticate(&auth.sign_in("ayla", "correct horse").expect("sign in").token)
        .expect("authenticate");

    let game = Coordinator::from_config(store, &config).expect("coordinator");
    let hero = game.create_character(&ayla_ctx, "Ayla").expect("create").id;

    assert_eq!(game.earn(&brom_ctx, &hero).unwrap_err().kind(), ErrorKind::Forbidden);
    assert_eq!(
        game.delete_character(&brom_ctx, &hero).unwrap_err().kind(),
        ErrorKind::Forbidden
    );
    let seen = game.character_detail(Some(&brom_ctx), &hero).expect("detail");
    assert_eq!(seen.money, None);
    assert!(game.list_characters(&brom_ctx).expect("list").is_empty());
}

#[test]
fn catalog_edits_apply_to_later_equips() {
    let tmp = TempDir::new().expect("tempdir");
    let store = Arc::new(
        SledStoreBuilder::new(tmp.path().join("db"))
            .without_flush()
            .open()
            .expect("open"),
    );
    let catalog = Catalog::new(store.clone());
    catalog
        .create_item(NewItem {
            code: 9,
            name: "Boots".into(),
            slot: Some(Slot::Shoes),
            stats: StatDelta::new(0, 1),
            price: 5,
        })
        .expect("create");
    catalog
        .update_item(
            9,
            ItemPatch {
                name: Some("Swift Boots".into()),
                stats: Some(StatDelta::new(3, 2)),
            },
        )
        .expect("update");
    assert_eq!(catalog.item_detail(9).expect("detail").name, "Swift Boots");

    let game = Coordinator::new(store);
    let ctx = common::ctx(1);
    let hero = game.create_character(&ctx, "Ayla").expect("create").id;
    game.earn(&ctx, &hero).expect("earn");
    game.buy(&ctx, &hero, 9, 1).expect("buy");
    let view = game.equip(&ctx, &hero, 9).expect("equip");
    assert_eq!((view.health, view.power), (503, 102));
}

#[test]
fn config_rejects_out_of_range_odds() {
    let tmp = TempDir::new().expect("tempdir");
    let mut config = config(&tmp);
    config.gambling.win_probability = 1.5;
    assert!(config.validate().is_err());

    let store = Arc::new(armory::store::MemoryStore::new());
    let err = Coordinator::from_config(store, &config).err().expect("rejected");
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}
