//! Binary entrypoint for the Armory CLI.
//!
//! Commands:
//! - `init` - write a starter `armory.toml` and create the data directory
//! - `status` - print configuration and catalog summary
//! - `sign-up`, `sign-in` - account registration and session tokens
//! - `item add|update|list|show|seed` - catalog authoring
//! - `character create|list|show|delete` - character lifecycle
//! - `inventory`, `equipment` - holdings of one character
//! - `equip`, `unequip`, `buy`, `sell`, `earn`, `gamble` - economic actions
//!
//! Results are printed to stdout as JSON. Failures print `{"error", "message"}`
//! and exit with status 1. Commands acting for an account need `--token`
//! (or `ARMORY_TOKEN`) from `sign-in`.
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{debug, info};
use serde::Serialize;

use armory::auth::{AccountService, Authenticator, SignUp};
use armory::catalog::{load_items_from_json, Catalog, ItemPatch, NewItem};
use armory::config::Config;
use armory::economy::{AccountContext, CharacterId, Coordinator, ItemCode, Money, Slot, StatDelta};
use armory::errors::EngineError;
use armory::store::{ItemCatalog, SledStore};

#[derive(Parser)]
#[command(name = "armory")]
#[command(about = "Character economy and equipment transactions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "armory.toml", global = true)]
    config: String,

    /// Session token from `sign-in`
    #[arg(long, env = "ARMORY_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file and create the data directory
    Init,
    /// Show configuration and catalog summary
    Status,
    /// Register a new account
    SignUp {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        age: Option<u32>,
        /// Password (prompted when absent)
        #[arg(long, env = "ARMORY_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Sign in and print a session token
    SignIn {
        #[arg(long)]
        user_id: String,
        /// Password (prompted when absent)
        #[arg(long, env = "ARMORY_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Item catalog authoring
    #[command(subcommand)]
    Item(ItemCommands),
    /// Character lifecycle
    #[command(subcommand)]
    Character(CharacterCommands),
    /// List a character's un-equipped items
    Inventory { character: String },
    /// List a character's equipped items
    Equipment { character: String },
    /// Equip an item from the inventory
    Equip { character: String, item: ItemCode },
    /// Return the item in a slot to the inventory
    Unequip {
        character: String,
        /// weapon, top, bottom, shoes or accessory
        slot: String,
    },
    /// Buy items from the shop
    Buy {
        character: String,
        item: ItemCode,
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,
    },
    /// Sell items back to the shop at 60% of catalog price
    Sell {
        character: String,
        item: ItemCode,
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,
    },
    /// Earn a fixed 100 coins
    Earn { character: String },
    /// Bet coins on a double-or-nothing draw
    Gamble { character: String, bet: Money },
}

#[derive(Subcommand)]
enum ItemCommands {
    /// Add an item to the catalog
    Add {
        #[arg(long)]
        code: ItemCode,
        #[arg(long)]
        name: String,
        #[arg(long)]
        slot: Option<String>,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        health: i64,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        power: i64,
        #[arg(long)]
        price: Money,
    },
    /// Rename an item or replace its stats
    Update {
        code: ItemCode,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        health: Option<i64>,
        #[arg(long, allow_hyphen_values = true)]
        power: Option<i64>,
    },
    /// List all items
    List,
    /// Show one item
    Show { code: ItemCode },
    /// Load items from a JSON seed file, skipping existing ones
    Seed {
        #[arg(default_value = "data/seeds/items.json")]
        path: String,
    },
}

#[derive(Subcommand)]
enum CharacterCommands {
    /// Create a character
    Create { name: String },
    /// List your characters, newest first
    List,
    /// Show a character (money only if it is yours)
    Show { character: String },
    /// Delete one of your characters
    Delete { character: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.command {
        Commands::Init => None,
        _ => Some(load_config(&cli.config).await?),
    };
    init_logging(&config, cli.verbose);

    match run(cli, config).await {
        Ok(()) => Ok(()),
        Err(err) => match err.downcast_ref::<EngineError>() {
            Some(engine) => {
                let body = serde_json::json!({
                    "error": engine.kind().as_str(),
                    "message": engine.to_string(),
                });
                eprintln!("{}", body);
                std::process::exit(1);
            }
            None => Err(err),
        },
    }
}

async fn load_config(path: &str) -> Result<Config> {
    if Path::new(path).exists() {
        return Config::load(path).await;
    }
    let mut config = Config::default();
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli, config: Option<Config>) -> Result<()> {
    let Some(config) = config else {
        return init(&cli.config).await;
    };

    let store = Arc::new(SledStore::open(&config.storage.data_dir)?);
    let coordinator = Coordinator::from_config(store.clone(), &config)?;
    let accounts = AccountService::new(store.clone(), &config.security)?;
    let catalog = Catalog::new(store.clone());
    let token = cli.token.as_deref();

    match cli.command {
        // handled before the store opens
        Commands::Init => {}
        Commands::Status => {
            let items = store.list_items()?.len();
            emit(&serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "data_dir": config.storage.data_dir,
                "items": items,
                "win_probability": coordinator.win_probability(),
                "session_ttl_minutes": config.security.session_ttl_minutes,
            }))?;
        }
        Commands::SignUp {
            user_id,
            name,
            age,
            password,
        } => {
            let (password, password_check) = match password {
                Some(p) => (p.clone(), Some(p)),
                None => {
                    let first = rpassword::prompt_password("Password: ")?;
                    let second = rpassword::prompt_password("Confirm password: ")?;
                    (first, Some(second))
                }
            };
            let view = accounts.sign_up(SignUp {
                user_id,
                password,
                password_check,
                name,
                age,
            })?;
            emit(&view)?;
        }
        Commands::SignIn { user_id, password } => {
            let password = match password {
                Some(p) => p,
                None => rpassword::prompt_password("Password: ")?,
            };
            emit(&accounts.sign_in(&user_id, &password)?)?;
        }
        Commands::Item(cmd) => item_command(&catalog, cmd)?,
        Commands::Character(cmd) => match cmd {
            CharacterCommands::Create { name } => {
                let ctx = authenticate(&accounts, token)?;
                emit(&coordinator.create_character(&ctx, &name)?)?;
            }
            CharacterCommands::List => {
                let ctx = authenticate(&accounts, token)?;
                emit(&coordinator.list_characters(&ctx)?)?;
            }
            CharacterCommands::Show { character } => {
                // Anonymous viewers may look, they just don't see money.
                let viewer = match token {
                    Some(t) => Some(accounts.authenticate(t)?),
                    None => None,
                };
                let id = CharacterId::new(character);
                emit(&coordinator.character_detail(viewer.as_ref(), &id)?)?;
            }
            CharacterCommands::Delete { character } => {
                let ctx = authenticate(&accounts, token)?;
                coordinator.delete_character(&ctx, &CharacterId::new(character.clone()))?;
                emit(&serde_json::json!({ "deleted": character }))?;
            }
        },
        Commands::Inventory { character } => {
            let ctx = authenticate(&accounts, token)?;
            emit(&coordinator.inventory(&ctx, &CharacterId::new(character))?)?;
        }
        Commands::Equipment { character } => {
            let ctx = authenticate(&accounts, token)?;
            emit(&coordinator.equipment(&ctx, &CharacterId::new(character))?)?;
        }
        Commands::Equip { character, item } => {
            let ctx = authenticate(&accounts, token)?;
            emit(&coordinator.equip(&ctx, &CharacterId::new(character), item)?)?;
        }
        Commands::Unequip { character, slot } => {
            let slot: Slot = slot.parse()?;
            let ctx = authenticate(&accounts, token)?;
            emit(&coordinator.unequip(&ctx, &CharacterId::new(character), slot)?)?;
        }
        Commands::Buy {
            character,
            item,
            count,
        } => {
            let ctx = authenticate(&accounts, token)?;
            emit(&coordinator.buy(&ctx, &CharacterId::new(character), item, count)?)?;
        }
        Commands::Sell {
            character,
            item,
            count,
        } => {
            let ctx = authenticate(&accounts, token)?;
            emit(&coordinator.sell(&ctx, &CharacterId::new(character), item, count)?)?;
        }
        Commands::Earn { character } => {
            let ctx = authenticate(&accounts, token)?;
            emit(&coordinator.earn(&ctx, &CharacterId::new(character))?)?;
        }
        Commands::Gamble { character, bet } => {
            let ctx = authenticate(&accounts, token)?;
            emit(&coordinator.gamble(&ctx, &CharacterId::new(character), bet)?)?;
        }
    }

    store.close()?;
    debug!("store closed");
    Ok(())
}

async fn init(path: &str) -> Result<()> {
    if Path::new(path).exists() {
        return Err(anyhow!("{} already exists; remove it first to start over", path));
    }
    Config::create_default(path).await?;
    let config = Config::load(path).await?;
    tokio::fs::create_dir_all(&config.storage.data_dir).await?;
    let store = SledStore::open(&config.storage.data_dir)?;
    store.close()?;
    info!("Initialized {} with data in {}", path, config.storage.data_dir);
    emit(&serde_json::json!({
        "config": path,
        "data_dir": config.storage.data_dir,
    }))
}

fn item_command(catalog: &Catalog<SledStore>, cmd: ItemCommands) -> Result<()> {
    match cmd {
        ItemCommands::Add {
            code,
            name,
            slot,
            health,
            power,
            price,
        } => {
            let slot = slot.map(|s| s.parse::<Slot>()).transpose()?;
            emit(&catalog.create_item(NewItem {
                code,
                name,
                slot,
                stats: StatDelta::new(health, power),
                price,
            })?)
        }
        ItemCommands::Update {
            code,
            name,
            health,
            power,
        } => {
            let stats = match (health, power) {
                (None, None) => None,
                (h, p) => Some(StatDelta::new(h.unwrap_or(0), p.unwrap_or(0))),
            };
            emit(&catalog.update_item(code, ItemPatch { name, stats })?)
        }
        ItemCommands::List => emit(&catalog.list_items()?),
        ItemCommands::Show { code } => emit(&catalog.item_detail(code)?),
        ItemCommands::Seed { path } => {
            let items = load_items_from_json(&path)?;
            emit(&catalog.seed(items)?)
        }
    }
}

fn authenticate(accounts: &AccountService<SledStore>, token: Option<&str>) -> Result<AccountContext> {
    let token = token.ok_or_else(|| {
        EngineError::Unauthorized("sign in first and pass --token or ARMORY_TOKEN".to_string())
    })?;
    Ok(accounts.authenticate(token)?)
}

fn emit<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    // sled is chatty at debug
    builder.filter_module("sled", log::LevelFilter::Warn);

    let files = config.as_ref().map(|c| {
        (
            c.logging.file.clone(),
            c.logging.security_file.clone(),
        )
    });
    match files {
        Some((Some(file), security_path)) => match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file)
        {
            Ok(f) => {
                let log_file = std::sync::Arc::new(std::sync::Mutex::new(f));
                // JSON goes to stdout, so echo log lines only when stderr is a terminal
                let is_tty = atty::is(atty::Stream::Stderr);
                builder.format(move |fmt, record| {
                    let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                    let line = format!("{} [{}] {}", ts, record.level(), record.args());

                    if let Ok(mut guard) = log_file.lock() {
                        let _ = writeln!(guard, "{}", line);
                    }

                    if record.target() == "security" {
                        if let Some(ref sec_path) = security_path {
                            if let Ok(mut sf) = std::fs::OpenOptions::new()
                                .create(true)
                                .append(true)
                                .open(sec_path)
                            {
                                let _ = writeln!(sf, "{}", line);
                            }
                        }
                    }

                    if is_tty {
                        writeln!(fmt, "{}", line)
                    } else {
                        Ok(())
                    }
                });
            }
            Err(_) => plain_format(&mut builder),
        },
        _ => plain_format(&mut builder),
    }
    let _ = builder.try_init();
}

fn plain_format(builder: &mut env_logger::Builder) {
    use std::io::Write;
    builder.format(|fmt, record| {
        let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
    });
}
