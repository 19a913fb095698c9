use std::path::PathBuf;
use std::process;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use matrix_prefs_lib::config::{PrefsConfig, RemoteKind};
use matrix_prefs_lib::prefs::{PreferenceKey, SaveOutcome, SaveStatus};
use matrix_prefs_lib::theme::{self, ColorTriple, ThemeName};
use matrix_prefs_lib::{migrate, sidebar, PrefsContext};

#[derive(Debug, Parser)]
#[command(name = "matrix-prefs", about = "Eisenhower Matrix preference store", version)]
struct Cli {
    /// Override the data directory holding the local cache and logs.
    #[arg(long, value_name = "PATH", global = true)]
    data_dir: Option<PathBuf>,

    /// Remote backend: disabled, sqlite or rest.
    #[arg(long, value_name = "KIND", global = true)]
    remote: Option<String>,

    /// Owner identity the preferences belong to.
    #[arg(long, value_name = "ID", global = true, default_value = "local")]
    owner: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print a preference value as JSON.
    Get {
        key: String,
        /// JSON returned when nothing is stored.
        #[arg(long, default_value = "null")]
        default: String,
    },
    /// Store a JSON preference value.
    Set { key: String, value: String },
    /// Sidebar ordering.
    #[command(subcommand)]
    Sidebar(SidebarCommand),
    /// Theme settings.
    #[command(subcommand)]
    Theme(ThemeCommand),
    /// Shared database maintenance.
    #[command(subcommand)]
    Db(DbCommand),
}

#[derive(Debug, Subcommand)]
enum SidebarCommand {
    /// List items in display order.
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Move an item to a new position (0-based).
    Move { id: String, to: usize },
    /// Restore the built-in order.
    Reset,
}

#[derive(Debug, Subcommand)]
enum ThemeCommand {
    /// Print the theme settings as JSON.
    Show,
    /// Switch to light, dark, system or custom.
    Set { name: String },
    /// Apply a custom palette (#rgb or #rrggbb each).
    Custom {
        primary: String,
        secondary: String,
        accent: String,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Create the preference table in the shared SQLite database.
    Provision,
}

#[tokio::main]
async fn main() {
    matrix_prefs_lib::init_logging();
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            1
        }
    };
    matrix_prefs_lib::flush_file_logs();
    process::exit(code);
}

fn resolve_config(cli: &Cli) -> Result<PrefsConfig> {
    let mut config = PrefsConfig::from_env().context("read configuration")?;
    if let Some(dir) = &cli.data_dir {
        config = config.with_data_dir(dir);
    }
    if let Some(kind) = &cli.remote {
        let kind: RemoteKind = kind.parse().context("parse --remote")?;
        config = config.with_remote_kind(kind).context("configure remote")?;
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<i32> {
    let config = resolve_config(&cli)?;
    if let Err(err) = matrix_prefs_lib::init_file_logging(&config.logs_dir(), &config.log) {
        tracing::warn!(target: "matrix_prefs", event = "file_logging_disabled", error = %err);
    }

    let ctx = PrefsContext::from_config(config).await?;
    let owner = cli.owner.as_str();
    let result = match cli.command {
        Commands::Get { key, default } => handle_get(&ctx, owner, &key, &default).await,
        Commands::Set { key, value } => handle_set(&ctx, owner, &key, &value).await,
        Commands::Sidebar(cmd) => handle_sidebar(&ctx, owner, cmd).await,
        Commands::Theme(cmd) => handle_theme(&ctx, owner, cmd).await,
        Commands::Db(DbCommand::Provision) => handle_provision(&ctx).await,
    };
    ctx.close().await;
    result
}

fn parse_key(raw: &str) -> Result<PreferenceKey> {
    PreferenceKey::new(raw).map_err(|err| anyhow!(err))
}

fn parse_json(raw: &str, what: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("{what} is not valid JSON"))
}

fn report_save(outcome: &SaveOutcome) -> i32 {
    match outcome.status() {
        SaveStatus::Saved => println!("saved"),
        SaveStatus::SavedLocallyOnly => println!("saved locally only"),
    }
    if let Some(warning) = &outcome.warning {
        eprintln!("Warning: {warning}");
    }
    0
}

async fn handle_get(ctx: &PrefsContext, owner: &str, key: &str, default: &str) -> Result<i32> {
    let key = parse_key(key)?;
    let default = parse_json(default, "--default")?;
    let value = ctx.store.get_preference(owner, &key, default).await;
    println!("{}", serde_json::to_string(&value).context("serialize value")?);
    Ok(0)
}

async fn handle_set(ctx: &PrefsContext, owner: &str, key: &str, value: &str) -> Result<i32> {
    let key = parse_key(key)?;
    let value = parse_json(value, "value")?;
    let outcome = ctx.store.set_preference(owner, &key, &value).await;
    Ok(report_save(&outcome))
}

async fn handle_sidebar(ctx: &PrefsContext, owner: &str, cmd: SidebarCommand) -> Result<i32> {
    match cmd {
        SidebarCommand::Show { json } => {
            let items = sidebar::load_sidebar(&ctx.store, owner).await;
            if json {
                let serialized =
                    serde_json::to_string_pretty(&items).context("serialize sidebar items")?;
                println!("{serialized}");
            } else {
                for (idx, item) in items.iter().enumerate() {
                    println!("{idx:>2}  {:<12} {:<12} {}", item.id, item.icon, item.label);
                }
            }
            Ok(0)
        }
        SidebarCommand::Move { id, to } => {
            let mut items = sidebar::load_sidebar(&ctx.store, owner).await;
            if !sidebar::move_item(&mut items, &id, to) {
                if items.iter().any(|item| item.id == id) {
                    println!("unchanged");
                    return Ok(0);
                }
                eprintln!("Error: no sidebar item `{id}`");
                return Ok(2);
            }
            let outcome = sidebar::save_sidebar(&ctx.store, owner, &items).await;
            Ok(report_save(&outcome))
        }
        SidebarCommand::Reset => {
            let outcome = sidebar::save_sidebar(&ctx.store, owner, &sidebar::default_items()).await;
            Ok(report_save(&outcome))
        }
    }
}

async fn handle_theme(ctx: &PrefsContext, owner: &str, cmd: ThemeCommand) -> Result<i32> {
    let mut settings = theme::load_theme(&ctx.store, owner).await;
    match cmd {
        ThemeCommand::Show => {
            let serialized =
                serde_json::to_string_pretty(&settings).context("serialize theme settings")?;
            println!("{serialized}");
            return Ok(0);
        }
        ThemeCommand::Set { name } => {
            let name: ThemeName = name.parse().map_err(|err| anyhow!("{err}"))?;
            settings.select(name).map_err(|err| anyhow!("{err}"))?;
        }
        ThemeCommand::Custom {
            primary,
            secondary,
            accent,
        } => {
            let colors =
                ColorTriple::new(&primary, &secondary, &accent).map_err(|err| anyhow!("{err}"))?;
            settings.apply_custom(colors);
        }
    }
    let outcome = theme::save_theme(&ctx.store, owner, &settings).await;
    Ok(report_save(&outcome))
}

async fn handle_provision(ctx: &PrefsContext) -> Result<i32> {
    let Some(pool) = ctx.sqlite_pool() else {
        eprintln!("Error: db provision requires --remote sqlite");
        return Ok(2);
    };
    let applied = migrate::apply_migrations(pool)
        .await
        .context("apply preference migrations")?;
    println!("Applied {applied} migration(s).");
    Ok(0)
}
