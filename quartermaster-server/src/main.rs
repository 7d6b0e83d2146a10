//! Quartermaster server and migration CLI.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use quartermaster::http::{serve, AppContext};
use quartermaster::migration::{startup_migrations, MigrationStatus, Migrator};
use quartermaster::model::{Location, PropertyType, Role, User};
use quartermaster::{connect, AppConfig, MemoryStore, PgExecutor, PgPool, Store};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "quartermaster")]
#[command(about = "Asset and inventory management server")]
#[command(version)]
struct Cli {
    /// Configuration file (default: config/config.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Database connection URL, overrides the configuration
    #[arg(long)]
    database_url: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Listen address, overrides `server.bind`
        #[arg(long)]
        bind: Option<String>,

        /// Keep everything in memory and seed an admin user
        #[arg(long)]
        in_memory: bool,
    },

    /// Manage the database schema
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Show applied and pending migrations
    Status,

    /// Apply pending migrations
    Up {
        /// Number of migrations to apply (default: all pending)
        #[arg(long)]
        steps: Option<usize>,
    },

    /// Roll back migrations
    Down {
        /// Number of migrations to roll back
        #[arg(long, default_value = "1")]
        steps: usize,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => AppConfig::load().context("loading configuration")?,
    };
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }

    match cli.command {
        Commands::Serve { bind, in_memory } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            may::config().set_workers(config.server.workers);
            if in_memory {
                serve_in_memory(config)
            } else {
                serve_postgres(config)
            }
        }
        Commands::Migrate { action } => {
            let executor = PgExecutor::new(
                connect(&config.database.url).context("connecting to the database")?,
            );
            let migrator = Migrator::embedded()?;
            match action {
                MigrateAction::Status => print_status(&migrator.status(&executor)?),
                MigrateAction::Up { steps } => {
                    let applied = migrator.up(&executor, steps)?;
                    println!("Applied {applied} migration(s)");
                }
                MigrateAction::Down { steps } => {
                    let reverted = migrator.down(&executor, Some(steps))?;
                    println!("Rolled back {reverted} migration(s)");
                }
            }
            Ok(())
        }
    }
}

fn serve_postgres(config: AppConfig) -> anyhow::Result<()> {
    let pool = PgPool::open(&config.database).context("opening the database pool")?;
    if config.server.migrate_on_startup {
        let connection = pool.acquire_connection()?;
        let applied = startup_migrations(&connection, None)?;
        log::info!("startup migrations: {applied} applied");
    }
    run(AppContext::new(pool, config.import), &config.server.bind)
}

fn serve_in_memory(config: AppConfig) -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let warehouse = Location::new("Main warehouse");
    store.insert_location(&warehouse)?;
    store.insert_property_type(&PropertyType::new("General"))?;
    let admin = User::new("admin", "Administrator", Role::Admin).at_location(warehouse.id);
    store.insert_user(&admin)?;
    log::warn!("in-memory mode: data is lost on exit");
    log::info!("seeded admin user; send `X-User-Id: {}`", admin.id);
    run(AppContext::new(store, config.import), &config.server.bind)
}

fn run<P: quartermaster::StoreProvider>(ctx: AppContext<P>, bind: &str) -> anyhow::Result<()> {
    let server = serve(ctx, bind).with_context(|| format!("binding {bind}"))?;
    server
        .join()
        .map_err(|e| anyhow!("server stopped unexpectedly: {e:?}"))
}

fn print_status(status: &MigrationStatus) {
    println!("Applied ({}):", status.applied.len());
    for record in &status.applied {
        let took = record
            .execution_time_ms
            .map_or_else(|| "n/a".to_string(), |ms| format!("{ms}ms"));
        println!(
            "  m{}_{} ({}, {took})",
            record.version,
            record.name,
            record.applied_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    println!("Pending ({}):", status.pending.len());
    for pending in &status.pending {
        println!("  m{}_{}", pending.version, pending.name);
    }
    if status.is_up_to_date() {
        println!("Schema is up to date");
    }
}
