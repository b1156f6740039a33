//! Civitas CLI
//!
//! Admin command-line interface for the Civitas record store

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use civitas_core::logging_facility;
use civitas_store::StoreConfig;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "civitas")]
#[command(about = "Civitas - alumni platform record store", long_about = None)]
struct Cli {
    /// TOML configuration file; CIVITAS__* environment variables take precedence
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending migrations and list what has been applied
    Migrate,
    /// List registered entities, or describe one
    Entities(commands::schema::EntitiesArgs),
    /// Seed import operations
    Seed(commands::seed::SeedArgs),
    /// Create a record from a JSON object of fields
    Create(commands::records::CreateArgs),
    /// Fetch one record by id
    Find(commands::records::FindArgs),
    /// List records, optionally narrowed by named scopes
    Query(commands::records::QueryArgs),
    /// Apply a partial update from a JSON object of fields
    Update(commands::records::UpdateArgs),
    /// Soft delete (or hard delete) a record
    Delete(commands::records::DeleteArgs),
    /// Bring back a soft-deleted record
    Restore(commands::records::RestoreArgs),
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> civitas_store::Result<()> {
    let config = StoreConfig::load(cli.config.as_deref())?;
    logging_facility::init(config.logging.profile);
    let mut store = commands::open_store(&config)?;

    match cli.command {
        Commands::Migrate => commands::schema::migrate(&store),
        Commands::Entities(args) => commands::schema::entities(&store, args),
        Commands::Seed(args) => commands::seed::execute(&mut store, args),
        Commands::Create(args) => commands::records::create(&mut store, args),
        Commands::Find(args) => commands::records::find(&store, args),
        Commands::Query(args) => commands::records::query(&store, args),
        Commands::Update(args) => commands::records::update(&mut store, args),
        Commands::Delete(args) => commands::records::delete(&mut store, args),
        Commands::Restore(args) => commands::records::restore(&mut store, args),
    }
}
