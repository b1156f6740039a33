//! Seed import command
//!
//! Usage: civitas seed import <PATH>

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use civitas_store::errors::io_error;
use civitas_store::seed::import_seed_file;
use civitas_store::RecordStore;
use serde_json::json;

use super::print_json;

#[derive(Debug, Args)]
pub struct SeedArgs {
    #[command(subcommand)]
    pub command: SeedCommand,
}

#[derive(Debug, Subcommand)]
pub enum SeedCommand {
    /// Import a seed file, or every seed in a directory
    Import(ImportArgs),
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Path to seed YAML file or directory
    pub path: PathBuf,
}

/// Execute seed command
pub fn execute(store: &mut RecordStore, args: SeedArgs) -> civitas_store::Result<()> {
    match args.command {
        SeedCommand::Import(import_args) => execute_import(store, import_args),
    }
}

/// Execute seed import
///
/// Each file is its own unit of work: a failing file stops the run but
/// leaves earlier files imported.
fn execute_import(store: &mut RecordStore, args: ImportArgs) -> civitas_store::Result<()> {
    let files = if args.path.is_dir() {
        seed_files(&args.path)?
    } else {
        vec![args.path]
    };

    let mut imported = Vec::with_capacity(files.len());
    for file in files {
        let report = import_seed_file(store, &file)?;
        imported.push(json!({
            "path": file.display().to_string(),
            "seed_digest": report.seed_digest,
            "records": report.created.len(),
            "keys": report.keys,
        }));
    }
    print_json(&json!(imported))
}

/// YAML files directly inside `dir`, sorted for determinism
fn seed_files(dir: &Path) -> civitas_store::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| io_error("seed_read", e))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .map(|ext| ext == "yaml" || ext == "yml")
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}
