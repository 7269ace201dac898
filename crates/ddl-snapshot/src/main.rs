//! ddl-snapshot CLI
//!
//! Command-line tool for generating `MySQL` migrations from schema snapshots.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ddl_snapshot::prelude::*;
use ddl_snapshot::snapshot::snapshot_to_string;
use ddl_snapshot::writer::render_statements;

/// Snapshot-based schema migrations.
#[derive(Parser)]
#[command(name = "ddl-snapshot")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Migrations directory.
    #[arg(short, long, env = "DDL_SNAPSHOT_DIR", default_value = "database/migrations")]
    dir: PathBuf,

    /// Snapshot file (defaults to `<dir>/.schema_state.json`).
    #[arg(short, long, env = "DDL_SNAPSHOT_STATE_FILE")]
    state_file: Option<PathBuf>,

    /// JSON file with the model descriptors.
    #[arg(short, long, default_value = "models.json")]
    models: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new migration pair from model changes.
    MakeMigrations {
        /// Migration name/description.
        #[arg(short, long)]
        name: Option<String>,

        /// Show SQL without writing files (dry run).
        #[arg(long)]
        dry_run: bool,
    },

    /// Record the current models as the snapshot without generating SQL.
    SyncState,

    /// Show the SQL between two snapshot files.
    Diff {
        /// Previous snapshot.
        #[arg(long)]
        from: PathBuf,

        /// Current snapshot.
        #[arg(long)]
        to: PathBuf,

        /// Show rollback SQL instead of forward SQL.
        #[arg(short, long)]
        reverse: bool,
    },

    /// Print the schema state the models describe.
    ShowState,
}

fn read_models(path: &Path) -> anyhow::Result<Vec<ModelSchema>> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read models from {}", path.display()))?;
    parse_models(&json).with_context(|| format!("failed to parse models in {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut options = GeneratorOptions::new().dir(&cli.dir);
    if let Some(state_file) = &cli.state_file {
        options = options.state_file(state_file);
    }

    match cli.command {
        Commands::MakeMigrations { name, dry_run } => {
            let name = name.unwrap_or_default();
            if name.trim().is_empty() {
                return Err(MigrateError::MissingName.into());
            }
            let models = read_models(&cli.models)?;

            if dry_run {
                info!("Dry run mode - SQL will be printed but not written.");
                let plan = plan_migrations(&models, &options)?;
                if plan.up_statements().is_empty() {
                    info!("No changes detected.");
                    return Ok(());
                }
                for op in &plan.operations {
                    info!("{}", op.description());
                }
                println!("-- up");
                print!("{}", render_statements(&plan.up_statements()));
                println!("\n-- down");
                print!("{}", render_statements(&plan.down_statements()));
                return Ok(());
            }

            let result = make_migrations(&models, &name, &options)?;
            if let (Some(up), Some(down)) = (&result.up_path, &result.down_path) {
                println!("{}", up.display());
                println!("{}", down.display());
            }
            info!("Snapshot: {}", result.state_path.display());
        }

        Commands::SyncState => {
            let models = read_models(&cli.models)?;
            let path = sync_schema_state(&models, &options)?;
            println!("{}", path.display());
        }

        Commands::Diff { from, to, reverse } => {
            let previous = load_snapshot(&from)?;
            let current = load_snapshot(&to)?;
            let (up, down) = diff(&previous, &current);
            let statements = if reverse { down } else { up };
            if statements.is_empty() {
                info!("No changes detected.");
            } else {
                print!("{}", render_statements(&statements));
            }
        }

        Commands::ShowState => {
            let models = read_models(&cli.models)?;
            let state = compute_current_state(&models)?;
            print!("{}", snapshot_to_string(&state)?);
        }
    }

    Ok(())
}
