//! Phaselog CLI - Command-line interface for phase-partitioned conversation memory.

use anyhow::Result;
use clap::{Parser, Subcommand};
use phaselog_core::PhaseLogError;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "phaselog")]
#[command(about = "Durable conversation memory split into project phases", long_about = None)]
#[command(version)]
struct Cli {
    /// Projects root directory
    #[arg(long, global = true, env = "PHASELOG_ROOT", default_value = "projects")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a project (and the projects root if needed)
    Init {
        /// Project name, turned into the directory slug
        name: String,
        /// Display title (defaults to the name)
        #[arg(short, long)]
        title: Option<String>,
    },
    /// List projects, most recent first
    Projects,
    /// Append a message to a phase log
    Say {
        /// Project slug
        project: String,
        /// Message text
        content: String,
        /// Phase name
        #[arg(short, long, default_value = "main")]
        phase: String,
        /// Author (user or assistant)
        #[arg(short, long, default_value = "user")]
        role: String,
        /// Metadata as a JSON object
        #[arg(long)]
        meta: Option<String>,
    },
    /// Show a phase's messages and checkpoint state
    History {
        /// Project slug
        project: String,
        /// Phase name
        #[arg(short, long, default_value = "main")]
        phase: String,
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove the last message of a phase
    Rollback {
        /// Project slug
        project: String,
        /// Phase name
        #[arg(short, long, default_value = "main")]
        phase: String,
    },
    /// Snapshot a phase log into its backup directory
    Backup {
        /// Project slug
        project: String,
        /// Phase name
        #[arg(short, long, default_value = "main")]
        phase: String,
    },
    /// List the backups of a phase log
    Backups {
        /// Project slug
        project: String,
        /// Phase name
        #[arg(short, long, default_value = "main")]
        phase: String,
    },
    /// Restore corrupt logs from backups and remove leftover temp files
    Recover {
        /// Project slug
        project: String,
    },
    /// Build and write the checkpoint of a phase
    Checkpoint {
        /// Project slug
        project: String,
        /// Phase name
        #[arg(short, long, default_value = "main")]
        phase: String,
    },
    /// Checkpoint a phase and open the next one
    Close {
        /// Project slug
        project: String,
        /// Phase name
        #[arg(short, long, default_value = "main")]
        phase: String,
    },
    /// Print the accumulated context up to a phase
    Hierarchy {
        /// Project slug
        project: String,
        /// Current phase
        #[arg(short, long, default_value = "main")]
        phase: String,
    },
    /// Verify project integrity
    Verify {
        /// Project slug
        project: String,
    },
    /// Delete old backups of a phase log
    Prune {
        /// Project slug
        project: String,
        /// Phase name
        #[arg(short, long, default_value = "main")]
        phase: String,
        /// Number of newest backups to keep
        #[arg(short, long, default_value = "10")]
        keep: usize,
    },
    /// Change a project's title
    Rename {
        /// Project slug
        project: String,
        /// New title
        title: String,
    },
}

fn main() -> Result<()> {
    // Respects RUST_LOG (e.g. RUST_LOG=phaselog_core=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let root = cli.root;

    let result = match cli.command {
        Commands::Init { name, title } => commands::project::init(&root, &name, title.as_deref()),
        Commands::Projects => commands::project::list(&root),
        Commands::Say {
            project,
            content,
            phase,
            role,
            meta,
        } => commands::log::say(&root, &project, &phase, &role, &content, meta.as_deref()),
        Commands::History {
            project,
            phase,
            json,
        } => commands::log::history(&root, &project, &phase, json),
        Commands::Rollback { project, phase } => commands::log::rollback(&root, &project, &phase),
        Commands::Backup { project, phase } => commands::backup::create(&root, &project, &phase),
        Commands::Backups { project, phase } => commands::backup::list(&root, &project, &phase),
        Commands::Recover { project } => commands::verify::recover(&root, &project),
        Commands::Checkpoint { project, phase } => {
            commands::checkpoint::build(&root, &project, &phase)
        }
        Commands::Close { project, phase } => commands::checkpoint::close(&root, &project, &phase),
        Commands::Hierarchy { project, phase } => {
            commands::checkpoint::hierarchy(&root, &project, &phase)
        }
        Commands::Verify { project } => commands::verify::run(&root, &project),
        Commands::Prune {
            project,
            phase,
            keep,
        } => commands::backup::prune(&root, &project, &phase, keep),
        Commands::Rename { project, title } => commands::project::rename(&root, &project, &title),
    };

    if let Err(err) = &result {
        if let Some(hint) = err
            .downcast_ref::<PhaseLogError>()
            .and_then(PhaseLogError::recovery_suggestion)
        {
            eprintln!("hint: {}", hint);
        }
    }
    result
}
