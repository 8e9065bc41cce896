//! # Plan Harness CLI (`plan`)
//!
//! Turns coaching documents into structured training plans and enriches
//! their sessions.
//!
//! ## Usage
//!
//! ```bash
//! plan --config ./config/plan.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `plan init` | Create the SQLite database and run migrations |
//! | `plan ingest <file>` | Store a document and assemble its plan |
//! | `plan reprocess <document-id>` | Check, repair and reassemble a stored document |
//! | `plan plans` | List plans (latest versions) |
//! | `plan show <plan-id>` | Print a plan |
//! | `plan enhance <plan-id>` | Enrich a plan's sessions |
//! | `plan check <document-id>` | Run the integrity checker |
//! | `plan patterns <format>` | Inspect the pattern library |
//! | `plan completions <shell>` | Generate shell completions |
//!
//! Logging goes to stderr, filtered by `PLAN_LOG` (default `info`).

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use plan_harness::enhance_cmd::EnhanceOptions;
use plan_harness::{config, enhance_cmd, ingest, integrity, logging, migrate, patterns, plans};

/// Plan Harness: coaching documents in, structured training plans out.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means all defaults.
#[derive(Parser)]
#[command(
    name = "plan",
    about = "Plan Harness: turn coaching documents into structured, versioned training plans",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/plan.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database. Safe to run repeatedly.
    Init,

    /// Store a document and assemble a training plan from it.
    Ingest {
        /// Path to the document (.docx, .xlsx, .pptx, .pdf, .csv, .txt).
        file: PathBuf,

        /// Declared mime type. Guessed from the extension when omitted.
        #[arg(long)]
        mime: Option<String>,
    },

    /// Check a stored document, repair its metadata, and assemble a new
    /// plan version.
    Reprocess {
        /// Document id printed by `plan ingest`.
        document_id: String,
    },

    /// List plans (latest version of each).
    Plans,

    /// Print a plan.
    Show {
        plan_id: String,

        /// Show a specific version instead of the latest.
        #[arg(long)]
        version: Option<u32>,

        /// Print the stored JSON record.
        #[arg(long)]
        json: bool,
    },

    /// Enrich a plan's sessions with coaching content.
    Enhance {
        plan_id: String,

        /// Only sessions in this week.
        #[arg(long)]
        week: Option<u32>,

        /// Only this session id (e.g. `w2-s1`).
        #[arg(long)]
        session: Option<String>,

        /// Override the configured policy: local-first, remote-first, balanced.
        #[arg(long)]
        policy: Option<String>,

        /// Override the plan's age group: youth, teen, adult, masters.
        #[arg(long)]
        age_group: Option<String>,

        /// Print the records as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Verify a stored document's metadata and payload.
    Check {
        document_id: String,

        /// Fill in missing timestamps, platform tags and checksums.
        #[arg(long)]
        repair: bool,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show stored fingerprints and hints for a format.
    Patterns {
        /// docx, xlsx, pptx, csv, text or pdf.
        format: String,
    },

    /// Generate shell completions.
    Completions {
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "plan", &mut std::io::stdout());
        return Ok(());
    }

    logging::init_logger();

    let cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        config::Config::minimal()
    };

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { file, mime } => {
            ingest::run_ingest(&cfg, &file, mime.as_deref()).await?;
        }
        Commands::Reprocess { document_id } => {
            ingest::run_reprocess(&cfg, &document_id).await?;
        }
        Commands::Plans => {
            plans::run_plans(&cfg).await?;
        }
        Commands::Show {
            plan_id,
            version,
            json,
        } => {
            plans::run_show(&cfg, &plan_id, version, json).await?;
        }
        Commands::Enhance {
            plan_id,
            week,
            session,
            policy,
            age_group,
            json,
        } => {
            let options = EnhanceOptions {
                week,
                session,
                policy,
                age_group,
                json,
            };
            enhance_cmd::run_enhance(&cfg, &plan_id, options).await?;
        }
        Commands::Check {
            document_id,
            repair,
            json,
        } => {
            integrity::run_check(&cfg, &document_id, repair, json).await?;
        }
        Commands::Patterns { format } => {
            patterns::run_patterns(&cfg, &format).await?;
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
