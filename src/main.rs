//! # Context Assistant CLI (`cassist`)
//!
//! ## Usage
//!
//! ```bash
//! cassist --config ./config/cassist.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cassist init` | Create the SQLite database and tables |
//! | `cassist reset --yes` | Drop all data and recreate the schema |
//! | `cassist bootstrap` | Create the `[[profiles]]` from the config file |
//! | `cassist context add <file>` | Embed a document and store it as a context |
//! | `cassist context show/list/delete` | Inspect or remove stored contexts |
//! | `cassist profile create/show/list/delete` | Manage assistant profiles |
//! | `cassist ask <profile> "<message>"` | Ask a profile one question |
//! | `cassist serve` | Start the HTTP server |

use anyhow::bail;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use context_assistant::profile_cmd::NewProfile;
use context_assistant::sqlite_store::SqliteContextStore;
use context_assistant::{ask, config, context_cmd, profile_cmd, server};
use context_assistant_core::context::DEFAULT_EMBEDDING_MODEL;
use context_assistant_core::store::ContextStore;

/// Context Assistant CLI — retrieval-augmented chat profiles over a local
/// context embedding store.
#[derive(Parser)]
#[command(
    name = "cassist",
    about = "Context Assistant — retrieval-augmented chat profiles over a local context embedding store",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cassist.toml")]
    config: PathBuf,

    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: existing tables and data are left alone.
    Init,

    /// Drop every table and index artifact, then recreate the schema.
    Reset {
        /// Confirm that all stored contexts and profiles should be destroyed.
        #[arg(long)]
        yes: bool,
    },

    /// Create the profiles listed under `[[profiles]]` in the config file.
    ///
    /// Profiles that already exist are skipped. Documents that fail to
    /// load are logged and left out.
    Bootstrap {
        /// Reset the database before creating profiles.
        #[arg(long)]
        reset: bool,
    },

    /// Manage stored contexts.
    Context {
        #[command(subcommand)]
        action: ContextAction,
    },

    /// Manage assistant profiles.
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Ask a profile one question and print the reply.
    Ask {
        /// Profile name.
        profile: String,
        /// The question.
        message: String,
        /// Skip retrieval and send the message with the initial context only.
        #[arg(long)]
        no_augment: bool,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Print shell completions.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum ContextAction {
    /// Embed a document (.txt, .md, .docx, .pdf) and store it.
    Add {
        path: PathBuf,
        /// Context name (defaults to the file stem).
        #[arg(long)]
        name: Option<String>,
        /// Embedding model.
        #[arg(long, default_value = DEFAULT_EMBEDDING_MODEL)]
        model: String,
    },
    /// Show one context.
    Show {
        name: String,
        /// Also print a preview of every chunk.
        #[arg(long)]
        chunks: bool,
    },
    /// List stored contexts.
    List,
    /// Delete a context, its chunks and its profile associations.
    Delete { name: String },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Create a profile from stored contexts.
    Create {
        name: String,
        /// Chat model.
        #[arg(long)]
        model: String,
        /// Embedding model used for queries.
        #[arg(long, default_value = DEFAULT_EMBEDDING_MODEL)]
        embedding_model: String,
        /// System prompt.
        #[arg(long)]
        initial_role: String,
        /// Instruction prepended to every question.
        #[arg(long, default_value = "")]
        initial_context: String,
        /// Stored context to attach (repeatable).
        #[arg(long = "context")]
        contexts: Vec<String>,
    },
    /// List profiles (name and model).
    List,
    /// Show one profile and its contexts.
    Show { name: String },
    /// Delete a profile. Its contexts are kept.
    Delete { name: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Commands that don't require config
    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(
            *shell,
            &mut Cli::command(),
            "cassist",
            &mut std::io::stdout(),
        );
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let store = SqliteContextStore::open(&cfg).await?;
            store.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Reset { yes } => {
            if !yes {
                bail!("reset destroys all contexts and profiles; pass --yes to confirm");
            }
            let store = SqliteContextStore::open(&cfg).await?;
            store.initialize_schema().await?;
            store.close().await;
            println!("Database reset.");
        }
        Commands::Bootstrap { reset } => {
            ask::run_bootstrap(&cfg, &cli.config, reset).await?;
        }
        Commands::Context { action } => match action {
            ContextAction::Add { path, name, model } => {
                context_cmd::run_context_add(&cfg, &path, name.as_deref(), &model).await?;
            }
            ContextAction::Show { name, chunks } => {
                context_cmd::run_context_show(&cfg, &name, chunks).await?;
            }
            ContextAction::List => {
                context_cmd::run_context_list(&cfg).await?;
            }
            ContextAction::Delete { name } => {
                context_cmd::run_context_delete(&cfg, &name).await?;
            }
        },
        Commands::Profile { action } => match action {
            ProfileAction::Create {
                name,
                model,
                embedding_model,
                initial_role,
                initial_context,
                contexts,
            } => {
                profile_cmd::run_profile_create(
                    &cfg,
                    NewProfile {
                        name: &name,
                        model: &model,
                        embedding_model: &embedding_model,
                        initial_role: &initial_role,
                        initial_context: &initial_context,
                        contexts: &contexts,
                    },
                )
                .await?;
            }
            ProfileAction::List => {
                profile_cmd::run_profile_list(&cfg).await?;
            }
            ProfileAction::Show { name } => {
                profile_cmd::run_profile_show(&cfg, &name).await?;
            }
            ProfileAction::Delete { name } => {
                profile_cmd::run_profile_delete(&cfg, &name).await?;
            }
        },
        Commands::Ask {
            profile,
            message,
            no_augment,
        } => {
            ask::run_ask(&cfg, &profile, &message, !no_augment).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
