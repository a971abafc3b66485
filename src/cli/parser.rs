//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Local-first context capture, indexing, and retrieval for AI
/// coding-assistant sessions.
#[derive(Parser, Debug)]
#[command(
    name = "memory-bank",
    version,
    about = "Local-first context capture, indexing, and retrieval for AI coding-assistant sessions",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Store root directory. Defaults to `.memory-bank` under the
    /// current directory.
    #[arg(short, long, env = "MEMORY_BANK_ROOT")]
    pub root: Option<PathBuf>,

    /// Output format: `text`, `json`, or `ndjson`.
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Resolves the effective store root: the explicit flag/env value,
    /// or `./.memory-bank`.
    #[must_use]
    pub fn get_root(&self) -> PathBuf {
        self.root
            .clone()
            .unwrap_or_else(|| PathBuf::from(".memory-bank"))
    }
}

/// Hook subcommand actions.
#[derive(Subcommand, Debug)]
pub enum HooksAction {
    /// Installs the Stop-event hook into the host agent's settings.
    Install,
    /// Removes the Stop-event hook from the host agent's settings.
    Uninstall,
    /// Reports whether the hook is currently installed.
    Status,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initializes a store at the resolved root.
    Init {
        /// Reinitializes even if a store already exists at the root.
        #[arg(long)]
        force: bool,
    },

    /// Manages Stop-event hook installation into the host agent.
    Hooks {
        #[command(subcommand)]
        action: HooksAction,
    },

    /// Handles one Stop-event invocation: reads a JSON document from
    /// stdin (`transcript_path`, `session_id`, `cwd`) and ingests the
    /// named transcript. Always exits 0.
    Hook,

    /// Imports a structured transcript file as a new session.
    Import {
        /// Path to the transcript file.
        path: PathBuf,
    },

    /// Lists sessions recorded in the store.
    Sessions,

    /// Deletes a session by id.
    Delete {
        /// Session id to delete.
        id: String,
    },

    /// Wraps a child process in a pseudo-terminal, capturing its
    /// session. Named in the command surface; its PTY collaborator is
    /// out of scope.
    Run {
        /// Command and arguments to run, after `--`.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Searches indexed chunks by semantic similarity.
    Search {
        /// Query text.
        query: String,
        /// Number of results to return.
        #[arg(long, default_value_t = 10)]
        top_k: usize,
        /// Restrict results to one source type (`session`, `plan`,
        /// `todo`, `task`).
        #[arg(long)]
        source_type: Option<String>,
        /// Restrict results to one session id.
        #[arg(long)]
        session: Option<String>,
        /// Disables temporal decay scoring.
        #[arg(long)]
        no_decay: bool,
        /// Searches across every project registered in the global
        /// registry, not just the resolved root.
        #[arg(long)]
        global: bool,
    },

    /// Visualizes session/episode relationships. Named in the command
    /// surface; not implemented.
    Graph,

    /// Assembles a token-budgeted context pack.
    Pack {
        /// Pack mode: `auto`, `debug`, `build`, or `explore`.
        #[arg(long, default_value = "auto")]
        mode: String,
        /// Total token budget.
        #[arg(long, default_value_t = 4000)]
        budget: usize,
        /// Render format: `xml`, `json`, or `markdown`.
        #[arg(long, default_value = "xml")]
        pack_format: String,
    },

    /// Re-applies a schema migration to the store's config.
    Migrate,

    /// Rebuilds the vector index from scratch.
    Reindex,

    /// Lists every project registered in the global registry.
    Projects,
}
