//! CLI struct definitions for the tessera command-line interface.
//!
//! All clap-derived types live here. Dispatch lives in `lib.rs`.

use crate::core::store::{Mode, Scope, StoreSource, TrackKind};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "tessera",
    version = env!("CARGO_PKG_VERSION"),
    about = "Materialize layered stores of shared files into monorepo workspaces, with an ownership ledger, conflict planning, and drift diffs."
)]
pub(crate) struct Cli {
    #[clap(flatten)]
    pub global: GlobalArgs,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(clap::Args, Debug)]
pub(crate) struct GlobalArgs {
    /// Tessera home directory (defaults to $TESSERA_HOME, then ~/.tessera).
    #[clap(long, global = true)]
    pub home: Option<PathBuf>,
    /// Workspace directory inside the repository (defaults to the repository root).
    #[clap(long, short = 'w', global = true)]
    pub workspace: Option<PathBuf>,
    /// Output format.
    #[clap(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,
    /// Debug logging to stderr.
    #[clap(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

#[derive(clap::Args, Debug, Clone)]
pub(crate) struct StoreSelector {
    /// Store ID (defaults to the active store).
    #[clap(long, short = 's')]
    pub store: Option<String>,
    /// Catalog scope when the ID exists in both: 'global' or 'component'.
    #[clap(long)]
    pub scope: Option<Scope>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Materialize the active (or named) store into the workspace
    #[clap(name = "apply")]
    Apply {
        #[clap(flatten)]
        target: StoreSelector,
        /// 'symlink' or 'copy'.
        #[clap(long)]
        mode: Option<Mode>,
        /// Resolve conflicts by replacing whatever occupies the path.
        #[clap(long)]
        force: bool,
        /// Print the plan without touching the workspace.
        #[clap(long)]
        dry_run: bool,
    },

    /// Remove everything the active store materialized
    #[clap(name = "unapply")]
    Unapply {
        #[clap(long)]
        force: bool,
    },

    /// Auxiliary stores applied alongside the active store
    #[clap(name = "stack")]
    Stack(StackCli),

    /// Declare paths as managed by a store
    #[clap(name = "track")]
    Track {
        #[clap(required = true)]
        paths: Vec<String>,
        #[clap(flatten)]
        target: StoreSelector,
        /// 'file' or 'directory' (inferred from disk when omitted).
        #[clap(long)]
        kind: Option<TrackKind>,
        #[clap(long)]
        role: Option<String>,
        #[clap(long)]
        description: Option<String>,
        #[clap(long)]
        origin: Option<String>,
    },

    /// Remove path declarations from a store
    #[clap(name = "untrack")]
    Untrack {
        #[clap(required = true)]
        paths: Vec<String>,
        #[clap(flatten)]
        target: StoreSelector,
    },

    /// Capture workspace content of declared paths into the active store
    #[clap(name = "commit")]
    Commit {
        /// Declared paths to capture (all when omitted; prunes undeclared overlay entries).
        paths: Vec<String>,
    },

    /// Compare workspace content against the store overlay
    #[clap(name = "diff")]
    Diff {
        paths: Vec<String>,
        #[clap(flatten)]
        target: StoreSelector,
        /// List changed files only, without unified diffs.
        #[clap(long)]
        name_only: bool,
        /// Exit with an error when drift is found.
        #[clap(long)]
        exit_code: bool,
    },

    /// Show the workspace record and ledger health
    #[clap(name = "status")]
    Status,

    /// Select the active store without applying it
    #[clap(name = "use")]
    Use {
        id: String,
        #[clap(long)]
        scope: Option<Scope>,
        /// Switch even while another store is applied.
        #[clap(long)]
        force: bool,
    },

    /// Create, update, inspect, and delete stores
    #[clap(name = "store")]
    Store(StoreCli),

    /// Inspect and delete workspace records
    #[clap(name = "workspace")]
    Workspace(WorkspaceCli),

    /// Delete stale workspace records
    #[clap(name = "prune")]
    Prune {
        #[clap(long)]
        dry_run: bool,
    },
}

#[derive(clap::Args, Debug)]
pub(crate) struct StackCli {
    #[clap(subcommand)]
    pub command: StackCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum StackCommand {
    /// List stack entries, lowest precedence first
    List,
    /// Push a store onto the stack
    Add {
        id: String,
        #[clap(long)]
        scope: Option<Scope>,
    },
    /// Remove the top of the stack
    Pop {
        #[clap(long)]
        force: bool,
    },
    /// Empty the stack
    Clear {
        #[clap(long)]
        force: bool,
    },
    /// Materialize every stack entry
    Apply {
        #[clap(long)]
        mode: Option<Mode>,
        #[clap(long)]
        force: bool,
        #[clap(long)]
        dry_run: bool,
    },
    /// Remove everything stack entries materialized
    Unapply {
        #[clap(long)]
        force: bool,
    },
}

#[derive(clap::Args, Debug, Clone, Default)]
pub(crate) struct StoreMetaArgs {
    #[clap(long)]
    pub name: Option<String>,
    #[clap(long)]
    pub description: Option<String>,
    /// 'human', 'agent', or 'other'.
    #[clap(long)]
    pub source: Option<StoreSource>,
    #[clap(long = "type")]
    pub category: Option<String>,
    #[clap(long)]
    pub owner: Option<String>,
    #[clap(long)]
    pub task_id: Option<String>,
    #[clap(long)]
    pub parent_task_id: Option<String>,
    #[clap(long)]
    pub priority: Option<String>,
    #[clap(long)]
    pub status: Option<String>,
}

#[derive(clap::Args, Debug)]
pub(crate) struct StoreCli {
    #[clap(subcommand)]
    pub command: StoreCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum StoreCommand {
    /// Create an empty store
    Create {
        id: String,
        #[clap(long)]
        scope: Option<Scope>,
        #[clap(flatten)]
        meta: StoreMetaArgs,
    },
    /// Update store metadata
    Update {
        id: String,
        #[clap(long)]
        scope: Option<Scope>,
        #[clap(flatten)]
        meta: StoreMetaArgs,
    },
    /// List stores in every visible catalog
    List {
        #[clap(long)]
        scope: Option<Scope>,
        #[clap(long)]
        status: Option<String>,
    },
    /// Show metadata, tracked paths, and referencing workspaces
    Describe {
        id: String,
        #[clap(long)]
        scope: Option<Scope>,
    },
    /// Delete a store and scrub it from every workspace record
    Delete {
        id: String,
        #[clap(long)]
        scope: Option<Scope>,
    },
}

#[derive(clap::Args, Debug)]
pub(crate) struct WorkspaceCli {
    #[clap(subcommand)]
    pub command: WorkspaceCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum WorkspaceCommand {
    /// List recorded workspaces
    List,
    /// Show a workspace record (the current one by default)
    Describe { id: Option<String> },
    /// Delete a workspace record (files are left in place)
    Delete { id: Option<String> },
}
