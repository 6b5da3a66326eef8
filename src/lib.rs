//! Tessera: workspace overlays for monorepos
//!
//! **Tessera materializes layered stores of shared files into workspaces.**
//!
//! A *store* is a named collection of declared paths plus an overlay tree
//! holding their content. Applying a store links (or copies) that content into
//! a workspace and records every materialized path in the workspace's
//! ownership ledger, so a later unapply removes exactly what was put there.
//!
//! # Architecture
//!
//! ## Two catalogs
//!
//! - **Global** (`~/.tessera/stores/`): shared by every repository
//! - **Component** (`<repo>/.tessera/stores/`): present only when the
//!   repository has a `.tessera/` directory
//!
//! ## Workspace records
//!
//! `~/.tessera/workspaces/<id>.json`, keyed by a hash of the repository
//! fingerprint and the workspace sub-path. Each record holds the active
//! store, the auxiliary stack, and the path ledger.
//!
//! ## The planner
//!
//! Every apply goes through [`engine::plan::plan`], a pure function that turns
//! the ledger and the stores' manifests into ordered operations or conflicts.
//! Nothing touches disk while conflicts remain, unless forced.
//!
//! # Examples
//!
//! ```bash
//! tessera store create editor-config --scope global
//! tessera use editor-config
//! tessera track .editorconfig .vscode
//! tessera commit
//! tessera apply --dry-run
//! tessera apply
//! tessera diff
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: data model, errors, config, persistence, filesystem helpers
//! - [`engine`]: catalogs, planner, executor, stack, track/commit, drift

pub mod core;
pub mod engine;

mod cli;

use cli::{
    Cli, Command, OutputFormat, StackCommand, StoreCommand, StoreMetaArgs, StoreSelector,
    WorkspaceCommand,
};
use crate::core::error::TesseraError;
use crate::core::output::{compact_line, error_envelope, preview_items, success_envelope};
use crate::core::{logging, store::StoreMeta};
use crate::engine::admin::{self, CreateStoreRequest, StorePatch};
use crate::engine::commit::{self, CommitRequest};
use crate::engine::drift::{self, DiffRequest, DriftStatus, PathHealth};
use crate::engine::execute::{self, ApplyRequest, ApplyResult, UnapplyRequest, UnapplyResult};
use crate::engine::plan::OpKind;
use crate::engine::stack::{self, StackApplyRequest, StackEntry};
use crate::engine::state::WorkspaceState;
use crate::engine::track::{self, TrackRequest, UntrackRequest};
use crate::engine::{Engine, EngineOptions};

use clap::Parser;
use colored::Colorize;
use serde::Serialize;

pub fn run() -> Result<(), TesseraError> {
    let cli = Cli::parse();
    logging::init(cli.global.verbose);
    let format = cli.global.format;
    let cmd = command_name(&cli.command);

    let result = open_engine(&cli).and_then(|engine| dispatch(&engine, cli.command, format));
    if let Err(e) = &result {
        if format == OutputFormat::Json {
            println!("{}", pretty(&error_envelope(cmd, e)));
        }
    }
    result
}

fn open_engine(cli: &Cli) -> Result<Engine, TesseraError> {
    Engine::open(EngineOptions {
        cwd: std::env::current_dir()?,
        home: cli.global.home.clone(),
        workspace: cli.global.workspace.clone(),
    })
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Apply { .. } => "apply",
        Command::Unapply { .. } => "unapply",
        Command::Stack(s) => match s.command {
            StackCommand::List => "stack.list",
            StackCommand::Add { .. } => "stack.add",
            StackCommand::Pop { .. } => "stack.pop",
            StackCommand::Clear { .. } => "stack.clear",
            StackCommand::Apply { .. } => "stack.apply",
            StackCommand::Unapply { .. } => "stack.unapply",
        },
        Command::Track { .. } => "track",
        Command::Untrack { .. } => "untrack",
        Command::Commit { .. } => "commit",
        Command::Diff { .. } => "diff",
        Command::Status => "status",
        Command::Use { .. } => "use",
        Command::Store(s) => match s.command {
            StoreCommand::Create { .. } => "store.create",
            StoreCommand::Update { .. } => "store.update",
            StoreCommand::List { .. } => "store.list",
            StoreCommand::Describe { .. } => "store.describe",
            StoreCommand::Delete { .. } => "store.delete",
        },
        Command::Workspace(w) => match w.command {
            WorkspaceCommand::List => "workspace.list",
            WorkspaceCommand::Describe { .. } => "workspace.describe",
            WorkspaceCommand::Delete { .. } => "workspace.delete",
        },
        Command::Prune { .. } => "prune",
    }
}

fn dispatch(engine: &Engine, command: Command, format: OutputFormat) -> Result<(), TesseraError> {
    let cmd = command_name(&command);
    let emit = |payload: &dyn erased::Payload, text: &dyn Fn()| -> Result<(), TesseraError> {
        match format {
            OutputFormat::Json => {
                println!("{}", pretty(&payload.envelope(cmd)?));
            }
            OutputFormat::Text => text(),
        }
        Ok(())
    };

    match command {
        Command::Apply {
            target: StoreSelector { store, scope },
            mode,
            force,
            dry_run,
        } => {
            let res = execute::apply(
                engine,
                ApplyRequest {
                    store,
                    scope,
                    mode,
                    force,
                    dry_run,
                },
            )?;
            emit(&res, &|| print_apply(&res))
        }
        Command::Unapply { force } => {
            let res = execute::unapply(engine, UnapplyRequest { force })?;
            emit(&res, &|| print_unapply(&res))
        }
        Command::Stack(stack_cli) => match stack_cli.command {
            StackCommand::List => {
                let entries = stack::stack_list(engine)?;
                emit(&entries, &|| print_stack(&entries))
            }
            StackCommand::Add { id, scope } => {
                let entries = stack::stack_add(engine, &id, scope)?;
                emit(&entries, &|| print_stack(&entries))
            }
            StackCommand::Pop { force } => {
                let popped = stack::stack_pop(engine, force)?;
                emit(&popped, &|| match &popped {
                    Some(id) => println!("{} {}", "popped".bright_green().bold(), id),
                    None => println!("stack is empty"),
                })
            }
            StackCommand::Clear { force } => {
                let cleared = stack::stack_clear(engine, force)?;
                emit(&cleared, &|| {
                    println!(
                        "{} {} store(s)",
                        "cleared".bright_green().bold(),
                        cleared.len()
                    )
                })
            }
            StackCommand::Apply {
                mode,
                force,
                dry_run,
            } => {
                let res = stack::stack_apply(
                    engine,
                    StackApplyRequest {
                        mode,
                        force,
                        dry_run,
                    },
                )?;
                emit(&res, &|| print_apply(&res))
            }
            StackCommand::Unapply { force } => {
                let res = stack::stack_unapply(engine, force)?;
                emit(&res, &|| print_unapply(&res))
            }
        },
        Command::Track {
            paths,
            target: StoreSelector { store, scope },
            kind,
            role,
            description,
            origin,
        } => {
            let res = track::track(
                engine,
                TrackRequest {
                    paths,
                    store,
                    scope,
                    kind,
                    role,
                    description,
                    origin,
                },
            )?;
            emit(&res, &|| {
                for p in &res.added {
                    println!("{} {}", "+ tracked".bright_green(), p);
                }
                for p in &res.existing {
                    println!("{} {}", "= already tracked".dimmed(), p);
                }
                println!("store: {}", res.store);
            })
        }
        Command::Untrack {
            paths,
            target: StoreSelector { store, scope },
        } => {
            let res = track::untrack(engine, UntrackRequest { paths, store, scope })?;
            emit(&res, &|| {
                for p in &res.removed {
                    println!("{} {}", "- untracked".bright_yellow(), p);
                }
                if !res.unmatched.is_empty() {
                    println!(
                        "{} {}",
                        "not tracked:".dimmed(),
                        preview_items(&res.unmatched, 8)
                    );
                }
                println!("store: {}", res.store);
            })
        }
        Command::Commit { paths } => {
            let res = commit::commit(engine, CommitRequest { paths })?;
            emit(&res, &|| {
                for p in &res.captured {
                    println!("{} {}", "captured".bright_green(), p);
                }
                for (label, items) in [
                    ("linked", &res.linked),
                    ("missing", &res.missing),
                    ("owned elsewhere", &res.foreign),
                    ("pruned", &res.pruned),
                ] {
                    if !items.is_empty() {
                        println!("{} {}", format!("{}:", label).dimmed(), preview_items(items, 8));
                    }
                }
                println!("store: {}", res.store);
            })
        }
        Command::Diff {
            paths,
            target: StoreSelector { store, scope },
            name_only,
            exit_code,
        } => {
            let res = drift::diff(
                engine,
                DiffRequest {
                    paths,
                    store,
                    scope,
                    patch: !name_only,
                },
            )?;
            emit(&res, &|| {
                for f in &res.files {
                    let tag = match f.status {
                        DriftStatus::Unchanged => continue,
                        DriftStatus::Added => "A".bright_green(),
                        DriftStatus::Removed => "D".bright_red(),
                        DriftStatus::Modified => "M".bright_yellow(),
                    };
                    match &f.diff {
                        Some(d) => print!("{}", d.render()),
                        None => println!("{} {}", tag, f.path),
                    }
                }
                if !res.has_drift() {
                    println!("no drift against {}", res.store);
                }
            })?;
            if exit_code && res.has_drift() {
                return Err(TesseraError::ValidationError(format!(
                    "workspace drifted from store '{}'",
                    res.store.id
                )));
            }
            Ok(())
        }
        Command::Status => {
            let res = drift::status(engine)?;
            emit(&res, &|| {
                println!("workspace: {} ({})", res.workspace_root, res.workspace_id);
                if !res.recorded {
                    println!("{}", "no workspace record".dimmed());
                    return;
                }
                let active = res
                    .active_store
                    .as_ref()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let applied = if res.applied {
                    "applied".bright_green()
                } else {
                    "not applied".dimmed()
                };
                println!("active:    {} [{}, {}]", active.bold(), res.mode, applied);
                if !res.stack.is_empty() {
                    println!("stack:     {}", res.stack.join(" < "));
                }
                for (store, n) in &res.owned_per_store {
                    println!("  {:<24} {} path(s)", store, n);
                }
                for p in res.unhealthy() {
                    let label = match p.health {
                        PathHealth::Missing => "missing".bright_red(),
                        PathHealth::TypeChanged => "type changed".bright_yellow(),
                        PathHealth::Drifted => "drifted".bright_yellow(),
                        PathHealth::Ok => continue,
                    };
                    println!("  {} {} ({})", label, p.path, p.store);
                }
            })
        }
        Command::Use { id, scope, force } => {
            let state = admin::use_store(engine, &id, scope, force)?;
            emit(&state, &|| {
                println!(
                    "{} {}",
                    "active store".bright_green().bold(),
                    state.active_store.as_deref().unwrap_or_default()
                )
            })
        }
        Command::Store(store_cli) => match store_cli.command {
            StoreCommand::Create { id, scope, meta } => {
                let StoreMetaArgs {
                    name,
                    description,
                    source,
                    category,
                    owner,
                    task_id,
                    parent_task_id,
                    priority,
                    status,
                } = meta;
                let created = admin::create_store(
                    engine,
                    CreateStoreRequest {
                        id: id.clone(),
                        scope,
                        name,
                        description,
                        source,
                        category,
                        owner,
                        task_id,
                        parent_task_id,
                        priority,
                        status,
                    },
                )?;
                emit(&created, &|| {
                    println!(
                        "{} {}:{}",
                        "created".bright_green().bold(),
                        created.scope,
                        id
                    )
                })
            }
            StoreCommand::Update { id, scope, meta } => {
                let updated = admin::update_store(engine, &id, scope, patch_from(meta))?;
                emit(&updated, &|| print_meta(&id, &updated))
            }
            StoreCommand::List { scope, status } => {
                let stores = admin::list_stores(engine, scope, status.as_deref())?;
                emit(&stores, &|| {
                    if stores.is_empty() {
                        println!("no stores");
                    }
                    for s in &stores {
                        println!(
                            "{:<10} {:<28} {:>3} tracked  {}",
                            s.scope.as_str().dimmed(),
                            s.id.bold(),
                            s.tracked,
                            compact_line(s.meta.description.as_deref().unwrap_or(""), 60)
                        );
                    }
                })
            }
            StoreCommand::Describe { id, scope } => {
                let desc = admin::describe_store(engine, &id, scope)?;
                emit(&desc, &|| {
                    print_meta(&desc.store.to_string(), &desc.meta);
                    println!("overlay:   {}", desc.overlay_root);
                    for t in &desc.tracked {
                        println!("  {:<9} {}", format!("{:?}", t.kind).to_lowercase(), t.path);
                    }
                    if !desc.workspaces.is_empty() {
                        println!("workspaces: {}", preview_items(&desc.workspaces, 5));
                    }
                })
            }
            StoreCommand::Delete { id, scope } => {
                let res = admin::delete_store(engine, &id, scope)?;
                emit(&res, &|| {
                    println!(
                        "{} {} ({} workspace record(s) updated, {} ledger entr(ies) dropped)",
                        "deleted".bright_red().bold(),
                        res.store,
                        res.workspaces_updated.len(),
                        res.ledger_entries_dropped
                    )
                })
            }
        },
        Command::Workspace(ws_cli) => match ws_cli.command {
            WorkspaceCommand::List => {
                let states = admin::list_workspaces(engine)?;
                emit(&states, &|| {
                    for s in &states {
                        print_workspace_line(s);
                    }
                })
            }
            WorkspaceCommand::Describe { id } => {
                let state = admin::describe_workspace(engine, id.as_deref())?;
                emit(&state, &|| {
                    print_workspace_line(&state);
                    for (path, owner) in &state.paths {
                        println!("  {:<8} {:<24} {}", owner.kind, owner.store, path);
                    }
                })
            }
            WorkspaceCommand::Delete { id } => {
                let deleted = admin::delete_workspace(engine, id.as_deref())?;
                emit(&deleted, &|| {
                    println!("{} {}", "deleted".bright_red().bold(), deleted)
                })
            }
        },
        Command::Prune { dry_run } => {
            let pruned = admin::prune(engine, dry_run)?;
            emit(&pruned, &|| {
                let verb = if dry_run { "would prune" } else { "pruned" };
                for p in &pruned {
                    println!("{} {} ({})", verb.bright_yellow(), p.workspace_root, p.reason);
                }
                if pruned.is_empty() {
                    println!("nothing to prune");
                }
            })
        }
    }
}

fn patch_from(meta: StoreMetaArgs) -> StorePatch {
    StorePatch {
        name: meta.name,
        description: meta.description,
        source: meta.source,
        category: meta.category,
        owner: meta.owner,
        task_id: meta.task_id,
        parent_task_id: meta.parent_task_id,
        priority: meta.priority,
        status: meta.status,
    }
}

fn print_apply(res: &ApplyResult) {
    let header = if res.dry_run { "plan" } else { "applied" };
    let stores = res
        .stores
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    println!("{} {} [{}]", header.bright_green().bold(), stores, res.mode);
    let ops = if res.dry_run {
        &res.plan.operations
    } else {
        &res.applied
    };
    for op in ops {
        let verb = match op.kind {
            OpKind::Remove => "remove".bright_red(),
            OpKind::CreateSymlink => "link".bright_green(),
            OpKind::Copy => "copy".bright_green(),
        };
        println!("  {:<7} {} ({})", verb, op.rel_path, op.store);
    }
    for c in &res.plan.conflicts {
        println!(
            "  {} {} [{}]",
            "forced".bright_yellow(),
            c.path,
            c.stores.join(", ")
        );
    }
    if !res.plan.skipped.is_empty() {
        println!(
            "  {} {}",
            "no content:".dimmed(),
            preview_items(&res.plan.skipped, 8)
        );
    }
    if ops.is_empty() {
        println!("  up to date");
    }
}

fn print_unapply(res: &UnapplyResult) {
    println!(
        "{} {} path(s) from {}",
        "removed".bright_yellow().bold(),
        res.removed.len(),
        res.stores.join(", ")
    );
    if res.state_deleted {
        println!("  workspace record deleted");
    }
}

fn print_stack(entries: &[StackEntry]) {
    if entries.is_empty() {
        println!("stack is empty");
    }
    for e in entries {
        println!("  {:>2}. {} ({} owned)", e.position, e.store, e.owned_paths);
    }
}

fn print_meta(label: &str, meta: &StoreMeta) {
    println!("{} {}", "store".bold(), label);
    println!("name:      {}", meta.name);
    let fields = [
        ("description", &meta.description),
        ("type", &meta.category),
        ("owner", &meta.owner),
        ("task", &meta.task_id),
        ("parent", &meta.parent_task_id),
        ("priority", &meta.priority),
        ("status", &meta.status),
    ];
    for (name, value) in fields {
        if let Some(v) = value {
            println!("{:<10} {}", format!("{}:", name), compact_line(v, 100));
        }
    }
}

fn print_workspace_line(state: &WorkspaceState) {
    println!(
        "{}  {}  active={} paths={}{}",
        state.workspace_id.dimmed(),
        state.workspace_root().display(),
        state.active_store.as_deref().unwrap_or("-"),
        state.paths.len(),
        if state.applied { " applied" } else { "" }
    );
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

mod erased {
    use super::*;

    /// Object-safe wrapper so one closure can emit any serializable result.
    pub trait Payload {
        fn envelope(&self, cmd: &str) -> Result<serde_json::Value, TesseraError>;
    }

    impl<T: Serialize> Payload for T {
        fn envelope(&self, cmd: &str) -> Result<serde_json::Value, TesseraError> {
            success_envelope(cmd, self)
        }
    }
}
