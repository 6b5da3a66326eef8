#[path = "../common/mod.rs"]
mod common;

use common::{Fixture, is_symlink, seed_store};
use std::fs;
use tessera::core::error::TesseraError;
use tessera::core::store::Mode;
use tessera::engine::admin;
use tessera::engine::execute::{self, ApplyRequest, UnapplyRequest};
use tessera::engine::plan::OpKind;
use tessera::engine::stack;
use tessera::engine::track::{self, UntrackRequest};

fn apply_active(engine: &tessera::engine::Engine) -> execute::ApplyResult {
    execute::apply(engine, ApplyRequest::default()).expect("apply succeeds")
}

#[test]
fn apply_links_declared_paths_and_is_idempotent() {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed_store(&engine, "base", &[("a.txt", "A"), ("conf/b.toml", "B")]);
    admin::use_store(&engine, "base", None, false).unwrap();

    let first = apply_active(&engine);
    assert_eq!(first.applied.len(), 2);
    assert!(first.applied.iter().all(|op| op.kind == OpKind::CreateSymlink));
    assert!(is_symlink(&fx.path("a.txt")));
    assert_eq!(fx.read("a.txt"), "A");
    assert_eq!(fx.read("conf/b.toml"), "B");

    let state = engine.load_state().unwrap().unwrap();
    assert!(state.applied);
    assert_eq!(state.mode, Mode::Symlink);
    assert_eq!(state.paths.len(), 2);
    assert_eq!(state.paths["a.txt"].store, "base");
    assert_eq!(state.applied_stores.len(), 1);

    let second = apply_active(&engine);
    assert!(second.plan.operations.is_empty());
    assert!(second.plan.conflicts.is_empty());
    assert!(second.applied.is_empty());
    let after = engine.load_state().unwrap().unwrap();
    assert_eq!(after.paths, state.paths);

    let ops: Vec<_> = engine
        .journal
        .events()
        .unwrap()
        .into_iter()
        .filter(|e| e.op == "apply")
        .collect();
    assert_eq!(ops.len(), 2);
    assert!(ops.iter().all(|e| e.status == "success"));
    assert_eq!(ops[0].store.as_deref(), Some("base"));
}

#[test]
fn dry_run_touches_neither_disk_nor_state() {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed_store(&engine, "base", &[("a.txt", "A")]);

    let res = execute::apply(
        &engine,
        ApplyRequest {
            store: Some("base".to_string()),
            dry_run: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert!(res.dry_run);
    assert_eq!(res.plan.count(OpKind::CreateSymlink), 1);
    assert!(res.applied.is_empty());
    assert!(!fx.path("a.txt").exists());
    assert!(engine.load_state().unwrap().is_none());
}

#[test]
fn unmanaged_file_blocks_apply_until_forced() {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed_store(&engine, "base", &[("a.txt", "A")]);
    fx.write("a.txt", "local edits");
    admin::use_store(&engine, "base", None, false).unwrap();

    match execute::apply(&engine, ApplyRequest::default()) {
        Err(TesseraError::Conflict { paths }) => assert_eq!(paths, vec!["a.txt"]),
        other => panic!("expected conflict, got {:?}", other.map(|r| r.applied)),
    }
    assert_eq!(fx.read("a.txt"), "local edits");
    assert!(engine.load_state().unwrap().unwrap().paths.is_empty());

    let dry = execute::apply(
        &engine,
        ApplyRequest {
            dry_run: true,
            ..Default::default()
        },
    );
    assert!(matches!(dry, Err(TesseraError::Conflict { .. })));

    let forced = execute::apply(
        &engine,
        ApplyRequest {
            force: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(forced.plan.conflicts.len(), 1);
    assert!(is_symlink(&fx.path("a.txt")));
    assert_eq!(fx.read("a.txt"), "A");
}

/// Apply `first` as the active store, then stack `second`; returns the conflict paths.
fn stacked_conflict(first: &str, second: &str) -> Vec<String> {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed_store(&engine, first, &[("shared.txt", first), ("own-first.txt", "1")]);
    seed_store(&engine, second, &[("shared.txt", second), ("own-second.txt", "2")]);
    admin::use_store(&engine, first, None, false).unwrap();
    apply_active(&engine);
    stack::stack_add(&engine, second, None).unwrap();

    let err = stack::stack_apply(&engine, Default::default()).unwrap_err();
    assert!(!fx.path("own-second.txt").exists());
    match err {
        TesseraError::Conflict { paths } => paths,
        other => panic!("expected conflict, got {other}"),
    }
}

#[test]
fn overlapping_stores_conflict_in_either_order() {
    assert_eq!(stacked_conflict("alpha", "beta"), vec!["shared.txt"]);
    assert_eq!(stacked_conflict("beta", "alpha"), vec!["shared.txt"]);
}

#[test]
fn unapply_removes_children_before_parents_and_drops_the_record() {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed_store(
        &engine,
        "base",
        &[("z.txt", "z"), ("a/d.txt", "d"), ("a/b/c.txt", "c")],
    );
    admin::use_store(&engine, "base", None, false).unwrap();
    apply_active(&engine);

    let res = execute::unapply(&engine, UnapplyRequest::default()).unwrap();
    assert_eq!(res.removed, vec!["a/b/c.txt", "a/d.txt", "z.txt"]);
    assert!(res.state_deleted);
    assert!(!fx.path("z.txt").exists());
    assert!(!fx.path("a/b/c.txt").exists());
    assert!(engine.load_state().unwrap().is_none());
}

#[test]
fn unapply_needs_a_record_and_apply_needs_a_store() {
    let fx = Fixture::new();
    let engine = fx.engine();
    assert!(matches!(
        execute::unapply(&engine, UnapplyRequest::default()),
        Err(TesseraError::StateMissing(_))
    ));
    assert!(matches!(
        execute::apply(&engine, ApplyRequest::default()),
        Err(TesseraError::NoActiveStore)
    ));
}

#[test]
fn switching_stores_retires_the_previous_paths() {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed_store(&engine, "base", &[("a.txt", "A"), ("both.txt", "from base")]);
    seed_store(&engine, "alt", &[("b.txt", "B"), ("both.txt", "from alt")]);
    admin::use_store(&engine, "base", None, false).unwrap();
    apply_active(&engine);

    let res = execute::apply(
        &engine,
        ApplyRequest {
            store: Some("alt".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    assert!(res.plan.conflicts.is_empty());
    assert!(!fx.path("a.txt").exists());
    assert_eq!(fx.read("b.txt"), "B");
    assert_eq!(fx.read("both.txt"), "from alt");

    let state = engine.load_state().unwrap().unwrap();
    assert_eq!(state.active_store.as_deref(), Some("alt"));
    assert!(state.paths.values().all(|o| o.store == "alt"));
    assert_eq!(state.paths.len(), 2);
}

#[test]
fn mode_switch_requires_force_and_records_checksums() {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed_store(&engine, "base", &[("a.txt", "A")]);
    admin::use_store(&engine, "base", None, false).unwrap();
    apply_active(&engine);

    let copy = ApplyRequest {
        mode: Some(Mode::Copy),
        ..Default::default()
    };
    assert!(matches!(
        execute::apply(&engine, copy.clone()),
        Err(TesseraError::ValidationError(_))
    ));

    let res = execute::apply(
        &engine,
        ApplyRequest {
            force: true,
            ..copy
        },
    )
    .unwrap();
    assert_eq!(res.applied[0].kind, OpKind::Remove);
    assert_eq!(res.applied[1].kind, OpKind::Copy);
    assert!(!is_symlink(&fx.path("a.txt")));
    assert_eq!(fx.read("a.txt"), "A");

    let state = engine.load_state().unwrap().unwrap();
    assert_eq!(state.mode, Mode::Copy);
    let owner = &state.paths["a.txt"];
    assert_eq!(owner.kind, Mode::Copy);
    assert_eq!(
        owner.checksum.as_deref(),
        Some(tessera::core::fsops::sha256_bytes(b"A").as_str())
    );
}

#[test]
fn untracked_paths_are_removed_on_the_next_apply() {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed_store(&engine, "base", &[("a.txt", "A"), ("b.txt", "B")]);
    admin::use_store(&engine, "base", None, false).unwrap();
    apply_active(&engine);

    track::untrack(
        &engine,
        UntrackRequest {
            paths: vec!["a.txt".to_string()],
            ..Default::default()
        },
    )
    .unwrap();
    let res = apply_active(&engine);
    assert_eq!(res.applied.len(), 1);
    assert_eq!(res.applied[0].kind, OpKind::Remove);
    assert!(!fx.path("a.txt").exists());
    assert!(fx.path("b.txt").exists());
}

#[test]
fn declared_paths_without_content_are_skipped() {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed_store(&engine, "base", &[("a.txt", "A")]);
    admin::use_store(&engine, "base", None, false).unwrap();
    track::track(
        &engine,
        track::TrackRequest {
            paths: vec!["later.txt".to_string()],
            ..Default::default()
        },
    )
    .unwrap();

    let res = apply_active(&engine);
    assert_eq!(res.plan.skipped, vec!["base:later.txt"]);
    assert!(!fx.path("later.txt").exists());
}

#[test]
fn sub_path_workspaces_are_independent() {
    let fx = Fixture::new();
    let root = fx.engine();
    seed_store(&root, "base", &[("a.txt", "A")]);
    let api = fx.engine_at("services/api");
    assert_ne!(api.workspace_id, root.workspace_id);

    execute::apply(
        &api,
        ApplyRequest {
            store: Some("base".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(fx.read("services/api/a.txt"), "A");
    assert!(!fx.path("a.txt").exists());
    assert!(root.load_state().unwrap().is_none());
    assert!(fs::symlink_metadata(fx.path("services/api/a.txt")).is_ok());
}

#[test]
fn stacked_store_cannot_be_applied_as_active() {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed_store(&engine, "base", &[("a.txt", "A")]);
    stack::stack_add(&engine, "base", None).unwrap();
    let err = execute::apply(
        &engine,
        ApplyRequest {
            store: Some("base".to_string()),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), "validation");
}

#[test]
fn forced_switch_retires_the_previous_store_on_the_next_apply() {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed_store(&engine, "s", &[("old.txt", "old")]);
    seed_store(&engine, "t", &[("new.txt", "new")]);
    admin::use_store(&engine, "s", None, false).unwrap();
    apply_active(&engine);

    assert!(admin::use_store(&engine, "t", None, false).is_err());
    admin::use_store(&engine, "t", None, true).unwrap();
    assert!(is_symlink(&fx.path("old.txt")));

    let res = apply_active(&engine);
    assert_eq!(res.plan.count(OpKind::Remove), 1);
    assert!(!fx.path("old.txt").exists());
    assert_eq!(fx.read("new.txt"), "new");
    let state = engine.load_state().unwrap().unwrap();
    assert!(state.owned_by("s").is_empty());
    assert_eq!(state.owned_by("t"), vec!["new.txt"]);
}
