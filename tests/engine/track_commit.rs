#[path = "../common/mod.rs"]
mod common;

use common::{Fixture, is_symlink, seed_store, write_file};
use std::fs;
use tessera::core::store::{Mode, TrackKind};
use tessera::engine::admin::{self, CreateStoreRequest};
use tessera::engine::catalog::Catalog;
use tessera::engine::commit::{self, CommitRequest};
use tessera::engine::drift::{self, DiffRequest};
use tessera::engine::execute::{self, ApplyRequest};
use tessera::engine::track::{self, TrackRequest, UntrackRequest};
use tessera::engine::{Engine, EngineOptions};

fn empty_store(engine: &Engine, id: &str) {
    admin::create_store(
        engine,
        CreateStoreRequest {
            id: id.to_string(),
            ..Default::default()
        },
    )
    .unwrap();
    admin::use_store(engine, id, None, false).unwrap();
}

fn track_paths(engine: &Engine, paths: &[&str]) -> track::TrackResult {
    track::track(
        engine,
        TrackRequest {
            paths: paths.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        },
    )
    .unwrap()
}

#[test]
fn track_canonicalizes_paths_relative_to_the_working_directory() {
    let fx = Fixture::new();
    fs::create_dir_all(fx.path("pkg/src")).unwrap();
    let engine = Engine::open(EngineOptions {
        cwd: fx.path("pkg"),
        home: Some(fx.home.path().to_path_buf()),
        workspace: None,
    })
    .unwrap();
    empty_store(&engine, "base");

    let absolute = fx.path("top.txt").display().to_string();
    let res = track_paths(&engine, &["src", "./x/../y.txt", "../top.txt", &absolute]);
    assert_eq!(res.added, vec!["pkg/src", "pkg/y.txt", "top.txt"]);
    assert_eq!(res.existing, vec!["top.txt"]);

    let manifest = engine
        .catalogs
        .global
        .load_track("base")
        .unwrap();
    assert_eq!(manifest.get("pkg/src").unwrap().kind, TrackKind::Directory);
    assert_eq!(manifest.get("pkg/y.txt").unwrap().kind, TrackKind::File);

    for bad in ["../../outside.txt", "..", "/etc/passwd"] {
        let err = track::track(
            &engine,
            TrackRequest {
                paths: vec![bad.to_string()],
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.kind(), "validation", "{bad} should be rejected");
    }
}

#[test]
fn untrack_reports_unmatched_inputs() {
    let fx = Fixture::new();
    let engine = fx.engine();
    empty_store(&engine, "base");
    track_paths(&engine, &["a.txt", "b.txt"]);

    let res = track::untrack(
        &engine,
        UntrackRequest {
            paths: vec!["a.txt".to_string(), "nope.txt".to_string()],
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(res.removed, vec!["a.txt"]);
    assert_eq!(res.unmatched, vec!["nope.txt"]);
}

#[test]
fn commit_captures_content_without_marking_applied() {
    let fx = Fixture::new();
    let engine = fx.engine();
    empty_store(&engine, "base");
    fx.write("a.txt", "hello");
    fx.write("conf/x.toml", "x = 1");
    track_paths(&engine, &["a.txt", "conf", "gone.txt"]);

    let res = commit::commit(&engine, CommitRequest::default()).unwrap();
    assert_eq!(res.captured, vec!["a.txt", "conf"]);
    assert_eq!(res.missing, vec!["gone.txt"]);

    let overlay = engine.catalogs.global.overlay_root("base");
    assert_eq!(fs::read_to_string(overlay.join("a.txt")).unwrap(), "hello");
    assert_eq!(fs::read_to_string(overlay.join("conf/x.toml")).unwrap(), "x = 1");

    let state = engine.load_state().unwrap().unwrap();
    assert!(!state.applied);
    assert_eq!(state.paths["a.txt"].kind, Mode::Copy);
    assert!(state.paths["a.txt"].checksum.is_some());
    assert!(state.paths["conf"].checksum.is_none());

    let applied = execute::apply(&engine, ApplyRequest::default()).unwrap();
    assert!(applied.plan.conflicts.is_empty());
    assert!(is_symlink(&fx.path("a.txt")));
    assert_eq!(fx.read("a.txt"), "hello");
    let state = engine.load_state().unwrap().unwrap();
    assert!(state.applied);
    assert_eq!(state.paths["a.txt"].kind, Mode::Symlink);
}

#[test]
fn commit_of_linked_paths_is_a_no_op() {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed_store(&engine, "base", &[("a.txt", "A")]);
    admin::use_store(&engine, "base", None, false).unwrap();
    execute::apply(&engine, ApplyRequest::default()).unwrap();

    let res = commit::commit(&engine, CommitRequest::default()).unwrap();
    assert_eq!(res.linked, vec!["a.txt"]);
    assert!(res.captured.is_empty());
    assert!(engine.load_state().unwrap().unwrap().applied);
}

#[test]
fn commit_rejects_undeclared_explicit_paths() {
    let fx = Fixture::new();
    let engine = fx.engine();
    empty_store(&engine, "base");
    fx.write("a.txt", "a");
    track_paths(&engine, &["a.txt"]);

    let err = commit::commit(
        &engine,
        CommitRequest {
            paths: vec!["other.txt".to_string()],
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), "validation");

    let res = commit::commit(
        &engine,
        CommitRequest {
            paths: vec!["a.txt".to_string()],
        },
    )
    .unwrap();
    assert_eq!(res.captured, vec!["a.txt"]);
    assert!(res.pruned.is_empty());
}

#[test]
fn full_commit_prunes_overlay_entries_nothing_declares() {
    let fx = Fixture::new();
    let engine = fx.engine();
    empty_store(&engine, "base");
    fx.write("a.txt", "a");
    track_paths(&engine, &["a.txt"]);
    let overlay = engine.catalogs.global.overlay_root("base");
    write_file(&overlay.join("stale/old.txt"), "old");

    let res = commit::commit(&engine, CommitRequest::default()).unwrap();
    assert_eq!(res.pruned, vec!["stale"]);
    assert!(!overlay.join("stale").exists());
    assert!(overlay.join("a.txt").exists());
}

#[test]
fn commit_needs_an_active_store() {
    let fx = Fixture::new();
    let engine = fx.engine();
    let err = commit::commit(&engine, CommitRequest::default()).unwrap_err();
    assert_eq!(err.kind(), "no_active_store");
}

#[test]
fn sub_directory_workspace_keys_paths_relative_to_itself() {
    let fx = Fixture::new();
    fx.write("pkg/run.sh", "echo hi");
    fx.write("top.txt", "top");
    let engine = Engine::open(EngineOptions {
        cwd: fx.path("pkg"),
        home: Some(fx.home.path().to_path_buf()),
        workspace: Some(".".into()),
    })
    .unwrap();
    assert_eq!(engine.sub_path, "pkg");
    empty_store(&engine, "tools");

    let res = track_paths(&engine, &["run.sh"]);
    assert_eq!(res.added, vec!["run.sh"]);
    let outside = track::track(
        &engine,
        TrackRequest {
            paths: vec!["../top.txt".to_string()],
            ..Default::default()
        },
    )
    .unwrap_err();
    assert_eq!(outside.kind(), "validation");

    let committed = commit::commit(&engine, CommitRequest::default()).unwrap();
    assert_eq!(committed.captured, vec!["run.sh"]);
    assert!(committed.missing.is_empty());
    let overlay = engine.catalogs.global.overlay_root("tools");
    assert_eq!(fs::read_to_string(overlay.join("run.sh")).unwrap(), "echo hi");

    fs::remove_file(fx.path("pkg/run.sh")).unwrap();
    execute::apply(
        &engine,
        ApplyRequest {
            mode: Some(Mode::Symlink),
            ..Default::default()
        },
    )
    .unwrap();
    assert!(is_symlink(&fx.path("pkg/run.sh")));
    assert_eq!(fx.read("pkg/run.sh"), "echo hi");
    assert!(!fx.path("pkg/pkg").exists());

    let state = engine.load_state().unwrap().unwrap();
    assert_eq!(state.owned_by("tools"), vec!["run.sh"]);
    let drift = drift::diff(&engine, DiffRequest::default()).unwrap();
    assert!(!drift.has_drift());
}
