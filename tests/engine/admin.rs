#[path = "../common/mod.rs"]
mod common;

use common::{Fixture, seed_store, seed_store_in};
use std::fs;
use tessera::core::error::TesseraError;
use tessera::core::store::{Scope, StoreSource};
use tessera::engine::admin::{self, CreateStoreRequest, StorePatch};
use tessera::engine::catalog::Catalog;
use tessera::engine::execute::{self, ApplyRequest};
use tessera::engine::stack::{self, StackApplyRequest};

#[test]
fn deleting_a_store_scrubs_every_workspace_that_references_it() {
    let fx = Fixture::new();
    let root = fx.engine();
    seed_store(&root, "shared", &[("s.txt", "S")]);
    seed_store(&root, "other", &[("o.txt", "O")]);

    // Active and applied at the repository root.
    admin::use_store(&root, "shared", None, false).unwrap();
    execute::apply(&root, ApplyRequest::default()).unwrap();

    // Stacked and applied under a/, next to an active store.
    let a = fx.engine_at("a");
    admin::use_store(&a, "other", None, false).unwrap();
    execute::apply(&a, ApplyRequest::default()).unwrap();
    stack::stack_add(&a, "shared", None).unwrap();
    stack::stack_apply(&a, StackApplyRequest::default()).unwrap();

    // Selected but never applied under b/.
    let b = fx.engine_at("b");
    admin::use_store(&b, "shared", None, false).unwrap();

    // Unrelated workspace under c/.
    let c = fx.engine_at("c");
    admin::use_store(&c, "other", None, false).unwrap();

    let described = admin::describe_store(&root, "shared", None).unwrap();
    assert_eq!(described.workspaces.len(), 3);

    let res = admin::delete_store(&root, "shared", None).unwrap();
    assert_eq!(res.workspaces_updated.len(), 3);
    assert_eq!(res.ledger_entries_dropped, 2);

    let root_state = root.load_state().unwrap().unwrap();
    assert!(root_state.active_store.is_none());
    assert!(root_state.paths.is_empty());
    assert!(!root_state.applied);
    assert!(fs::symlink_metadata(fx.path("s.txt")).is_ok(), "files stay in place");

    let a_state = a.load_state().unwrap().unwrap();
    assert!(a_state.stack.is_empty());
    assert!(a_state.stack_scopes.is_empty());
    assert_eq!(a_state.active_store.as_deref(), Some("other"));
    assert_eq!(a_state.owned_by("other"), vec!["o.txt"]);
    assert!(a_state.applied);

    let b_state = b.load_state().unwrap().unwrap();
    assert!(b_state.active_store.is_none());

    let c_state = c.load_state().unwrap().unwrap();
    assert_eq!(c_state.active_store.as_deref(), Some("other"));

    assert!(matches!(
        admin::describe_store(&root, "shared", None),
        Err(TesseraError::NotFound(_))
    ));
}

#[test]
fn ambiguous_ids_abort_delete_before_any_change() {
    let fx = Fixture::with_component();
    let engine = fx.engine();
    seed_store_in(&engine, "dup", Scope::Global, &[]);
    seed_store_in(&engine, "dup", Scope::Component, &[]);

    assert!(matches!(
        admin::delete_store(&engine, "dup", None),
        Err(TesseraError::Ambiguous(_))
    ));
    assert!(engine.catalogs.global.exists("dup"));

    let res = admin::delete_store(&engine, "dup", Some(Scope::Component)).unwrap();
    assert_eq!(res.store.scope, Scope::Component);
    assert!(engine.catalogs.global.exists("dup"));
    assert!(!engine.catalogs.component.as_ref().unwrap().exists("dup"));
}

#[test]
fn create_defaults_to_component_scope_and_rejects_duplicates() {
    let fx = Fixture::with_component();
    let engine = fx.engine();
    let meta = admin::create_store(
        &engine,
        CreateStoreRequest {
            id: "tools".to_string(),
            description: Some("shared tooling".to_string()),
            source: Some(StoreSource::Agent),
            status: Some("active".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(meta.scope, Scope::Component);
    assert_eq!(meta.name, "tools");
    assert_eq!(meta.source, StoreSource::Agent);

    let dup = admin::create_store(
        &engine,
        CreateStoreRequest {
            id: "tools".to_string(),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert_eq!(dup.kind(), "validation");

    let bad = admin::create_store(
        &engine,
        CreateStoreRequest {
            id: "../escape".to_string(),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert_eq!(bad.kind(), "validation");
}

#[test]
fn component_scope_needs_a_component_catalog() {
    let fx = Fixture::new();
    let engine = fx.engine();
    let err = admin::create_store(
        &engine,
        CreateStoreRequest {
            id: "x".to_string(),
            scope: Some(Scope::Component),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

#[test]
fn update_and_list_filter_by_status_and_scope() {
    let fx = Fixture::with_component();
    let engine = fx.engine();
    seed_store_in(&engine, "b-global", Scope::Global, &[("x", "x")]);
    seed_store_in(&engine, "a-comp", Scope::Component, &[]);

    let updated = admin::update_store(
        &engine,
        "a-comp",
        None,
        StorePatch {
            status: Some("archived".to_string()),
            owner: Some("platform".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(updated.status.as_deref(), Some("archived"));
    assert_eq!(updated.owner.as_deref(), Some("platform"));

    let all = admin::list_stores(&engine, None, None).unwrap();
    let ids: Vec<_> = all.iter().map(|s| (s.scope, s.id.as_str())).collect();
    assert_eq!(
        ids,
        vec![(Scope::Global, "b-global"), (Scope::Component, "a-comp")]
    );
    assert_eq!(all[0].tracked, 1);

    let archived = admin::list_stores(&engine, None, Some("archived")).unwrap();
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].id, "a-comp");

    let global = admin::list_stores(&engine, Some(Scope::Global), None).unwrap();
    assert_eq!(global.len(), 1);
    assert_eq!(global[0].id, "b-global");
}

#[test]
fn use_store_guards_an_applied_workspace() {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed_store(&engine, "base", &[("a.txt", "A")]);
    seed_store(&engine, "alt", &[("b.txt", "B")]);
    admin::use_store(&engine, "base", None, false).unwrap();
    execute::apply(&engine, ApplyRequest::default()).unwrap();

    let err = admin::use_store(&engine, "alt", None, false).unwrap_err();
    assert_eq!(err.kind(), "validation");
    admin::use_store(&engine, "base", None, false).unwrap();

    let state = admin::use_store(&engine, "alt", None, true).unwrap();
    assert_eq!(state.active_store.as_deref(), Some("alt"));
    assert_eq!(state.active_store_scope, Some(Scope::Global));
    assert_eq!(state.owned_by("base"), vec!["a.txt"]);
}

#[test]
fn workspace_records_can_be_listed_described_and_deleted() {
    let fx = Fixture::new();
    let root = fx.engine();
    seed_store(&root, "base", &[]);
    admin::use_store(&root, "base", None, false).unwrap();
    let sub = fx.engine_at("pkg");
    admin::use_store(&sub, "base", None, false).unwrap();

    let listed = admin::list_workspaces(&root).unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].sub_path, ".");
    assert_eq!(listed[1].sub_path, "pkg");

    let current = admin::describe_workspace(&sub, None).unwrap();
    assert_eq!(current.workspace_id, sub.workspace_id);
    let other = admin::describe_workspace(&sub, Some(&root.workspace_id)).unwrap();
    assert_eq!(other.sub_path, ".");

    admin::delete_workspace(&root, Some(&sub.workspace_id)).unwrap();
    assert!(sub.load_state().unwrap().is_none());
    assert!(matches!(
        admin::delete_workspace(&root, Some(&sub.workspace_id)),
        Err(TesseraError::StateMissing(_))
    ));
}

#[test]
fn prune_drops_records_for_missing_or_empty_workspaces() {
    let fx = Fixture::new();
    let root = fx.engine();
    seed_store(&root, "base", &[]);
    admin::use_store(&root, "base", None, false).unwrap();

    let gone = fx.engine_at("gone");
    admin::use_store(&gone, "base", None, false).unwrap();
    fs::remove_dir_all(fx.path("gone")).unwrap();

    let empty = fx.engine_at("empty");
    stack::stack_add(&empty, "base", None).unwrap();
    stack::stack_clear(&empty, false).unwrap();

    let preview = admin::prune(&root, true).unwrap();
    assert_eq!(preview.len(), 2);
    assert!(gone.load_state().unwrap().is_some());

    let pruned = admin::prune(&root, false).unwrap();
    let mut ids: Vec<_> = pruned.iter().map(|p| p.workspace_id.clone()).collect();
    ids.sort();
    let mut expected = vec![gone.workspace_id.clone(), empty.workspace_id.clone()];
    expected.sort();
    assert_eq!(ids, expected);
    assert!(root.load_state().unwrap().is_some());
    assert!(admin::prune(&root, false).unwrap().is_empty());
}

#[test]
fn deleting_a_store_leaves_the_same_id_in_the_other_scope_alone() {
    let fx = Fixture::with_component();
    let engine = fx.engine();
    seed_store_in(&engine, "s", Scope::Component, &[("c.txt", "C")]);
    seed_store_in(&engine, "s", Scope::Global, &[("g.txt", "G")]);
    seed_store(&engine, "t", &[("t.txt", "T")]);

    admin::use_store(&engine, "s", Some(Scope::Component), false).unwrap();
    execute::apply(&engine, ApplyRequest::default()).unwrap();
    // The ledger now outlives the scope hint for `s`.
    admin::use_store(&engine, "t", None, true).unwrap();

    let global = admin::describe_store(&engine, "s", Some(Scope::Global)).unwrap();
    assert!(global.workspaces.is_empty());
    let res = admin::delete_store(&engine, "s", Some(Scope::Global)).unwrap();
    assert!(res.workspaces_updated.is_empty());
    assert_eq!(res.ledger_entries_dropped, 0);
    let state = engine.load_state().unwrap().unwrap();
    assert_eq!(state.owned_by("s"), vec!["c.txt"]);
    assert_eq!(state.paths["c.txt"].scope, Some(Scope::Component));

    let res = admin::delete_store(&engine, "s", Some(Scope::Component)).unwrap();
    assert_eq!(res.workspaces_updated, vec![engine.workspace_id.clone()]);
    assert_eq!(res.ledger_entries_dropped, 1);
}
