#[path = "../common/mod.rs"]
mod common;

use common::{Fixture, is_symlink, seed_store, seed_store_in};
use tessera::core::error::TesseraError;
use tessera::core::store::Scope;
use tessera::engine::admin;
use tessera::engine::execute::{self, ApplyRequest};
use tessera::engine::plan::OpKind;
use tessera::engine::stack::{self, StackApplyRequest};

#[test]
fn add_rejects_duplicates_and_the_active_store() {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed_store(&engine, "base", &[("a.txt", "A")]);
    seed_store(&engine, "extra", &[("b.txt", "B")]);
    admin::use_store(&engine, "base", None, false).unwrap();

    let entries = stack::stack_add(&engine, "extra", None).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].store.id, "extra");
    assert_eq!(entries[0].store.scope, Scope::Global);

    let dup = stack::stack_add(&engine, "extra", None).unwrap_err();
    assert_eq!(dup.kind(), "validation");
    let active = stack::stack_add(&engine, "base", None).unwrap_err();
    assert_eq!(active.kind(), "validation");
    assert!(matches!(
        stack::stack_add(&engine, "nope", None),
        Err(TesseraError::NotFound(_))
    ));
}

#[test]
fn contested_stack_paths_need_force_and_the_later_store_wins() {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed_store(&engine, "lower", &[("shared.txt", "lower"), ("l.txt", "l")]);
    seed_store(&engine, "upper", &[("shared.txt", "upper"), ("u.txt", "u")]);
    stack::stack_add(&engine, "lower", None).unwrap();
    stack::stack_add(&engine, "upper", None).unwrap();

    match stack::stack_apply(&engine, StackApplyRequest::default()) {
        Err(TesseraError::Conflict { paths }) => assert_eq!(paths, vec!["shared.txt"]),
        other => panic!("expected conflict, got {:?}", other.map(|r| r.plan)),
    }
    assert!(!fx.path("l.txt").exists());

    let res = stack::stack_apply(
        &engine,
        StackApplyRequest {
            force: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(res.plan.conflicts.len(), 1);
    assert_eq!(res.plan.conflicts[0].stores, vec!["lower", "upper"]);
    assert_eq!(fx.read("shared.txt"), "upper");
    assert!(is_symlink(&fx.path("l.txt")));

    let state = engine.load_state().unwrap().unwrap();
    assert!(state.applied);
    assert_eq!(state.paths["shared.txt"].store, "upper");
    assert_eq!(state.paths["l.txt"].store, "lower");
    assert!(state.active_store.is_none());

    let listed = stack::stack_list(&engine).unwrap();
    assert_eq!(listed[0].owned_paths, 1);
    assert_eq!(listed[1].owned_paths, 2);
}

#[test]
fn stack_apply_on_empty_stack_is_rejected() {
    let fx = Fixture::new();
    let engine = fx.engine();
    let err = stack::stack_apply(&engine, StackApplyRequest::default()).unwrap_err();
    assert_eq!(err.kind(), "validation");
}

#[test]
fn stack_unapply_leaves_the_active_store_in_place() {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed_store(&engine, "base", &[("a.txt", "A")]);
    seed_store(&engine, "extra", &[("b.txt", "B")]);
    admin::use_store(&engine, "base", None, false).unwrap();
    execute::apply(&engine, ApplyRequest::default()).unwrap();
    stack::stack_add(&engine, "extra", None).unwrap();
    stack::stack_apply(&engine, StackApplyRequest::default()).unwrap();
    assert_eq!(fx.read("b.txt"), "B");

    let res = stack::stack_unapply(&engine, false).unwrap();
    assert_eq!(res.removed, vec!["b.txt"]);
    assert!(!res.state_deleted);
    assert!(!fx.path("b.txt").exists());
    assert_eq!(fx.read("a.txt"), "A");

    let state = engine.load_state().unwrap().unwrap();
    assert_eq!(state.owned_by("base"), vec!["a.txt"]);
    assert_eq!(state.stack, vec!["extra"]);
}

#[test]
fn pop_and_clear_refuse_while_stack_paths_are_applied() {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed_store(&engine, "one", &[("1.txt", "1")]);
    seed_store(&engine, "two", &[("2.txt", "2")]);
    stack::stack_add(&engine, "one", None).unwrap();
    stack::stack_add(&engine, "two", None).unwrap();
    stack::stack_apply(&engine, StackApplyRequest::default()).unwrap();

    assert_eq!(stack::stack_pop(&engine, false).unwrap_err().kind(), "validation");
    assert_eq!(stack::stack_clear(&engine, false).unwrap_err().kind(), "validation");

    stack::stack_unapply(&engine, false).unwrap();
    assert!(engine.load_state().unwrap().is_none());

    stack::stack_add(&engine, "one", None).unwrap();
    stack::stack_add(&engine, "two", None).unwrap();
    assert_eq!(stack::stack_pop(&engine, false).unwrap().as_deref(), Some("two"));
    assert_eq!(stack::stack_clear(&engine, false).unwrap(), vec!["one"]);
    assert!(stack::stack_list(&engine).unwrap().is_empty());
    assert_eq!(stack::stack_pop(&engine, false).unwrap(), None);
}

#[test]
fn stack_routes_each_store_to_its_recorded_scope() {
    let fx = Fixture::with_component();
    let engine = fx.engine();
    seed_store_in(&engine, "dup", Scope::Global, &[("g.txt", "global")]);
    seed_store_in(&engine, "dup", Scope::Component, &[("c.txt", "component")]);

    assert!(matches!(
        stack::stack_add(&engine, "dup", None),
        Err(TesseraError::Ambiguous(_))
    ));
    stack::stack_add(&engine, "dup", Some(Scope::Component)).unwrap();
    let res = stack::stack_apply(&engine, StackApplyRequest::default()).unwrap();
    assert_eq!(res.stores[0].scope, Scope::Component);
    assert_eq!(fx.read("c.txt"), "component");
    assert!(!fx.path("g.txt").exists());
}

#[test]
fn stack_dry_run_reports_plan_only() {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed_store(&engine, "one", &[("1.txt", "1")]);
    stack::stack_add(&engine, "one", None).unwrap();
    let res = stack::stack_apply(
        &engine,
        StackApplyRequest {
            dry_run: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert!(res.dry_run);
    assert_eq!(res.plan.operations.len(), 1);
    assert!(!fx.path("1.txt").exists());
    assert!(!engine.load_state().unwrap().unwrap().applied);
}

#[test]
fn forced_pop_leaves_paths_for_the_next_stack_apply_to_remove() {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed_store(&engine, "lower", &[("x.txt", "x")]);
    seed_store(&engine, "upper", &[("y.txt", "y")]);
    stack::stack_add(&engine, "lower", None).unwrap();
    stack::stack_add(&engine, "upper", None).unwrap();
    stack::stack_apply(&engine, StackApplyRequest::default()).unwrap();

    assert!(stack::stack_pop(&engine, false).is_err());
    assert_eq!(stack::stack_pop(&engine, true).unwrap().as_deref(), Some("upper"));
    assert!(is_symlink(&fx.path("y.txt")));

    let res = stack::stack_apply(&engine, StackApplyRequest::default()).unwrap();
    let removed: Vec<_> = res
        .applied
        .iter()
        .filter(|op| op.kind == OpKind::Remove)
        .map(|op| op.rel_path.as_str())
        .collect();
    assert_eq!(removed, vec!["y.txt"]);
    assert!(!fx.path("y.txt").exists());
    let state = engine.load_state().unwrap().unwrap();
    assert_eq!(state.paths.keys().collect::<Vec<_>>(), vec!["x.txt"]);

    let unapplied = stack::stack_unapply(&engine, false).unwrap();
    assert_eq!(unapplied.removed, vec!["x.txt"]);
    assert!(unapplied.state_deleted);
}
