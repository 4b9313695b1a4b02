//! Integration tests for rank-based insertion through pointcuts.
//!
//! Modules activated in any order must produce chains in the configured
//! composition order, with unlisted types placed by the documented rule.

mod common;

use weft_chain::{ChainStore, CompositionOrder, UnlistedPlacement};
use weft_core::{ModuleId, Target};
use weft_test::{CallLog, RecordingInterceptor, test_account, test_account_type, test_operation};

use common::{chain_types, register_recorder, weaver};

#[test]
fn test_rank_stability_across_modules() {
    let w = weaver(&["A", "B", "C"]);
    let log = CallLog::new();
    for name in ["A", "B", "C"] {
        register_recorder(&w, name, &log);
    }

    // Three independent modules, activated C, A, B.
    for name in ["C", "A", "B"] {
        let pointcut = w.pointcut(name).unwrap().operations("deposit(.*)").build().unwrap();
        assert!(w.activate(ModuleId::new(), vec![pointcut]).is_clean());
    }

    let account = w.construct(&test_account_type(), "<init>()", vec![]).unwrap();
    let target = Target::from(account);
    assert_eq!(chain_types(&w, &target, "deposit(i64)"), vec!["A", "B", "C"]);
}

#[test]
fn test_unlisted_last_follows_listed() {
    let store = ChainStore::new();
    let order = CompositionOrder::new(["Auth"], UnlistedPlacement::Last);
    let log = CallLog::new();
    let target = Target::from(test_account());
    let deposit = test_operation(target.type_info(), "deposit(i64)");

    store.insert_ranked(&target, &deposit, RecordingInterceptor::handle("Metrics", &log), &order);
    store.insert_ranked(&target, &deposit, RecordingInterceptor::handle("Trace", &log), &order);
    store.insert_ranked(&target, &deposit, RecordingInterceptor::handle("Auth", &log), &order);

    let names: Vec<_> = store
        .snapshot(&target, &deposit)
        .iter()
        .map(|h| h.type_name().to_string())
        .collect();
    assert_eq!(names, vec!["Auth", "Metrics", "Trace"]);
}

#[test]
fn test_unlisted_first_precedes_listed() {
    let store = ChainStore::new();
    let order = CompositionOrder::new(["Auth"], UnlistedPlacement::First);
    let log = CallLog::new();
    let target = Target::from(test_account());
    let deposit = test_operation(target.type_info(), "deposit(i64)");

    store.insert_ranked(&target, &deposit, RecordingInterceptor::handle("Auth", &log), &order);
    store.insert_ranked(&target, &deposit, RecordingInterceptor::handle("Metrics", &log), &order);
    store.insert_ranked(&target, &deposit, RecordingInterceptor::handle("Trace", &log), &order);

    let names: Vec<_> = store
        .snapshot(&target, &deposit)
        .iter()
        .map(|h| h.type_name().to_string())
        .collect();
    assert_eq!(names, vec!["Metrics", "Trace", "Auth"]);
}

#[test]
fn test_reapplying_a_pointcut_adds_no_duplicates() {
    let w = weaver(&[]);
    let log = CallLog::new();
    let built = register_recorder(&w, "Audit", &log);
    let module = ModuleId::new();
    let pointcut = || w.pointcut("Audit").unwrap().operations("deposit(.*)").build().unwrap();
    w.activate(module, vec![pointcut()]);

    let account = w.construct(&test_account_type(), "<init>()", vec![]).unwrap();
    let target = Target::from(account);
    assert_eq!(chain_types(&w, &target, "deposit(i64)").len(), 1);

    // Announcing the same object again is a no-op.
    let object: std::sync::Arc<dyn weft_core::Wrappee> = match &target {
        Target::Object(object) => object.clone(),
        Target::Type(_) => unreachable!(),
    };
    w.adopt(&object);
    assert_eq!(chain_types(&w, &target, "deposit(i64)").len(), 1);
    assert_eq!(built.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[test]
fn test_non_interceptable_operations_are_skipped() {
    let w = weaver(&[]);
    let log = CallLog::new();
    register_recorder(&w, "Audit", &log);
    w.activate(
        ModuleId::new(),
        vec![w.pointcut("Audit").unwrap().operations("audit()").build().unwrap()],
    );

    let account = w.construct(&test_account_type(), "<init>()", vec![]).unwrap();
    let target = Target::from(account);
    assert!(chain_types(&w, &target, "audit()").is_empty());
    // The default sharing mode still attaches the interceptor for role use.
    assert!(w.store().is_attached_type(&target, "Audit"));
}
