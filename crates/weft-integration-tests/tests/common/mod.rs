//! Shared helpers for weft integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use weft_chain::{CompositionOrder, UnlistedPlacement};
use weft_core::{InterceptorHandle, Target};
use weft_pointcut::InterceptorFactory;
use weft_runtime::Weaver;
use weft_test::{CallLog, RecordingInterceptor};

/// A weaver on host `node1` with unlisted types placed last.
pub fn weaver(order: &[&str]) -> Weaver {
    Weaver::new(
        CompositionOrder::new(order.iter().copied(), UnlistedPlacement::Last),
        "node1",
    )
}

/// Register a factory building a fresh [`RecordingInterceptor`] per target
/// and return the counter of factory calls.
pub fn register_recorder(weaver: &Weaver, type_name: &str, log: &CallLog) -> Arc<AtomicUsize> {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&built);
    let log = log.clone();
    let name = type_name.to_string();
    weaver.register_factory(InterceptorFactory::new(type_name, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(InterceptorHandle::new(RecordingInterceptor::new(
            name.clone(),
            &log,
        )))
    }));
    built
}

/// Type names of a chain, outermost first.
pub fn chain_types(weaver: &Weaver, target: &Target, signature: &str) -> Vec<String> {
    let operation = target
        .type_info()
        .operation(signature)
        .cloned()
        .unwrap_or_else(|| panic!("no operation {signature}"));
    weaver
        .store()
        .snapshot(target, &operation)
        .iter()
        .map(|h| h.type_name().to_string())
        .collect()
}
