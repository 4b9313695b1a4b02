//! Copy-on-write interceptor chains.
//!
//! Readers take an `Arc` snapshot without locking; writers serialize on a
//! per-chain mutex and publish a fresh vector. A call that already took its
//! snapshot keeps running against it whatever happens afterwards.

use arc_swap::ArcSwap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

use weft_core::{ChainSnapshot, InterceptorHandle, InterceptorSet, OperationKey};

use crate::order::CompositionOrder;

struct ChainCell {
    key: OperationKey,
    interceptable: bool,
    entries: ArcSwap<Vec<InterceptorHandle>>,
    write: Mutex<()>,
}

/// The ordered interceptors bound to one (target, operation).
///
/// Cloning yields another handle to the same chain.
#[derive(Clone)]
pub struct InterceptorChain {
    cell: Arc<ChainCell>,
}

impl InterceptorChain {
    /// Create an empty chain.
    #[must_use]
    pub fn new(key: OperationKey, interceptable: bool) -> Self {
        Self {
            cell: Arc::new(ChainCell {
                key,
                interceptable,
                entries: ArcSwap::from_pointee(Vec::new()),
                write: Mutex::new(()),
            }),
        }
    }

    /// The operation this chain belongs to.
    #[must_use]
    pub fn key(&self) -> &OperationKey {
        &self.cell.key
    }

    /// Whether the chain accepts entries at all.
    #[must_use]
    pub fn is_interceptable(&self) -> bool {
        self.cell.interceptable
    }

    /// Current contents.
    #[must_use]
    pub fn snapshot(&self) -> ChainSnapshot {
        self.cell.entries.load_full()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cell.entries.load().len()
    }

    /// Whether the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cell.entries.load().is_empty()
    }

    /// Whether `interceptor` is in the chain.
    #[must_use]
    pub fn contains(&self, interceptor: &InterceptorHandle) -> bool {
        self.cell.entries.load().contains(interceptor)
    }

    /// Insert at `rank` (clamped to the chain length), shifting later
    /// entries.
    ///
    /// Returns `false` without changing anything if the operation is not
    /// interceptable or the interceptor is already in the chain.
    pub fn insert(&self, interceptor: InterceptorHandle, rank: usize) -> bool {
        self.insert_with(interceptor, |_| rank).is_some()
    }

    /// Insert at the rank `order` assigns, computed under the write lock.
    ///
    /// Returns the rank used, or `None` if the insertion was skipped.
    pub fn insert_ranked(
        &self,
        interceptor: InterceptorHandle,
        order: &CompositionOrder,
    ) -> Option<usize> {
        let type_name = interceptor.type_name().to_string();
        self.insert_with(interceptor, |entries| order.rank_for(entries, &type_name))
    }

    fn insert_with<F>(&self, interceptor: InterceptorHandle, rank: F) -> Option<usize>
    where
        F: FnOnce(&[InterceptorHandle]) -> usize,
    {
        if !self.cell.interceptable {
            debug!(
                target: "weft::wrapping",
                operation = %self.cell.key,
                "operation is not interceptable, skipping"
            );
            return None;
        }

        let _guard = self.cell.write.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.cell.entries.load_full();
        if current.contains(&interceptor) {
            debug!(
                target: "weft::wrapping",
                operation = %self.cell.key,
                interceptor = ?interceptor,
                "already wrapped"
            );
            return None;
        }

        let rank = rank(current.as_slice()).min(current.len());
        let mut next = Vec::with_capacity(current.len().saturating_add(1));
        next.extend(current.iter().take(rank).cloned());
        next.push(interceptor.clone());
        next.extend(current.iter().skip(rank).cloned());
        self.cell.entries.store(Arc::new(next));

        debug!(
            target: "weft::wrapping",
            operation = %self.cell.key,
            interceptor = ?interceptor,
            rank,
            "wrapped operation"
        );
        Some(rank)
    }

    /// Remove every occurrence of `interceptor`. Returns whether any was
    /// present.
    pub fn remove(&self, interceptor: &InterceptorHandle) -> bool {
        self.retain(|entry| entry != interceptor) > 0
    }

    /// Remove every entry belonging to `set`, keeping the relative order of
    /// the rest. Returns the number of entries removed.
    pub fn remove_all(&self, set: &InterceptorSet) -> usize {
        self.retain(|entry| !set.contains(entry))
    }

    fn retain<F>(&self, keep: F) -> usize
    where
        F: Fn(&InterceptorHandle) -> bool,
    {
        let _guard = self.cell.write.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.cell.entries.load_full();
        let next: Vec<_> = current.iter().filter(|&entry| keep(entry)).cloned().collect();
        let removed = current.len().saturating_sub(next.len());
        if removed > 0 {
            self.cell.entries.store(Arc::new(next));
            debug!(
                target: "weft::wrapping",
                operation = %self.cell.key,
                removed,
                "unwrapped operation"
            );
        }
        removed
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("key", &self.cell.key)
            .field("entries", &self.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::UnlistedPlacement;
    use weft_test::{CallLog, RecordingInterceptor};

    fn key() -> OperationKey {
        OperationKey {
            owner: "bank.Account".into(),
            signature: "deposit(i64)".into(),
        }
    }

    fn names(chain: &InterceptorChain) -> Vec<String> {
        chain
            .snapshot()
            .iter()
            .map(|h| h.type_name().to_string())
            .collect()
    }

    #[test]
    fn test_no_duplicates() {
        let log = CallLog::new();
        let chain = InterceptorChain::new(key(), true);
        let a = RecordingInterceptor::handle("A", &log);
        assert!(chain.insert(a.clone(), 0));
        assert!(!chain.insert(a.clone(), 0));
        assert_eq!(chain.len(), 1);
        assert!(chain.contains(&a));
    }

    #[test]
    fn test_insert_shifts_and_clamps() {
        let log = CallLog::new();
        let chain = InterceptorChain::new(key(), true);
        chain.insert(RecordingInterceptor::handle("A", &log), 0);
        chain.insert(RecordingInterceptor::handle("C", &log), 99);
        chain.insert(RecordingInterceptor::handle("B", &log), 1);
        assert_eq!(names(&chain), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_not_interceptable_rejects() {
        let log = CallLog::new();
        let chain = InterceptorChain::new(key(), false);
        assert!(!chain.insert(RecordingInterceptor::handle("A", &log), 0));
        assert!(chain.is_empty());
        let order = CompositionOrder::default();
        assert_eq!(
            chain.insert_ranked(RecordingInterceptor::handle("A", &log), &order),
            None
        );
    }

    #[test]
    fn test_insert_ranked() {
        let log = CallLog::new();
        let order = CompositionOrder::new(["A", "B", "C"], UnlistedPlacement::Last);
        let chain = InterceptorChain::new(key(), true);
        for ty in ["C", "A", "B"] {
            chain.insert_ranked(RecordingInterceptor::handle(ty, &log), &order);
        }
        assert_eq!(names(&chain), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_snapshot_is_stable() {
        let log = CallLog::new();
        let chain = InterceptorChain::new(key(), true);
        chain.insert(RecordingInterceptor::handle("A", &log), 0);
        let before = chain.snapshot();
        chain.insert(RecordingInterceptor::handle("B", &log), 1);
        assert_eq!(before.len(), 1);
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_remove_and_remove_all() {
        let log = CallLog::new();
        let chain = InterceptorChain::new(key(), true);
        let a = RecordingInterceptor::handle("A", &log);
        let b = RecordingInterceptor::handle("B", &log);
        let c = RecordingInterceptor::handle("C", &log);
        for (i, h) in [&a, &b, &c].into_iter().enumerate() {
            chain.insert((*h).clone(), i);
        }

        assert!(chain.remove(&b));
        assert!(!chain.remove(&b));
        assert_eq!(names(&chain), vec!["A", "C"]);

        let set: InterceptorSet = [a.clone()].into_iter().collect();
        assert_eq!(chain.remove_all(&set), 1);
        assert_eq!(names(&chain), vec!["C"]);

        // Removed chains may be refilled.
        assert!(chain.insert(a, 0));
        assert_eq!(names(&chain), vec!["A", "C"]);
    }
}
