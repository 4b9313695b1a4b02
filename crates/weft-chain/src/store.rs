//! The chain store.
//!
//! Chains live in scopes: one instance scope per object target and one
//! shared scope per type. Object scopes hold only a weak reference to their
//! object, so wrapping never extends a target's lifetime; dead scopes are
//! swept periodically as new object scopes are created (see
//! [`SweepSchedule`]), on [`ChainStore::sweep`], or on an explicit
//! [`ChainStore::evict`].

use arc_swap::ArcSwap;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tracing::debug;

use weft_core::{
    ChainSnapshot, InterceptorHandle, InterceptorSet, ObjectId, Operation, OperationKey, ScopeKey,
    Target, Wrappee,
};

use crate::catch::{CatchChain, CatchEntry, CatchSnapshot};
use crate::chain::InterceptorChain;
use crate::order::CompositionOrder;
use crate::sweep::SweepSchedule;

enum ScopeOwner {
    Object(Weak<dyn Wrappee>),
    Type,
}

struct Scope {
    owner: ScopeOwner,
    chains: DashMap<OperationKey, InterceptorChain>,
    catches: DashMap<OperationKey, Arc<CatchChain>>,
    attached: ArcSwap<Vec<InterceptorHandle>>,
    attach_lock: Mutex<()>,
}

impl Scope {
    fn new(target: &Target) -> Self {
        let owner = match target {
            Target::Object(object) => ScopeOwner::Object(Arc::downgrade(object)),
            Target::Type(_) => ScopeOwner::Type,
        };
        Self {
            owner,
            chains: DashMap::new(),
            catches: DashMap::new(),
            attached: ArcSwap::from_pointee(Vec::new()),
            attach_lock: Mutex::new(()),
        }
    }

    fn is_live(&self) -> bool {
        match &self.owner {
            ScopeOwner::Object(object) => object.strong_count() > 0,
            ScopeOwner::Type => true,
        }
    }

    fn update_attached<F>(&self, change: F) -> bool
    where
        F: FnOnce(&mut Vec<InterceptorHandle>) -> bool,
    {
        let _guard = self.attach_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = Vec::clone(&self.attached.load_full());
        let changed = change(&mut next);
        if changed {
            self.attached.store(Arc::new(next));
        }
        changed
    }
}

/// Owner of every interceptor chain, catch chain and attached set.
pub struct ChainStore {
    scopes: DashMap<ScopeKey, Arc<Scope>>,
    sweeps: SweepSchedule,
    empty: ChainSnapshot,
}

impl Default for ChainStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scopes: DashMap::new(),
            sweeps: SweepSchedule::default(),
            empty: Arc::new(Vec::new()),
        }
    }

    /// Sweep dead object scopes at most every `floor` new object scopes.
    #[must_use]
    pub fn with_sweep_floor(mut self, floor: usize) -> Self {
        self.sweeps = SweepSchedule::new(floor);
        self
    }

    fn existing_scope(&self, target: &Target) -> Option<Arc<Scope>> {
        self.scopes
            .get(&target.scope_key())
            .map(|scope| Arc::clone(scope.value()))
    }

    fn scope_for(&self, target: &Target) -> Arc<Scope> {
        let key = target.scope_key();
        if let Some(scope) = self.scopes.get(&key) {
            return Arc::clone(scope.value());
        }

        let (scope, created) = match self.scopes.entry(key) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => (Arc::clone(&entry.insert(Arc::new(Scope::new(target)))), true),
        };

        // The entry guard is released above; sweeping takes shard locks.
        if created && !target.is_type() && self.sweeps.record(self.scopes.len()) {
            self.sweep();
        }
        scope
    }

    /// Return (creating on first use) the chain for `operation` in the
    /// target's scope.
    #[must_use]
    pub fn chain_for(&self, target: &Target, operation: &Operation) -> InterceptorChain {
        self.scope_for(target)
            .chains
            .entry(operation.key())
            .or_insert_with(|| InterceptorChain::new(operation.key(), operation.is_interceptable()))
            .clone()
    }

    /// Current chain contents, empty if nothing was ever wrapped.
    ///
    /// Never creates a scope, so it is cheap on the dispatch path.
    #[must_use]
    pub fn snapshot(&self, target: &Target, operation: &Operation) -> ChainSnapshot {
        self.existing_scope(target)
            .and_then(|scope| {
                scope
                    .chains
                    .get(&operation.key())
                    .map(|chain| chain.snapshot())
            })
            .unwrap_or_else(|| Arc::clone(&self.empty))
    }

    /// Insert at an explicit rank. See [`InterceptorChain::insert`].
    pub fn insert(
        &self,
        target: &Target,
        operation: &Operation,
        interceptor: InterceptorHandle,
        rank: usize,
    ) -> bool {
        if !operation.is_interceptable() {
            debug!(
                target: "weft::wrapping",
                operation = %operation.key(),
                "operation is not interceptable, skipping"
            );
            return false;
        }
        self.chain_for(target, operation).insert(interceptor, rank)
    }

    /// Insert at the rank `order` assigns. See
    /// [`InterceptorChain::insert_ranked`].
    pub fn insert_ranked(
        &self,
        target: &Target,
        operation: &Operation,
        interceptor: InterceptorHandle,
        order: &CompositionOrder,
    ) -> Option<usize> {
        if !operation.is_interceptable() {
            debug!(
                target: "weft::wrapping",
                operation = %operation.key(),
                "operation is not interceptable, skipping"
            );
            return None;
        }
        self.chain_for(target, operation)
            .insert_ranked(interceptor, order)
    }

    /// Remove every occurrence of `interceptor` from one chain.
    pub fn remove_interceptor(
        &self,
        target: &Target,
        operation: &Operation,
        interceptor: &InterceptorHandle,
    ) -> bool {
        self.existing_scope(target)
            .and_then(|scope| {
                scope
                    .chains
                    .get(&operation.key())
                    .map(|chain| chain.remove(interceptor))
            })
            .unwrap_or(false)
    }

    /// Remove every member of `set` from every chain, catch chain and the
    /// attached set of the target's scope. Other entries keep their
    /// relative order. Returns the number of chain entries removed.
    pub fn remove_all_for(&self, target: &Target, set: &InterceptorSet) -> usize {
        let Some(scope) = self.existing_scope(target) else {
            return 0;
        };

        let removed = scope
            .chains
            .iter()
            .map(|chain| chain.remove_all(set))
            .fold(0usize, usize::saturating_add);
        for catches in scope.catches.iter() {
            catches.remove_all(set);
        }
        scope.update_attached(|attached| {
            let before = attached.len();
            attached.retain(|h| !set.contains(h));
            attached.len() != before
        });

        debug!(
            target: "weft::wrapping",
            scope = %target.scope_key(),
            interceptors = set.len(),
            removed,
            "removed interceptors from scope"
        );
        removed
    }

    /// Detach one interceptor and remove it from every chain of the scope.
    pub fn unwrap(&self, target: &Target, interceptor: &InterceptorHandle) -> usize {
        let set: InterceptorSet = std::iter::once(interceptor.clone()).collect();
        self.remove_all_for(target, &set)
    }

    /// Record `interceptor` as attached to the target. Returns `false` if
    /// it already was.
    pub fn attach(&self, target: &Target, interceptor: InterceptorHandle) -> bool {
        let attached = self.scope_for(target).update_attached(|attached| {
            if attached.contains(&interceptor) {
                false
            } else {
                attached.push(interceptor.clone());
                true
            }
        });
        if attached {
            debug!(
                target: "weft::wrapping",
                scope = %target.scope_key(),
                interceptor = ?interceptor,
                "attached interceptor"
            );
        }
        attached
    }

    /// Forget that `interceptor` is attached, without touching chains.
    pub fn detach(&self, target: &Target, interceptor: &InterceptorHandle) -> bool {
        self.existing_scope(target).is_some_and(|scope| {
            scope.update_attached(|attached| {
                let before = attached.len();
                attached.retain(|h| h != interceptor);
                attached.len() != before
            })
        })
    }

    /// Interceptors attached to the target, in attachment order.
    #[must_use]
    pub fn attached_interceptors(&self, target: &Target) -> Arc<Vec<InterceptorHandle>> {
        self.existing_scope(target)
            .map_or_else(|| Arc::clone(&self.empty), |scope| scope.attached.load_full())
    }

    /// Whether this exact interceptor is attached to the target.
    #[must_use]
    pub fn is_attached(&self, target: &Target, interceptor: &InterceptorHandle) -> bool {
        self.attached_interceptors(target).contains(interceptor)
    }

    /// Whether any interceptor of `type_name` is attached to the target.
    #[must_use]
    pub fn is_attached_type(&self, target: &Target, type_name: &str) -> bool {
        self.attached_interceptors(target)
            .iter()
            .any(|h| h.type_name() == type_name)
    }

    /// Append a handler to the operation's catch chain.
    ///
    /// Rejected (`false`) for non-interceptable operations and for a
    /// repeated (interceptor, handler) pair.
    pub fn add_catch_entry(&self, target: &Target, operation: &Operation, entry: CatchEntry) -> bool {
        if !operation.is_interceptable() {
            return false;
        }
        let scope = self.scope_for(target);
        let chain = scope
            .catches
            .entry(operation.key())
            .or_insert_with(|| Arc::new(CatchChain::new(operation.key())))
            .clone();
        chain.push(entry)
    }

    /// The operation's catch chain, empty if none was ever declared.
    #[must_use]
    pub fn catch_chain(&self, target: &Target, operation: &Operation) -> CatchSnapshot {
        self.existing_scope(target)
            .and_then(|scope| {
                scope
                    .catches
                    .get(&operation.key())
                    .map(|chain| chain.snapshot())
            })
            .unwrap_or_default()
    }

    /// Keys of operations whose chain is currently non-empty.
    #[must_use]
    pub fn wrapped_operations(&self, target: &Target) -> Vec<OperationKey> {
        let mut keys: Vec<_> = self
            .existing_scope(target)
            .map(|scope| {
                scope
                    .chains
                    .iter()
                    .filter(|chain| !chain.is_empty())
                    .map(|chain| chain.key().clone())
                    .collect()
            })
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Drop an object's scope. Consumes "target destroyed" events.
    pub fn evict(&self, object: ObjectId) -> bool {
        let evicted = self.scopes.remove(&ScopeKey::Object(object)).is_some();
        if evicted {
            debug!(target: "weft::wrapping", %object, "evicted object scope");
        }
        evicted
    }

    /// Drop every scope whose object is gone. Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let before = self.scopes.len();
        self.scopes.retain(|_, scope| scope.is_live());
        let swept = before.saturating_sub(self.scopes.len());
        if swept > 0 {
            debug!(target: "weft::wrapping", swept, "swept dead object scopes");
        }
        swept
    }

    /// Number of live scopes (object and type).
    #[must_use]
    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }
}

impl std::fmt::Debug for ChainStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainStore")
            .field("scopes", &self.scopes.len())
            .finish_non_exhaustive()
    }
}
