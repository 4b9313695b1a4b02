//! Module-owned pointcuts, applied as targets come into use.
//!
//! The registry is the [`LifecycleListener`] the dispatcher notifies. Each
//! target is matched once, on its first use; pointcuts activated later are
//! applied to every live target already seen. Deactivating a module removes
//! exactly the interceptors its pointcuts installed.
//!
//! Concurrent first users of a target block until its pointcuts are
//! applied, so no call reads a chain that is still being woven.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock, Weak};
use tracing::{debug, info, warn};

use weft_chain::SweepSchedule;
use weft_core::{
    InterceptorHandle, InterceptorSet, LifecycleListener, ModuleId, ObjectId, ScopeKey, Target,
    TypeInfo, Wrappee,
};

use crate::error::{PointcutError, PointcutResult};
use crate::matcher::Matcher;
use crate::pointcut::Pointcut;

/// A pointcut that could not be applied to a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyFailure {
    /// Display form of the target.
    pub target: String,
    /// Interceptor type the pointcut installs.
    pub interceptor_type: String,
    /// Why it failed.
    pub error: PointcutError,
}

/// Result of [`PointcutRegistry::activate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationSummary {
    /// Pointcuts added.
    pub pointcuts: usize,
    /// Already-seen targets the pointcuts selected.
    pub targets: usize,
    /// Operations wrapped across those targets.
    pub wrapped: usize,
    /// Applications that failed. The rest of the module stays active.
    pub failures: Vec<ApplyFailure>,
}

impl ActivationSummary {
    /// Whether every application succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A target reached by a module, held without keeping objects alive.
enum Reached {
    Object(Weak<dyn Wrappee>),
    Type(Arc<TypeInfo>),
}

impl Reached {
    fn upgrade(&self) -> Option<Target> {
        match self {
            Self::Object(object) => object.upgrade().map(Target::Object),
            Self::Type(ty) => Some(Target::Type(Arc::clone(ty))),
        }
    }

    fn is_live(&self) -> bool {
        match self {
            Self::Object(object) => object.strong_count() > 0,
            Self::Type(_) => true,
        }
    }
}

struct ModuleRecord {
    id: ModuleId,
    pointcuts: RwLock<Vec<Arc<Pointcut>>>,
    reached: DashMap<ScopeKey, Reached>,
    installed: Mutex<InterceptorSet>,
}

impl ModuleRecord {
    fn new(id: ModuleId) -> Self {
        Self {
            id,
            pointcuts: RwLock::new(Vec::new()),
            reached: DashMap::new(),
            installed: Mutex::new(InterceptorSet::new()),
        }
    }

    fn pointcuts(&self) -> Vec<Arc<Pointcut>> {
        self.pointcuts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn uninstall(&self, released: &[InterceptorHandle]) {
        if released.is_empty() {
            return;
        }
        let mut installed = self.installed.lock().unwrap_or_else(PoisonError::into_inner);
        for handle in released {
            installed.remove(handle);
        }
    }
}

/// A target seen by the registry. `applied` completes once every active
/// pointcut has been applied; concurrent first users wait on it.
struct Seen<T> {
    target: T,
    applied: OnceLock<()>,
}

impl<T> Seen<T> {
    fn new(target: T) -> Arc<Self> {
        Arc::new(Self {
            target,
            applied: OnceLock::new(),
        })
    }
}

/// Registry of active modules and the targets seen so far.
pub struct PointcutRegistry {
    matcher: Matcher,
    modules: RwLock<Vec<Arc<ModuleRecord>>>,
    seen_types: DashMap<String, Arc<Seen<Arc<TypeInfo>>>>,
    seen_objects: DashMap<ObjectId, Arc<Seen<Weak<dyn Wrappee>>>>,
    sweeps: SweepSchedule,
}

impl PointcutRegistry {
    /// Create a registry applying pointcuts through `matcher`.
    #[must_use]
    pub fn new(matcher: Matcher) -> Self {
        Self {
            matcher,
            modules: RwLock::new(Vec::new()),
            seen_types: DashMap::new(),
            seen_objects: DashMap::new(),
            sweeps: SweepSchedule::default(),
        }
    }

    /// Sweep dead objects at most every `floor` new objects.
    #[must_use]
    pub fn with_sweep_floor(mut self, floor: usize) -> Self {
        self.sweeps = SweepSchedule::new(floor);
        self
    }

    /// The matcher pointcuts are applied with.
    #[must_use]
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    fn module_records(&self) -> Vec<Arc<ModuleRecord>> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record_for(&self, module: ModuleId) -> Arc<ModuleRecord> {
        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = modules.iter().find(|m| m.id == module) {
            return Arc::clone(existing);
        }
        let record = Arc::new(ModuleRecord::new(module));
        modules.push(Arc::clone(&record));
        record
    }

    /// Activate pointcuts on behalf of `module`.
    ///
    /// The pointcuts apply to every target used from now on and,
    /// immediately, to every live target already seen. Activating a module
    /// that is already active adds to its pointcuts.
    pub fn activate(&self, module: ModuleId, pointcuts: Vec<Pointcut>) -> ActivationSummary {
        let record = self.record_for(module);
        let pointcuts: Vec<Arc<Pointcut>> = pointcuts.into_iter().map(Arc::new).collect();
        record
            .pointcuts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(pointcuts.iter().cloned());

        let mut summary = ActivationSummary {
            pointcuts: pointcuts.len(),
            ..ActivationSummary::default()
        };
        for target in self.seen_targets() {
            let mut selected = false;
            for pointcut in &pointcuts {
                match self.apply_one(&record, pointcut, &target) {
                    Ok(wrapped) => {
                        selected |= wrapped.is_some();
                        summary.wrapped = summary.wrapped.saturating_add(wrapped.unwrap_or(0));
                    },
                    Err(error) => summary.failures.push(ApplyFailure {
                        target: target.to_string(),
                        interceptor_type: pointcut.interceptor_type().to_string(),
                        error,
                    }),
                }
            }
            if selected {
                summary.targets = summary.targets.saturating_add(1);
            }
        }

        info!(
            target: "weft::pointcut",
            %module,
            pointcuts = summary.pointcuts,
            targets = summary.targets,
            wrapped = summary.wrapped,
            failures = summary.failures.len(),
            "activated module"
        );
        summary
    }

    /// Remove everything `module` installed. Returns the number of chain
    /// entries removed; `0` if the module was not active.
    pub fn deactivate(&self, module: ModuleId) -> usize {
        let record = {
            let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
            let Some(index) = modules.iter().position(|m| m.id == module) else {
                return 0;
            };
            modules.remove(index)
        };

        let installed = std::mem::take(
            &mut *record.installed.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let reached: Vec<Target> = record
            .reached
            .iter()
            .filter_map(|entry| entry.value().upgrade())
            .collect();
        record.reached.clear();

        let mut removed = 0usize;
        for target in &reached {
            removed = removed.saturating_add(self.matcher.store().remove_all_for(target, &installed));
        }

        info!(
            target: "weft::pointcut",
            %module,
            interceptors = installed.len(),
            removed,
            "deactivated module"
        );
        removed
    }

    /// Ids of active modules, in activation order.
    #[must_use]
    pub fn modules(&self) -> Vec<ModuleId> {
        self.module_records().iter().map(|m| m.id).collect()
    }

    /// Whether `module` is active.
    #[must_use]
    pub fn is_active(&self, module: ModuleId) -> bool {
        self.module_records().iter().any(|m| m.id == module)
    }

    /// Forget a destroyed object, here, in every pointcut and in the chain
    /// store. Interceptors built for the object alone are released.
    pub fn evict(&self, object: ObjectId) -> bool {
        let seen = self.seen_objects.remove(&object).is_some();
        let scope = ScopeKey::Object(object);
        for record in self.module_records() {
            record.reached.remove(&scope);
            let released: Vec<InterceptorHandle> = record
                .pointcuts()
                .iter()
                .filter_map(|pointcut| pointcut.forget(&scope))
                .collect();
            record.uninstall(&released);
        }
        let scoped = self.matcher.store().evict(object);
        seen || scoped
    }

    /// Forget every object that is gone, release the interceptors built for
    /// them and sweep the chain store. Returns the number of objects
    /// forgotten.
    pub fn sweep(&self) -> usize {
        let before = self.seen_objects.len();
        self.seen_objects
            .retain(|_, seen| seen.target.strong_count() > 0);
        let forgotten = before.saturating_sub(self.seen_objects.len());

        let mut released_total = 0usize;
        for record in self.module_records() {
            record.reached.retain(|_, reached| reached.is_live());
            for pointcut in record.pointcuts() {
                let released = pointcut.release_scopes(|scope| match scope {
                    ScopeKey::Object(id) => self.seen_objects.contains_key(id),
                    ScopeKey::Type(_) => true,
                });
                released_total = released_total.saturating_add(released.len());
                record.uninstall(&released);
            }
        }
        self.matcher.store().sweep();

        if forgotten > 0 || released_total > 0 {
            debug!(
                target: "weft::lifecycle",
                forgotten,
                released = released_total,
                "swept dead objects"
            );
        }
        forgotten
    }

    /// Number of targets seen (live objects plus types).
    #[must_use]
    pub fn seen_count(&self) -> usize {
        self.seen_objects
            .iter()
            .filter(|entry| entry.value().target.strong_count() > 0)
            .count()
            .saturating_add(self.seen_types.len())
    }

    fn seen_targets(&self) -> Vec<Target> {
        let mut targets: Vec<Target> = self
            .seen_types
            .iter()
            .map(|entry| Target::Type(Arc::clone(&entry.value().target)))
            .collect();
        targets.extend(
            self.seen_objects
                .iter()
                .filter_map(|entry| entry.value().target.upgrade().map(Target::Object)),
        );
        targets
    }

    /// Apply one pointcut and book-keep what it installed. Returns the
    /// number of operations wrapped, `None` if the target was not selected.
    fn apply_one(
        &self,
        record: &ModuleRecord,
        pointcut: &Pointcut,
        target: &Target,
    ) -> PointcutResult<Option<usize>> {
        let report = self.matcher.apply(pointcut, target)?;
        let Some(interceptor) = report.interceptor else {
            return Ok(None);
        };

        record
            .installed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(interceptor);
        record
            .reached
            .entry(target.scope_key())
            .or_insert_with(|| match target {
                Target::Object(object) => Reached::Object(Arc::downgrade(object)),
                Target::Type(ty) => Reached::Type(Arc::clone(ty)),
            });
        Ok(Some(report.wrapped.len()))
    }

    /// Apply every active pointcut to a newly used target. Failures are
    /// logged: the call that triggered the lifecycle event still proceeds.
    fn apply_all(&self, target: &Target) {
        for record in self.module_records() {
            for pointcut in record.pointcuts() {
                if let Err(error) = self.apply_one(&record, &pointcut, target) {
                    warn!(
                        target: "weft::pointcut",
                        module = %record.id,
                        %target,
                        interceptor_type = pointcut.interceptor_type(),
                        %error,
                        "failed to apply pointcut"
                    );
                }
            }
        }
    }
}

// Interceptor factories run inside `applied.get_or_init` and must not
// dispatch on the target being initialized.
impl LifecycleListener for PointcutRegistry {
    fn when_using_new_instance(&self, object: &Arc<dyn Wrappee>) {
        let id = object.object_id();
        let (seen, created) = match self.seen_objects.entry(id) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => (
                Arc::clone(&entry.insert(Seen::new(Arc::downgrade(object)))),
                true,
            ),
        };
        if created && self.sweeps.record(self.seen_objects.len()) {
            self.sweep();
        }
        seen.applied.get_or_init(|| {
            debug!(target: "weft::lifecycle", object = %id, class = %object.class().name(), "new instance");
            self.apply_all(&Target::Object(Arc::clone(object)));
        });
    }

    fn when_using_new_type(&self, type_info: &Arc<TypeInfo>) {
        let existing = self
            .seen_types
            .get(type_info.name())
            .map(|entry| Arc::clone(entry.value()));
        let seen = existing.unwrap_or_else(|| {
            Arc::clone(
                &self
                    .seen_types
                    .entry(type_info.name().to_string())
                    .or_insert_with(|| Seen::new(Arc::clone(type_info))),
            )
        });
        seen.applied.get_or_init(|| {
            debug!(target: "weft::lifecycle", type_name = %type_info.name(), "new type");
            self.apply_all(&Target::Type(Arc::clone(&seen.target)));
        });
    }
}

impl std::fmt::Debug for PointcutRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointcutRegistry")
            .field("modules", &self.modules())
            .field("seen_types", &self.seen_types.len())
            .field("seen_objects", &self.seen_objects.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointcut::{InterceptorFactory, SharingMode};
    use weft_chain::{ChainStore, CompositionOrder};
    use weft_test::{
        CallLog, RecordingInterceptor, test_account, test_account_type, test_operation,
    };

    fn registry() -> PointcutRegistry {
        PointcutRegistry::new(Matcher::new(
            Arc::new(ChainStore::new()),
            Arc::new(CompositionOrder::default()),
            "node1",
        ))
    }

    fn audit(log: &CallLog, operations: &str) -> Pointcut {
        let log = log.clone();
        Pointcut::builder(InterceptorFactory::new("Audit", move |_| {
            Ok(RecordingInterceptor::handle("Audit", &log))
        }))
        .operations(operations)
        .build()
        .unwrap()
    }

    fn chain_len(reg: &PointcutRegistry, target: &Target, signature: &str) -> usize {
        let op = test_operation(target.type_info(), signature);
        reg.matcher().store().snapshot(target, &op).len()
    }

    fn as_wrappee(object: &Arc<weft_core::Instance>) -> Arc<dyn Wrappee> {
        Arc::clone(object) as Arc<dyn Wrappee>
    }

    #[test]
    fn test_applies_on_first_use() {
        let log = CallLog::new();
        let reg = registry();
        let module = ModuleId::new();
        let summary = reg.activate(module, vec![audit(&log, "deposit(i64)")]);
        assert_eq!(summary.pointcuts, 1);
        assert_eq!(summary.targets, 0);

        let object = test_account();
        let target = Target::from(Arc::clone(&object));
        assert_eq!(chain_len(&reg, &target, "deposit(i64)"), 0);

        reg.when_using_new_instance(&as_wrappee(&object));
        assert_eq!(chain_len(&reg, &target, "deposit(i64)"), 1);

        // A second notification does not re-apply.
        reg.when_using_new_instance(&as_wrappee(&object));
        assert_eq!(chain_len(&reg, &target, "deposit(i64)"), 1);
        assert_eq!(reg.matcher().store().attached_interceptors(&target).len(), 1);
    }

    #[test]
    fn test_late_activation_reaches_seen_targets() {
        let log = CallLog::new();
        let reg = registry();
        let object = test_account();
        reg.when_using_new_instance(&as_wrappee(&object));
        reg.when_using_new_type(&test_account_type());

        let summary = reg.activate(ModuleId::new(), vec![audit(&log, "deposit(i64)||create()")]);
        assert!(summary.is_clean());
        assert_eq!(summary.targets, 2);
        assert_eq!(summary.wrapped, 2);
        assert_eq!(chain_len(&reg, &Target::from(test_account_type()), "create()"), 1);
        assert_eq!(reg.seen_count(), 2);
    }

    #[test]
    fn test_deactivate_removes_only_own_interceptors() {
        let log = CallLog::new();
        let reg = registry();
        let first = ModuleId::new();
        let second = ModuleId::new();
        reg.activate(first, vec![audit(&log, "deposit(i64)")]);
        reg.activate(second, vec![audit(&log, "deposit(i64)")]);

        let object = test_account();
        let target = Target::from(Arc::clone(&object));
        reg.when_using_new_instance(&as_wrappee(&object));
        assert_eq!(chain_len(&reg, &target, "deposit(i64)"), 2);

        assert_eq!(reg.deactivate(first), 1);
        assert_eq!(chain_len(&reg, &target, "deposit(i64)"), 1);
        assert_eq!(reg.modules(), vec![second]);
        assert!(!reg.is_active(first));
        assert_eq!(reg.deactivate(first), 0);
    }

    #[test]
    fn test_failures_are_collected() {
        let reg = registry();
        let object = test_account();
        reg.when_using_new_instance(&as_wrappee(&object));

        let broken = Pointcut::builder(InterceptorFactory::new("Broken", |_| Err("nope".into())))
            .sharing(SharingMode::Shared)
            .build()
            .unwrap();
        let summary = reg.activate(ModuleId::new(), vec![broken]);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].interceptor_type, "Broken");
    }

    #[test]
    fn test_dead_objects_are_not_retained() {
        let log = CallLog::new();
        let reg = registry();
        reg.activate(ModuleId::new(), vec![audit(&log, "ALL")]);
        {
            let object = test_account();
            reg.when_using_new_instance(&as_wrappee(&object));
        }
        assert_eq!(reg.seen_count(), 0);

        let object = test_account();
        reg.when_using_new_instance(&as_wrappee(&object));
        assert!(reg.evict(object.object_id()));
        assert_eq!(reg.seen_count(), 0);
    }

    fn attached_weak(reg: &PointcutRegistry, target: &Target) -> std::sync::Weak<dyn weft_core::Interceptor> {
        let attached = reg.matcher().store().attached_interceptors(target);
        assert_eq!(attached.len(), 1);
        Arc::downgrade(attached[0].as_arc())
    }

    #[test]
    fn test_evict_releases_per_target_interceptors() {
        let log = CallLog::new();
        let reg = registry();
        let pc = audit(&log, "deposit(i64)");
        reg.activate(ModuleId::new(), vec![pc]);

        let object = test_account();
        let id = object.object_id();
        reg.when_using_new_instance(&as_wrappee(&object));
        let interceptor = attached_weak(&reg, &Target::from(Arc::clone(&object)));

        drop(object);
        assert!(reg.evict(id));
        assert!(interceptor.upgrade().is_none());
    }

    #[test]
    fn test_sweep_releases_dead_objects() {
        let log = CallLog::new();
        let reg = registry();
        let module = ModuleId::new();
        reg.activate(module, vec![audit(&log, "deposit(i64)")]);

        let survivor = test_account();
        reg.when_using_new_instance(&as_wrappee(&survivor));
        let doomed = test_account();
        reg.when_using_new_instance(&as_wrappee(&doomed));
        let interceptor = attached_weak(&reg, &Target::from(Arc::clone(&doomed)));

        drop(doomed);
        assert_eq!(reg.sweep(), 1);
        assert!(interceptor.upgrade().is_none());
        assert_eq!(reg.matcher().store().scope_count(), 1);

        // The survivor's interceptor is still owned by the module.
        assert_eq!(reg.deactivate(module), 1);
    }

    #[test]
    fn test_new_objects_trigger_amortized_sweeps() {
        let log = CallLog::new();
        let reg = registry().with_sweep_floor(2);
        reg.activate(ModuleId::new(), vec![audit(&log, "deposit(i64)")]);

        let first = test_account();
        reg.when_using_new_instance(&as_wrappee(&first));
        let interceptor = attached_weak(&reg, &Target::from(Arc::clone(&first)));
        drop(first);
        assert!(interceptor.upgrade().is_some());

        let second = test_account();
        reg.when_using_new_instance(&as_wrappee(&second));
        assert!(interceptor.upgrade().is_none());
        assert_eq!(reg.seen_count(), 1);
    }

    #[test]
    fn test_concurrent_first_users_wait_for_weaving() {
        use std::sync::Barrier;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::time::Duration;
        const THREADS: usize = 6;

        let log = CallLog::new();
        let reg = registry();
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let slow = Pointcut::builder(InterceptorFactory::new("Census", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            Ok(RecordingInterceptor::handle("Census", &log))
        }))
        .operations("create()")
        .build()
        .unwrap();
        reg.activate(ModuleId::new(), vec![slow]);

        let start = Barrier::new(THREADS);
        let ty = test_account_type();
        let target = Target::from(Arc::clone(&ty));
        let lens: Vec<usize> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    s.spawn(|| {
                        start.wait();
                        reg.when_using_new_type(&ty);
                        chain_len(&reg, &target, "create()")
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(lens, vec![1; THREADS]);
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }
}
