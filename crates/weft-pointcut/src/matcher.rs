//! Applying pointcuts to targets.

use std::sync::Arc;
use tracing::{debug, trace};

use weft_chain::{CatchEntry, ChainStore, CompositionOrder};
use weft_core::{InterceptorHandle, OperationKey, Target};

use crate::error::{PointcutError, PointcutResult};
use crate::pointcut::{Pointcut, SharingMode};

/// What one [`Matcher::apply`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Interceptor installed, if the target matched.
    pub interceptor: Option<InterceptorHandle>,
    /// Operations whose chain now holds the interceptor.
    pub wrapped: Vec<OperationKey>,
    /// Whether the interceptor is in the target's attached set.
    pub attached: bool,
}

impl ApplyReport {
    /// Whether the pointcut left the target untouched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interceptor.is_none()
    }
}

/// Installs pointcut interceptors into a [`ChainStore`].
#[derive(Debug, Clone)]
pub struct Matcher {
    store: Arc<ChainStore>,
    order: Arc<CompositionOrder>,
    host: String,
}

impl Matcher {
    /// Create a matcher for the given host identity.
    #[must_use]
    pub fn new(store: Arc<ChainStore>, order: Arc<CompositionOrder>, host: impl Into<String>) -> Self {
        Self {
            store,
            order,
            host: host.into(),
        }
    }

    /// The chain store written to.
    #[must_use]
    pub fn store(&self) -> &Arc<ChainStore> {
        &self.store
    }

    /// The composition order used for insertion ranks.
    #[must_use]
    pub fn order(&self) -> &Arc<CompositionOrder> {
        &self.order
    }

    /// Host identity matched against pointcut host selectors.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Apply one pointcut to one target.
    ///
    /// Selectors are checked cheapest first (type, host, name). A matching
    /// target gets the pointcut's interceptor inserted, at its composition
    /// rank, into the chain of every selected operation, plus a catch entry
    /// per operation when the pointcut declares a handler. Applying twice is
    /// a no-op since chains never hold duplicates.
    ///
    /// # Errors
    ///
    /// Fails when the interceptor cannot be built or does not implement the
    /// declared catch handler. Nothing is inserted or cached in either case.
    pub fn apply(&self, pointcut: &Pointcut, target: &Target) -> PointcutResult<ApplyReport> {
        let ty = target.type_info();
        if !pointcut.matches_type(ty) || !pointcut.matches_host(&self.host) || !pointcut.matches_name(target) {
            trace!(
                target: "weft::pointcut",
                %pointcut,
                %target,
                "pointcut does not select target"
            );
            return Ok(ApplyReport::default());
        }

        let operations = pointcut.matching_operations(target);
        if operations.is_empty() && pointcut.sharing() == SharingMode::Shared {
            return Ok(ApplyReport::default());
        }

        let interceptor = pointcut.interceptor_for(target)?;
        if let Some(handler) = pointcut.catch_handler() {
            if !interceptor.handles(handler) {
                if pointcut.sharing() == SharingMode::OnePerTarget
                    && !self.store.is_attached(target, &interceptor)
                {
                    pointcut.forget(&target.scope_key());
                }
                return Err(PointcutError::UnknownHandler {
                    interceptor_type: interceptor.type_name().to_string(),
                    handler: handler.to_string(),
                });
            }
        }

        let mut wrapped = Vec::new();
        for operation in operations.iter() {
            let inserted = self
                .store
                .insert_ranked(target, operation, interceptor.clone(), &self.order);
            if inserted.is_none() && !self.store.snapshot(target, operation).contains(&interceptor) {
                continue;
            }
            if let Some(handler) = pointcut.catch_handler() {
                self.store.add_catch_entry(
                    target,
                    operation,
                    CatchEntry::new(interceptor.clone(), handler),
                );
            }
            wrapped.push(operation.key());
        }

        let attached = if !wrapped.is_empty() || pointcut.sharing() == SharingMode::OnePerTarget {
            self.store.attach(target, interceptor.clone());
            true
        } else {
            false
        };

        debug!(
            target: "weft::pointcut",
            %target,
            interceptor = ?interceptor,
            wrapped = wrapped.len(),
            attached,
            "applied pointcut"
        );
        Ok(ApplyReport {
            interceptor: Some(interceptor),
            wrapped,
            attached,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointcut::InterceptorFactory;
    use weft_chain::UnlistedPlacement;
    use weft_test::{
        CallLog, CatchingInterceptor, RecordingInterceptor, test_account, test_account_type,
        test_named_account, test_operation,
    };

    fn matcher(order: &[&str]) -> Matcher {
        Matcher::new(
            Arc::new(ChainStore::new()),
            Arc::new(CompositionOrder::new(order.iter().copied(), UnlistedPlacement::Last)),
            "node1",
        )
    }

    fn recorder(name: &str, log: &CallLog) -> InterceptorFactory {
        let log = log.clone();
        let name = name.to_string();
        InterceptorFactory::new(name.clone(), move |_| Ok(RecordingInterceptor::handle(name.clone(), &log)))
    }

    fn chain_types(m: &Matcher, target: &Target, signature: &str) -> Vec<String> {
        let op = test_operation(target.type_info(), signature);
        m.store()
            .snapshot(target, &op)
            .iter()
            .map(|h| h.type_name().to_string())
            .collect()
    }

    #[test]
    fn test_apply_wraps_selected_operations() {
        let log = CallLog::new();
        let m = matcher(&[]);
        let pc = Pointcut::builder(recorder("Audit", &log))
            .operations("deposit(i64)||withdraw(i64)")
            .build()
            .unwrap();
        let target = Target::from(test_account());

        let report = m.apply(&pc, &target).unwrap();
        assert_eq!(report.wrapped.len(), 2);
        assert!(report.attached);
        assert_eq!(chain_types(&m, &target, "deposit(i64)"), vec!["Audit"]);
        assert!(chain_types(&m, &target, "getBalance()").is_empty());
    }

    #[test]
    fn test_apply_is_idempotent() {
        let log = CallLog::new();
        let m = matcher(&[]);
        let pc = Pointcut::builder(recorder("Audit", &log))
            .operations("GETTERS")
            .build()
            .unwrap();
        let target = Target::from(test_account());

        let first = m.apply(&pc, &target).unwrap();
        let second = m.apply(&pc, &target).unwrap();
        assert_eq!(first.interceptor, second.interceptor);
        assert_eq!(chain_types(&m, &target, "getBalance()"), vec!["Audit"]);
        assert_eq!(m.store().attached_interceptors(&target).len(), 1);
    }

    #[test]
    fn test_composition_order_respected() {
        let log = CallLog::new();
        let m = matcher(&["Auth", "Audit"]);
        let audit = Pointcut::builder(recorder("Audit", &log)).build().unwrap();
        let auth = Pointcut::builder(recorder("Auth", &log)).build().unwrap();
        let cache = Pointcut::builder(recorder("Cache", &log)).build().unwrap();
        let target = Target::from(test_account());

        m.apply(&audit, &target).unwrap();
        m.apply(&cache, &target).unwrap();
        m.apply(&auth, &target).unwrap();
        assert_eq!(
            chain_types(&m, &target, "deposit(i64)"),
            vec!["Auth", "Audit", "Cache"]
        );
    }

    #[test]
    fn test_non_matching_target_untouched() {
        let log = CallLog::new();
        let m = matcher(&[]);
        let by_name = Pointcut::builder(recorder("Audit", &log))
            .names("vip-.*")
            .build()
            .unwrap();
        let by_host = Pointcut::builder(recorder("Audit", &log))
            .hosts("gateway")
            .build()
            .unwrap();
        let target = Target::from(test_named_account("regular"));

        assert!(m.apply(&by_name, &target).unwrap().is_empty());
        assert!(m.apply(&by_host, &target).unwrap().is_empty());
        assert!(m.store().wrapped_operations(&target).is_empty());
        assert!(log.is_empty());
    }

    #[test]
    fn test_static_operations_on_type_target() {
        let log = CallLog::new();
        let m = matcher(&[]);
        let pc = Pointcut::builder(recorder("Audit", &log))
            .operations("create()")
            .build()
            .unwrap();
        let ty = Target::from(test_account_type());
        let object = Target::from(test_account());

        assert_eq!(m.apply(&pc, &ty).unwrap().wrapped.len(), 1);
        assert_eq!(chain_types(&m, &ty, "create()"), vec!["Audit"]);

        // Instance candidates exclude statics, so the object only gets attached.
        let report = m.apply(&pc, &object).unwrap();
        assert!(report.wrapped.is_empty());
        assert!(report.attached);
    }

    #[test]
    fn test_shared_without_operations_is_skipped() {
        let log = CallLog::new();
        let m = matcher(&[]);
        let pc = Pointcut::builder(recorder("Audit", &log))
            .operations("noSuchOp()")
            .sharing(SharingMode::Shared)
            .build()
            .unwrap();
        let target = Target::from(test_account());
        assert!(m.apply(&pc, &target).unwrap().is_empty());
        assert!(m.store().attached_interceptors(&target).is_empty());
    }

    #[test]
    fn test_catch_handler_bound() {
        let log = CallLog::new();
        let m = matcher(&[]);
        let catcher = InterceptorHandle::new(CatchingInterceptor::new("Recovery", &log).with_handler("recover"));
        let pc = Pointcut::builder(InterceptorFactory::instance(catcher.clone()))
            .operations("withdraw(i64)")
            .catch_handler("recover")
            .build()
            .unwrap();
        let target = Target::from(test_account());

        m.apply(&pc, &target).unwrap();
        let op = test_operation(target.type_info(), "withdraw(i64)");
        let entries = m.store().catch_chain(&target, &op);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0], CatchEntry::new(catcher, "recover"));
    }

    #[test]
    fn test_unknown_handler_inserts_nothing() {
        let log = CallLog::new();
        let m = matcher(&[]);
        let pc = Pointcut::builder(recorder("Audit", &log))
            .catch_handler("recover")
            .build()
            .unwrap();
        let target = Target::from(test_account());

        let err = m.apply(&pc, &target).unwrap_err();
        assert!(matches!(err, PointcutError::UnknownHandler { .. }));
        assert!(m.store().wrapped_operations(&target).is_empty());
        assert_eq!(pc.per_target_count(), 0);
    }

    #[test]
    fn test_name_selector_keeps_type_operations() {
        let log = CallLog::new();
        let m = matcher(&[]);
        let pc = Pointcut::builder(recorder("Audit", &log))
            .names("vip-.*")
            .operations("create()||deposit(i64)")
            .build()
            .unwrap();
        let ty = Target::from(test_account_type());

        assert_eq!(m.apply(&pc, &ty).unwrap().wrapped.len(), 1);
        assert_eq!(chain_types(&m, &ty, "create()"), vec!["Audit"]);
        assert!(m.apply(&pc, &Target::from(test_named_account("regular"))).unwrap().is_empty());
        let vip = Target::from(test_named_account("vip-1"));
        assert_eq!(m.apply(&pc, &vip).unwrap().wrapped.len(), 1);
    }

    #[test]
    fn test_factory_error_surfaces() {
        let m = matcher(&[]);
        let pc = Pointcut::builder(InterceptorFactory::new("Broken", |_| Err("boom".into())))
            .build()
            .unwrap();
        let err = m.apply(&pc, &Target::from(test_account())).unwrap_err();
        assert!(matches!(err, PointcutError::Factory { .. }));
    }
}
