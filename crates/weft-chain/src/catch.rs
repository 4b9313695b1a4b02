//! Catch chains: failure handlers bound to one (target, operation).

use arc_swap::ArcSwap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

use weft_core::{InterceptorHandle, InterceptorSet, OperationKey};

/// A named handler on an interceptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CatchEntry {
    /// The interceptor implementing the handler.
    pub interceptor: InterceptorHandle,
    /// Handler name passed to [`weft_core::Interceptor::catch`].
    pub handler: String,
}

impl CatchEntry {
    /// Create an entry.
    #[must_use]
    pub fn new(interceptor: InterceptorHandle, handler: impl Into<String>) -> Self {
        Self {
            interceptor,
            handler: handler.into(),
        }
    }
}

/// Handlers as they were when a failure was caught.
pub type CatchSnapshot = Arc<Vec<CatchEntry>>;

/// Ordered handlers, tried in declaration order on failure.
pub(crate) struct CatchChain {
    key: OperationKey,
    entries: ArcSwap<Vec<CatchEntry>>,
    write: Mutex<()>,
}

impl CatchChain {
    pub(crate) fn new(key: OperationKey) -> Self {
        Self {
            key,
            entries: ArcSwap::from_pointee(Vec::new()),
            write: Mutex::new(()),
        }
    }

    pub(crate) fn snapshot(&self) -> CatchSnapshot {
        self.entries.load_full()
    }

    /// Append unless the same (interceptor, handler) pair is present.
    pub(crate) fn push(&self, entry: CatchEntry) -> bool {
        let _guard = self.write.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.entries.load_full();
        if current.contains(&entry) {
            return false;
        }
        debug!(
            target: "weft::exceptions",
            operation = %self.key,
            interceptor = ?entry.interceptor,
            handler = %entry.handler,
            "added catch handler"
        );
        let mut next = Vec::clone(&current);
        next.push(entry);
        self.entries.store(Arc::new(next));
        true
    }

    /// Drop every entry owned by an interceptor in `set`.
    pub(crate) fn remove_all(&self, set: &InterceptorSet) -> usize {
        let _guard = self.write.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.entries.load_full();
        let next: Vec<_> = current
            .iter()
            .filter(|entry| !set.contains(&entry.interceptor))
            .cloned()
            .collect();
        let removed = current.len().saturating_sub(next.len());
        if removed > 0 {
            self.entries.store(Arc::new(next));
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_test::{CallLog, CatchingInterceptor};

    fn key() -> OperationKey {
        OperationKey {
            owner: "bank.Account".into(),
            signature: "withdraw(i64)".into(),
        }
    }

    #[test]
    fn test_push_keeps_declaration_order() {
        let log = CallLog::new();
        let h = InterceptorHandle::new(
            CatchingInterceptor::new("Recovery", &log)
                .with_handler("first")
                .with_handler("second"),
        );
        let chain = CatchChain::new(key());
        assert!(chain.push(CatchEntry::new(h.clone(), "first")));
        assert!(chain.push(CatchEntry::new(h.clone(), "second")));
        assert!(!chain.push(CatchEntry::new(h.clone(), "first")));

        let handlers: Vec<_> = chain.snapshot().iter().map(|e| e.handler.clone()).collect();
        assert_eq!(handlers, vec!["first", "second"]);
    }

    #[test]
    fn test_remove_all_by_owner() {
        let log = CallLog::new();
        let a = InterceptorHandle::new(CatchingInterceptor::new("A", &log).with_handler("h"));
        let b = InterceptorHandle::new(CatchingInterceptor::new("B", &log).with_handler("h"));
        let chain = CatchChain::new(key());
        chain.push(CatchEntry::new(a.clone(), "h"));
        chain.push(CatchEntry::new(b.clone(), "h"));

        let set: InterceptorSet = [a].into_iter().collect();
        assert_eq!(chain.remove_all(&set), 1);
        assert_eq!(chain.snapshot()[0].interceptor, b);
    }
}
