//! The interceptor seam.

use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

use crate::error::{CallError, CallResult, Fault};
use crate::invocation::{CallGateway, Invocation};
use crate::target::Target;

/// A behavioural extension attached to operations of a target.
///
/// Interceptors are shared between every chain they sit in and are called
/// concurrently, so any state they keep needs interior mutability.
pub trait Interceptor: Send + Sync + 'static {
    /// Interceptor type name, used by the composition order.
    fn type_name(&self) -> &str;

    /// Run around the intercepted operation.
    ///
    /// Call [`Invocation::proceed`] to hand control to the rest of the chain
    /// (and ultimately the original implementation). Not calling it
    /// short-circuits the call.
    ///
    /// # Errors
    ///
    /// Any failure raised here propagates to the caller unless a catch
    /// handler bound to the operation handles it.
    fn intercept(&self, call: &mut Invocation<'_>) -> CallResult;

    /// Whether the interceptor exposes the named role operation.
    fn exposes_role(&self, _name: &str) -> bool {
        false
    }

    /// Invoke a role operation.
    ///
    /// # Errors
    ///
    /// The default implementation raises `no_role_operation`.
    fn invoke_role(&self, name: &str, _call: &RoleCall<'_>) -> CallResult {
        Err(CallError::raised(
            "no_role_operation",
            format!("{} exposes no role operation {name}", self.type_name()),
        ))
    }

    /// Whether the interceptor implements the named catch handler.
    fn handles(&self, _handler: &str) -> bool {
        false
    }

    /// Try to handle a failure. `Ok` means handled.
    ///
    /// # Errors
    ///
    /// Raising means "not handled": the next handler in the catch chain is
    /// tried.
    fn catch(&self, _handler: &str, _target: &Target, fault: &Fault) -> CallResult {
        Err(CallError::Raised(fault.clone()))
    }
}

/// Arguments of an out-of-band role call.
pub struct RoleCall<'a> {
    target: &'a Target,
    args: &'a [Value],
    gateway: Option<&'a dyn CallGateway>,
}

impl<'a> RoleCall<'a> {
    /// Build a role call.
    #[must_use]
    pub fn new(target: &'a Target, args: &'a [Value]) -> Self {
        Self {
            target,
            args,
            gateway: None,
        }
    }

    /// Give the interceptor a way to issue nested calls.
    #[must_use]
    pub fn with_gateway(mut self, gateway: &'a dyn CallGateway) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// The target the role was invoked on.
    #[must_use]
    pub fn target(&self) -> &Target {
        self.target
    }

    /// Call arguments.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        self.args
    }

    /// Gateway for nested calls, if the caller supplied one.
    #[must_use]
    pub fn gateway(&self) -> Option<&'a dyn CallGateway> {
        self.gateway
    }
}

/// Shared handle to an interceptor.
///
/// Equality and hashing use pointer identity: two handles are equal only if
/// they point at the same interceptor instance.
#[derive(Clone)]
pub struct InterceptorHandle(Arc<dyn Interceptor>);

impl InterceptorHandle {
    /// Wrap a fresh interceptor.
    #[must_use]
    pub fn new<I: Interceptor>(interceptor: I) -> Self {
        Self(Arc::new(interceptor))
    }

    /// Wrap an already-shared interceptor.
    #[must_use]
    pub fn from_arc(interceptor: Arc<dyn Interceptor>) -> Self {
        Self(interceptor)
    }

    /// The shared interceptor.
    #[must_use]
    pub fn as_arc(&self) -> &Arc<dyn Interceptor> {
        &self.0
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0).cast::<()>()
    }
}

impl Deref for InterceptorHandle {
    type Target = dyn Interceptor;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl PartialEq for InterceptorHandle {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.addr(), other.addr())
    }
}

impl Eq for InterceptorHandle {}

impl Hash for InterceptorHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.addr(), state);
    }
}

impl fmt::Debug for InterceptorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:p}", self.0.type_name(), self.addr())
    }
}

impl<I: Interceptor> From<Arc<I>> for InterceptorHandle {
    fn from(interceptor: Arc<I>) -> Self {
        Self(interceptor)
    }
}

/// An unordered set of interceptors, e.g. everything one module created.
#[derive(Debug, Clone, Default)]
pub struct InterceptorSet {
    members: HashSet<InterceptorHandle>,
}

impl InterceptorSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an interceptor. Returns `false` if it was already present.
    pub fn insert(&mut self, interceptor: InterceptorHandle) -> bool {
        self.members.insert(interceptor)
    }

    /// Remove an interceptor. Returns `false` if it was not present.
    pub fn remove(&mut self, interceptor: &InterceptorHandle) -> bool {
        self.members.remove(interceptor)
    }

    /// Membership test.
    #[must_use]
    pub fn contains(&self, interceptor: &InterceptorHandle) -> bool {
        self.members.contains(interceptor)
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterate the members in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &InterceptorHandle> {
        self.members.iter()
    }
}

impl FromIterator<InterceptorHandle> for InterceptorSet {
    fn from_iter<T: IntoIterator<Item = InterceptorHandle>>(iter: T) -> Self {
        Self {
            members: iter.into_iter().collect(),
        }
    }
}

impl Extend<InterceptorHandle> for InterceptorSet {
    fn extend<T: IntoIterator<Item = InterceptorHandle>>(&mut self, iter: T) {
        self.members.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop(&'static str);

    impl Interceptor for Noop {
        fn type_name(&self) -> &str {
            self.0
        }

        fn intercept(&self, call: &mut Invocation<'_>) -> CallResult {
            call.proceed()
        }
    }

    #[test]
    fn test_handle_identity() {
        let a = InterceptorHandle::new(Noop("A"));
        let a2 = a.clone();
        let other_a = InterceptorHandle::new(Noop("A"));
        assert_eq!(a, a2);
        assert_ne!(a, other_a);
    }

    #[test]
    fn test_set_dedups_by_identity() {
        let a = InterceptorHandle::new(Noop("A"));
        let mut set = InterceptorSet::new();
        assert!(set.insert(a.clone()));
        assert!(!set.insert(a.clone()));
        assert!(set.insert(InterceptorHandle::new(Noop("A"))));
        assert_eq!(set.len(), 2);
        assert!(set.contains(&a));
        assert!(set.remove(&a));
        assert!(!set.remove(&a));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_default_role_and_catch() {
        let a = InterceptorHandle::new(Noop("A"));
        let ty = crate::rtti::TypeInfo::builder("T").build().unwrap();
        let target = Target::from(ty);
        assert!(!a.exposes_role("ping"));
        let err = a.invoke_role("ping", &RoleCall::new(&target, &[])).unwrap_err();
        assert_eq!(err.fault().kind, "no_role_operation");

        let fault = Fault::new("boom", "exploded");
        assert!(!a.handles("recover"));
        let err = a.catch("recover", &target, &fault).unwrap_err();
        assert_eq!(err.fault(), &fault);
    }

    #[test]
    fn test_debug_shows_type() {
        let a = InterceptorHandle::new(Noop("Audit"));
        assert!(format!("{a:?}").starts_with("Audit@"));
    }
}
