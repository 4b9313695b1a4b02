//! Mock interceptors and listeners for testing.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use weft_core::{
    CallError, CallResult, Fault, Interceptor, InterceptorHandle, Invocation, LifecycleListener,
    ObjectId, RoleCall, Target, TypeInfo, Wrappee,
};

/// Shared, ordered record of what mocks observed.
///
/// Uses `std::sync::Mutex` so it can be cloned into interceptors running on
/// any thread.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn record(&self, entry: impl Into<String>) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.push(entry.into());
        }
    }

    /// Copy of every entry so far.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|g| g.len()).unwrap_or_default()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every entry.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.clear();
        }
    }
}

/// Records its type name, then proceeds.
#[derive(Debug)]
pub struct RecordingInterceptor {
    type_name: String,
    label: String,
    log: CallLog,
}

impl RecordingInterceptor {
    /// Create a recorder that logs its type name.
    #[must_use]
    pub fn new(type_name: impl Into<String>, log: &CallLog) -> Self {
        let type_name = type_name.into();
        Self {
            label: type_name.clone(),
            type_name,
            log: log.clone(),
        }
    }

    /// Log `label` instead of the type name (distinguishes instances).
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Shorthand for a handle to a new recorder.
    #[must_use]
    pub fn handle(type_name: impl Into<String>, log: &CallLog) -> InterceptorHandle {
        InterceptorHandle::new(Self::new(type_name, log))
    }
}

impl Interceptor for RecordingInterceptor {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn intercept(&self, call: &mut Invocation<'_>) -> CallResult {
        self.log.record(self.label.clone());
        call.proceed()
    }
}

/// Raises a fixed fault without proceeding.
#[derive(Debug)]
pub struct FailingInterceptor {
    type_name: String,
    fault: Fault,
    transported: bool,
}

impl FailingInterceptor {
    /// Create an interceptor raising `fault`.
    #[must_use]
    pub fn new(type_name: impl Into<String>, fault: Fault) -> Self {
        Self {
            type_name: type_name.into(),
            fault,
            transported: false,
        }
    }

    /// Raise the fault transport-wrapped.
    #[must_use]
    pub fn transported(mut self) -> Self {
        self.transported = true;
        self
    }
}

impl Interceptor for FailingInterceptor {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn intercept(&self, _call: &mut Invocation<'_>) -> CallResult {
        let fault = self.fault.clone();
        if self.transported {
            Err(CallError::Transported(fault))
        } else {
            Err(CallError::Raised(fault))
        }
    }
}

/// Proceeds transparently and exposes fixed-result role operations.
#[derive(Debug)]
pub struct RoleInterceptor {
    type_name: String,
    roles: HashMap<String, Value>,
    log: CallLog,
}

impl RoleInterceptor {
    /// Create an interceptor with no roles.
    #[must_use]
    pub fn new(type_name: impl Into<String>, log: &CallLog) -> Self {
        Self {
            type_name: type_name.into(),
            roles: HashMap::new(),
            log: log.clone(),
        }
    }

    /// Expose role `name` returning `result`.
    #[must_use]
    pub fn with_role(mut self, name: impl Into<String>, result: Value) -> Self {
        self.roles.insert(name.into(), result);
        self
    }
}

impl Interceptor for RoleInterceptor {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn intercept(&self, call: &mut Invocation<'_>) -> CallResult {
        call.proceed()
    }

    fn exposes_role(&self, name: &str) -> bool {
        self.roles.contains_key(name)
    }

    fn invoke_role(&self, name: &str, call: &RoleCall<'_>) -> CallResult {
        self.log
            .record(format!("{}.{name}/{}", self.type_name, call.args().len()));
        self.roles
            .get(name)
            .cloned()
            .ok_or_else(|| CallError::raised("no_role_operation", name.to_string()))
    }
}

/// Proceeds transparently and implements named catch handlers.
///
/// Each handler either succeeds (handles the failure) or raises.
#[derive(Debug)]
pub struct CatchingInterceptor {
    type_name: String,
    handlers: HashMap<String, bool>,
    log: CallLog,
}

impl CatchingInterceptor {
    /// Create an interceptor with no handlers.
    #[must_use]
    pub fn new(type_name: impl Into<String>, log: &CallLog) -> Self {
        Self {
            type_name: type_name.into(),
            handlers: HashMap::new(),
            log: log.clone(),
        }
    }

    /// Add a handler that handles every failure.
    #[must_use]
    pub fn with_handler(mut self, name: impl Into<String>) -> Self {
        self.handlers.insert(name.into(), true);
        self
    }

    /// Add a handler that raises while handling.
    #[must_use]
    pub fn with_failing_handler(mut self, name: impl Into<String>) -> Self {
        self.handlers.insert(name.into(), false);
        self
    }
}

impl Interceptor for CatchingInterceptor {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn intercept(&self, call: &mut Invocation<'_>) -> CallResult {
        call.proceed()
    }

    fn handles(&self, handler: &str) -> bool {
        self.handlers.contains_key(handler)
    }

    fn catch(&self, handler: &str, _target: &Target, fault: &Fault) -> CallResult {
        self.log.record(format!("{handler}:{}", fault.kind));
        match self.handlers.get(handler) {
            Some(true) => Ok(Value::Null),
            _ => Err(CallError::raised(
                "handler_failed",
                format!("{handler} could not handle {}", fault.kind),
            )),
        }
    }
}

type InterceptFn = dyn Fn(&mut Invocation<'_>) -> CallResult + Send + Sync;

/// An interceptor defined by a closure.
pub struct FnInterceptor {
    type_name: String,
    body: Box<InterceptFn>,
}

impl FnInterceptor {
    /// Create an interceptor running `body`.
    #[must_use]
    pub fn new<F>(type_name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut Invocation<'_>) -> CallResult + Send + Sync + 'static,
    {
        Self {
            type_name: type_name.into(),
            body: Box::new(body),
        }
    }
}

impl Interceptor for FnInterceptor {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn intercept(&self, call: &mut Invocation<'_>) -> CallResult {
        (self.body)(call)
    }
}

/// Records lifecycle notifications.
#[derive(Debug, Default)]
pub struct RecordingListener {
    instances: Mutex<Vec<ObjectId>>,
    types: Mutex<Vec<String>>,
}

impl RecordingListener {
    /// Create a listener with nothing recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Objects reported as newly used.
    #[must_use]
    pub fn instances(&self) -> Vec<ObjectId> {
        self.instances.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Types reported as newly used.
    #[must_use]
    pub fn types(&self) -> Vec<String> {
        self.types.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

impl LifecycleListener for RecordingListener {
    fn when_using_new_instance(&self, object: &Arc<dyn Wrappee>) {
        if let Ok(mut guard) = self.instances.lock() {
            guard.push(object.object_id());
        }
    }

    fn when_using_new_type(&self, type_info: &Arc<TypeInfo>) {
        if let Ok(mut guard) = self.types.lock() {
            guard.push(type_info.name().to_string());
        }
    }
}
