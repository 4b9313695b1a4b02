//! The dispatcher.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use weft_chain::ChainStore;
use weft_core::{
    CallError, CallGateway, CallResult, Instance, Invocation, LifecycleListener, Operation,
    RoleCall, Target, TypeInfo,
};

/// Runs intercepted calls against a [`ChainStore`].
///
/// Holds no per-call state: every call gets its own [`Invocation`], so one
/// dispatcher serves any number of concurrent and re-entrant calls.
pub struct Dispatcher {
    store: Arc<ChainStore>,
    listener: Option<Arc<dyn LifecycleListener>>,
}

impl Dispatcher {
    /// Create a dispatcher reading chains from `store`.
    #[must_use]
    pub fn new(store: Arc<ChainStore>) -> Self {
        Self {
            store,
            listener: None,
        }
    }

    /// Notify `listener` when an object or type is first used, so pointcuts
    /// can apply before the chain is read.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn LifecycleListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// The chain store read on every call.
    #[must_use]
    pub fn store(&self) -> &Arc<ChainStore> {
        &self.store
    }

    fn notify(&self, target: &Target, operation: &Operation) {
        let Some(listener) = &self.listener else {
            return;
        };
        match target {
            // Only the most derived constructor announces the object.
            Target::Object(object)
                if operation.is_constructor() && operation.owner() == object.class().name() =>
            {
                listener.when_using_new_instance(object);
            },
            Target::Type(ty) if operation.is_static() => listener.when_using_new_type(ty),
            _ => {},
        }
    }

    /// Dispatch a call.
    ///
    /// The chain is snapshotted once; concurrent changes to it do not affect
    /// this call. On failure the operation's catch chain is tried in order
    /// and the first handler that completes handles the failure, making the
    /// call return [`Value::Null`]. An unhandled failure is returned as it
    /// was raised, transport wrapping included.
    ///
    /// # Errors
    ///
    /// Returns the call's failure if no catch handler handled it.
    pub fn invoke(&self, target: &Target, operation: &Arc<Operation>, args: Vec<Value>) -> CallResult {
        self.notify(target, operation);

        let chain = self.store.snapshot(target, operation);
        trace!(
            target: "weft::wrapping",
            %target,
            operation = %operation.key(),
            chain_len = chain.len(),
            "dispatching call"
        );
        let result = Invocation::new(target, operation, args, chain)
            .with_gateway(self)
            .start();

        match result {
            Ok(value) => Ok(value),
            Err(error) => self.recover(target, operation, error),
        }
    }

    fn recover(&self, target: &Target, operation: &Operation, error: CallError) -> CallResult {
        let handlers = self.store.catch_chain(target, operation);
        if handlers.is_empty() {
            return Err(error);
        }

        let fault = error.fault();
        debug!(
            target: "weft::exceptions",
            operation = %operation.key(),
            %fault,
            transported = error.is_transported(),
            handlers = handlers.len(),
            "trying catch chain"
        );
        for entry in handlers.iter() {
            match entry.interceptor.catch(&entry.handler, target, fault) {
                Ok(_) => {
                    debug!(
                        target: "weft::exceptions",
                        operation = %operation.key(),
                        interceptor = ?entry.interceptor,
                        handler = %entry.handler,
                        "failure handled"
                    );
                    return Ok(Value::Null);
                },
                Err(raised) => {
                    debug!(
                        target: "weft::exceptions",
                        interceptor = ?entry.interceptor,
                        handler = %entry.handler,
                        error = %raised,
                        "catch handler raised, trying next"
                    );
                },
            }
        }

        warn!(
            target: "weft::exceptions",
            operation = %operation.key(),
            %fault,
            "failure not handled by any catch handler"
        );
        Err(error)
    }

    /// Invoke role operation `name` on the first attached interceptor
    /// exposing it, optionally restricted to one interceptor type.
    ///
    /// Returns `None` when no attached interceptor exposes the role.
    pub fn invoke_role(
        &self,
        target: &Target,
        name: &str,
        args: Vec<Value>,
        required_type: Option<&str>,
    ) -> Option<CallResult> {
        if let (Some(listener), Target::Type(ty)) = (&self.listener, target) {
            listener.when_using_new_type(ty);
        }

        let attached = self.store.attached_interceptors(target);
        let Some(interceptor) = attached
            .iter()
            .filter(|h| required_type.is_none_or(|ty| h.type_name() == ty))
            .find(|h| h.exposes_role(name))
        else {
            debug!(
                target: "weft::roles",
                %target,
                role = name,
                required_type,
                attached = attached.len(),
                "no role operation"
            );
            return None;
        };

        trace!(
            target: "weft::roles",
            %target,
            role = name,
            interceptor = ?interceptor,
            "invoking role operation"
        );
        let call = RoleCall::new(target, &args).with_gateway(self);
        Some(interceptor.invoke_role(name, &call))
    }

    /// Create an object of `class` and run the constructor `signature` on it
    /// through its chain.
    ///
    /// # Errors
    ///
    /// Fails with `no_such_constructor` if `class` declares no such
    /// constructor, or with the constructor's own failure.
    pub fn construct(
        &self,
        class: &Arc<TypeInfo>,
        signature: &str,
        args: Vec<Value>,
    ) -> Result<Arc<Instance>, CallError> {
        let constructor = class
            .constructors()
            .find(|op| op.signature() == signature)
            .cloned()
            .ok_or_else(|| {
                CallError::raised(
                    "no_such_constructor",
                    format!("{} has no constructor {signature}", class.name()),
                )
            })?;

        let object = Instance::new(Arc::clone(class));
        self.invoke(&Target::from(Arc::clone(&object)), &constructor, args)?;
        Ok(object)
    }
}

impl CallGateway for Dispatcher {
    fn call(&self, target: &Target, operation: &Arc<Operation>, args: Vec<Value>) -> CallResult {
        self.invoke(target, operation, args)
    }

    fn call_role(
        &self,
        target: &Target,
        name: &str,
        args: Vec<Value>,
        required_type: Option<&str>,
    ) -> Option<CallResult> {
        self.invoke_role(target, name, args, required_type)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("store", &self.store)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}
