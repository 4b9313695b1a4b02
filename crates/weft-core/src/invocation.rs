//! Per-call interception state.
//!
//! An [`Invocation`] pairs an immutable chain snapshot with a rank cursor.
//! Each dispatched call gets its own invocation, so re-entrant and
//! concurrent calls never share chain position.

use serde_json::Value;
use std::sync::Arc;
use tracing::trace;

use crate::error::CallResult;
use crate::interceptor::InterceptorHandle;
use crate::rtti::Operation;
use crate::target::Target;

/// A chain as it was when a call started.
pub type ChainSnapshot = Arc<Vec<InterceptorHandle>>;

/// Entry point for nested calls issued from inside an interceptor.
///
/// Implemented by the dispatcher so interceptors can call other operations
/// (or role operations) with full interception applied.
pub trait CallGateway: Send + Sync {
    /// Dispatch an intercepted call.
    ///
    /// # Errors
    ///
    /// Returns the call's failure if it was not handled.
    fn call(&self, target: &Target, operation: &Arc<Operation>, args: Vec<Value>) -> CallResult;

    /// Dispatch a role call. `None` means no attached interceptor exposes it.
    fn call_role(
        &self,
        target: &Target,
        name: &str,
        args: Vec<Value>,
        required_type: Option<&str>,
    ) -> Option<CallResult>;
}

/// One in-flight call.
pub struct Invocation<'a> {
    target: &'a Target,
    operation: &'a Arc<Operation>,
    args: Vec<Value>,
    chain: ChainSnapshot,
    rank: usize,
    gateway: Option<&'a dyn CallGateway>,
}

impl<'a> Invocation<'a> {
    /// Create an invocation positioned at rank 0.
    #[must_use]
    pub fn new(
        target: &'a Target,
        operation: &'a Arc<Operation>,
        args: Vec<Value>,
        chain: ChainSnapshot,
    ) -> Self {
        Self {
            target,
            operation,
            args,
            chain,
            rank: 0,
            gateway: None,
        }
    }

    /// Let interceptors issue nested calls through `gateway`.
    #[must_use]
    pub fn with_gateway(mut self, gateway: &'a dyn CallGateway) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Run the chain from the current rank.
    ///
    /// # Errors
    ///
    /// Returns whatever the first interceptor (or the original) raises.
    pub fn start(&mut self) -> CallResult {
        self.run_current()
    }

    /// Hand control to the next chain position, or to the original
    /// implementation once past the end.
    ///
    /// The cursor is restored when the call returns, so an interceptor may
    /// proceed more than once (retries) and each time reaches the same
    /// downstream position.
    ///
    /// # Errors
    ///
    /// Returns whatever the downstream position raises.
    pub fn proceed(&mut self) -> CallResult {
        let saved = self.rank;
        self.rank = saved.saturating_add(1);
        let result = self.run_current();
        self.rank = saved;
        result
    }

    fn run_current(&mut self) -> CallResult {
        let chain = Arc::clone(&self.chain);
        match chain.get(self.rank) {
            Some(interceptor) => {
                trace!(
                    target: "weft::wrapping",
                    interceptor = ?interceptor,
                    rank = self.rank,
                    operation = %self.operation.signature(),
                    "calling interceptor"
                );
                interceptor.intercept(self)
            },
            None => {
                trace!(
                    target: "weft::wrapping",
                    operation = %self.operation.signature(),
                    "calling original implementation"
                );
                self.operation.call_original(self.target, &self.args)
            },
        }
    }

    /// Current chain position.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Length of the chain snapshot.
    #[must_use]
    pub fn chain_len(&self) -> usize {
        self.chain.len()
    }

    /// The snapshot this call runs against.
    #[must_use]
    pub fn chain(&self) -> &ChainSnapshot {
        &self.chain
    }

    /// The interceptor at the current position, if any.
    #[must_use]
    pub fn current(&self) -> Option<&InterceptorHandle> {
        self.chain.get(self.rank)
    }

    /// The called target.
    #[must_use]
    pub fn target(&self) -> &'a Target {
        self.target
    }

    /// The called operation.
    #[must_use]
    pub fn operation(&self) -> &'a Arc<Operation> {
        self.operation
    }

    /// Call arguments.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Mutable call arguments; changes are seen by every later position.
    pub fn args_mut(&mut self) -> &mut Vec<Value> {
        &mut self.args
    }

    /// Gateway for nested calls, when dispatched through one.
    #[must_use]
    pub fn dispatcher(&self) -> Option<&'a dyn CallGateway> {
        self.gateway
    }
}
