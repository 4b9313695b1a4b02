//! Weft Core - Foundation types and traits for the weft interception engine.
//!
//! This crate provides:
//! - Structural type metadata produced by the preparation pass ([`TypeInfo`],
//!   [`FieldInfo`], [`Operation`], [`AccessInfo`])
//! - Targets an interceptor can attach to ([`Target`], [`Wrappee`], [`Instance`])
//! - The [`Interceptor`] seam and pointer-identity [`InterceptorHandle`]s
//! - The per-call [`Invocation`] (chain snapshot plus rank cursor)
//! - Call failures as values ([`CallError`], [`Fault`])
//! - The [`LifecycleListener`] hook consumed from the lifecycle layer
//!
//! # Example
//!
//! ```
//! use weft_core::{Instance, Operation, Target, TypeInfo};
//! use serde_json::json;
//!
//! let account = TypeInfo::builder("bank.Account")
//!     .operation(Operation::builder("balance").original(|_, _| Ok(json!(10))))
//!     .build()
//!     .unwrap();
//!
//! let object = Instance::new(account.clone());
//! let target = Target::from(object);
//! let op = account.operation("balance()").unwrap();
//! assert_eq!(op.call_original(&target, &[]).unwrap(), json!(10));
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod error;
pub mod interceptor;
pub mod invocation;
pub mod lifecycle;
pub mod rtti;
pub mod target;
pub mod types;

pub use error::{CallError, CallResult, CoreError, CoreResult, Fault};
pub use interceptor::{Interceptor, InterceptorHandle, InterceptorSet, RoleCall};
pub use invocation::{CallGateway, ChainSnapshot, Invocation};
pub use lifecycle::LifecycleListener;
pub use rtti::{
    AccessInfo, FieldInfo, FieldKind, Operation, OperationBuilder, OperationKey, OriginalFn,
    TypeBuilder, TypeInfo,
};
pub use target::{Instance, ScopeKey, Target, Wrappee};
pub use types::{ModuleId, ObjectId};

/// Re-exported so downstream crates share one value type.
pub use serde_json::Value;
