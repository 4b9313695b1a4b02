//! Prelude module - commonly used types for convenient import.
//!
//! Use `use weft_core::prelude::*;` to import all essential types.

// Errors and failures
pub use crate::{CallError, CallResult, CoreError, CoreResult, Fault};

// Structural metadata
pub use crate::{AccessInfo, FieldInfo, FieldKind, Operation, OperationKey, TypeInfo};

// Targets
pub use crate::{Instance, ScopeKey, Target, Wrappee};

// Interception
pub use crate::{Interceptor, InterceptorHandle, InterceptorSet, Invocation, RoleCall};

// Lifecycle
pub use crate::LifecycleListener;

// Identifiers
pub use crate::{ModuleId, ObjectId};

// Values
pub use crate::Value;
