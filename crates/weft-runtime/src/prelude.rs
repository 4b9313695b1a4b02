//! Prelude module - commonly used types for convenient import.
//!
//! Use `use weft_runtime::prelude::*;` to import all essential types.

// Facade
pub use crate::{RuntimeError, RuntimeResult, Weaver, init_logging};

// Configuration
pub use weft_config::WeaverConfig;

// Model
pub use weft_core::{
    CallError, CallResult, Fault, Instance, Interceptor, InterceptorHandle, Invocation, ModuleId,
    Operation, Target, TypeInfo, Value, Wrappee,
};

// Pointcuts
pub use weft_pointcut::{ActivationSummary, InterceptorFactory, Pointcut, SharingMode};
