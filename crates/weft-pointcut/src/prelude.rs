//! Prelude module - commonly used types for convenient import.
//!
//! Use `use weft_pointcut::prelude::*;` to import all essential types.

pub use crate::{
    ActivationSummary, ApplyReport, FactoryRegistry, InterceptorFactory, Matcher, Pointcut,
    PointcutError, PointcutRegistry, PointcutResult, Selector, SelectorDimension, SharingMode,
};
