//! Weft Pointcut - Declarative selection of what gets intercepted.
//!
//! This crate provides:
//! - [`Selector`]: the selector language (Emacs-syntax regexes joined with
//!   `&&`, `||` and `!`, plus operation category keywords such as
//!   `GETTERS` or `MODIFIERS(balance)`)
//! - [`Pointcut`]: four selectors (name, type, operation, host) bound to an
//!   [`InterceptorFactory`]
//! - [`Matcher`]: installs a pointcut's interceptor into a
//!   [`weft_chain::ChainStore`] for a target
//! - [`PointcutRegistry`]: module-scoped activation, applied as targets
//!   come into use
//!
//! # Example
//!
//! ```rust,ignore
//! use weft_pointcut::prelude::*;
//!
//! let pointcut = Pointcut::builder(InterceptorFactory::instance(audit))
//!     .types("bank\\..*")
//!     .operations("SETTERS || deposit(.*)")
//!     .build()?;
//! registry.activate(module, vec![pointcut]);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod keyword;
mod matcher;
mod pointcut;
mod registry;
mod selector;

pub use error::{PointcutError, PointcutResult};
pub use keyword::{Keyword, KeywordParam, KeywordTerm};
pub use matcher::{ApplyReport, Matcher};
pub use pointcut::{FactoryRegistry, InterceptorFactory, Pointcut, PointcutBuilder, SharingMode};
pub use registry::{ActivationSummary, ApplyFailure, PointcutRegistry};
pub use selector::{ALL, Selector, SelectorDimension};
