//! Pointcut error types.

use thiserror::Error;

use crate::selector::SelectorDimension;

/// Errors raised while declaring or applying pointcuts.
///
/// Everything except [`PointcutError::Factory`] and
/// [`PointcutError::UnknownHandler`] is a configuration error detected when
/// the pointcut is built; those two are composition errors reported per
/// target by [`crate::Matcher::apply`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PointcutError {
    /// A selector string is empty or has an empty term.
    #[error("empty {dimension} selector term in {selector:?}")]
    EmptyTerm {
        /// Dimension of the selector.
        dimension: SelectorDimension,
        /// Full selector text.
        selector: String,
    },

    /// A regular expression term does not compile.
    #[error("invalid {dimension} pattern {pattern:?}: {message}")]
    InvalidPattern {
        /// Dimension of the selector.
        dimension: SelectorDimension,
        /// Offending term.
        pattern: String,
        /// Compiler message.
        message: String,
    },

    /// A parameterized category keyword is not known.
    #[error("unknown operation keyword {keyword:?}")]
    UnknownKeyword {
        /// Keyword as written.
        keyword: String,
    },

    /// A keyword's parameter list is malformed or not accepted.
    #[error("invalid parameters for {keyword}: {message}")]
    InvalidKeywordParameters {
        /// Keyword name.
        keyword: String,
        /// What is wrong.
        message: String,
    },

    /// No factory is registered under the requested interceptor type.
    #[error("no interceptor factory registered for {0:?}")]
    UnknownFactory(String),

    /// The interceptor factory failed for one target.
    #[error("interceptor factory {interceptor_type} failed for {target}: {message}")]
    Factory {
        /// Interceptor type the factory builds.
        interceptor_type: String,
        /// Target being wrapped.
        target: String,
        /// Factory message.
        message: String,
    },

    /// The pointcut names a catch handler its interceptor does not implement.
    #[error("{interceptor_type} does not implement catch handler {handler:?}")]
    UnknownHandler {
        /// Interceptor type.
        interceptor_type: String,
        /// Handler name.
        handler: String,
    },
}

impl PointcutError {
    /// Whether the error was detected at construction (as opposed to while
    /// composing a specific target).
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        !matches!(self, Self::Factory { .. } | Self::UnknownHandler { .. })
    }
}

/// Result type for pointcut operations.
pub type PointcutResult<T> = Result<T, PointcutError>;
