//! Runtime error types.

use thiserror::Error;

/// Errors that can occur while building or configuring a weaver.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(#[from] weft_config::ConfigError),

    /// Telemetry error.
    #[error("Telemetry error: {0}")]
    TelemetryError(#[from] weft_telemetry::TelemetryError),

    /// Pointcut error.
    #[error("Pointcut error: {0}")]
    PointcutError(#[from] weft_pointcut::PointcutError),

    /// The named module is not active.
    #[error("Module not active: {module_id}")]
    ModuleNotActive {
        /// The module ID.
        module_id: String,
    },
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
