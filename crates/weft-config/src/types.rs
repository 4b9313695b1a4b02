//! Configuration struct definitions.

use serde::{Deserialize, Serialize};

/// Root configuration of a weaver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaverConfig {
    /// Interceptor composition order.
    pub composition: CompositionSection,
    /// Identity of this host, matched by host selectors.
    pub host: HostSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// CompositionSection
// ---------------------------------------------------------------------------

/// Ordering of interceptors contributed by independent modules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionSection {
    /// Interceptor type names, outermost first.
    pub order: Vec<String>,
    /// Placement of types absent from `order`: `"last"` or `"first"`.
    pub unlisted: String,
}

impl Default for CompositionSection {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            unlisted: "last".to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// HostSection
// ---------------------------------------------------------------------------

/// Host identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSection {
    /// Name matched against pointcut host selectors.
    pub name: String,
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            name: "localhost".to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"` (human-friendly), `"compact"` (one-line),
    /// `"json"` (structured), or `"full"` (verbose).
    pub format: String,
    /// Per-target tracing directives (e.g. `["weft::pointcut=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}
