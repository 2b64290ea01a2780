//! Telemetry - Structured Logging Setup
//!
//! `TigerStyle`: Logging is optional and never panics. A service that cannot
//! log still serves.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use khata_store::telemetry::{init_logging, LogConfig};
//!
//! // Initialize with defaults (reads RUST_LOG)
//! init_logging(&LogConfig::default()).expect("logging init");
//!
//! // Or configure explicitly
//! let config = LogConfig::default()
//!     .with_filter("khata_store=debug")
//!     .with_ansi(false);
//! init_logging(&config).expect("logging init");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG` - Filter directives (default: "`khata_store=info`")
//!
//! Initialization installs a global subscriber and can therefore succeed at
//! most once per process. Call it from the binary entry point; library code
//! and tests only emit events and never install.

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::constants::LOG_FILTER_DEFAULT;

/// Logging setup errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// A filter directive did not parse
    #[error("invalid log filter: {directive}")]
    InvalidFilter {
        /// The offending directive string
        directive: String,
    },

    /// A global subscriber is already installed
    #[error("logging initialization failed: {reason}")]
    InitFailed {
        /// The reason for the failure
        reason: String,
    },
}

/// Result type for telemetry operations
pub type TelemetryResult<T> = std::result::Result<T, TelemetryError>;

/// Configuration for the log subscriber
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directives, `target=level` comma separated
    pub filter: String,

    /// Emit ANSI color codes
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: std::env::var("RUST_LOG").unwrap_or_else(|_| LOG_FILTER_DEFAULT.to_string()),
            ansi: true,
        }
    }
}

impl LogConfig {
    /// Set the filter directives.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Enable or disable ANSI colors.
    #[must_use]
    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    /// Parse the filter directives without installing anything.
    fn build_filter(&self) -> TelemetryResult<EnvFilter> {
        EnvFilter::try_new(&self.filter).map_err(|_| TelemetryError::InvalidFilter {
            directive: self.filter.clone(),
        })
    }
}

/// Install the global log subscriber.
///
/// # Errors
///
/// Returns `InvalidFilter` if the directives do not parse, or `InitFailed`
/// if a global subscriber is already installed (common in test binaries
/// where the first test wins).
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = config.build_filter()?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(true)
        .try_init()
        .map_err(|e| TelemetryError::InitFailed {
            reason: e.to_string(),
        })?;

    tracing::debug!(filter = %config.filter, "logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert!(!config.filter.is_empty());
        assert!(config.ansi);
    }

    #[test]
    fn test_log_config_builders() {
        let config = LogConfig::default()
            .with_filter("khata_store=trace")
            .with_ansi(false);
        assert_eq!(config.filter, "khata_store=trace");
        assert!(!config.ansi);
    }

    #[test]
    fn test_valid_filter_parses() {
        let config = LogConfig::default().with_filter("khata_store=debug,sled=warn");
        assert!(config.build_filter().is_ok());
    }

    #[test]
    fn test_invalid_filter_is_rejected() {
        let config = LogConfig::default().with_filter("khata_store=notalevel");
        let err = config.build_filter().unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidFilter { .. }));
    }
}
