//! Storage Errors
//!
//! `TigerStyle`: Explicit error types with context.

use thiserror::Error;

/// Errors from the data-access layer.
///
/// A missing record is never an error: lookups return `Ok(None)` so callers
/// decide between 404-style handling and defaults. Partial failure of
/// multi-record operations is reported through affected-record counts, not
/// through this type.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Filter key used an operator outside the supported set
    #[error("unsupported filter operator: {operator} (in key {key})")]
    UnsupportedOperator {
        /// Operator suffix that was not recognized
        operator: String,
        /// Full filter key the operator appeared in
        key: String,
    },

    /// Backend transiently unreachable (timeout, throttle, I/O fault)
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// What failed and why
        message: String,
    },

    /// A record failed to encode or decode against the entity schema
    #[error("serialization error: {message}")]
    Serialization {
        /// Encode/decode failure detail
        message: String,
    },

    /// Concurrent schema creation collided and the conflict was not benign
    #[error("schema conflict for {store}: {message}")]
    SchemaConflict {
        /// Logical store name
        store: String,
        /// Conflict detail
        message: String,
    },

    /// Invalid caller input (empty key, oversized record, bad filter value)
    #[error("validation error: {message}")]
    Validation {
        /// Validation failure detail
        message: String,
    },

    /// Invariant violation inside the layer
    #[error("internal error: {message}")]
    Internal {
        /// Error message
        message: String,
    },
}

impl StoreError {
    /// Create an unsupported-operator error.
    #[must_use]
    pub fn unsupported_operator(operator: impl Into<String>, key: impl Into<String>) -> Self {
        Self::UnsupportedOperator {
            operator: operator.into(),
            key: key.into(),
        }
    }

    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create a serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a schema conflict error.
    #[must_use]
    pub fn schema_conflict(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaConflict {
            store: store.into(),
            message: message.into(),
        }
    }

    /// Create a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this error is transient (retrying may succeed).
    ///
    /// The layer itself never retries; callers use this to decide.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Result type for data-access operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let err = StoreError::unsupported_operator("regex", "name__regex");
        assert!(
            matches!(err, StoreError::UnsupportedOperator { operator, key }
                if operator == "regex" && key == "name__regex")
        );

        let err = StoreError::schema_conflict("transactions", "already creating");
        assert!(matches!(err, StoreError::SchemaConflict { store, .. } if store == "transactions"));
    }

    #[test]
    fn test_is_transient() {
        assert!(StoreError::unavailable("timeout").is_transient());

        assert!(!StoreError::unsupported_operator("between", "amount__between").is_transient());
        assert!(!StoreError::serialization("bad field").is_transient());
        assert!(!StoreError::internal("bug").is_transient());
    }

    #[test]
    fn test_display_includes_context() {
        let err = StoreError::unsupported_operator("between", "amount__between");
        let text = err.to_string();
        assert!(text.contains("between"));
        assert!(text.contains("amount__between"));
    }
}
