//! Storage - Driver Trait and Implementations
//!
//! `TigerStyle`: Abstract storage with an always-testable in-memory driver.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    StorageDriver Trait                       │
//! └─────────────────────────────────────────────────────────────┘
//!          ↑                    ↑                    ↑
//!          │                    │                    │
//! ┌────────┴────────┐  ┌────────┴────────┐  ┌───────┴────────┐
//! │  MemoryDriver   │  │ KeyValueDriver  │  │ DocumentDriver │
//! │   (testing)     │  │ (embedded sled) │  │ (server, opt.) │
//! └─────────────────┘  └─────────────────┘  └────────────────┘
//! ```
//!
//! The document driver pushes filters, sorting, and paging down to the
//! server. The key-value driver can only do point lookups or full scans, so
//! everything else happens client-side after the scan. The memory driver is
//! the deterministic stand-in used by tests and local tooling.

mod error;
mod keyvalue;
mod memory;

#[cfg(feature = "mongodb")]
mod document;

pub use error::{StoreError, StoreResult};
pub use keyvalue::KeyValueDriver;
pub use memory::{FaultPlan, MemoryDriver};

#[cfg(feature = "mongodb")]
pub use document::DocumentDriver;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::model::Record;
use crate::query::FilterSpec;

// =============================================================================
// Sort Specification
// =============================================================================

/// How to order fetched records: one field, ascending or descending.
///
/// The raw form uses a `-` prefix for descending (`"-transaction_date"`),
/// matching the query-string convention the callers speak.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    /// Field to order by
    pub field: String,
    /// Ascending when true
    pub ascending: bool,
}

impl SortSpec {
    /// Ascending sort on a field.
    ///
    /// # Panics
    /// Panics if the field name is empty.
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        let field = field.into();
        assert!(!field.is_empty(), "sort field must not be empty");
        Self {
            field,
            ascending: true,
        }
    }

    /// Descending sort on a field.
    ///
    /// # Panics
    /// Panics if the field name is empty.
    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        let field = field.into();
        assert!(!field.is_empty(), "sort field must not be empty");
        Self {
            field,
            ascending: false,
        }
    }

    /// Parse the raw `-`-prefixed form.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix('-') {
            Some(field) => Self::desc(field),
            None => Self::asc(raw),
        }
    }

    /// Stable in-memory application: ties keep their scan order.
    ///
    /// Records missing the sort field order first ascending (their value
    /// ranks as null), mirroring the document backend.
    pub fn apply(&self, records: &mut [Record]) {
        records.sort_by(|a, b| {
            let left = a.field_value(&self.field).unwrap_or(Value::Null);
            let right = b.field_value(&self.field).unwrap_or(Value::Null);
            let ordering = crate::query::order_values(&left, &right);
            if self.ascending {
                ordering
            } else {
                ordering.reverse()
            }
        });
    }
}

// =============================================================================
// StorageDriver Trait
// =============================================================================

/// Abstract storage driver over one backend.
///
/// `TigerStyle`: All operations are async, return explicit errors.
///
/// Uniform contract, one logical store (table/collection/tree) per call:
/// drivers own the mapping from logical store names to physical ones
/// (prefixing). Absent records are `Ok(None)`/`Ok(false)`, never errors.
/// Transient backend faults surface as [`StoreError::Unavailable`]; this
/// layer never retries.
#[async_trait]
pub trait StorageDriver: Send + Sync + std::fmt::Debug {
    /// Fetch records matching `filter`, ordered by `sort`, after `skip`,
    /// at most `limit`.
    async fn fetch(
        &self,
        store: &str,
        filter: &FilterSpec,
        sort: Option<&SortSpec>,
        skip: Option<u64>,
        limit: Option<u64>,
    ) -> StoreResult<Vec<Record>>;

    /// Fetch a single matching record, or `None`.
    async fn fetch_one(&self, store: &str, filter: &FilterSpec) -> StoreResult<Option<Record>>;

    /// Count records matching `filter`.
    async fn count(&self, store: &str, filter: &FilterSpec) -> StoreResult<u64>;

    /// Store a record, replacing any existing record with the same `pk`.
    async fn put(&self, store: &str, record: &Record) -> StoreResult<()>;

    /// Merge partial fields into the record identified by `pk`, refreshing
    /// its `updated_at`.
    ///
    /// Returns `false` if no such record exists.
    async fn patch(&self, store: &str, pk: &str, fields: &Map<String, Value>)
        -> StoreResult<bool>;

    /// Remove the record identified by `pk`.
    ///
    /// Returns `true` if the record existed and was removed.
    async fn remove(&self, store: &str, pk: &str) -> StoreResult<bool>;

    /// Create the underlying table/collection/tree if absent.
    ///
    /// Idempotent and race-tolerant: concurrent callers all succeed, and a
    /// benign "already exists" conflict is treated as success.
    async fn ensure_schema(&self, store: &str) -> StoreResult<()>;

    /// Cheap backend liveness probe.
    async fn ping(&self) -> StoreResult<()>;

    /// Release backend resources. Called once at process shutdown.
    async fn close(&self) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pk: &str, amount: f64) -> Record {
        let mut fields = Map::new();
        fields.insert("amount".to_string(), json!(amount));
        Record::new(pk.to_string(), format!("0-{pk}"), fields)
    }

    #[test]
    fn test_sort_spec_parse() {
        assert_eq!(SortSpec::parse("amount"), SortSpec::asc("amount"));
        assert_eq!(SortSpec::parse("-amount"), SortSpec::desc("amount"));
    }

    #[test]
    fn test_sort_apply_ascending_and_descending() {
        let mut records = vec![record("a", 200.0), record("b", 10.0), record("c", 100.0)];

        SortSpec::asc("amount").apply(&mut records);
        let pks: Vec<&str> = records.iter().map(|r| r.pk.as_str()).collect();
        assert_eq!(pks, vec!["b", "c", "a"]);

        SortSpec::desc("amount").apply(&mut records);
        let pks: Vec<&str> = records.iter().map(|r| r.pk.as_str()).collect();
        assert_eq!(pks, vec!["a", "c", "b"]);
    }

    #[test]
    fn test_sort_apply_is_stable_on_ties() {
        let mut records = vec![record("first", 50.0), record("second", 50.0)];
        SortSpec::asc("amount").apply(&mut records);
        let pks: Vec<&str> = records.iter().map(|r| r.pk.as_str()).collect();
        assert_eq!(pks, vec!["first", "second"], "ties preserve scan order");
    }

    #[test]
    fn test_sort_missing_field_ranks_first_ascending() {
        let mut with_missing = vec![record("has", 5.0), {
            let mut r = record("missing", 0.0);
            r.fields.remove("amount");
            r
        }];
        SortSpec::asc("amount").apply(&mut with_missing);
        assert_eq!(with_missing[0].pk, "missing");
    }
}
