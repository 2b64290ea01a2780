//! `MemoryDriver` - In-Memory Storage for Testing
//!
//! `TigerStyle`: Deterministic testing with fault injection.
//!
//! The driver every test reaches for: tables are `BTreeMap`s keyed by
//! sort key behind an `RwLock`, so unfiltered scans iterate in insertion
//! order exactly like the key-value driver and runs are reproducible.
//! Fault plans inject [`StoreError::Unavailable`] at chosen call counts,
//! which is how the partial-failure contracts of multi-record
//! delete/update get exercised without a flaky backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::constants::RECORD_ITEM_BYTES_MAX;
use crate::model::Record;
use crate::query::FilterSpec;

use super::error::{StoreError, StoreResult};
use super::{SortSpec, StorageDriver};

// =============================================================================
// FaultPlan
// =============================================================================

/// Deterministic fault schedule for one driver operation.
///
/// A plan matches calls to its operation name, lets `skip_calls` of them
/// through, then fails the next `fire_calls` with
/// [`StoreError::Unavailable`]. Counting is per plan.
///
/// # Example
/// ```
/// use khata_store::storage::FaultPlan;
///
/// // Let one remove succeed, then fail the next.
/// let plan = FaultPlan::new("remove").after_calls(1).times(1);
/// # let _ = plan;
/// ```
#[derive(Debug, Clone)]
pub struct FaultPlan {
    operation: String,
    skip_calls: u64,
    fire_calls: u64,
}

impl FaultPlan {
    /// Plan a fault for the named operation (`"fetch"`, `"put"`,
    /// `"patch"`, `"remove"`, `"count"`, `"ensure_schema"`, `"ping"`).
    ///
    /// By default the very first call fails, once.
    #[must_use]
    pub fn new(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        assert!(!operation.is_empty(), "fault operation must not be empty");
        Self {
            operation,
            skip_calls: 0,
            fire_calls: 1,
        }
    }

    /// Let this many matching calls succeed before failing.
    #[must_use]
    pub fn after_calls(mut self, calls: u64) -> Self {
        self.skip_calls = calls;
        self
    }

    /// Fail this many matching calls, then recover.
    #[must_use]
    pub fn times(mut self, calls: u64) -> Self {
        self.fire_calls = calls;
        self
    }

    /// Fail every matching call from the trigger point on.
    #[must_use]
    pub fn forever(mut self) -> Self {
        self.fire_calls = u64::MAX;
        self
    }
}

#[derive(Debug)]
struct FaultState {
    plan: FaultPlan,
    seen: u64,
}

// =============================================================================
// MemoryDriver
// =============================================================================

/// In-memory storage driver for tests and local tooling.
///
/// `TigerStyle`:
/// - Deterministic: scans iterate tables in sort-key (insertion) order
/// - Fault injection via [`FaultPlan`]
/// - Thread-safe with `RwLock`; clones share the same tables
#[derive(Debug, Clone, Default)]
pub struct MemoryDriver {
    /// store name → sk → record
    tables: Arc<RwLock<HashMap<String, BTreeMap<String, Record>>>>,
    /// Registered fault schedules with their call counters
    faults: Arc<Mutex<Vec<FaultState>>>,
}

impl MemoryDriver {
    /// Create an empty driver with no faults planned.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a driver with fault plans registered up front.
    #[must_use]
    pub fn with_faults(plans: Vec<FaultPlan>) -> Self {
        let driver = Self::new();
        for plan in plans {
            driver.add_fault(plan);
        }
        driver
    }

    /// Register an additional fault plan.
    pub fn add_fault(&self, plan: FaultPlan) {
        self.faults
            .lock()
            .unwrap()
            .push(FaultState { plan, seen: 0 });
    }

    /// Number of records in a store (for tests).
    #[must_use]
    pub fn record_count(&self, store: &str) -> usize {
        self.tables
            .read()
            .unwrap()
            .get(store)
            .map_or(0, BTreeMap::len)
    }

    /// Drop all stores and records (for tests).
    pub fn clear(&self) {
        self.tables.write().unwrap().clear();
    }

    /// Fail the call if a registered plan says so.
    fn maybe_fault(&self, operation: &str) -> StoreResult<()> {
        let mut faults = self.faults.lock().unwrap();
        let mut fire = false;
        for state in faults.iter_mut() {
            if state.plan.operation == operation {
                let position = state.seen;
                state.seen += 1;
                if position >= state.plan.skip_calls
                    && position - state.plan.skip_calls < state.plan.fire_calls
                {
                    fire = true;
                }
            }
        }
        if fire {
            Err(StoreError::unavailable(format!(
                "injected fault during {operation}"
            )))
        } else {
            Ok(())
        }
    }

    fn scan(&self, store: &str, filter: &FilterSpec) -> Vec<Record> {
        let tables = self.tables.read().unwrap();
        let Some(table) = tables.get(store) else {
            return Vec::new();
        };

        // Point lookup bypasses the filter machinery
        if let Some(pk) = filter.as_pk_lookup() {
            return table.values().find(|r| r.pk == pk).cloned().into_iter().collect();
        }

        table.values().filter(|r| filter.matches(r)).cloned().collect()
    }
}

#[async_trait]
impl StorageDriver for MemoryDriver {
    #[tracing::instrument(skip(self, filter, sort))]
    async fn fetch(
        &self,
        store: &str,
        filter: &FilterSpec,
        sort: Option<&SortSpec>,
        skip: Option<u64>,
        limit: Option<u64>,
    ) -> StoreResult<Vec<Record>> {
        self.maybe_fault("fetch")?;

        let mut records = self.scan(store, filter);
        if let Some(sort) = sort {
            sort.apply(&mut records);
        }
        if let Some(skip) = skip {
            let skip = usize::try_from(skip).unwrap_or(usize::MAX);
            records = records.into_iter().skip(skip).collect();
        }
        if let Some(limit) = limit {
            let limit = usize::try_from(limit).unwrap_or(usize::MAX);
            records.truncate(limit);
        }
        Ok(records)
    }

    async fn fetch_one(&self, store: &str, filter: &FilterSpec) -> StoreResult<Option<Record>> {
        self.maybe_fault("fetch")?;
        Ok(self.scan(store, filter).into_iter().next())
    }

    async fn count(&self, store: &str, filter: &FilterSpec) -> StoreResult<u64> {
        self.maybe_fault("count")?;
        Ok(self.scan(store, filter).len() as u64)
    }

    #[tracing::instrument(skip(self, record), fields(pk = %record.pk))]
    async fn put(&self, store: &str, record: &Record) -> StoreResult<()> {
        self.maybe_fault("put")?;

        // Preconditions
        assert!(!record.pk.is_empty(), "record must have pk");
        assert!(!record.sk.is_empty(), "record must have sk");
        if record.encoded_len() > RECORD_ITEM_BYTES_MAX {
            return Err(StoreError::validation(format!(
                "record {} exceeds {RECORD_ITEM_BYTES_MAX} bytes",
                record.pk
            )));
        }

        let mut tables = self.tables.write().unwrap();
        let table = tables.entry(store.to_string()).or_default();

        // Rewrites keep the original sort key so scan position is stable.
        let sk = table
            .iter()
            .find(|(_, r)| r.pk == record.pk)
            .map_or_else(|| record.sk.clone(), |(sk, _)| sk.clone());
        let mut stored = record.clone();
        stored.sk = sk.clone();
        table.insert(sk, stored);
        Ok(())
    }

    async fn patch(
        &self,
        store: &str,
        pk: &str,
        fields: &Map<String, Value>,
    ) -> StoreResult<bool> {
        self.maybe_fault("patch")?;
        assert!(!pk.is_empty(), "pk must not be empty");

        let mut tables = self.tables.write().unwrap();
        match tables
            .get_mut(store)
            .and_then(|t| t.values_mut().find(|r| r.pk == pk))
        {
            Some(record) => {
                record.apply_patch(fields);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn remove(&self, store: &str, pk: &str) -> StoreResult<bool> {
        self.maybe_fault("remove")?;
        assert!(!pk.is_empty(), "pk must not be empty");

        let mut tables = self.tables.write().unwrap();
        let Some(table) = tables.get_mut(store) else {
            return Ok(false);
        };
        let Some(sk) = table
            .iter()
            .find(|(_, r)| r.pk == pk)
            .map(|(sk, _)| sk.clone())
        else {
            return Ok(false);
        };
        Ok(table.remove(&sk).is_some())
    }

    async fn ensure_schema(&self, store: &str) -> StoreResult<()> {
        self.maybe_fault("ensure_schema")?;
        assert!(!store.is_empty(), "store name must not be empty");

        let mut tables = self.tables.write().unwrap();
        tables.entry(store.to_string()).or_default();
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        self.maybe_fault("ping")
    }

    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const STORE: &str = "transactions";

    fn record(pk: &str, sk: &str, amount: f64) -> Record {
        let mut fields = Map::new();
        fields.insert("amount".to_string(), json!(amount));
        Record::new(pk.to_string(), sk.to_string(), fields)
    }

    #[tokio::test]
    async fn test_put_fetch_remove_round_trip() {
        let driver = MemoryDriver::new();
        driver.put(STORE, &record("a", "0001", 100.0)).await.unwrap();

        let found = driver
            .fetch_one(STORE, &FilterSpec::new().eq("pk", "a"))
            .await
            .unwrap();
        assert_eq!(found.unwrap().pk, "a");

        assert!(driver.remove(STORE, "a").await.unwrap());
        assert!(!driver.remove(STORE, "a").await.unwrap(), "second remove is a no-op");
        assert_eq!(driver.record_count(STORE), 0);
    }

    #[tokio::test]
    async fn test_fetch_filters_sorts_and_pages() {
        let driver = MemoryDriver::new();
        for (i, (pk, amount)) in [("a", 200.0), ("b", 10.0), ("c", 100.0), ("d", 300.0)]
            .iter()
            .enumerate()
        {
            driver
                .put(STORE, &record(pk, &format!("{i:04}"), *amount))
                .await
                .unwrap();
        }

        let spec = FilterSpec::new().gte("amount", 50);
        let sorted = driver
            .fetch(STORE, &spec, Some(&SortSpec::asc("amount")), None, None)
            .await
            .unwrap();
        let pks: Vec<&str> = sorted.iter().map(|r| r.pk.as_str()).collect();
        assert_eq!(pks, vec!["c", "a", "d"]);

        let paged = driver
            .fetch(STORE, &spec, Some(&SortSpec::asc("amount")), Some(1), Some(1))
            .await
            .unwrap();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].pk, "a");
    }

    #[tokio::test]
    async fn test_scan_without_filter_is_insertion_ordered() {
        let driver = MemoryDriver::new();
        // pks deliberately out of alphabetical order; sks increase
        for (i, pk) in ["charlie", "alpha", "bravo"].iter().enumerate() {
            driver
                .put(STORE, &record(pk, &format!("{i:04}"), 1.0))
                .await
                .unwrap();
        }
        let all = driver
            .fetch(STORE, &FilterSpec::new(), None, None, None)
            .await
            .unwrap();
        let pks: Vec<&str> = all.iter().map(|r| r.pk.as_str()).collect();
        assert_eq!(pks, vec!["charlie", "alpha", "bravo"]);
    }

    #[tokio::test]
    async fn test_rewrite_keeps_sort_key_and_single_record() {
        let driver = MemoryDriver::new();
        driver.put(STORE, &record("a", "0001", 100.0)).await.unwrap();
        // Save again with a different (fresh) sk, as a manager would
        driver.put(STORE, &record("a", "0009", 50.0)).await.unwrap();

        assert_eq!(driver.record_count(STORE), 1);
        let found = driver
            .fetch_one(STORE, &FilterSpec::new().eq("pk", "a"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.sk, "0001", "sort key survives rewrites");
        assert_eq!(found.field_value("amount"), Some(json!(50.0)));
    }

    #[tokio::test]
    async fn test_patch_merges_and_touches() {
        let driver = MemoryDriver::new();
        driver.put(STORE, &record("a", "0001", 100.0)).await.unwrap();

        let mut patch = Map::new();
        patch.insert("amount".to_string(), json!(50));
        assert!(driver.patch(STORE, "a", &patch).await.unwrap());
        assert!(!driver.patch(STORE, "missing", &patch).await.unwrap());

        let found = driver
            .fetch_one(STORE, &FilterSpec::new().eq("pk", "a"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.field_value("amount"), Some(json!(50)));
        assert!(found.updated_at >= found.created_at);
    }

    #[tokio::test]
    async fn test_count_matches_fetch_len() {
        let driver = MemoryDriver::new();
        for (i, (pk, amount)) in [("a", 10.0), ("b", 100.0), ("c", 200.0)].iter().enumerate() {
            driver
                .put(STORE, &record(pk, &format!("{i:04}"), *amount))
                .await
                .unwrap();
        }
        let spec = FilterSpec::new().gte("amount", 50).lte("amount", 150);

        let count = driver.count(STORE, &spec).await.unwrap();
        let listed = driver.fetch(STORE, &spec, None, None, None).await.unwrap();
        assert_eq!(count, listed.len() as u64);
        assert_eq!(count, 1);
        assert_eq!(listed[0].pk, "b");
    }

    #[tokio::test]
    async fn test_unknown_store_scans_empty() {
        let driver = MemoryDriver::new();
        let records = driver
            .fetch("nowhere", &FilterSpec::new(), None, None, None)
            .await
            .unwrap();
        assert!(records.is_empty());
        assert_eq!(driver.count("nowhere", &FilterSpec::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let driver = MemoryDriver::new();
        driver.ensure_schema(STORE).await.unwrap();
        driver.ensure_schema(STORE).await.unwrap();
        assert_eq!(driver.record_count(STORE), 0);
    }

    #[tokio::test]
    async fn test_fault_plan_fires_at_position() {
        let driver =
            MemoryDriver::with_faults(vec![FaultPlan::new("remove").after_calls(1).times(1)]);
        driver.put(STORE, &record("a", "0001", 1.0)).await.unwrap();
        driver.put(STORE, &record("b", "0002", 2.0)).await.unwrap();
        driver.put(STORE, &record("c", "0003", 3.0)).await.unwrap();

        assert!(driver.remove(STORE, "a").await.is_ok());
        let err = driver.remove(STORE, "b").await.unwrap_err();
        assert!(err.is_transient(), "injected faults are transient");
        assert!(driver.remove(STORE, "c").await.is_ok(), "plan recovers after firing");
    }

    #[tokio::test]
    async fn test_fault_plan_forever() {
        let driver = MemoryDriver::with_faults(vec![FaultPlan::new("ping").forever()]);
        assert!(driver.ping().await.is_err());
        assert!(driver.ping().await.is_err());
    }

    #[tokio::test]
    async fn test_oversized_record_rejected() {
        let driver = MemoryDriver::new();
        let mut fields = Map::new();
        fields.insert("blob".to_string(), json!("x".repeat(RECORD_ITEM_BYTES_MAX)));
        let huge = Record::new("big".to_string(), "0-big".to_string(), fields);

        let err = driver.put(STORE, &huge).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));
    }
}
