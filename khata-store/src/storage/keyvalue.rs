//! `KeyValueDriver` - Embedded Key-Value Storage
//!
//! `TigerStyle`: Honest about what a key-value store can and cannot do.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      KeyValueDriver                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Db: sled (one file-backed database per process)            │
//! │  Tree {prefix}_{store}:      sk → JSON record               │
//! │  Tree {prefix}_{store}__pk:  pk → sk (point-lookup index)   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The backend supports exactly two read shapes: point lookup by key and
//! full scan. Every fetch with a predicate beyond an exact `pk` equality
//! therefore scans the whole tree, applies the filter's in-memory predicate
//! per record, then sorts and pages client-side, O(table size) per query.
//! Scans iterate in sort-key order, which is insertion order within a
//! process, and run without snapshot isolation: concurrent writes may or
//! may not be observed by an in-flight query (best effort, by contract).
//!
//! Sort keys are stable: rewriting a `pk` keeps its original `sk`, so a
//! record's scan position never changes. sled calls are synchronous and
//! page-cache backed; durability flushing is deferred to [`close`].
//!
//! [`close`]: KeyValueDriver::close

use std::path::Path;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::constants::{RECORD_ITEM_BYTES_MAX, STORE_PREFIX_BYTES_MAX};
use crate::model::Record;
use crate::query::FilterSpec;

use super::error::{StoreError, StoreResult};
use super::{SortSpec, StorageDriver};

/// Suffix distinguishing the pk index tree from its primary tree.
const PK_INDEX_TREE_SUFFIX: &str = "__pk";

/// Embedded key-value driver backed by sled.
#[derive(Debug, Clone)]
pub struct KeyValueDriver {
    db: sled::Db,
    prefix: String,
}

impl KeyValueDriver {
    /// Open (or create) a database at the given path.
    ///
    /// Physical tree names are `{prefix}_{store}`; an empty prefix uses the
    /// store name alone.
    ///
    /// # Errors
    /// Returns `Unavailable` if the database cannot be opened.
    ///
    /// # Panics
    /// Panics if the prefix exceeds its size limit.
    pub fn open(path: impl AsRef<Path>, prefix: impl Into<String>) -> StoreResult<Self> {
        let prefix = prefix.into();
        assert!(
            prefix.len() <= STORE_PREFIX_BYTES_MAX,
            "prefix {} bytes exceeds max {}",
            prefix.len(),
            STORE_PREFIX_BYTES_MAX
        );

        let db = sled::open(path).map_err(map_sled_error)?;
        Ok(Self { db, prefix })
    }

    /// Open a throwaway database that is deleted on drop.
    ///
    /// # Errors
    /// Returns `Unavailable` if the database cannot be created.
    pub fn temporary(prefix: impl Into<String>) -> StoreResult<Self> {
        let prefix = prefix.into();
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(map_sled_error)?;
        Ok(Self { db, prefix })
    }

    /// Physical name of a logical store's primary tree.
    fn physical_name(&self, store: &str) -> String {
        if self.prefix.is_empty() {
            store.to_string()
        } else {
            format!("{}_{store}", self.prefix)
        }
    }

    fn tree(&self, store: &str) -> StoreResult<sled::Tree> {
        self.db
            .open_tree(self.physical_name(store))
            .map_err(map_sled_error)
    }

    fn pk_index(&self, store: &str) -> StoreResult<sled::Tree> {
        self.db
            .open_tree(format!("{}{PK_INDEX_TREE_SUFFIX}", self.physical_name(store)))
            .map_err(map_sled_error)
    }

    /// Point lookup: pk → record, via the index tree.
    fn get_by_pk(&self, store: &str, pk: &str) -> StoreResult<Option<Record>> {
        let index = self.pk_index(store)?;
        let Some(sk) = index.get(pk.as_bytes()).map_err(map_sled_error)? else {
            return Ok(None);
        };
        let tree = self.tree(store)?;
        match tree.get(&sk).map_err(map_sled_error)? {
            Some(bytes) => Ok(Some(decode_record(&bytes)?)),
            // Index points at a missing row; repair on next put
            None => Ok(None),
        }
    }

    /// Full scan in sort-key (insertion) order, filtered in memory.
    fn scan(&self, store: &str, filter: &FilterSpec) -> StoreResult<Vec<Record>> {
        if let Some(pk) = filter.as_pk_lookup() {
            return Ok(self.get_by_pk(store, pk)?.into_iter().collect());
        }

        let tree = self.tree(store)?;
        let mut records = Vec::new();
        for entry in tree.iter() {
            let (_, bytes) = entry.map_err(map_sled_error)?;
            let record = decode_record(&bytes)?;
            if filter.matches(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl StorageDriver for KeyValueDriver {
    #[tracing::instrument(skip(self, filter, sort))]
    async fn fetch(
        &self,
        store: &str,
        filter: &FilterSpec,
        sort: Option<&SortSpec>,
        skip: Option<u64>,
        limit: Option<u64>,
    ) -> StoreResult<Vec<Record>> {
        let mut records = self.scan(store, filter)?;
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
        if let Some(pk) = filter.as_pk_lookup() {
            return self.get_by_pk(store, pk);
        }

        let tree = self.tree(store)?;
        for entry in tree.iter() {
            let (_, bytes) = entry.map_err(map_sled_error)?;
            let record = decode_record(&bytes)?;
            if filter.matches(&record) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    async fn count(&self, store: &str, filter: &FilterSpec) -> StoreResult<u64> {
        Ok(self.scan(store, filter)?.len() as u64)
    }

    #[tracing::instrument(skip(self, record), fields(pk = %record.pk))]
    async fn put(&self, store: &str, record: &Record) -> StoreResult<()> {
        // Preconditions
        assert!(!record.pk.is_empty(), "record must have pk");
        assert!(!record.sk.is_empty(), "record must have sk");

        let index = self.pk_index(store)?;
        let tree = self.tree(store)?;

        // Rewrites keep the original sort key so scan position is stable.
        let sk = match index.get(record.pk.as_bytes()).map_err(map_sled_error)? {
            Some(existing) => String::from_utf8(existing.to_vec())
                .map_err(|e| StoreError::serialization(format!("stored sk: {e}")))?,
            None => record.sk.clone(),
        };

        let mut stored = record.clone();
        stored.sk = sk.clone();
        let bytes = encode_record(&stored)?;
        if bytes.len() > RECORD_ITEM_BYTES_MAX {
            return Err(StoreError::validation(format!(
                "record {} exceeds {RECORD_ITEM_BYTES_MAX} bytes",
                record.pk
            )));
        }

        tree.insert(sk.as_bytes(), bytes).map_err(map_sled_error)?;
        index
            .insert(record.pk.as_bytes(), sk.as_bytes())
            .map_err(map_sled_error)?;
        Ok(())
    }

    async fn patch(
        &self,
        store: &str,
        pk: &str,
        fields: &Map<String, Value>,
    ) -> StoreResult<bool> {
        assert!(!pk.is_empty(), "pk must not be empty");

        let Some(mut record) = self.get_by_pk(store, pk)? else {
            return Ok(false);
        };
        record.apply_patch(fields);

        let tree = self.tree(store)?;
        tree.insert(record.sk.as_bytes(), encode_record(&record)?)
            .map_err(map_sled_error)?;
        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    async fn remove(&self, store: &str, pk: &str) -> StoreResult<bool> {
        assert!(!pk.is_empty(), "pk must not be empty");

        let index = self.pk_index(store)?;
        let Some(sk) = index.remove(pk.as_bytes()).map_err(map_sled_error)? else {
            return Ok(false);
        };
        let tree = self.tree(store)?;
        let removed = tree.remove(&sk).map_err(map_sled_error)?;
        Ok(removed.is_some())
    }

    async fn ensure_schema(&self, store: &str) -> StoreResult<()> {
        assert!(!store.is_empty(), "store name must not be empty");

        // open_tree creates on first use and is safe under concurrency, so
        // repeated and racing calls all land in the same place.
        self.tree(store)?;
        self.pk_index(store)?;
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        self.db.size_on_disk().map(|_| ()).map_err(map_sled_error)
    }

    async fn close(&self) -> StoreResult<()> {
        self.db
            .flush_async()
            .await
            .map(|_| ())
            .map_err(map_sled_error)
    }
}

fn encode_record(record: &Record) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(record).map_err(|e| StoreError::serialization(format!("encode: {e}")))
}

fn decode_record(bytes: &[u8]) -> StoreResult<Record> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::serialization(format!("decode: {e}")))
}

fn map_sled_error(err: sled::Error) -> StoreError {
    match err {
        sled::Error::Io(e) => StoreError::unavailable(format!("sled io: {e}")),
        sled::Error::CollectionNotFound(name) => StoreError::internal(format!(
            "sled tree vanished: {}",
            String::from_utf8_lossy(&name)
        )),
        other => StoreError::internal(format!("sled: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const STORE: &str = "transactions";

    fn driver() -> KeyValueDriver {
        KeyValueDriver::temporary("test").unwrap()
    }

    fn record(pk: &str, sk: &str, amount: f64) -> Record {
        let mut fields = Map::new();
        fields.insert("amount".to_string(), json!(amount));
        Record::new(pk.to_string(), sk.to_string(), fields)
    }

    #[tokio::test]
    async fn test_put_fetch_remove_round_trip() {
        let driver = driver();
        driver.put(STORE, &record("a", "0001", 100.0)).await.unwrap();

        let found = driver
            .fetch_one(STORE, &FilterSpec::new().eq("pk", "a"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.pk, "a");
        assert_eq!(found.field_value("amount"), Some(json!(100.0)));

        assert!(driver.remove(STORE, "a").await.unwrap());
        assert!(!driver.remove(STORE, "a").await.unwrap());
        let gone = driver
            .fetch_one(STORE, &FilterSpec::new().eq("pk", "a"))
            .await
            .unwrap();
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn test_scan_order_is_insertion_order() {
        let driver = driver();
        // pks deliberately out of alphabetical order; sks increase
        for (i, pk) in ["zulu", "alpha", "mike"].iter().enumerate() {
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
        assert_eq!(pks, vec!["zulu", "alpha", "mike"]);
    }

    #[tokio::test]
    async fn test_rewrite_keeps_sort_key_and_single_row() {
        let driver = driver();
        driver.put(STORE, &record("a", "0001", 100.0)).await.unwrap();
        // Save again with a different (fresh) sk, as a manager would
        driver.put(STORE, &record("a", "0009", 50.0)).await.unwrap();

        assert_eq!(driver.count(STORE, &FilterSpec::new()).await.unwrap(), 1);
        let found = driver
            .fetch_one(STORE, &FilterSpec::new().eq("pk", "a"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.sk, "0001", "sort key survives rewrites");
        assert_eq!(found.field_value("amount"), Some(json!(50.0)));
    }

    #[tokio::test]
    async fn test_filtered_fetch_sorts_and_pages_client_side() {
        let driver = driver();
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
        let page = driver
            .fetch(
                STORE,
                &spec,
                Some(&SortSpec::desc("amount")),
                Some(1),
                Some(2),
            )
            .await
            .unwrap();
        let pks: Vec<&str> = page.iter().map(|r| r.pk.as_str()).collect();
        assert_eq!(pks, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_patch_updates_in_place() {
        let driver = driver();
        driver.put(STORE, &record("a", "0001", 100.0)).await.unwrap();

        let mut patch = Map::new();
        patch.insert("amount".to_string(), json!(50));
        patch.insert("notes".to_string(), json!("halved"));
        assert!(driver.patch(STORE, "a", &patch).await.unwrap());
        assert!(!driver.patch(STORE, "missing", &patch).await.unwrap());

        let found = driver
            .fetch_one(STORE, &FilterSpec::new().eq("pk", "a"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.field_value("amount"), Some(json!(50)));
        assert_eq!(found.field_value("notes"), Some(json!("halved")));
    }

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let driver = driver();
        driver.ensure_schema(STORE).await.unwrap();
        driver.ensure_schema(STORE).await.unwrap();
        assert_eq!(driver.count(STORE, &FilterSpec::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reopen_preserves_records() {
        let dir = tempfile::TempDir::new().unwrap();

        {
            let driver = KeyValueDriver::open(dir.path(), "test").unwrap();
            driver.put(STORE, &record("a", "0001", 100.0)).await.unwrap();
            driver.close().await.unwrap();
        }

        let reopened = KeyValueDriver::open(dir.path(), "test").unwrap();
        let found = reopened
            .fetch_one(STORE, &FilterSpec::new().eq("pk", "a"))
            .await
            .unwrap();
        assert_eq!(found.unwrap().field_value("amount"), Some(json!(100.0)));
    }

    #[tokio::test]
    async fn test_prefix_separates_physical_trees() {
        let driver = driver();
        assert_eq!(driver.physical_name("budgets"), "test_budgets");

        let unprefixed = KeyValueDriver::temporary("").unwrap();
        assert_eq!(unprefixed.physical_name("budgets"), "budgets");
    }

    #[tokio::test]
    async fn test_ping_succeeds_on_open_db() {
        let driver = driver();
        driver.ping().await.unwrap();
    }
}
