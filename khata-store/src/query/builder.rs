//! `QueryBuilder` - Lazy, Chainable Queries
//!
//! `TigerStyle`: No storage call until a terminal, one obvious cost per
//! terminal.
//!
//! Builders accumulate a filter, an ordering, and page bounds. Chainable
//! methods consume and return the builder; calling [`filter`] or
//! [`order_by`] again replaces the previous value rather than merging
//! into it. Terminal methods also consume the builder, so a builder is
//! used exactly once; clone it first to run several terminals over the
//! same query.
//!
//! [`filter`]: QueryBuilder::filter
//! [`order_by`]: QueryBuilder::order_by

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::constants::{QUERY_EXISTS_CANDIDATES_COUNT, QUERY_GET_CANDIDATES_COUNT};
use crate::model::Model;
use crate::storage::{SortSpec, StorageDriver, StoreResult};

use super::filter::FilterSpec;

/// A lazy query over one model's store.
///
/// Obtained from a [`Manager`]; nothing touches the driver until a
/// terminal method runs.
///
/// [`Manager`]: super::Manager
pub struct QueryBuilder<M: Model> {
    driver: Arc<dyn StorageDriver>,
    filter: FilterSpec,
    sort: Option<SortSpec>,
    skip: Option<u64>,
    limit: Option<u64>,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Clone for QueryBuilder<M> {
    fn clone(&self) -> Self {
        Self {
            driver: Arc::clone(&self.driver),
            filter: self.filter.clone(),
            sort: self.sort.clone(),
            skip: self.skip,
            limit: self.limit,
            _model: PhantomData,
        }
    }
}

impl<M: Model> std::fmt::Debug for QueryBuilder<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("store", &M::STORE_NAME)
            .field("filter", &self.filter)
            .field("sort", &self.sort)
            .field("skip", &self.skip)
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

impl<M: Model> QueryBuilder<M> {
    pub(crate) fn new(driver: Arc<dyn StorageDriver>) -> Self {
        Self {
            driver,
            filter: FilterSpec::new(),
            sort: None,
            skip: None,
            limit: None,
            _model: PhantomData,
        }
    }

    // =========================================================================
    // Chainable methods
    // =========================================================================

    /// Attach a filter, replacing any previously attached one.
    #[must_use]
    pub fn filter(mut self, spec: FilterSpec) -> Self {
        self.filter = spec;
        self
    }

    /// Order results by a field, replacing any previous ordering.
    ///
    /// A leading `-` sorts descending: `order_by("-amount")`.
    ///
    /// # Panics
    /// Panics if the field name is empty.
    #[must_use]
    pub fn order_by(mut self, field: &str) -> Self {
        self.sort = Some(SortSpec::parse(field));
        self
    }

    /// Skip the first `count` results.
    #[must_use]
    pub fn skip(mut self, count: u64) -> Self {
        self.skip = Some(count);
        self
    }

    /// Return at most `count` results.
    #[must_use]
    pub fn limit(mut self, count: u64) -> Self {
        self.limit = Some(count);
        self
    }

    // =========================================================================
    // Terminal methods
    // =========================================================================

    /// Run the query and return every matching model.
    ///
    /// # Errors
    /// Propagates driver errors; fails with a serialization error if a
    /// stored record no longer matches the model's schema.
    pub async fn to_list(self) -> StoreResult<Vec<M>> {
        let records = self
            .driver
            .fetch(
                M::STORE_NAME,
                &self.filter,
                self.sort.as_ref(),
                self.skip,
                self.limit,
            )
            .await?;
        records.iter().map(M::from_record).collect()
    }

    /// Return the first result under the current ordering, if any.
    ///
    /// # Errors
    /// Propagates driver errors.
    pub async fn first(self) -> StoreResult<Option<M>> {
        let records = self
            .driver
            .fetch(
                M::STORE_NAME,
                &self.filter,
                self.sort.as_ref(),
                self.skip,
                Some(1),
            )
            .await?;
        records.first().map(M::from_record).transpose()
    }

    /// Count matching records.
    ///
    /// Counts the filtered set; ordering and page bounds do not apply.
    ///
    /// # Errors
    /// Propagates driver errors.
    pub async fn count(self) -> StoreResult<u64> {
        self.driver.count(M::STORE_NAME, &self.filter).await
    }

    /// Whether any record matches the filter.
    ///
    /// Fetches at most one record; cheaper than `count() > 0` on backends
    /// that scan.
    ///
    /// # Errors
    /// Propagates driver errors.
    pub async fn exists(self) -> StoreResult<bool> {
        let records = self
            .driver
            .fetch(
                M::STORE_NAME,
                &self.filter,
                None,
                None,
                Some(QUERY_EXISTS_CANDIDATES_COUNT),
            )
            .await?;
        Ok(!records.is_empty())
    }

    /// Fetch the single record the filter identifies.
    ///
    /// Returns `Ok(None)` when nothing matches. When several records
    /// match, the first under the current ordering (primary key ascending
    /// if none was set) is returned and a warning is logged; the choice
    /// is deterministic, so repeated calls agree.
    ///
    /// # Errors
    /// Propagates driver errors.
    pub async fn get(self) -> StoreResult<Option<M>> {
        let sort = self.sort.unwrap_or_else(|| SortSpec::asc("pk"));
        let records = self
            .driver
            .fetch(
                M::STORE_NAME,
                &self.filter,
                Some(&sort),
                None,
                Some(QUERY_GET_CANDIDATES_COUNT),
            )
            .await?;
        if records.len() > 1 {
            tracing::warn!(
                store = M::STORE_NAME,
                field = %sort.field,
                "get matched multiple records; returning the first"
            );
        }
        records.first().map(M::from_record).transpose()
    }

    /// Delete every record the query selects, one at a time.
    ///
    /// Returns the number of confirmed deletions. A record that fails to
    /// delete is logged and skipped; the rest of the batch still runs, so
    /// the returned count can be smaller than the selected set. There is
    /// no atomicity across records.
    ///
    /// # Errors
    /// Fails only if the selection itself cannot be fetched.
    #[tracing::instrument(skip(self), fields(store = M::STORE_NAME))]
    pub async fn delete(self) -> StoreResult<u64> {
        let records = self
            .driver
            .fetch(
                M::STORE_NAME,
                &self.filter,
                self.sort.as_ref(),
                self.skip,
                self.limit,
            )
            .await?;

        let mut confirmed: u64 = 0;
        for record in &records {
            match self.driver.remove(M::STORE_NAME, &record.pk).await {
                Ok(true) => confirmed += 1,
                // Already gone, nothing to confirm
                Ok(false) => {}
                Err(error) => {
                    tracing::warn!(
                        store = M::STORE_NAME,
                        pk = %record.pk,
                        %error,
                        "delete skipped record"
                    );
                }
            }
        }

        debug_assert!(confirmed as usize <= records.len());
        Ok(confirmed)
    }

    /// Patch every record the query selects with the same fields.
    ///
    /// Returns the number of confirmed updates, with the same
    /// partial-failure contract as [`delete`]: failed records are logged
    /// and skipped, and there is no atomicity across records. Each
    /// driver refreshes `updated_at` as part of the patch.
    ///
    /// # Errors
    /// Fails only if the selection itself cannot be fetched.
    ///
    /// [`delete`]: QueryBuilder::delete
    #[tracing::instrument(skip(self, fields), fields(store = M::STORE_NAME))]
    pub async fn update(self, fields: Map<String, Value>) -> StoreResult<u64> {
        let records = self
            .driver
            .fetch(
                M::STORE_NAME,
                &self.filter,
                self.sort.as_ref(),
                self.skip,
                self.limit,
            )
            .await?;

        let mut confirmed: u64 = 0;
        for record in &records {
            match self.driver.patch(M::STORE_NAME, &record.pk, &fields).await {
                Ok(true) => confirmed += 1,
                // Vanished between fetch and patch
                Ok(false) => {}
                Err(error) => {
                    tracing::warn!(
                        store = M::STORE_NAME,
                        pk = %record.pk,
                        %error,
                        "update skipped record"
                    );
                }
            }
        }

        Ok(confirmed)
    }
}
