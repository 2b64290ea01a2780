//! `Manager` - Per-Model Persistence Entry Point
//!
//! `TigerStyle`: One type owns the write path, queries stay on the builder.
//!
//! A `Manager<M>` binds one model type to the store's driver and key
//! generator. Collection reads go through [`all`]/[`filter`], which hand
//! out lazy [`QueryBuilder`]s; creation and instance-level writes
//! (`save`, `update_fields`, `delete`, `refresh`) live here because they
//! need key assignment and timestamp maintenance.
//!
//! [`all`]: Manager::all
//! [`filter`]: Manager::filter

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};

use crate::model::{KeyGen, Model};
use crate::storage::{StorageDriver, StoreResult};

use super::builder::QueryBuilder;
use super::filter::FilterSpec;

/// Typed persistence handle for one model type.
///
/// Cheap to clone; obtained from [`Store::objects`].
///
/// [`Store::objects`]: crate::store::Store::objects
pub struct Manager<M: Model> {
    driver: Arc<dyn StorageDriver>,
    keys: Arc<KeyGen>,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Clone for Manager<M> {
    fn clone(&self) -> Self {
        Self {
            driver: Arc::clone(&self.driver),
            keys: Arc::clone(&self.keys),
            _model: PhantomData,
        }
    }
}

impl<M: Model> std::fmt::Debug for Manager<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("store", &M::STORE_NAME)
            .finish_non_exhaustive()
    }
}

impl<M: Model> Manager<M> {
    pub(crate) fn new(driver: Arc<dyn StorageDriver>, keys: Arc<KeyGen>) -> Self {
        Self {
            driver,
            keys,
            _model: PhantomData,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Query over every record in the store.
    #[must_use]
    pub fn all(&self) -> QueryBuilder<M> {
        QueryBuilder::new(Arc::clone(&self.driver))
    }

    /// Query over records matching `spec`.
    #[must_use]
    pub fn filter(&self, spec: FilterSpec) -> QueryBuilder<M> {
        self.all().filter(spec)
    }

    /// Fetch the single record `spec` identifies, if any.
    ///
    /// # Errors
    /// Propagates driver errors.
    pub async fn get(&self, spec: FilterSpec) -> StoreResult<Option<M>> {
        self.filter(spec).get().await
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Persist a new model, assigning keys if the caller did not.
    ///
    /// A caller-supplied `pk` is kept, which makes imports idempotent:
    /// re-creating the same `pk` overwrites rather than duplicates.
    ///
    /// # Errors
    /// Propagates driver errors.
    #[tracing::instrument(skip(self, model), fields(store = M::STORE_NAME))]
    pub async fn create(&self, mut model: M) -> StoreResult<M> {
        if model.pk().is_empty() {
            model.set_pk(self.keys.pk());
        }
        if model.sk().is_empty() {
            model.set_sk(self.keys.sk());
        }

        // Postcondition inputs for the driver
        debug_assert!(!model.pk().is_empty());
        debug_assert!(!model.sk().is_empty());

        let record = model.to_record()?;
        self.driver.put(M::STORE_NAME, &record).await?;
        Ok(model)
    }

    /// Fetch the record `lookup` identifies, creating it from `defaults`
    /// when absent.
    ///
    /// Returns the model and whether it was created. Lookup and creation
    /// are two separate driver calls with no lock between them: two
    /// concurrent callers can both observe "absent" and both create.
    /// Callers needing uniqueness must enforce it themselves.
    ///
    /// # Errors
    /// Propagates driver errors.
    pub async fn get_or_create(&self, lookup: FilterSpec, defaults: M) -> StoreResult<(M, bool)> {
        #[cfg(debug_assertions)]
        if let Ok(record) = defaults.to_record() {
            debug_assert!(
                lookup.matches(&record),
                "defaults must satisfy the lookup filter, or get_or_create will create forever"
            );
        }

        if let Some(found) = self.filter(lookup).get().await? {
            return Ok((found, false));
        }
        let created = self.create(defaults).await?;
        Ok((created, true))
    }

    /// Persist a batch of new models sequentially.
    ///
    /// Models are created in order. If one fails, the error propagates
    /// and the models already created stay persisted; there is no
    /// atomicity across the batch.
    ///
    /// # Errors
    /// Propagates the first driver error.
    pub async fn bulk_create(&self, models: Vec<M>) -> StoreResult<Vec<M>> {
        let mut created = Vec::with_capacity(models.len());
        for model in models {
            created.push(self.create(model).await?);
        }
        Ok(created)
    }

    // =========================================================================
    // Instance operations
    // =========================================================================

    /// Persist the model's current state, assigning keys on first save.
    ///
    /// Refreshes `updated_at` and replaces the stored record wholesale.
    ///
    /// # Errors
    /// Propagates driver errors.
    #[tracing::instrument(skip(self, model), fields(store = M::STORE_NAME))]
    pub async fn save(&self, model: &mut M) -> StoreResult<()> {
        if model.pk().is_empty() {
            model.set_pk(self.keys.pk());
        }
        if model.sk().is_empty() {
            model.set_sk(self.keys.sk());
        }
        model.set_updated_at(Utc::now());

        let record = model.to_record()?;
        self.driver.put(M::STORE_NAME, &record).await
    }

    /// Patch specific fields of a saved model, then reload it.
    ///
    /// Returns `false` without touching the model if its record no longer
    /// exists.
    ///
    /// # Errors
    /// Propagates driver errors.
    ///
    /// # Panics
    /// Panics if the model has never been saved.
    pub async fn update_fields(
        &self,
        model: &mut M,
        fields: Map<String, Value>,
    ) -> StoreResult<bool> {
        assert!(!model.pk().is_empty(), "model must be saved before update");

        if !self.driver.patch(M::STORE_NAME, model.pk(), &fields).await? {
            return Ok(false);
        }
        // Pick up the patched fields and refreshed updated_at
        self.refresh(model).await
    }

    /// Remove the model's record from storage.
    ///
    /// This is the hard delete; marking `is_deleted` and saving is the
    /// soft one. Returns `false` if the record was already gone.
    ///
    /// # Errors
    /// Propagates driver errors.
    #[tracing::instrument(skip(self, model), fields(store = M::STORE_NAME))]
    pub async fn delete(&self, model: &M) -> StoreResult<bool> {
        assert!(!model.pk().is_empty(), "model must be saved before delete");

        self.driver.remove(M::STORE_NAME, model.pk()).await
    }

    /// Reload the model from storage, overwriting local state.
    ///
    /// Returns `false` and leaves the model untouched if its record no
    /// longer exists.
    ///
    /// # Errors
    /// Propagates driver errors.
    pub async fn refresh(&self, model: &mut M) -> StoreResult<bool> {
        assert!(!model.pk().is_empty(), "model must be saved before refresh");

        let lookup = FilterSpec::new().eq("pk", model.pk());
        match self.driver.fetch_one(M::STORE_NAME, &lookup).await? {
            Some(record) => {
                *model = M::from_record(&record)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
