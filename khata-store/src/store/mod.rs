//! `Store` - Backend Selection and Model Binding
//!
//! `TigerStyle`: Pick the backend once, at startup, explicitly.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Store                               │
//! │  driver: Arc<dyn StorageDriver>     (chosen at connect time)  │
//! │  keys:   Arc<KeyGen>                (shared key generator)    │
//! ├──────────────────────────────────────────────────────────────┤
//! │  objects::<Transaction>() ─▶ Manager<Transaction>             │
//! │  objects::<Category>()    ─▶ Manager<Category>                │
//! │  ...                                                          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`StoreConfig`] decides which driver backs the store: the cloud flag
//! selects the embedded key-value backend, otherwise the hosted document
//! backend. The choice is made exactly once in [`StoreBuilder::connect`]
//! and the resulting [`Store`] never rebinds; restart the process to
//! change backends. Every model registered with the builder gets its
//! schema ensured before the store is handed out.
//!
//! The store is an explicit value to pass around, not a global. Handing
//! [`Store::in_memory`] to code under test swaps the whole persistence
//! layer without further ceremony.

use std::path::PathBuf;
use std::sync::Arc;

use crate::constants::{STORE_DATABASE_NAME_DEFAULT, STORE_PREFIX_DEFAULT};
use crate::model::{
    Account, Budget, Category, Contact, KeyGen, Model, Transaction, UpiProvider,
};
use crate::query::Manager;
#[cfg(feature = "mongodb")]
use crate::storage::DocumentDriver;
use crate::storage::{KeyValueDriver, MemoryDriver, StorageDriver, StoreResult};
#[cfg(not(feature = "mongodb"))]
use crate::storage::StoreError;

/// Environment switch selecting the backend (`true` means key-value).
const ENV_IS_CLOUD: &str = "IS_CLOUD";
/// Environment override for the document server URL.
const ENV_MONGO_URL: &str = "MONGO_URL";
/// Environment override for the database name (also the table prefix).
const ENV_DB_NAME: &str = "DB_NAME";
/// Environment override for the key-value data directory.
const ENV_DATA_DIR: &str = "KHATA_DATA_DIR";

// =============================================================================
// BackendMode
// =============================================================================

/// Which storage backend a store binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    /// Hosted document database (requires the `mongodb` feature).
    Document,
    /// Embedded key-value database.
    KeyValue,
}

impl BackendMode {
    /// Map the deployment's cloud flag to a backend.
    ///
    /// Cloud deployments run on the embedded key-value store; everything
    /// else talks to the hosted document database.
    #[must_use]
    pub fn from_cloud_flag(is_cloud: bool) -> Self {
        if is_cloud {
            Self::KeyValue
        } else {
            Self::Document
        }
    }

    /// Get string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::KeyValue => "keyvalue",
        }
    }
}

impl std::fmt::Display for BackendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// StoreConfig
// =============================================================================

/// Connection settings for a [`Store`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Backend to bind at connect time.
    pub mode: BackendMode,
    /// Document server URL (document mode only).
    pub document_url: String,
    /// Database name (document mode only).
    pub database: String,
    /// Prefix for physical store names, `{prefix}_{store}`.
    pub prefix: String,
    /// Key-value data directory; `None` uses a throwaway database.
    pub data_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            mode: BackendMode::Document,
            document_url: "mongodb://localhost:27017".to_string(),
            database: STORE_DATABASE_NAME_DEFAULT.to_string(),
            prefix: STORE_PREFIX_DEFAULT.to_string(),
            data_dir: None,
        }
    }
}

impl StoreConfig {
    /// Configuration for the given backend with default settings.
    #[must_use]
    pub fn new(mode: BackendMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Read configuration from the environment.
    ///
    /// `IS_CLOUD` picks the backend, `MONGO_URL` and `DB_NAME` configure
    /// the document side (`DB_NAME` doubles as the physical name prefix),
    /// and `KHATA_DATA_DIR` locates the key-value database. Unset
    /// variables keep their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var(ENV_IS_CLOUD) {
            let is_cloud = matches!(value.to_lowercase().as_str(), "true" | "1" | "yes");
            config.mode = BackendMode::from_cloud_flag(is_cloud);
        }
        if let Ok(url) = std::env::var(ENV_MONGO_URL) {
            config.document_url = url;
        }
        if let Ok(name) = std::env::var(ENV_DB_NAME) {
            config.prefix.clone_from(&name);
            config.database = name;
        }
        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            config.data_dir = Some(PathBuf::from(dir));
        }

        config
    }

    /// Set the document server URL.
    #[must_use]
    pub fn with_document_url(mut self, url: impl Into<String>) -> Self {
        self.document_url = url.into();
        self
    }

    /// Set the database name.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set the physical name prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the key-value data directory.
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }
}

// =============================================================================
// StoreBuilder
// =============================================================================

/// Collects model registrations, then connects.
#[derive(Debug)]
pub struct StoreBuilder {
    config: StoreConfig,
    stores: Vec<&'static str>,
    driver: Option<Arc<dyn StorageDriver>>,
}

impl StoreBuilder {
    fn new(config: StoreConfig) -> Self {
        Self {
            config,
            stores: Vec::new(),
            driver: None,
        }
    }

    /// Register a model type for schema-ensure at connect time.
    #[must_use]
    pub fn register<M: Model>(mut self) -> Self {
        if !self.stores.contains(&M::STORE_NAME) {
            self.stores.push(M::STORE_NAME);
        }
        self
    }

    /// Register the full finance model catalog.
    #[must_use]
    pub fn with_finance_models(self) -> Self {
        self.register::<Transaction>()
            .register::<Category>()
            .register::<Account>()
            .register::<Contact>()
            .register::<Budget>()
            .register::<UpiProvider>()
    }

    /// Bind an explicit driver instead of building one from the config.
    ///
    /// This is the seam tests use to inject [`MemoryDriver`] or a faulty
    /// double.
    #[must_use]
    pub fn with_driver(mut self, driver: Arc<dyn StorageDriver>) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Build the driver, ensure every registered schema, return the store.
    ///
    /// # Errors
    /// Returns `Unavailable` if the backend cannot be reached, or a
    /// validation error in document mode when the crate was built without
    /// the `mongodb` feature.
    #[tracing::instrument(skip(self), fields(mode = %self.config.mode))]
    pub async fn connect(self) -> StoreResult<Store> {
        let driver = match self.driver {
            Some(driver) => driver,
            None => build_driver(&self.config).await?,
        };

        for store in &self.stores {
            driver.ensure_schema(store).await?;
        }
        tracing::info!(
            mode = %self.config.mode,
            stores = self.stores.len(),
            "store connected"
        );

        Ok(Store {
            driver,
            keys: Arc::new(KeyGen::new()),
            stores: Arc::from(self.stores.as_slice()),
        })
    }
}

async fn build_driver(config: &StoreConfig) -> StoreResult<Arc<dyn StorageDriver>> {
    match config.mode {
        BackendMode::Document => build_document_driver(config).await,
        BackendMode::KeyValue => build_keyvalue_driver(config),
    }
}

#[cfg(feature = "mongodb")]
async fn build_document_driver(config: &StoreConfig) -> StoreResult<Arc<dyn StorageDriver>> {
    let driver = DocumentDriver::connect(
        &config.document_url,
        &config.database,
        config.prefix.clone(),
    )
    .await?;
    Ok(Arc::new(driver))
}

#[cfg(not(feature = "mongodb"))]
#[allow(clippy::unused_async)] // signature matches the feature-gated variant
async fn build_document_driver(config: &StoreConfig) -> StoreResult<Arc<dyn StorageDriver>> {
    let _ = config;
    Err(StoreError::validation(
        "document backend requires the mongodb feature",
    ))
}

fn build_keyvalue_driver(config: &StoreConfig) -> StoreResult<Arc<dyn StorageDriver>> {
    let driver = match &config.data_dir {
        Some(path) => KeyValueDriver::open(path, config.prefix.clone())?,
        None => KeyValueDriver::temporary(config.prefix.clone())?,
    };
    Ok(Arc::new(driver))
}

// =============================================================================
// Store
// =============================================================================

/// The bound persistence context.
///
/// Cheap to clone and safe to share; all clones use the same driver and
/// key generator. Hand out [`Manager`]s with [`objects`].
///
/// [`objects`]: Store::objects
#[derive(Debug, Clone)]
pub struct Store {
    driver: Arc<dyn StorageDriver>,
    keys: Arc<KeyGen>,
    stores: Arc<[&'static str]>,
}

impl Store {
    /// Start configuring a store.
    #[must_use]
    pub fn builder(config: StoreConfig) -> StoreBuilder {
        StoreBuilder::new(config)
    }

    /// Connect with the full finance catalog registered.
    ///
    /// # Errors
    /// Propagates builder errors, see [`StoreBuilder::connect`].
    pub async fn connect(config: StoreConfig) -> StoreResult<Self> {
        Self::builder(config).with_finance_models().connect().await
    }

    /// A store over a fresh in-memory driver, for tests and tooling.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_driver(Arc::new(MemoryDriver::new()))
    }

    /// A store over an explicit driver, skipping config and schema setup.
    #[must_use]
    pub fn with_driver(driver: Arc<dyn StorageDriver>) -> Self {
        Self {
            driver,
            keys: Arc::new(KeyGen::new()),
            stores: Arc::from(FINANCE_STORES),
        }
    }

    /// Typed persistence handle for a model type.
    #[must_use]
    pub fn objects<M: Model>(&self) -> Manager<M> {
        Manager::new(Arc::clone(&self.driver), Arc::clone(&self.keys))
    }

    /// Store names registered at connect time.
    #[must_use]
    pub fn registered_stores(&self) -> &[&'static str] {
        &self.stores
    }

    /// Probe backend liveness.
    ///
    /// # Errors
    /// Returns `Unavailable` if the backend does not respond.
    pub async fn ping(&self) -> StoreResult<()> {
        self.driver.ping().await
    }

    /// Flush and release backend resources.
    ///
    /// Call once at process shutdown; the store is unusable afterwards.
    ///
    /// # Errors
    /// Propagates driver shutdown errors.
    pub async fn close(&self) -> StoreResult<()> {
        self.driver.close().await
    }
}

/// The finance model catalog's store names, in registration order.
const FINANCE_STORES: &[&str] = &[
    Transaction::STORE_NAME,
    Category::STORE_NAME,
    Account::STORE_NAME,
    Contact::STORE_NAME,
    Budget::STORE_NAME,
    UpiProvider::STORE_NAME,
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PaymentMethod, TransactionType};
    use crate::query::FilterSpec;

    fn expense(amount: f64) -> Transaction {
        Transaction::new(
            TransactionType::Expense,
            amount,
            "cat-food".to_string(),
            "Lunch".to_string(),
            PaymentMethod::Cash,
        )
    }

    #[test]
    fn test_cloud_flag_selects_keyvalue() {
        assert_eq!(BackendMode::from_cloud_flag(true), BackendMode::KeyValue);
        assert_eq!(BackendMode::from_cloud_flag(false), BackendMode::Document);
    }

    #[test]
    fn test_config_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.mode, BackendMode::Document);
        assert_eq!(config.database, "khata");
        assert_eq!(config.prefix, "khata");
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn test_config_builders() {
        let config = StoreConfig::new(BackendMode::KeyValue)
            .with_prefix("test")
            .with_data_dir("/tmp/khata-test");
        assert_eq!(config.mode, BackendMode::KeyValue);
        assert_eq!(config.prefix, "test");
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/khata-test")));
    }

    #[tokio::test]
    async fn test_builder_deduplicates_registrations() {
        let store = Store::builder(StoreConfig::new(BackendMode::KeyValue))
            .register::<Transaction>()
            .register::<Transaction>()
            .register::<Category>()
            .connect()
            .await
            .unwrap();
        assert_eq!(store.registered_stores(), ["transactions", "categories"]);
    }

    #[tokio::test]
    async fn test_keyvalue_store_end_to_end() {
        let store = Store::builder(StoreConfig::new(BackendMode::KeyValue))
            .with_finance_models()
            .connect()
            .await
            .unwrap();
        store.ping().await.unwrap();

        let txns = store.objects::<Transaction>();
        let created = txns.create(expense(100.0)).await.unwrap();
        let found = txns
            .get(FilterSpec::new().eq("pk", created.pk.as_str()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.amount, 100.0);

        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_in_memory_store_shares_driver_across_clones() {
        let store = Store::in_memory();
        let txns = store.objects::<Transaction>();
        txns.create(expense(10.0)).await.unwrap();

        let clone = store.clone();
        let seen = clone.objects::<Transaction>().all().count().await.unwrap();
        assert_eq!(seen, 1);
    }

    #[cfg(not(feature = "mongodb"))]
    #[tokio::test]
    async fn test_document_mode_requires_feature() {
        let err = Store::connect(StoreConfig::new(BackendMode::Document))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::storage::StoreError::Validation { .. }));
    }

    #[test]
    fn test_env_config_round_trip() {
        // Env vars are process-global; this is the only test touching them.
        std::env::set_var(ENV_IS_CLOUD, "true");
        std::env::set_var(ENV_DB_NAME, "khata_test");
        let config = StoreConfig::from_env();
        std::env::remove_var(ENV_IS_CLOUD);
        std::env::remove_var(ENV_DB_NAME);

        assert_eq!(config.mode, BackendMode::KeyValue);
        assert_eq!(config.database, "khata_test");
        assert_eq!(config.prefix, "khata_test");
    }
}
