//! # Khata Store
//!
//! A uniform persistence layer for personal-finance backends, with one query
//! API over interchangeable storage backends.
//!
//! ## Features
//!
//! - **💸 Typed Finance Models**: Transactions, categories, accounts, contacts, budgets, UPI providers
//! - **🔁 One API, Two Backends**: Hosted document database or embedded key-value store, chosen once at startup
//! - **🔍 Query Mini-language**: `field__operator` filters with chainable ordering and pagination
//! - **✅ Identical Semantics**: The same query returns the same rows on either backend
//! - **🧪 Test-first Seams**: In-memory driver and fault injection for exercising failure paths
//!
//! ## Quick Start
//!
//! ```rust
//! use khata_store::{FilterSpec, PaymentMethod, Store, Transaction, TransactionType};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), anyhow::Error> {
//! // An in-memory store, no backend required
//! let store = Store::in_memory();
//! let transactions = store.objects::<Transaction>();
//!
//! // Record an expense
//! transactions
//!     .create(Transaction::new(
//!         TransactionType::Expense,
//!         240.0,
//!         "cat-food".to_string(),
//!         "Lunch at the canteen".to_string(),
//!         PaymentMethod::Upi,
//!     ))
//!     .await?;
//!
//! // Query it back
//! let expensive = transactions
//!     .filter(FilterSpec::new().eq("transaction_type", "EXPENSE").gte("amount", 100))
//!     .order_by("-amount")
//!     .to_list()
//!     .await?;
//! assert_eq!(expensive.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! Production code connects the same way with [`Store::connect`] and a
//! [`StoreConfig`], typically built from the environment:
//!
//! ```rust,no_run
//! use khata_store::{Store, StoreConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), anyhow::Error> {
//! let store = Store::connect(StoreConfig::from_env()).await?;
//! store.ping().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                         Store                            │
//! │          objects::<M>() hands out typed Managers         │
//! ├─────────────────────────────────────────────────────────┤
//! │  Manager<M>        │ create / get / get_or_create / ...  │
//! │  QueryBuilder<M>   │ filter / order_by / skip / limit    │
//! │  FilterSpec        │ field__operator mini-language       │
//! ├─────────────────────────────────────────────────────────┤
//! │                  StorageDriver (trait)                   │
//! │  DocumentDriver    │ hosted, filters run server-side     │
//! │  KeyValueDriver    │ embedded, filters run client-side   │
//! │  MemoryDriver      │ in-process, for tests and tooling   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Components
//!
//! - [`Store`](store::Store) - Backend binding and model registry
//! - [`Manager`](query::Manager) - Typed create/read/update/delete per model
//! - [`QueryBuilder`](query::QueryBuilder) - Lazy, chainable query assembly
//! - [`FilterSpec`](query::FilterSpec) - Backend-portable filter translation
//! - [`StorageDriver`](storage::StorageDriver) - The seam both backends implement
//!
//! ## Backend Selection
//!
//! The backend is chosen exactly once, when the store connects. The `IS_CLOUD`
//! environment switch maps cloud deployments to the embedded key-value store
//! and everything else to the hosted document database; see
//! [`StoreConfig::from_env`](store::StoreConfig::from_env). There is no
//! runtime rebinding and no per-query fallback. A query that cannot reach its
//! backend reports [`StoreError::Unavailable`](storage::StoreError) and the
//! caller decides what to do.
//!
//! ## Feature Flags
//!
//! - `mongodb` - Document backend driver (the embedded backends are always built)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod constants;
pub mod model;
pub mod query;
pub mod storage;
pub mod store;
pub mod telemetry;

// Re-export common types
pub use constants::*;

// Model exports
pub use model::{
    Account, AccountType, Attachment, Budget, Category, CategoryType, Contact, KeyGen, Location,
    Model, PaymentMethod, Record, RecurrenceFrequency, RecurringConfig, SplitShare, Transaction,
    TransactionType, UpiProvider,
};

// Query exports
pub use query::{CompareOp, Comparison, FilterSpec, Manager, QueryBuilder};

// Storage exports
pub use storage::{
    FaultPlan, KeyValueDriver, MemoryDriver, SortSpec, StorageDriver, StoreError, StoreResult,
};

#[cfg(feature = "mongodb")]
pub use storage::DocumentDriver;

// Store exports (main API)
pub use store::{BackendMode, Store, StoreBuilder, StoreConfig};

// Telemetry exports
pub use telemetry::{init_logging, LogConfig, TelemetryError, TelemetryResult};
