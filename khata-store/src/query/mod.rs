//! Query Layer - Filters, Lazy Queries, Managers
//!
//! `TigerStyle`: Parse once, translate per backend, stay lazy until a
//! terminal.
//!
//! ```text
//! Manager<M> ──filter()──▶ QueryBuilder<M> ──to_list()/get()/...──▶ driver
//!                               │
//!                         FilterSpec (typed comparisons)
//!                          ├─ matches(record)     in-memory predicate
//!                          └─ to_document()       native query document
//! ```
//!
//! [`FilterSpec`] is the shared query language: a list of typed
//! comparisons parsed once from `field__operator` keys. [`QueryBuilder`]
//! accumulates filter, order, and page bounds without touching storage;
//! its terminal methods consume the builder and run exactly one driver
//! call per terminal (plus one per record for the bulk writes).
//! [`Manager`] is the per-model entry point handing out builders and
//! owning create/save/delete.

mod builder;
mod filter;
mod manager;

pub use builder::QueryBuilder;
pub use filter::{CompareOp, Comparison, FilterSpec};
pub use manager::Manager;

#[cfg(feature = "mongodb")]
pub(crate) use filter::document_field_name;
pub(crate) use filter::order_values;
