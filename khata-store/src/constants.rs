//! `TigerStyle` Constants
//!
//! All limits use big-endian naming: `CATEGORY_SPECIFICS_UNIT_LIMIT`
//! Example: `RECORD_ITEM_BYTES_MAX` (not `MAX_RECORD_ITEM_SIZE`)
//!
//! Every constant includes units in the name:
//! - _`BYTES_MAX/MIN` for size limits
//! - _`COUNT_MAX` for quantity limits
//! - _MS for milliseconds

// =============================================================================
// Record Limits
// =============================================================================

/// Maximum length of a primary key
pub const RECORD_PK_BYTES_MAX: usize = 256;

/// Maximum length of a sort key
pub const RECORD_SK_BYTES_MAX: usize = 64;

/// Maximum encoded size of a single record (key-value item ceiling)
pub const RECORD_ITEM_BYTES_MAX: usize = 400 * 1024; // 400KB

/// Maximum number of fields in a record's attribute bag
pub const RECORD_FIELDS_COUNT_MAX: usize = 256;

/// Maximum length of a field name
pub const RECORD_FIELD_NAME_BYTES_MAX: usize = 128;

// =============================================================================
// Store Limits
// =============================================================================

/// Maximum length of a logical store name
pub const STORE_NAME_BYTES_MAX: usize = 128;

/// Maximum length of the physical table name prefix
pub const STORE_PREFIX_BYTES_MAX: usize = 64;

/// Default physical table name prefix
pub const STORE_PREFIX_DEFAULT: &str = "khata";

/// Default logical database name for the document backend
pub const STORE_DATABASE_NAME_DEFAULT: &str = "khata";

/// Maximum pooled connections for the document backend
pub const DOCUMENT_POOL_CONNECTIONS_COUNT_MAX: u32 = 10;

// =============================================================================
// Filter Limits
// =============================================================================

/// Maximum number of comparisons in one filter specification
pub const FILTER_COMPARISONS_COUNT_MAX: usize = 64;

/// Separator between a field name and its comparison operator
pub const FILTER_OPERATOR_SEPARATOR: &str = "__";

// =============================================================================
// Query Limits
// =============================================================================

/// Records fetched by `get` to detect ambiguous matches
pub const QUERY_GET_CANDIDATES_COUNT: u64 = 2;

/// Records fetched by `exists`
pub const QUERY_EXISTS_CANDIDATES_COUNT: u64 = 1;

// =============================================================================
// Key Generation
// =============================================================================

/// Hex digits encoding the millisecond component of a sort key
pub const KEYGEN_SK_MILLIS_HEX_WIDTH: usize = 12;

/// Hex digits encoding the counter component of a sort key
pub const KEYGEN_SK_COUNTER_HEX_WIDTH: usize = 8;

// =============================================================================
// Telemetry
// =============================================================================

/// Default log filter directive when `RUST_LOG` is unset
pub const LOG_FILTER_DEFAULT: &str = "khata_store=info";

// =============================================================================
// Domain Defaults
// =============================================================================

/// Default transaction currency
pub const TRANSACTION_CURRENCY_DEFAULT: &str = "INR";
