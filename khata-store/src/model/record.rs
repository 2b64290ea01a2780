//! Record - Raw Persisted Shape
//!
//! `TigerStyle`: Explicit fields, backend-neutral.
//!
//! A [`Record`] is what drivers read and write: a primary key, a sort key
//! (meaningful for the key-value backend, carried everywhere for uniformity),
//! an opaque JSON attribute bag for the entity's declared fields, and audit
//! timestamps. Typed entities convert to and from this shape at the manager
//! boundary.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::{
    KEYGEN_SK_COUNTER_HEX_WIDTH, KEYGEN_SK_MILLIS_HEX_WIDTH, RECORD_PK_BYTES_MAX,
    RECORD_SK_BYTES_MAX,
};

// =============================================================================
// Record
// =============================================================================

/// A persisted record, independent of any concrete entity type.
///
/// Identity (`pk`) is immutable after creation. Audit timestamps are
/// monotonic non-decreasing: [`Record::touch`] never moves `updated_at`
/// backwards, even across clock adjustments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Primary identity (document id / partition key)
    pub pk: String,
    /// Sort key (creation-ordered, unique within a process)
    pub sk: String,
    /// Declared entity fields as an opaque attribute bag
    pub fields: Map<String, Value>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Record {
    /// Create a record with the given keys and field bag.
    ///
    /// # Panics
    /// Panics if either key exceeds its size limit.
    #[must_use]
    pub fn new(pk: String, sk: String, fields: Map<String, Value>) -> Self {
        // Preconditions
        assert!(
            pk.len() <= RECORD_PK_BYTES_MAX,
            "pk {} bytes exceeds max {}",
            pk.len(),
            RECORD_PK_BYTES_MAX
        );
        assert!(
            sk.len() <= RECORD_SK_BYTES_MAX,
            "sk {} bytes exceeds max {}",
            sk.len(),
            RECORD_SK_BYTES_MAX
        );

        let now = Utc::now();
        Self {
            pk,
            sk,
            fields,
            created_at: now,
            updated_at: now,
        }
    }

    /// Resolve a field by name, including the identity and audit fields.
    ///
    /// `pk`, `sk`, `created_at`, and `updated_at` resolve to the record's
    /// own values (timestamps as RFC 3339 strings, which order
    /// lexicographically); every other name is looked up in the attribute
    /// bag. Returns `None` for absent fields.
    #[must_use]
    pub fn field_value(&self, name: &str) -> Option<Value> {
        match name {
            "pk" => Some(Value::String(self.pk.clone())),
            "sk" => Some(Value::String(self.sk.clone())),
            "created_at" => Some(Value::String(super::datetime::format_utc(self.created_at))),
            "updated_at" => Some(Value::String(super::datetime::format_utc(self.updated_at))),
            _ => self.fields.get(name).cloned(),
        }
    }

    /// Set a bag field and refresh `updated_at`.
    pub fn set_field(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
        self.touch();
    }

    /// Merge partial fields into the bag and refresh `updated_at`.
    ///
    /// Keys `pk`, `sk`, `created_at`, and `updated_at` are ignored: identity
    /// is immutable and audit timestamps are owned by this layer.
    pub fn apply_patch(&mut self, fields: &Map<String, Value>) {
        for (key, value) in fields {
            match key.as_str() {
                "pk" | "sk" | "created_at" | "updated_at" => {}
                _ => {
                    self.fields.insert(key.clone(), value.clone());
                }
            }
        }
        self.touch();
    }

    /// Refresh `updated_at`, keeping it monotonic non-decreasing.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Encoded size of this record in bytes (JSON form).
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        serde_json::to_vec(self).map(|v| v.len()).unwrap_or(0)
    }
}

// =============================================================================
// KeyGen
// =============================================================================

/// Generator for record keys.
///
/// Primary keys are random UUIDs. Sort keys combine a millisecond timestamp
/// with a process-local counter behind a mutex (the only shared mutable
/// state this layer introduces), zero-padded hex so lexicographic order
/// equals creation order.
#[derive(Debug)]
pub struct KeyGen {
    counter: Mutex<u64>,
}

impl KeyGen {
    /// Create a new generator with the counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            counter: Mutex::new(0),
        }
    }

    /// Generate a fresh primary key (UUID v4).
    #[must_use]
    pub fn pk(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Generate a fresh sort key.
    ///
    /// Fixed-width `{millis_hex}-{counter_hex}`: unique within a process via
    /// the counter, ordered across restarts via the timestamp prefix.
    #[must_use]
    pub fn sk(&self) -> String {
        let millis = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        let count = {
            let mut guard = self.counter.lock().unwrap();
            let current = *guard;
            *guard = guard.wrapping_add(1);
            current
        };
        let sk = format!(
            "{millis:0mw$x}-{count:0cw$x}",
            mw = KEYGEN_SK_MILLIS_HEX_WIDTH,
            cw = KEYGEN_SK_COUNTER_HEX_WIDTH
        );

        // Postcondition
        debug_assert!(sk.len() <= RECORD_SK_BYTES_MAX, "sk exceeds size limit");
        sk
    }
}

impl Default for KeyGen {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_record() -> Record {
        let mut fields = Map::new();
        fields.insert("amount".to_string(), json!(100.0));
        fields.insert("currency".to_string(), json!("INR"));
        Record::new("txn-1".to_string(), "0-0".to_string(), fields)
    }

    #[test]
    fn test_field_value_resolves_identity_and_bag() {
        let record = sample_record();

        assert_eq!(record.field_value("pk"), Some(json!("txn-1")));
        assert_eq!(record.field_value("sk"), Some(json!("0-0")));
        assert_eq!(record.field_value("amount"), Some(json!(100.0)));
        assert_eq!(record.field_value("missing"), None);

        let created = record.field_value("created_at").unwrap();
        assert!(created.as_str().unwrap().contains('T'), "RFC 3339 form");
    }

    #[test]
    fn test_apply_patch_skips_reserved_keys() {
        let mut record = sample_record();
        let before_created = record.created_at;

        let mut patch = Map::new();
        patch.insert("amount".to_string(), json!(50));
        patch.insert("pk".to_string(), json!("evil"));
        patch.insert("created_at".to_string(), json!("1970-01-01T00:00:00Z"));
        record.apply_patch(&patch);

        assert_eq!(record.pk, "txn-1", "identity is immutable");
        assert_eq!(record.created_at, before_created);
        assert_eq!(record.field_value("amount"), Some(json!(50)));
    }

    #[test]
    fn test_touch_is_monotonic() {
        let mut record = sample_record();
        let first = record.updated_at;
        record.touch();
        assert!(record.updated_at >= first);
    }

    #[test]
    fn test_record_round_trips_through_json() {
        let record = sample_record();
        let bytes = serde_json::to_vec(&record).unwrap();
        let back: Record = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(back.pk, record.pk);
        assert_eq!(back.sk, record.sk);
        assert_eq!(back.fields, record.fields);
        assert_eq!(back.created_at, record.created_at);
    }

    #[test]
    fn test_keygen_sort_keys_are_unique_and_ordered() {
        let keys = KeyGen::new();
        let mut produced: Vec<String> = (0..100).map(|_| keys.sk()).collect();

        let sorted = {
            let mut copy = produced.clone();
            copy.sort();
            copy
        };
        assert_eq!(produced, sorted, "creation order is lexicographic order");

        produced.dedup();
        assert_eq!(produced.len(), 100, "all sort keys distinct");
    }

    #[test]
    fn test_keygen_primary_keys_are_distinct() {
        let keys = KeyGen::new();
        let a = keys.pk();
        let b = keys.pk();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36, "UUID text form");
    }
}
