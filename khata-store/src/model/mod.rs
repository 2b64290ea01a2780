//! Model Layer - Typed Entities over Records
//!
//! `TigerStyle`: One trait boundary between typed models and untyped storage.
//!
//! A [`Model`] is a serde struct that knows its logical store name and
//! carries the four identity/audit fields every stored record has: `pk`,
//! `sk`, `created_at`, `updated_at`. The default trait methods convert
//! between the typed struct and the flat [`Record`] the drivers speak,
//! so drivers never see domain types and models never see backends.

mod finance;
mod record;

pub use finance::{
    Account, AccountType, Attachment, Budget, Category, CategoryType, Contact, Location,
    PaymentMethod, RecurrenceFrequency, RecurringConfig, SplitShare, Transaction,
    TransactionType, UpiProvider,
};
pub use record::{KeyGen, Record};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::storage::{StoreError, StoreResult};

/// Field names carried on the record itself rather than in its field bag.
const IDENTITY_FIELDS: [&str; 4] = ["pk", "sk", "created_at", "updated_at"];

// =============================================================================
// Canonical timestamps
// =============================================================================

/// Canonical timestamp encoding shared by every driver.
///
/// Timestamps are stored as fixed-width RFC 3339 strings in UTC with
/// microsecond precision, e.g. `2026-02-14T09:30:00.000000Z`. Fixed width
/// means lexicographic order equals chronological order, so string
/// comparison of timestamps behaves identically on every backend.
///
/// Use as a serde `with` module:
///
/// ```
/// use chrono::{DateTime, Utc};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Event {
///     #[serde(with = "khata_store::model::datetime")]
///     at: DateTime<Utc>,
/// }
/// ```
pub mod datetime {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::storage::{StoreError, StoreResult};

    /// Format a timestamp in the canonical encoding.
    #[must_use]
    pub fn format_utc(at: DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Parse a canonical (or any RFC 3339) timestamp back to UTC.
    ///
    /// # Errors
    /// Returns a serialization error if the text is not RFC 3339.
    pub fn parse_utc(text: &str) -> StoreResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(text)
            .map(|at| at.with_timezone(&Utc))
            .map_err(|e| StoreError::serialization(format!("timestamp {text:?}: {e}")))
    }

    /// Serialize in the canonical encoding.
    ///
    /// # Errors
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_utc(*at))
    }

    /// Deserialize from any RFC 3339 string, normalizing to UTC.
    ///
    /// # Errors
    /// Fails if the value is not an RFC 3339 string.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let text = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&text)
            .map(|at| at.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }

    /// Same encoding for optional timestamps.
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        /// Serialize an optional timestamp in the canonical encoding.
        ///
        /// # Errors
        /// Propagates serializer errors.
        pub fn serialize<S: Serializer>(
            at: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match at {
                Some(at) => serializer.serialize_str(&super::format_utc(*at)),
                None => serializer.serialize_none(),
            }
        }

        /// Deserialize an optional RFC 3339 string, normalizing to UTC.
        ///
        /// # Errors
        /// Fails if a present value is not an RFC 3339 string.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            let text = Option::<String>::deserialize(deserializer)?;
            text.map(|text| {
                DateTime::parse_from_rfc3339(&text)
                    .map(|at| at.with_timezone(&Utc))
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
        }
    }
}

// =============================================================================
// Model trait
// =============================================================================

/// A persisted entity type.
///
/// Implementors are plain serde structs whose serialized form is a JSON
/// object. The four identity/audit fields are accessed through the trait
/// so managers and query builders can assign keys and maintain timestamps
/// without knowing the concrete type.
pub trait Model: Serialize + DeserializeOwned + std::fmt::Debug + Send + Sync + Sized {
    /// Logical store this model's records live in.
    const STORE_NAME: &'static str;

    /// Primary key. Empty until the model is first saved.
    fn pk(&self) -> &str;
    /// Set the primary key.
    fn set_pk(&mut self, pk: String);
    /// Sort key. Empty until the model is first saved.
    fn sk(&self) -> &str;
    /// Set the sort key.
    fn set_sk(&mut self, sk: String);
    /// Creation timestamp.
    fn created_at(&self) -> DateTime<Utc>;
    /// Set the creation timestamp.
    fn set_created_at(&mut self, at: DateTime<Utc>);
    /// Last-write timestamp.
    fn updated_at(&self) -> DateTime<Utc>;
    /// Set the last-write timestamp.
    fn set_updated_at(&mut self, at: DateTime<Utc>);

    /// Convert to the flat record the drivers store.
    ///
    /// Identity/audit fields move onto the record itself; everything else
    /// lands in the field bag under its serde name.
    ///
    /// # Errors
    /// Returns a serialization error if the model does not serialize to a
    /// JSON object.
    fn to_record(&self) -> StoreResult<Record> {
        let value = serde_json::to_value(self)
            .map_err(|e| StoreError::serialization(format!("model encode: {e}")))?;
        let Value::Object(mut bag) = value else {
            return Err(StoreError::serialization(format!(
                "model {} must serialize to an object",
                Self::STORE_NAME
            )));
        };
        for field in IDENTITY_FIELDS {
            bag.remove(field);
        }

        let mut record = Record::new(self.pk().to_string(), self.sk().to_string(), bag);
        record.created_at = self.created_at();
        record.updated_at = self.updated_at();
        Ok(record)
    }

    /// Rebuild a model from a stored record.
    ///
    /// # Errors
    /// Returns a serialization error if the record's fields do not match
    /// the model's schema.
    fn from_record(record: &Record) -> StoreResult<Self> {
        let mut bag = record.fields.clone();
        bag.insert("pk".to_string(), Value::String(record.pk.clone()));
        bag.insert("sk".to_string(), Value::String(record.sk.clone()));
        bag.insert(
            "created_at".to_string(),
            Value::String(datetime::format_utc(record.created_at)),
        );
        bag.insert(
            "updated_at".to_string(),
            Value::String(datetime::format_utc(record.updated_at)),
        );
        serde_json::from_value(Value::Object(bag))
            .map_err(|e| StoreError::serialization(format!("model decode: {e}")))
    }
}

/// Implement [`Model`] for a struct carrying the standard identity fields.
macro_rules! impl_model {
    ($type:ty, $store:expr) => {
        impl $crate::model::Model for $type {
            const STORE_NAME: &'static str = $store;

            fn pk(&self) -> &str {
                &self.pk
            }
            fn set_pk(&mut self, pk: String) {
                self.pk = pk;
            }
            fn sk(&self) -> &str {
                &self.sk
            }
            fn set_sk(&mut self, sk: String) {
                self.sk = sk;
            }
            fn created_at(&self) -> ::chrono::DateTime<::chrono::Utc> {
                self.created_at
            }
            fn set_created_at(&mut self, at: ::chrono::DateTime<::chrono::Utc>) {
                self.created_at = at;
            }
            fn updated_at(&self) -> ::chrono::DateTime<::chrono::Utc> {
                self.updated_at
            }
            fn set_updated_at(&mut self, at: ::chrono::DateTime<::chrono::Utc>) {
                self.updated_at = at;
            }
        }
    };
}

pub(crate) use impl_model;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_utc_is_fixed_width() {
        let whole_second = Utc.with_ymd_and_hms(2026, 2, 14, 9, 30, 0).unwrap();
        let text = datetime::format_utc(whole_second);
        assert_eq!(text, "2026-02-14T09:30:00.000000Z");
        assert_eq!(text.len(), 27);
    }

    #[test]
    fn test_format_then_parse_round_trips() {
        let now = Utc::now();
        let parsed = datetime::parse_utc(&datetime::format_utc(now)).unwrap();
        // Canonical precision is microseconds
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }

    #[test]
    fn test_parse_utc_normalizes_offsets() {
        let offset = datetime::parse_utc("2026-02-14T15:00:00.000000+05:30").unwrap();
        let utc = datetime::parse_utc("2026-02-14T09:30:00.000000Z").unwrap();
        assert_eq!(offset, utc);
    }

    #[test]
    fn test_parse_utc_rejects_garbage() {
        let err = datetime::parse_utc("not a timestamp").unwrap_err();
        assert!(matches!(err, StoreError::Serialization { .. }));
    }

    #[test]
    fn test_string_order_matches_time_order_across_second_boundary() {
        let before = Utc.with_ymd_and_hms(2026, 2, 14, 9, 29, 59).unwrap()
            + chrono::Duration::microseconds(999_999);
        let after = Utc.with_ymd_and_hms(2026, 2, 14, 9, 30, 0).unwrap();
        assert!(datetime::format_utc(before) < datetime::format_utc(after));
    }
}
