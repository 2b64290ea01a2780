//! `DocumentDriver` - Hosted Document Storage
//!
//! `TigerStyle`: Push the work to the server, keep the mapping thin.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      DocumentDriver                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Client: mongodb (pooled, max 10 connections)                │
//! │  Collection {prefix}_{store}: one document per record        │
//! │  Document: _id = pk, sk, created_at, updated_at, ...fields   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Filters translate to native query documents ([`FilterSpec::to_document`])
//! so matching, sorting and pagination all run server-side. Timestamps are
//! stored as fixed-width RFC 3339 strings (UTC, microseconds) so that string
//! comparison orders them the same way every driver does.
//!
//! Only compiled with the `mongodb` feature.

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use chrono::Utc;
use mongodb::error::ErrorKind;
use mongodb::options::{ClientOptions, FindOptions, ReplaceOptions};
use mongodb::{Client, Collection, Database};
use serde_json::{Map, Value};

use crate::constants::{
    DOCUMENT_POOL_CONNECTIONS_COUNT_MAX, RECORD_ITEM_BYTES_MAX, STORE_PREFIX_BYTES_MAX,
};
use crate::model::datetime;
use crate::model::Record;
use crate::query::{document_field_name, FilterSpec};

use super::error::{StoreError, StoreResult};
use super::{SortSpec, StorageDriver};

/// Server error code raised by `create` when the collection already exists.
const NAMESPACE_EXISTS_CODE: i32 = 48;

/// Field names carried outside the record's field bag.
const RESERVED_FIELDS: [&str; 5] = ["_id", "pk", "sk", "created_at", "updated_at"];

/// Hosted document driver backed by `MongoDB`.
#[derive(Debug, Clone)]
pub struct DocumentDriver {
    client: Client,
    db: Database,
    prefix: String,
}

impl DocumentDriver {
    /// Connect to a server and select a database.
    ///
    /// Verifies liveness with a ping so misconfiguration fails here rather
    /// than on the first query.
    ///
    /// # Errors
    /// Returns `Unavailable` if the URL cannot be parsed or the server does
    /// not respond.
    ///
    /// # Panics
    /// Panics if `database` is empty or the prefix exceeds its size limit.
    pub async fn connect(
        url: &str,
        database: &str,
        prefix: impl Into<String>,
    ) -> StoreResult<Self> {
        let prefix = prefix.into();

        // Preconditions
        assert!(!url.is_empty(), "connection url cannot be empty");
        assert!(!database.is_empty(), "database name cannot be empty");
        assert!(
            prefix.len() <= STORE_PREFIX_BYTES_MAX,
            "prefix {} bytes exceeds max {}",
            prefix.len(),
            STORE_PREFIX_BYTES_MAX
        );

        let mut options = ClientOptions::parse(url)
            .await
            .map_err(|e| StoreError::unavailable(format!("failed to parse url: {e}")))?;
        options.max_pool_size = Some(DOCUMENT_POOL_CONNECTIONS_COUNT_MAX);

        let client = Client::with_options(options)
            .map_err(|e| StoreError::unavailable(format!("failed to connect: {e}")))?;
        let db = client.database(database);

        let driver = Self { client, db, prefix };
        driver.ping().await?;
        Ok(driver)
    }

    /// Physical name of a logical store's collection.
    fn physical_name(&self, store: &str) -> String {
        if self.prefix.is_empty() {
            store.to_string()
        } else {
            format!("{}_{store}", self.prefix)
        }
    }

    fn collection(&self, store: &str) -> Collection<Document> {
        self.db.collection::<Document>(&self.physical_name(store))
    }
}

#[async_trait]
impl StorageDriver for DocumentDriver {
    #[tracing::instrument(skip(self, filter, sort))]
    async fn fetch(
        &self,
        store: &str,
        filter: &FilterSpec,
        sort: Option<&SortSpec>,
        skip: Option<u64>,
        limit: Option<u64>,
    ) -> StoreResult<Vec<Record>> {
        let options = FindOptions::builder()
            .sort(sort.map(sort_document))
            .skip(skip)
            .limit(limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX)))
            .build();

        let mut cursor = self
            .collection(store)
            .find(filter.to_document()?, options)
            .await
            .map_err(map_mongo_error)?;

        let mut records = Vec::new();
        while cursor.advance().await.map_err(map_mongo_error)? {
            let document = cursor.deserialize_current().map_err(map_mongo_error)?;
            records.push(document_to_record(document)?);
        }
        Ok(records)
    }

    async fn fetch_one(&self, store: &str, filter: &FilterSpec) -> StoreResult<Option<Record>> {
        let found = self
            .collection(store)
            .find_one(filter.to_document()?, None)
            .await
            .map_err(map_mongo_error)?;
        found.map(document_to_record).transpose()
    }

    async fn count(&self, store: &str, filter: &FilterSpec) -> StoreResult<u64> {
        self.collection(store)
            .count_documents(filter.to_document()?, None)
            .await
            .map_err(map_mongo_error)
    }

    #[tracing::instrument(skip(self, record), fields(pk = %record.pk))]
    async fn put(&self, store: &str, record: &Record) -> StoreResult<()> {
        // Preconditions
        assert!(!record.pk.is_empty(), "record must have pk");
        assert!(!record.sk.is_empty(), "record must have sk");

        if record.encoded_len() > RECORD_ITEM_BYTES_MAX {
            return Err(StoreError::validation(format!(
                "record {} exceeds {RECORD_ITEM_BYTES_MAX} bytes",
                record.pk
            )));
        }

        let options = ReplaceOptions::builder().upsert(true).build();
        self.collection(store)
            .replace_one(
                doc! { "_id": record.pk.clone() },
                record_to_document(record)?,
                options,
            )
            .await
            .map_err(map_mongo_error)?;
        Ok(())
    }

    async fn patch(
        &self,
        store: &str,
        pk: &str,
        fields: &Map<String, Value>,
    ) -> StoreResult<bool> {
        assert!(!pk.is_empty(), "pk must not be empty");

        let mut set_doc = Document::new();
        for (name, value) in fields {
            if RESERVED_FIELDS.contains(&name.as_str()) {
                continue;
            }
            set_doc.insert(name.clone(), json_to_bson(value)?);
        }
        set_doc.insert("updated_at", datetime::format_utc(Utc::now()));

        let result = self
            .collection(store)
            .update_one(doc! { "_id": pk }, doc! { "$set": set_doc }, None)
            .await
            .map_err(map_mongo_error)?;
        Ok(result.matched_count > 0)
    }

    #[tracing::instrument(skip(self))]
    async fn remove(&self, store: &str, pk: &str) -> StoreResult<bool> {
        assert!(!pk.is_empty(), "pk must not be empty");

        let result = self
            .collection(store)
            .delete_one(doc! { "_id": pk }, None)
            .await
            .map_err(map_mongo_error)?;
        Ok(result.deleted_count > 0)
    }

    async fn ensure_schema(&self, store: &str) -> StoreResult<()> {
        assert!(!store.is_empty(), "store name must not be empty");

        // Racing creators collide on the server; the loser's error means
        // the collection exists, which is the outcome we wanted.
        match self.db.create_collection(self.physical_name(store), None).await {
            Ok(()) => Ok(()),
            Err(err) if is_namespace_exists(&err) => Ok(()),
            Err(err) => Err(map_mongo_error(err)),
        }
    }

    async fn ping(&self) -> StoreResult<()> {
        self.db
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map(|_| ())
            .map_err(map_mongo_error)
    }

    async fn close(&self) -> StoreResult<()> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}

fn sort_document(sort: &SortSpec) -> Document {
    let mut doc = Document::new();
    doc.insert(
        document_field_name(&sort.field),
        if sort.ascending { 1_i32 } else { -1_i32 },
    );
    doc
}

fn json_to_bson(value: &Value) -> StoreResult<Bson> {
    bson::to_bson(value).map_err(|e| StoreError::serialization(format!("field encode: {e}")))
}

fn record_to_document(record: &Record) -> StoreResult<Document> {
    let mut doc = doc! {
        "_id": record.pk.clone(),
        "sk": record.sk.clone(),
        "created_at": datetime::format_utc(record.created_at),
        "updated_at": datetime::format_utc(record.updated_at),
    };
    for (name, value) in &record.fields {
        if RESERVED_FIELDS.contains(&name.as_str()) {
            continue;
        }
        doc.insert(name.clone(), json_to_bson(value)?);
    }
    Ok(doc)
}

fn document_to_record(mut doc: Document) -> StoreResult<Record> {
    let pk = take_string(&mut doc, "_id")?;
    let sk = take_string(&mut doc, "sk")?;
    let created_at = datetime::parse_utc(&take_string(&mut doc, "created_at")?)?;
    let updated_at = datetime::parse_utc(&take_string(&mut doc, "updated_at")?)?;

    let mut fields = Map::new();
    for (name, value) in doc {
        fields.insert(name, value.into_relaxed_extjson());
    }

    Ok(Record {
        pk,
        sk,
        fields,
        created_at,
        updated_at,
    })
}

fn take_string(doc: &mut Document, key: &str) -> StoreResult<String> {
    match doc.remove(key) {
        Some(Bson::String(s)) => Ok(s),
        other => Err(StoreError::serialization(format!(
            "document field {key} is {other:?}, expected string"
        ))),
    }
}

fn is_namespace_exists(err: &mongodb::error::Error) -> bool {
    matches!(&*err.kind, ErrorKind::Command(c) if c.code == NAMESPACE_EXISTS_CODE)
}

fn map_mongo_error(err: mongodb::error::Error) -> StoreError {
    match &*err.kind {
        ErrorKind::Io(_)
        | ErrorKind::ServerSelection { .. }
        | ErrorKind::DnsResolve { .. }
        | ErrorKind::ConnectionPoolCleared { .. }
        | ErrorKind::Authentication { .. } => StoreError::unavailable(format!("mongodb: {err}")),
        ErrorKind::BsonSerialization(_) | ErrorKind::BsonDeserialization(_) => {
            StoreError::serialization(format!("mongodb: {err}"))
        }
        _ => StoreError::internal(format!("mongodb: {err}")),
    }
}

// =============================================================================
// Tests (require running MongoDB)
// =============================================================================
