//! Integration Tests for the Store
//!
//! End-to-end workflow validation across storage backends.
//!
//! These tests validate:
//! - The expense lifecycle: create, count, update, fetch by key
//! - Filter semantics that must agree on every backend
//! - Soft delete versus hard delete
//! - Persistence across reopen for the embedded backend
//! - Partial failure reporting under fault injection

use std::sync::Arc;

use serde_json::{json, Map};

use khata_store::{
    BackendMode, Category, CategoryType, FaultPlan, FilterSpec, KeyValueDriver, MemoryDriver,
    PaymentMethod, Store, StoreConfig, Transaction, TransactionType,
};

fn expense(amount: f64, description: &str) -> Transaction {
    Transaction::new(
        TransactionType::Expense,
        amount,
        "cat-general".to_string(),
        description.to_string(),
        PaymentMethod::Cash,
    )
}

fn income(amount: f64, description: &str) -> Transaction {
    Transaction::new(
        TransactionType::Income,
        amount,
        "cat-salary".to_string(),
        description.to_string(),
        PaymentMethod::BankTransfer,
    )
}

/// One store per embedded backend, so every scenario runs on both.
fn every_store() -> Vec<(&'static str, Store)> {
    let keyvalue = KeyValueDriver::temporary("it").expect("temporary keyvalue db");
    vec![
        ("memory", Store::in_memory()),
        ("keyvalue", Store::with_driver(Arc::new(keyvalue))),
    ]
}

// =============================================================================
// Expense Lifecycle
// =============================================================================

#[tokio::test]
async fn test_expense_lifecycle() {
    for (backend, store) in every_store() {
        let txns = store.objects::<Transaction>();

        // Create
        let created = txns.create(expense(100.0, "Dinner")).await.unwrap();
        assert!(!created.pk.is_empty(), "{backend}: create assigns a key");
        assert_eq!(created.currency, "INR", "{backend}: currency defaults");

        let expenses = FilterSpec::new().eq("transaction_type", "EXPENSE");
        assert_eq!(
            txns.filter(expenses.clone()).count().await.unwrap(),
            1,
            "{backend}: count"
        );

        // Update through the query path
        let mut fields = Map::new();
        fields.insert("amount".to_string(), json!(50.0));
        let changed = txns
            .filter(expenses.clone())
            .update(fields)
            .await
            .unwrap();
        assert_eq!(changed, 1, "{backend}: exactly one record patched");

        // The same filter sees the new amount
        let reloaded = txns
            .get(expenses)
            .await
            .unwrap()
            .expect("record exists");
        assert_eq!(reloaded.pk, created.pk, "{backend}: same record");
        assert_eq!(reloaded.amount, 50.0, "{backend}: amount updated");
        assert_eq!(reloaded.description, "Dinner", "{backend}: rest untouched");
        assert!(
            reloaded.updated_at >= reloaded.created_at,
            "{backend}: update refreshes updated_at"
        );
    }
}

#[tokio::test]
async fn test_amount_range_filter() {
    for (backend, store) in every_store() {
        let txns = store.objects::<Transaction>();
        for (amount, description) in [(10.0, "Coffee"), (100.0, "Groceries"), (200.0, "Rent")] {
            txns.create(expense(amount, description)).await.unwrap();
        }

        let spec = FilterSpec::new().gte("amount", 50).lte("amount", 150);
        let matched = txns.filter(spec.clone()).to_list().await.unwrap();
        assert_eq!(matched.len(), 1, "{backend}: one record in range");
        assert_eq!(matched[0].amount, 100.0, "{backend}: the middle record");

        let counted = txns.filter(spec).count().await.unwrap();
        assert_eq!(counted, 1, "{backend}: count agrees with the list");
    }
}

// =============================================================================
// Backend Equivalence
// =============================================================================

#[tokio::test]
async fn test_backends_agree_on_filter_semantics() {
    // Same catalog on every backend: three expenses, one income, one with notes.
    let stores = every_store();
    for (_, store) in &stores {
        let txns = store.objects::<Transaction>();
        txns.create(expense(200.0, "Rent").with_notes("july".to_string()))
            .await
            .unwrap();
        txns.create(expense(10.0, "Coffee")).await.unwrap();
        txns.create(expense(100.0, "Groceries")).await.unwrap();
        txns.create(income(500.0, "Salary")).await.unwrap();
    }

    let cases: Vec<(&str, FilterSpec, Vec<&str>)> = vec![
        (
            "amount gte",
            FilterSpec::new().gte("amount", 100),
            vec!["Groceries", "Rent", "Salary"],
        ),
        ("amount lt", FilterSpec::new().lt("amount", 100), vec!["Coffee"]),
        (
            "type ne",
            FilterSpec::new().ne("transaction_type", "EXPENSE"),
            vec!["Salary"],
        ),
        (
            "amount in",
            FilterSpec::new().is_in("amount", json!([10.0, 500.0])),
            vec!["Coffee", "Salary"],
        ),
        (
            "amount nin",
            FilterSpec::new().not_in("amount", json!([10.0, 500.0])),
            vec!["Groceries", "Rent"],
        ),
        (
            "contains",
            FilterSpec::new().contains("description", "ee"),
            vec!["Coffee"],
        ),
        (
            "icontains",
            FilterSpec::new().icontains("description", "RENT"),
            vec!["Rent"],
        ),
        (
            "startswith",
            FilterSpec::new().starts_with("description", "Gro"),
            vec!["Groceries"],
        ),
        (
            "endswith",
            FilterSpec::new().ends_with("description", "fee"),
            vec!["Coffee"],
        ),
        (
            "notes absent",
            FilterSpec::new().is_null("notes", true),
            vec!["Coffee", "Groceries", "Salary"],
        ),
        (
            "notes present",
            FilterSpec::new().is_null("notes", false),
            vec!["Rent"],
        ),
        (
            "range",
            FilterSpec::new().gte("amount", 50).lte("amount", 150),
            vec!["Groceries"],
        ),
    ];

    for (case, spec, expected) in cases {
        for (backend, store) in &stores {
            let matched = store
                .objects::<Transaction>()
                .filter(spec.clone())
                .order_by("description")
                .to_list()
                .await
                .unwrap();
            let descriptions: Vec<&str> =
                matched.iter().map(|t| t.description.as_str()).collect();
            assert_eq!(descriptions, expected, "{case} on {backend}");
        }
    }
}

#[tokio::test]
async fn test_exists_reflects_matches() {
    for (backend, store) in every_store() {
        let txns = store.objects::<Transaction>();
        assert!(
            !txns.all().exists().await.unwrap(),
            "{backend}: empty store has nothing"
        );

        txns.create(expense(30.0, "Taxi")).await.unwrap();
        assert!(txns.all().exists().await.unwrap(), "{backend}: one record");
        assert!(
            !txns
                .filter(FilterSpec::new().gt("amount", 1000))
                .exists()
                .await
                .unwrap(),
            "{backend}: filter can still match nothing"
        );
    }
}

#[tokio::test]
async fn test_bulk_create_keeps_creation_order() {
    for (backend, store) in every_store() {
        let txns = store.objects::<Transaction>();
        txns.bulk_create(vec![
            expense(1.0, "First"),
            expense(2.0, "Second"),
            expense(3.0, "Third"),
        ])
        .await
        .unwrap();

        let listed = txns.all().to_list().await.unwrap();
        let names: Vec<&str> = listed.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(
            names,
            ["First", "Second", "Third"],
            "{backend}: scan order follows creation order"
        );
    }
}

// =============================================================================
// Soft Delete
// =============================================================================

#[tokio::test]
async fn test_soft_delete_stays_reachable_by_key() {
    for (backend, store) in every_store() {
        let txns = store.objects::<Transaction>();
        txns.create(expense(60.0, "Books")).await.unwrap();
        let mut gym = txns.create(expense(900.0, "Gym")).await.unwrap();

        // Soft delete is just a flag write.
        gym.is_deleted = true;
        txns.save(&mut gym).await.unwrap();

        let visible = txns
            .filter(FilterSpec::new().eq("is_deleted", false))
            .to_list()
            .await
            .unwrap();
        assert_eq!(visible.len(), 1, "{backend}: flag hides the record");
        assert_eq!(visible[0].description, "Books", "{backend}");

        let by_key = txns
            .get(FilterSpec::new().eq("pk", gym.pk.as_str()))
            .await
            .unwrap()
            .expect("soft deleted records stay reachable by key");
        assert!(by_key.is_deleted, "{backend}: flag round trips");

        // Hard delete actually removes the row.
        assert!(txns.delete(&gym).await.unwrap(), "{backend}");
        let gone = txns
            .get(FilterSpec::new().eq("pk", gym.pk.as_str()))
            .await
            .unwrap();
        assert!(gone.is_none(), "{backend}: hard delete removes the row");
    }
}

// =============================================================================
// get_or_create
// =============================================================================

#[tokio::test]
async fn test_get_or_create_finds_existing() {
    for (backend, store) in every_store() {
        let categories = store.objects::<Category>();
        let lookup = FilterSpec::new().eq("name", "Food");

        let (food, created) = categories
            .get_or_create(
                lookup.clone(),
                Category::new("Food".to_string(), CategoryType::Expense),
            )
            .await
            .unwrap();
        assert!(created, "{backend}: first call creates");

        let (again, created) = categories
            .get_or_create(
                lookup,
                Category::new("Food".to_string(), CategoryType::Expense),
            )
            .await
            .unwrap();
        assert!(!created, "{backend}: second call finds");
        assert_eq!(food.pk, again.pk, "{backend}: same record both times");
        assert_eq!(categories.all().count().await.unwrap(), 1, "{backend}");
    }
}

// =============================================================================
// Embedded Persistence
// =============================================================================

#[tokio::test]
async fn test_keyvalue_reopen_preserves_records() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(BackendMode::KeyValue).with_data_dir(dir.path());

    {
        let store = Store::connect(config.clone()).await.unwrap();
        let txns = store.objects::<Transaction>();
        txns.create(expense(100.0, "Rent")).await.unwrap();
        txns.create(expense(40.0, "Taxi")).await.unwrap();
        store.close().await.unwrap();
    }

    // Reconnecting re-runs schema setup over existing trees, which must be
    // harmless, and the data written before close is still there.
    let store = Store::connect(config).await.unwrap();
    let txns = store.objects::<Transaction>();
    assert_eq!(txns.all().count().await.unwrap(), 2);

    let rent = txns
        .get(FilterSpec::new().eq("description", "Rent"))
        .await
        .unwrap()
        .expect("rent survived the reopen");
    assert_eq!(rent.amount, 100.0);
}

// =============================================================================
// Fault Injection
// =============================================================================

#[tokio::test]
async fn test_delete_reports_confirmed_count_under_faults() {
    let store = Store::with_driver(Arc::new(MemoryDriver::with_faults(vec![
        FaultPlan::new("remove").after_calls(1),
    ])));
    let txns = store.objects::<Transaction>();
    for description in ["One", "Two", "Three"] {
        txns.create(expense(10.0, description)).await.unwrap();
    }

    let confirmed = txns.all().delete().await.unwrap();
    assert_eq!(confirmed, 2, "one remove fails, two are confirmed");

    let survivors = txns.all().count().await.unwrap();
    assert_eq!(survivors, 1, "the faulted record is still stored");
}

#[tokio::test]
async fn test_unavailable_backend_surfaces_not_retries() {
    let store = Store::with_driver(Arc::new(MemoryDriver::with_faults(vec![
        FaultPlan::new("fetch").forever(),
    ])));
    let txns = store.objects::<Transaction>();

    let err = txns.all().to_list().await.unwrap_err();
    assert!(err.is_transient(), "outage errors are marked transient");
}
