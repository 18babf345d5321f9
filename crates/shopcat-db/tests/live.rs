//! Live integration tests for shopcat-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness from `DATABASE_URL`. Run with `--ignored`.

use serde_json::json;
use shopcat_core::StoredCatalog;
use shopcat_db::{
    add_list_item, add_store, clear_catalog, create_list, create_user, delete_list, get_catalog,
    get_list, get_user_by_email, list_items, list_lists, list_scrape_history, list_stores,
    record_scrape, remove_list_item, remove_store, DbError,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn insert_test_user(pool: &sqlx::PgPool, email: &str) -> i64 {
    create_user(pool, email, "$argon2id$test")
        .await
        .unwrap_or_else(|e| panic!("create_user failed for '{email}': {e}"))
        .id
}

fn stored_catalog(product_ids: &[i64]) -> StoredCatalog {
    let products: Vec<serde_json::Value> = product_ids
        .iter()
        .map(|id| json!({ "id": id, "title": format!("P{id}"), "handle": format!("p-{id}") }))
        .collect();
    serde_json::from_value(json!({
        "products": products,
        "collections": [{ "id": 1, "handle": "all", "title": "All" }]
    }))
    .expect("valid stored catalog")
}

// ---------------------------------------------------------------------------
// users
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_email_is_rejected_case_insensitively(pool: sqlx::PgPool) {
    insert_test_user(&pool, "ada@example.com").await;
    let err = create_user(&pool, "ADA@example.com", "$argon2id$other")
        .await
        .expect_err("duplicate email must fail");
    assert!(matches!(err, DbError::Duplicate { entity: "user" }));

    let found = get_user_by_email(&pool, " Ada@Example.com ")
        .await
        .unwrap()
        .expect("user exists");
    assert_eq!(found.email, "ada@example.com");
}

// ---------------------------------------------------------------------------
// stores + catalogs
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn add_store_is_idempotent(pool: sqlx::PgPool) {
    let user = insert_test_user(&pool, "a@example.com").await;
    let first = add_store(&pool, user, "https://a.example").await.unwrap();
    let second = add_store(&pool, user, "https://a.example").await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(list_stores(&pool, user).await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn record_scrape_replaces_catalog_and_appends_history(pool: sqlx::PgPool) {
    let user = insert_test_user(&pool, "a@example.com").await;
    let origin = "https://a.example";

    record_scrape(&pool, user, origin, &stored_catalog(&[1, 2]))
        .await
        .unwrap();
    let store = record_scrape(&pool, user, origin, &stored_catalog(&[3]))
        .await
        .unwrap();
    assert_eq!(store.product_count, 1);
    assert_eq!(store.collection_count, 1);
    assert!(store.last_scraped_at.is_some());

    let row = get_catalog(&pool, user, origin).await.unwrap().unwrap();
    assert_eq!(row.catalog.0.products.len(), 1);
    assert_eq!(row.catalog.0.products[0].id, 3);

    let history = list_scrape_history(&pool, user, origin, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].product_count, 1);
    assert_eq!(history[1].product_count, 2);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn catalogs_are_scoped_per_user(pool: sqlx::PgPool) {
    let alice = insert_test_user(&pool, "alice@example.com").await;
    let bob = insert_test_user(&pool, "bob@example.com").await;
    record_scrape(&pool, alice, "https://a.example", &stored_catalog(&[1]))
        .await
        .unwrap();

    assert!(get_catalog(&pool, bob, "https://a.example")
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn clear_catalog_keeps_store_and_remove_store_cascades(pool: sqlx::PgPool) {
    let user = insert_test_user(&pool, "a@example.com").await;
    let origin = "https://a.example";
    record_scrape(&pool, user, origin, &stored_catalog(&[1]))
        .await
        .unwrap();

    assert!(clear_catalog(&pool, user, origin).await.unwrap());
    assert!(!clear_catalog(&pool, user, origin).await.unwrap());
    assert!(get_catalog(&pool, user, origin).await.unwrap().is_none());
    assert_eq!(list_stores(&pool, user).await.unwrap().len(), 1);

    remove_store(&pool, user, origin).await.unwrap();
    assert!(list_stores(&pool, user).await.unwrap().is_empty());
    assert!(matches!(
        remove_store(&pool, user, origin).await,
        Err(DbError::NotFound)
    ));
}

// ---------------------------------------------------------------------------
// lists
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn list_items_round_trip(pool: sqlx::PgPool) {
    let user = insert_test_user(&pool, "a@example.com").await;
    let list = create_list(&pool, user, "Picks").await.unwrap();
    assert_eq!(list.item_count, 0);

    add_list_item(&pool, list.id, "https://a.example", 1, "p-1", "P1")
        .await
        .unwrap();
    add_list_item(&pool, list.id, "https://a.example", 1, "p-1", "P1 renamed")
        .await
        .unwrap();
    add_list_item(&pool, list.id, "https://a.example", 2, "p-2", "P2")
        .await
        .unwrap();

    let fetched = get_list(&pool, user, list.public_id).await.unwrap().unwrap();
    assert_eq!(fetched.item_count, 2);
    let items = list_items(&pool, list.id).await.unwrap();
    assert_eq!(items[0].title, "P1 renamed");

    remove_list_item(&pool, list.id, "https://a.example", 2)
        .await
        .unwrap();
    assert!(matches!(
        remove_list_item(&pool, list.id, "https://a.example", 2).await,
        Err(DbError::NotFound)
    ));

    delete_list(&pool, user, list.public_id).await.unwrap();
    assert!(list_lists(&pool, user).await.unwrap().is_empty());
}
