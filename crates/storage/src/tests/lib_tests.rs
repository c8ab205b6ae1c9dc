use super::*;

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn set_get_and_remove_round_trip() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    assert_eq!(storage.get_item("Cart").await.expect("read"), None);

    storage.set_item("Cart", "{\"items\":[]}").await.expect("write");
    storage.set_item("Cart", "{\"items\":[1]}").await.expect("overwrite");
    assert_eq!(
        storage.get_item("Cart").await.expect("read").as_deref(),
        Some("{\"items\":[1]}")
    );

    storage.remove_item("Cart").await.expect("remove");
    assert_eq!(storage.get_item("Cart").await.expect("read"), None);
}

#[tokio::test]
async fn entries_are_independent_per_key() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.set_item("Cart", "cart").await.expect("cart");
    storage.set_item("User", "user").await.expect("user");
    storage.remove_item("User").await.expect("remove user");

    assert_eq!(
        storage.get_item("Cart").await.expect("read").as_deref(),
        Some("cart")
    );
    assert_eq!(storage.get_item("User").await.expect("read"), None);
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("client.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn read_json_reports_malformed_payload() {
    let storage = MemoryStorage::with_entry("Cart", "{not json");
    let result = read_json::<serde_json::Value>(&storage, "Cart").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn read_json_missing_entry_is_none() {
    let storage = MemoryStorage::new();
    let value = read_json::<serde_json::Value>(&storage, "User")
        .await
        .expect("read");
    assert!(value.is_none());
}

#[tokio::test]
async fn noop_storage_drops_writes() {
    let storage = NoopStorage;
    write_json(&storage, "Cart", &serde_json::json!({ "items": [] }))
        .await
        .expect("write");
    assert_eq!(storage.get_item("Cart").await.expect("read"), None);
    assert!(!storage.is_durable());
}

#[test]
fn sqlite_path_ignores_memory_and_query() {
    assert_eq!(sqlite_path("sqlite::memory:"), None);
    assert_eq!(
        sqlite_path("sqlite://./data/client.db?mode=rwc"),
        Some(PathBuf::from("./data/client.db"))
    );
}
