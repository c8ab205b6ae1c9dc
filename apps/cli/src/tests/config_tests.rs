use super::*;

use std::collections::HashMap;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
}

#[test]
fn empty_database_url_falls_back_to_default() {
    assert_eq!(
        normalize_database_url("   "),
        Settings::default().database_url
    );
}

#[test]
fn file_values_override_defaults() {
    let mut settings = Settings::default();
    apply_file(
        &mut settings,
        r#"
        api_url = "https://foodmine.example"
        storage = "memory"
        request_timeout_seconds = 3
        home_lat = 43.65
        home_lng = -79.38
        "#,
    )
    .expect("valid config");

    assert_eq!(settings.api_url, "https://foodmine.example");
    assert_eq!(settings.storage, StorageMode::Memory);
    assert_eq!(settings.request_timeout_seconds, 3);
    assert_eq!(settings.home_location, Some(GeoPoint::new(43.65, -79.38)));
    assert_eq!(settings.database_url, Settings::default().database_url);
}

#[test]
fn malformed_file_is_an_error() {
    let mut settings = Settings::default();
    assert!(apply_file(&mut settings, "storage = \"floppy\"").is_err());
}

#[test]
fn app_prefixed_env_wins_over_plain_env() {
    let mut settings = Settings::default();
    apply_env(
        &mut settings,
        env_from(&[
            ("FOODMINE_API_URL", "http://plain:5000"),
            ("APP__API_URL", "http://prefixed:5000"),
            ("DATABASE_URL", "sqlite://plain.db"),
            ("APP__STORAGE", "none"),
        ]),
    );

    assert_eq!(settings.api_url, "http://prefixed:5000");
    assert_eq!(settings.database_url, "sqlite://plain.db");
    assert_eq!(settings.storage, StorageMode::None);
}

#[test]
fn home_location_needs_both_coordinates() {
    let mut settings = Settings::default();
    apply_env(&mut settings, env_from(&[("APP__HOME_LAT", "10.5")]));
    assert_eq!(settings.home_location, None);

    apply_env(
        &mut settings,
        env_from(&[("APP__HOME_LAT", "10.5"), ("APP__HOME_LNG", "20.25")]),
    );
    assert_eq!(settings.home_location, Some(GeoPoint::new(10.5, 20.25)));
}

#[test]
fn invalid_storage_env_is_ignored() {
    let mut settings = Settings::default();
    apply_env(&mut settings, env_from(&[("APP__STORAGE", "floppy")]));
    assert_eq!(settings.storage, StorageMode::Sqlite);
}

#[test]
fn missing_config_file_uses_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings =
        load_settings_with(&dir.path().join("client.toml"), env_from(&[])).expect("settings");
    assert_eq!(settings, Settings::default());
}

#[test]
fn environment_overrides_config_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("client.toml");
    std::fs::write(&path, "request_timeout_seconds = 3\ndatabase_url = \"./local.db\"\n")
        .expect("write config");

    let settings = load_settings_with(
        &path,
        env_from(&[("APP__REQUEST_TIMEOUT_SECONDS", "30")]),
    )
    .expect("settings");

    assert_eq!(settings.request_timeout_seconds, 30);
    assert_eq!(settings.database_url, "sqlite://./local.db");
}

#[tokio::test]
async fn normalized_database_url_opens_sqlite_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("nested").join("client.db");

    let url = normalize_database_url(&db_path.to_string_lossy());
    let storage = storage::Storage::new(&url).await.expect("open sqlite");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should be created: {}",
        db_path.display()
    );
}
