use feedrelay::WatermarkStore;
use std::collections::BTreeMap;

#[tokio::test]
async fn missing_file_loads_as_empty_mapping() {
    let dir = tempfile::tempdir().unwrap();
    let store = WatermarkStore::new(dir.path().join("absent.json"));
    assert!(store.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn save_then_load_round_trips_ids_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let store = WatermarkStore::new(dir.path().join("wm.json"));

    // Ids beyond safe-integer range and with leading zeros must survive
    // untouched; they are opaque strings on disk.
    let mut map = BTreeMap::new();
    map.insert("alpha".to_string(), "1790000000000000000001".to_string());
    map.insert("beta".to_string(), "007".to_string());
    store.save(&map).await.unwrap();

    assert_eq!(store.load().await.unwrap(), map);
}

#[tokio::test]
async fn save_rewrites_the_mapping_wholesale() {
    let dir = tempfile::tempdir().unwrap();
    let store = WatermarkStore::new(dir.path().join("wm.json"));

    let mut first = BTreeMap::new();
    first.insert("alpha".to_string(), "1".to_string());
    first.insert("beta".to_string(), "2".to_string());
    store.save(&first).await.unwrap();

    // A later save with beta gone must not leave its stale entry behind.
    let mut second = BTreeMap::new();
    second.insert("alpha".to_string(), "9".to_string());
    store.save(&second).await.unwrap();

    assert_eq!(store.load().await.unwrap(), second);
}

#[tokio::test]
async fn save_leaves_no_temp_file_behind() {
    let dir = tempfile::tempdir().unwrap();
    let store = WatermarkStore::new(dir.path().join("wm.json"));

    let mut map = BTreeMap::new();
    map.insert("alpha".to_string(), "1".to_string());
    store.save(&map).await.unwrap();

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["wm.json".to_string()]);
}

#[tokio::test]
async fn corrupt_file_is_a_persistence_error_not_a_panic() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wm.json");
    std::fs::write(&path, b"{ this is not json").unwrap();

    let store = WatermarkStore::new(&path);
    let err = store.load().await.unwrap_err();
    assert!(err.to_string().contains("persistence"));
}
