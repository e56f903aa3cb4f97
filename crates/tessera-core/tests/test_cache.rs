//! Graph cache round trips and misses.

mod common;

use std::fs;

use common::*;
use pretty_assertions::assert_eq;
use tessera_core::config::ConventionPattern;
use tessera_core::graph::cache;

#[test]
fn serialize_round_trip_preserves_everything() {
    let mut b = build_fixture("ts_project");
    b.kg.set_patterns(vec![ConventionPattern {
        name: "service-suffix".to_string(),
        description: "Services end in .service.ts".to_string(),
        files: vec!["src/services/user.service.ts".to_string()],
    }]);

    let blob = cache::serialize(&b.kg).unwrap();
    let restored = cache::deserialize(&blob).expect("cache should load");

    assert_eq!(restored, b.kg);
    assert!(!restored
        .symbol("src/types/user.ts:User")
        .unwrap()
        .used_by
        .is_empty());
}

#[test]
fn save_and_load_under_project_root() {
    let b = build_fixture("ts_cycle");
    let dir = tempfile::tempdir().unwrap();

    let path = cache::save(&b.kg, dir.path()).unwrap();
    assert_eq!(path, dir.path().join(".tessera/graph-cache.json"));
    assert!(path.is_file());

    let loaded = cache::load(dir.path()).expect("cache should load");
    assert_eq!(loaded, b.kg);

    cache::invalidate(dir.path()).unwrap();
    assert!(cache::load(dir.path()).is_none());
}

#[test]
fn version_mismatch_discards_the_document() {
    let b = build_fixture("ts_acyclic");
    let dir = tempfile::tempdir().unwrap();
    let path = cache::save(&b.kg, dir.path()).unwrap();

    let mut doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    doc["version"] = serde_json::json!("0.0.1-stale");
    fs::write(&path, doc.to_string()).unwrap();

    assert!(cache::load(dir.path()).is_none());
}

#[test]
fn corrupt_cache_is_a_miss() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join(".tessera")).unwrap();
    fs::write(dir.path().join(cache::CACHE_PATH), "{\"version\": ").unwrap();
    assert!(cache::load(dir.path()).is_none());
}

#[test]
fn document_uses_pair_lists_for_maps() {
    let b = build_fixture("ts_acyclic");
    let doc: serde_json::Value = serde_json::from_str(&cache::serialize(&b.kg).unwrap()).unwrap();
    assert_eq!(doc["version"], cache::CACHE_VERSION);
    assert_eq!(doc["files"][0][0], "src/a.ts");
    assert_eq!(doc["files"][0][1]["path"], "src/a.ts");
    assert_eq!(doc["adjacency"][0][0], "src/a.ts");
    assert_eq!(doc["adjacency"][0][1], serde_json::json!(["src/b.ts", "src/c.ts"]));
    assert_eq!(doc["edges"].as_array().unwrap().len(), 3);
}
