//! End-to-end tests against a store on disk.

use paperdb_core::{
    Catalog, CollectionConfig, DocumentStore, LogQuery, Operation, StoreConfig, StoreError,
    MAX_LOG_ENTRIES,
};
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

fn site_catalog() -> Catalog {
    let mut catalog = Catalog::new(1_700_000_000_000, false);
    catalog.insert_collection(
        "jobs",
        CollectionConfig::new("jobs.json", "id")
            .relation("applications", "job_applications.jobId"),
    );
    catalog.insert_collection(
        "job_applications",
        CollectionConfig::new("job_applications.json", "id"),
    );
    catalog.insert_collection(
        "testimonials",
        CollectionConfig::new("testimonials.json", "id"),
    );
    catalog
}

fn create_site_store(path: &Path) -> DocumentStore {
    DocumentStore::create_store(path, StoreConfig::new(), site_catalog()).unwrap()
}

#[test]
fn create_then_find_by_id_roundtrip() {
    let dir = tempdir().unwrap();
    let store = create_site_store(dir.path());

    let created = store
        .create("jobs", fields(json!({"title": "Engineer", "status": "open"})))
        .unwrap();
    let id = created.get("id").cloned().unwrap();

    let found = store.find_by_id("jobs", &id).unwrap().unwrap();
    assert_eq!(found, created);
    assert_eq!(found.get("title"), Some(&json!("Engineer")));
    assert!(found.created_at > 0);
    assert_eq!(found.created_at, found.updated_at);
}

#[test]
fn create_respects_supplied_primary_key() {
    let dir = tempdir().unwrap();
    let store = create_site_store(dir.path());

    store
        .create("jobs", fields(json!({"id": "J1", "title": "Engineer"})))
        .unwrap();

    let found = store.find_by_id("jobs", &json!("J1")).unwrap();
    assert!(found.is_some());
}

#[test]
fn update_is_a_shallow_merge() {
    let dir = tempdir().unwrap();
    let store = create_site_store(dir.path());

    let created = store
        .create(
            "jobs",
            fields(json!({"id": "J1", "title": "Engineer", "location": "Remote"})),
        )
        .unwrap();

    let updated = store
        .update("jobs", &json!("J1"), fields(json!({"title": "Senior Engineer"})))
        .unwrap()
        .unwrap();

    assert_eq!(updated.get("title"), Some(&json!("Senior Engineer")));
    assert_eq!(updated.get("location"), Some(&json!("Remote")));
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at > created.updated_at);
}

#[test]
fn update_missing_id_returns_none() {
    let dir = tempdir().unwrap();
    let store = create_site_store(dir.path());

    let result = store
        .update("jobs", &json!("absent"), fields(json!({"title": "x"})))
        .unwrap();
    assert!(result.is_none());
}

#[test]
fn delete_missing_id_returns_false() {
    let dir = tempdir().unwrap();
    let store = create_site_store(dir.path());

    assert!(!store.delete("jobs", &json!("absent")).unwrap());
}

#[test]
fn delete_removes_first_match_only() {
    let dir = tempdir().unwrap();
    let store = create_site_store(dir.path());

    // Duplicate keys are a caller bug the store tolerates: first match wins.
    store
        .create("jobs", fields(json!({"id": "dup", "title": "first"})))
        .unwrap();
    store
        .create("jobs", fields(json!({"id": "dup", "title": "second"})))
        .unwrap();

    assert!(store.delete("jobs", &json!("dup")).unwrap());

    let survivor = store.find_by_id("jobs", &json!("dup")).unwrap().unwrap();
    assert_eq!(survivor.get("title"), Some(&json!("second")));
}

#[test]
fn delete_cascades_to_declared_relations() {
    let dir = tempdir().unwrap();
    let store = create_site_store(dir.path());

    store
        .create("jobs", fields(json!({"id": "J1", "title": "Engineer"})))
        .unwrap();
    store
        .create(
            "job_applications",
            fields(json!({"jobId": "J1", "applicant": "ada"})),
        )
        .unwrap();
    store
        .create(
            "job_applications",
            fields(json!({"jobId": "J1", "applicant": "grace"})),
        )
        .unwrap();
    store
        .create(
            "job_applications",
            fields(json!({"jobId": "J2", "applicant": "linus"})),
        )
        .unwrap();

    assert!(store.delete("jobs", &json!("J1")).unwrap());

    let dangling = store
        .find("job_applications", &fields(json!({"jobId": "J1"})))
        .unwrap();
    assert!(dangling.is_empty());

    // Dependents of other jobs are untouched; cascade is depth-one, exact.
    let remaining = store.find("job_applications", &Map::new()).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].get("applicant"), Some(&json!("linus")));

    assert_eq!(store.stats().cascade_removals, 2);
}

#[test]
fn query_operators_filter_exactly() {
    let dir = tempdir().unwrap();
    let store = create_site_store(dir.path());

    for rating in [2, 4, 5, 3] {
        store
            .create("testimonials", fields(json!({"rating": rating})))
            .unwrap();
    }

    let above = store
        .find("testimonials", &fields(json!({"rating": {"$gt": 3}})))
        .unwrap();
    let ratings: Vec<&Value> = above.iter().filter_map(|r| r.get("rating")).collect();
    assert_eq!(above.len(), 2);
    assert!(ratings.contains(&&json!(4)));
    assert!(ratings.contains(&&json!(5)));

    let below = store
        .find("testimonials", &fields(json!({"rating": {"$lt": 3}})))
        .unwrap();
    assert_eq!(below.len(), 1);

    let members = store
        .find("testimonials", &fields(json!({"rating": {"$in": [2, 5]}})))
        .unwrap();
    assert_eq!(members.len(), 2);

    let not_two = store
        .find("testimonials", &fields(json!({"rating": {"$ne": 2}})))
        .unwrap();
    assert_eq!(not_two.len(), 3);
}

#[test]
fn find_with_relations_attaches_dependents() {
    let dir = tempdir().unwrap();
    let store = create_site_store(dir.path());

    store
        .create("jobs", fields(json!({"id": "J1", "title": "Engineer"})))
        .unwrap();
    store
        .create(
            "job_applications",
            fields(json!({"jobId": "J1", "applicant": "ada"})),
        )
        .unwrap();
    store
        .create(
            "job_applications",
            fields(json!({"jobId": "J2", "applicant": "linus"})),
        )
        .unwrap();

    let job = store
        .find_with_relations("jobs", &json!("J1"), &["applications"])
        .unwrap()
        .unwrap();

    let applications = job.get("applications").unwrap().as_array().unwrap();
    assert_eq!(applications.len(), 1);
    assert_eq!(applications[0]["applicant"], json!("ada"));

    // Unknown requested relation names are skipped, not attached.
    let job = store
        .find_with_relations("jobs", &json!("J1"), &["nonexistent"])
        .unwrap()
        .unwrap();
    assert!(job.get("nonexistent").is_none());
}

#[test]
fn unknown_collection_is_an_error() {
    let dir = tempdir().unwrap();
    let store = create_site_store(dir.path());

    assert!(matches!(
        store.find("no_such", &Map::new()),
        Err(StoreError::UnknownCollection { .. })
    ));
    assert!(matches!(
        store.create("no_such", Map::new()),
        Err(StoreError::UnknownCollection { .. })
    ));
}

#[test]
fn records_survive_reopen() {
    let dir = tempdir().unwrap();

    {
        let store = create_site_store(dir.path());
        store
            .create("jobs", fields(json!({"id": "J1", "title": "Engineer"})))
            .unwrap();
    }

    let store = DocumentStore::open(dir.path(), StoreConfig::new()).unwrap();
    let found = store.find_by_id("jobs", &json!("J1")).unwrap();
    assert!(found.is_some());
}

#[test]
fn open_without_catalog_is_fatal() {
    let dir = tempdir().unwrap();

    let result = DocumentStore::open(&dir.path().join("missing"), StoreConfig::new());
    assert!(matches!(result, Err(StoreError::InvalidDirectory { .. })));

    let result = DocumentStore::open(dir.path(), StoreConfig::new());
    assert!(matches!(result, Err(StoreError::CatalogMissing { .. })));
}

#[test]
fn create_store_refuses_existing_catalog() {
    let dir = tempdir().unwrap();

    {
        let _store = create_site_store(dir.path());
    }
    let result = DocumentStore::create_store(dir.path(), StoreConfig::new(), site_catalog());
    assert!(matches!(result, Err(StoreError::InvalidDirectory { .. })));
}

#[test]
fn corrupt_collection_file_is_surfaced() {
    let dir = tempdir().unwrap();

    {
        let store = create_site_store(dir.path());
        store
            .create("jobs", fields(json!({"id": "J1"})))
            .unwrap();
    }

    std::fs::write(dir.path().join("jobs.json"), b"{definitely not an array")
        .unwrap();

    let store = DocumentStore::open(dir.path(), StoreConfig::new()).unwrap();
    assert!(matches!(
        store.find("jobs", &Map::new()),
        Err(StoreError::CollectionCorrupt { .. })
    ));

    // A missing file stays an empty collection, not an error.
    std::fs::remove_file(dir.path().join("jobs.json")).unwrap();
    store.invalidate_cache(Some("jobs")).unwrap();
    assert!(store.find("jobs", &Map::new()).unwrap().is_empty());
}

#[test]
fn transaction_log_records_mutations() {
    let dir = tempdir().unwrap();
    let store = DocumentStore::create_store(
        dir.path(),
        StoreConfig::new().actor("api"),
        site_catalog(),
    )
    .unwrap();

    store
        .create("jobs", fields(json!({"id": "J1", "title": "a"})))
        .unwrap();
    store
        .update("jobs", &json!("J1"), fields(json!({"title": "b"})))
        .unwrap();
    store.delete("jobs", &json!("J1")).unwrap();

    let entries = store.query_log(&LogQuery::new().collection("jobs"));
    assert_eq!(entries.len(), 3);

    // Newest first.
    assert_eq!(entries[0].operation, Operation::Delete);
    assert_eq!(entries[1].operation, Operation::Update);
    assert_eq!(entries[2].operation, Operation::Create);

    assert_eq!(entries[1].changes["before"]["title"], json!("a"));
    assert_eq!(entries[1].changes["after"]["title"], json!("b"));
    assert_eq!(entries[2].changes["title"], json!("a"));
    assert!(entries.iter().all(|e| e.actor.as_deref() == Some("api")));

    let updates = store.query_log(&LogQuery::new().operation(Operation::Update));
    assert_eq!(updates.len(), 1);
}

#[test]
fn transaction_log_caps_at_one_thousand() {
    let dir = tempdir().unwrap();
    let store = create_site_store(dir.path());

    for i in 0..(MAX_LOG_ENTRIES + 1) {
        store
            .create("jobs", fields(json!({"id": format!("J{i}")})))
            .unwrap();
    }

    let entries = store.query_log(&LogQuery::new());
    assert_eq!(entries.len(), MAX_LOG_ENTRIES);

    // The first operation was evicted; the newest is present.
    assert_eq!(entries[0].record_id, json!(format!("J{MAX_LOG_ENTRIES}")));
    assert!(!entries.iter().any(|e| e.record_id == json!("J0")));
    assert!(entries.iter().any(|e| e.record_id == json!("J1")));

    assert_eq!(store.stats().log_evictions, 1);
}

#[test]
fn concurrent_creates_never_lose_records() {
    let dir = tempdir().unwrap();
    let store = Arc::new(create_site_store(dir.path()));

    let handles: Vec<_> = (0..2)
        .map(|n| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store
                    .create("jobs", fields(json!({"worker": n})))
                    .unwrap()
                    .get("id")
                    .cloned()
                    .unwrap()
            })
        })
        .collect();

    let ids: Vec<Value> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for id in &ids {
        assert!(store.find_by_id("jobs", id).unwrap().is_some(), "lost {id}");
    }
    assert_eq!(store.find("jobs", &Map::new()).unwrap().len(), 2);
}

#[test]
fn contended_mutations_on_one_collection_all_land() {
    let dir = tempdir().unwrap();
    let store = Arc::new(create_site_store(dir.path()));

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..10 {
                    store
                        .create("jobs", fields(json!({"id": format!("{worker}-{i}")})))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.find("jobs", &Map::new()).unwrap().len(), 40);
    assert_eq!(store.stats().record_counts["jobs"], 40);
}

#[test]
fn encrypted_store_roundtrip() {
    let dir = tempdir().unwrap();
    let config = || StoreConfig::new().encryption_secret("static-store-secret");

    {
        let mut catalog = Catalog::new(1_700_000_000_000, true);
        catalog.insert_collection("jobs", CollectionConfig::new("jobs.json", "id"));
        let store = DocumentStore::create_store(dir.path(), config(), catalog).unwrap();
        store
            .create("jobs", fields(json!({"id": "J1", "title": "Engineer"})))
            .unwrap();
    }

    // The file on disk is an opaque blob, not plaintext JSON.
    let raw = std::fs::read(dir.path().join("jobs.json")).unwrap();
    assert!(serde_json::from_slice::<Value>(&raw).is_err());

    let store = DocumentStore::open(dir.path(), config()).unwrap();
    let found = store.find_by_id("jobs", &json!("J1")).unwrap().unwrap();
    assert_eq!(found.get("title"), Some(&json!("Engineer")));

    // Wrong secret fails to decrypt, surfaced as corruption of the file.
    drop(store);
    let store = DocumentStore::open(
        dir.path(),
        StoreConfig::new().encryption_secret("wrong-secret"),
    )
    .unwrap();
    assert!(matches!(
        store.find("jobs", &Map::new()),
        Err(StoreError::CollectionCorrupt { .. })
    ));
}

#[test]
fn encrypted_store_requires_a_secret() {
    let dir = tempdir().unwrap();

    {
        let mut catalog = Catalog::new(1, true);
        catalog.insert_collection("jobs", CollectionConfig::new("jobs.json", "id"));
        let _store = DocumentStore::create_store(
            dir.path(),
            StoreConfig::new().encryption_secret("s"),
            catalog,
        )
        .unwrap();
    }

    let result = DocumentStore::open(dir.path(), StoreConfig::new());
    assert!(matches!(result, Err(StoreError::KeyDerivationFailed { .. })));
}

#[test]
fn second_instance_is_locked_out() {
    let dir = tempdir().unwrap();
    let _store = create_site_store(dir.path());

    let second = DocumentStore::open(dir.path(), StoreConfig::new());
    assert!(matches!(second, Err(StoreError::StoreLocked)));
}

#[test]
fn invalidate_cache_forces_reload_from_disk() {
    let dir = tempdir().unwrap();
    let store = create_site_store(dir.path());

    store
        .create("jobs", fields(json!({"id": "J1"})))
        .unwrap();
    store.find("jobs", &Map::new()).unwrap();
    let hits_before = store.stats().cache_hits;
    assert!(hits_before > 0);

    store.invalidate_cache(None).unwrap();
    assert_eq!(store.stats().cached_collections, 0);

    let loads_before = store.stats().loads;
    store.find("jobs", &Map::new()).unwrap();
    assert_eq!(store.stats().loads, loads_before + 1);
}

#[test]
fn stats_reflect_operations() {
    let dir = tempdir().unwrap();
    let store = create_site_store(dir.path());

    store
        .create("jobs", fields(json!({"id": "J1"})))
        .unwrap();
    store
        .update("jobs", &json!("J1"), fields(json!({"title": "x"})))
        .unwrap();
    store.delete("jobs", &json!("J1")).unwrap();

    let stats = store.stats();
    assert_eq!(stats.creates, 1);
    assert_eq!(stats.updates, 1);
    assert_eq!(stats.deletes, 1);
    assert_eq!(stats.log_entries, 3);
    assert_eq!(stats.record_counts["jobs"], 0);
}
