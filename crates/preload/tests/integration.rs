use std::path::PathBuf;

use refdata_preload::config::{PreloadData, Remap};
use refdata_preload::memory::MemoryStore;
use refdata_preload::report::MigrationState;
use refdata_preload::{reconcile, FieldMeta, FieldValues, PreloadError, Value};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_fixture(name: &str) -> PreloadData {
    PreloadData::from_path(&fixtures_dir().join(name)).unwrap()
}

fn clinic_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.define_list("app.Reason");
    store.define_list("app.Transport");
    store.define(
        "app.Site",
        vec![
            FieldMeta::new("site_code").unique(),
            FieldMeta::new("name"),
            FieldMeta::new("beds"),
        ],
    );
    store.define(
        "app.Country",
        vec![FieldMeta::new("iso").unique(), FieldMeta::new("name")],
    );
    store
}

fn label(store: &MemoryStore, model: &str, code: &str) -> Option<Value> {
    store
        .find(model, "short_code", code)
        .first()
        .and_then(|row| row.get("name").cloned())
}

// -------------------------------------------------------------------------
// List data
// -------------------------------------------------------------------------

#[test]
fn every_declared_code_exists_with_its_label() {
    let store = clinic_store();
    let data = load_fixture("clinic.preload.toml");
    reconcile(&store, &data).unwrap();

    for decl in &data.list_data {
        assert_eq!(store.count(&decl.model), decl.entries.len());
        for entry in &decl.entries {
            assert_eq!(
                label(&store, &decl.model, &entry.short_code),
                Some(Value::Text(entry.label.clone())),
                "{} / {}",
                decl.model,
                entry.short_code
            );
        }
    }
}

#[test]
fn list_pass_is_idempotent() {
    let store = clinic_store();
    let data = load_fixture("clinic.preload.toml");
    reconcile(&store, &data).unwrap();
    let first = store.rows("app.Reason");

    let report = reconcile(&store, &data).unwrap();
    assert_eq!(report.list.created, 0);
    assert_eq!(report.list.updated, 5);
    assert_eq!(store.rows("app.Reason"), first);
}

#[test]
fn relabel_updates_without_duplicating() {
    let store = clinic_store();
    let data = PreloadData::new().list("app.Reason", [("other", "Other")]);
    let report = reconcile(&store, &data).unwrap();
    assert_eq!(report.list.created, 1);

    let updated = load_fixture("reason-updated.preload.toml");
    reconcile(&store, &updated).unwrap();
    assert_eq!(store.count("app.Reason"), 1);
    assert_eq!(
        label(&store, "app.Reason", "other"),
        Some(Value::from("Other (updated)"))
    );
}

// -------------------------------------------------------------------------
// Model data
// -------------------------------------------------------------------------

#[test]
fn site_record_is_keyed_by_site_code() {
    let store = clinic_store();
    let first = PreloadData::new().records(
        "app.Site",
        Some("site_code"),
        vec![FieldValues::new().with("site_code", "10").with("name", "Clinic A")],
    );
    reconcile(&store, &first).unwrap();

    let second = PreloadData::new().records(
        "app.Site",
        Some("site_code"),
        vec![FieldValues::new().with("site_code", "10").with("name", "Clinic A (north)")],
    );
    let report = reconcile(&store, &second).unwrap();

    assert_eq!(report.model.updated, 1);
    let rows = store.find("app.Site", "site_code", "10");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name"), Some(&Value::from("Clinic A (north)")));
}

#[test]
fn missing_unique_field_fails_deterministically() {
    let store = MemoryStore::new();
    store.define("app.Visit", vec![FieldMeta::new("label"), FieldMeta::new("day")]);
    let data = PreloadData::new().records(
        "app.Visit",
        None,
        vec![FieldValues::new().with("label", "Day 1").with("day", 1)],
    );

    for _ in 0..2 {
        let err = reconcile(&store, &data).unwrap_err();
        assert!(matches!(err, PreloadError::NoUniqueField { .. }), "{err}");
    }
    assert_eq!(store.count("app.Visit"), 0);
}

// -------------------------------------------------------------------------
// Unique-field migration
// -------------------------------------------------------------------------

#[test]
fn site_code_rename_converges() {
    let store = clinic_store();
    store
        .insert("app.Site", FieldValues::new().with("site_code", "10").with("name", "Clinic A"))
        .unwrap();
    let data = PreloadData::new().remap("app.Site", "site_code", Remap::new("10", "10A"));

    let report = reconcile(&store, &data).unwrap();
    assert_eq!(report.migrations[0].state, MigrationState::NewMissingOldPresent);
    assert!(store.find("app.Site", "site_code", "10").is_empty());
    assert_eq!(store.find("app.Site", "site_code", "10A").len(), 1);

    let rerun = reconcile(&store, &data).unwrap();
    assert_eq!(rerun.migrations[0].state, MigrationState::NewPresentOldMissing);
    assert_eq!(store.count("app.Site"), 1);
}

#[test]
fn referenced_old_record_survives_beside_new_one() {
    let store = clinic_store();
    let old = store
        .insert("app.Site", FieldValues::new().with("site_code", "A"))
        .unwrap();
    store
        .insert("app.Site", FieldValues::new().with("site_code", "B"))
        .unwrap();
    store.protect("app.Site", old);

    let data = PreloadData::new().remap("app.Site", "site_code", Remap::new("A", "B"));
    let report = reconcile(&store, &data).unwrap();

    assert_eq!(report.migrations[0].state, MigrationState::NewPresentOldPresent);
    assert_eq!(report.unique_field.stale_retained, 1);
    assert_eq!(store.find("app.Site", "site_code", "A").len(), 1);
    assert_eq!(store.find("app.Site", "site_code", "B").len(), 1);
}

// -------------------------------------------------------------------------
// Full fixture
// -------------------------------------------------------------------------

#[test]
fn clinic_fixture_reaches_a_fixed_point() {
    let store = clinic_store();
    let data = load_fixture("clinic.preload.toml");

    let first = reconcile(&store, &data).unwrap();
    assert_eq!(first.list.created, 5);
    assert_eq!(first.model.created, 4);
    assert_eq!(first.unique_field.migrated, 1);

    let sites = store.rows("app.Site");
    let countries = store.rows("app.Country");

    // Second run recreates site "20" from model data, then the migration
    // removes it again as a stale duplicate of "20B".
    let second = reconcile(&store, &data).unwrap();
    assert_eq!(second.model.created, 1);
    assert_eq!(second.unique_field.stale_deleted, 1);
    assert_eq!(
        second.migrations[0].state,
        MigrationState::NewPresentOldPresent
    );

    let mut codes: Vec<_> = store
        .rows("app.Site")
        .iter()
        .filter_map(|r| r.get("site_code").cloned())
        .collect();
    codes.sort_by_key(|v| v.to_string());
    assert_eq!(codes, vec![Value::from("10"), Value::from("20B")]);
    assert_eq!(store.rows("app.Site").len(), sites.len());
    assert_eq!(store.rows("app.Country"), countries);
}

#[test]
fn report_serializes_to_json() {
    let store = clinic_store();
    let report = reconcile(&store, &load_fixture("clinic.preload.toml")).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["list"]["created"], 5);
    assert_eq!(json["migrations"][0]["state"], "new_missing_old_present");
    assert_eq!(json["migrations"][0]["new"], "20B");
}

#[test]
fn from_path_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = PreloadData::from_path(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, PreloadError::Io(_)));
}
