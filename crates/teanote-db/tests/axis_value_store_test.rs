//! Integration tests for the rating schema store and the axis value store.
//!
//! Each test migrates its isolated schema forward first, so notes are bound
//! to the seeded STANDARD schema.

use futures::future::join_all;
use serde_json::json;
use teanote_db::test_fixtures::TestDatabase;
use teanote_db::{
    AxisValueRepository, AxisValues, AxisViolation, Error, RatingSchemaRepository,
};

async fn migrated_with_note() -> (TestDatabase, i32, i32) {
    let test_db = TestDatabase::new().await;
    let note_id = test_db.insert_legacy_note(3.0, json!({})).await;
    test_db.db.migrator.up().await.expect("forward migration");
    let schema = test_db
        .db
        .schemas
        .get_active_schema("STANDARD")
        .await
        .expect("default schema");
    (test_db, note_id, schema.id)
}

fn values(pairs: &[(&str, f64)]) -> AxisValues {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL
async fn test_out_of_range_value_rejects_whole_submission() {
    let (test_db, note_id, schema_id) = migrated_with_note().await;

    let err = test_db
        .db
        .axis_values
        .set_values(note_id, schema_id, &values(&[("RICHNESS", 7.0), ("CLARITY", 3.0)]))
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), 422);
    assert!(matches!(
        err.violations(),
        [AxisViolation::OutOfRange { code, .. }] if code == "RICHNESS"
    ));
    assert_eq!(test_db.count_rows("note_axis_value").await, 0);
    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL
async fn test_all_violations_are_reported() {
    let (test_db, note_id, schema_id) = migrated_with_note().await;

    let err = test_db
        .db
        .axis_values
        .set_values(
            note_id,
            schema_id,
            &values(&[("AROMA", 3.0), ("STRENGTH", 2.5), ("SMOOTHNESS", 0.0)]),
        )
        .await
        .unwrap_err();

    let violations = err.violations();
    assert_eq!(violations.len(), 3);
    assert!(violations
        .iter()
        .any(|v| matches!(v, AxisViolation::UnknownAxis { code } if code == "AROMA")));
    assert!(violations
        .iter()
        .any(|v| matches!(v, AxisViolation::OffStep { code, .. } if code == "STRENGTH")));
    assert!(violations
        .iter()
        .any(|v| matches!(v, AxisViolation::OutOfRange { code, .. } if code == "SMOOTHNESS")));
    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL
async fn test_set_values_is_an_idempotent_upsert() {
    let (test_db, note_id, schema_id) = migrated_with_note().await;
    let store = &test_db.db.axis_values;

    let first = values(&[("RICHNESS", 4.0), ("CLARITY", 2.0)]);
    store.set_values(note_id, schema_id, &first).await.unwrap();
    store.set_values(note_id, schema_id, &first).await.unwrap();
    assert_eq!(test_db.count_rows("note_axis_value").await, 2);

    store
        .set_values(note_id, schema_id, &values(&[("RICHNESS", 5.0)]))
        .await
        .unwrap();
    let stored = store.get_values(note_id).await.unwrap();
    assert_eq!(stored, values(&[("CLARITY", 2.0), ("RICHNESS", 5.0)]));

    let rows = store.list_rows(note_id).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(store.delete_values(note_id).await.unwrap(), 2);
    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL
async fn test_concurrent_writes_to_one_note_serialize() {
    let (test_db, note_id, schema_id) = migrated_with_note().await;
    let store = &test_db.db.axis_values;

    let submissions: Vec<AxisValues> = (1..=5)
        .map(|v| values(&[("RICHNESS", v as f64), ("STRENGTH", v as f64)]))
        .collect();
    let results = join_all(
        submissions
            .iter()
            .map(|s| store.set_values(note_id, schema_id, s)),
    )
    .await;
    assert!(results.iter().all(|r| r.is_ok()));

    // One submission wins whole; axes never mix values from different writers
    let stored = store.get_values(note_id).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored["RICHNESS"], stored["STRENGTH"]);
    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL
async fn test_schema_mismatch_and_missing_note() {
    let (test_db, note_id, _schema_id) = migrated_with_note().await;
    let other = test_db.insert_schema("GONGFU", "1.0.0", true).await;

    let err = test_db
        .db
        .axis_values
        .set_values(note_id, other, &AxisValues::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err.violations(),
        [AxisViolation::SchemaMismatch { .. }]
    ));

    let err = test_db
        .db
        .axis_values
        .set_values(i32::MAX, other, &AxisValues::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoteNotFound(id) if id == i32::MAX));
    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL
async fn test_unknown_schema_is_a_validation_failure() {
    let (test_db, note_id, schema_id) = migrated_with_note().await;
    let missing = schema_id + 1000;

    let err = test_db
        .db
        .axis_values
        .set_values(note_id, missing, &values(&[("RICHNESS", 3.0)]))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 422);
    let violations = err.violations();
    assert!(violations
        .iter()
        .any(|v| matches!(v, AxisViolation::UnknownSchema { schema_id } if *schema_id == missing)));
    assert!(violations
        .iter()
        .any(|v| matches!(v, AxisViolation::UnknownAxis { code } if code == "RICHNESS")));
    assert!(violations
        .iter()
        .any(|v| matches!(v, AxisViolation::SchemaMismatch { .. })));
    assert!(test_db
        .db
        .axis_values
        .get_values(note_id)
        .await
        .unwrap()
        .is_empty());
    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL
async fn test_active_schema_uses_semantic_version_order() {
    let (test_db, _note_id, _schema_id) = migrated_with_note().await;
    test_db.insert_schema("GONGFU", "1.9.0", true).await;
    let newest = test_db.insert_schema("GONGFU", "1.10.0", true).await;
    test_db.insert_schema("GONGFU", "2.0.0", false).await;

    let schema = test_db
        .db
        .schemas
        .get_active_schema("GONGFU")
        .await
        .unwrap();
    assert_eq!(schema.id, newest);
    assert_eq!(schema.version, "1.10.0");

    let err = test_db
        .db
        .schemas
        .get_active_schema("MISSING")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SchemaNotFound { .. }));

    let all = test_db.db.schemas.list_schemas(true).await.unwrap();
    assert_eq!(all.len(), 4);
    assert_eq!(all[0].version, "2.0.0");
    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL
async fn test_axes_come_back_in_display_order() {
    let (test_db, _note_id, schema_id) = migrated_with_note().await;

    let axes = test_db.db.schemas.get_axes(schema_id).await.unwrap();
    let codes: Vec<&str> = axes.iter().map(|a| a.code.as_str()).collect();
    assert_eq!(
        codes,
        ["RICHNESS", "STRENGTH", "SMOOTHNESS", "CLARITY", "COMPLEXITY"]
    );
    assert!(axes.iter().all(|a| a.is_required));
    assert_eq!(axes[0].display_names.get("en"), Some("Richness"));
    test_db.cleanup().await;
}
