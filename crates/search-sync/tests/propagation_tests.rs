//! Integration tests for registry-driven propagation.
//!
//! Covers direct updates and deletes, propagation to documents that embed
//! related records, and the switches that turn propagation off.

mod common;

use std::collections::BTreeSet;

use serde_json::{Value, json};

use helios_search_sync::bulk::{ActionKind, BulkAction};
use helios_search_sync::document::{DocumentBuilder, Index};
use helios_search_sync::error::{FieldError, SyncError};
use helios_search_sync::fields::Field;
use helios_search_sync::record::{DynamicRecord, PrimaryKey, RecordType};
use helios_search_sync::signals::{MutationEvent, RealTimeProcessor, RelationAction, SignalProcessor};
use helios_search_sync::{SyncResult, SyncSettings};

use common::*;

fn ids(actions: &[BulkAction], index: &str) -> BTreeSet<PrimaryKey> {
    actions
        .iter()
        .filter(|a| a.index == index)
        .map(|a| a.id.clone())
        .collect()
}

// ============================================================================
// Direct Updates
// ============================================================================

/// A car with no manufacturer indexes an empty country, even though the
/// field is required.
#[tokio::test]
async fn test_missing_intermediate_is_empty() {
    let garage = Garage::new();
    let car = garage.car(1, "2CV", None, &[]);
    let document = build(
        DocumentBuilder::new("CarDocument", Index::new("cars"), "Car")
            .field("country", Field::keyword().attr("manufacturer.country_code").required()),
    );

    let payload = document.prepare(&car).unwrap();
    assert_eq!(payload["country"], Value::Null);
}

/// A required path missing on the record fails; the same optional path is
/// empty.
#[tokio::test]
async fn test_missing_required_path_fails() {
    let car = DynamicRecord::new("Car", 7).with_attribute("name", "Ami").into_ref();

    let required = build(
        DocumentBuilder::new("CarDocument", Index::new("cars"), "Car")
            .field("launched", Field::date().required()),
    );
    let err = required.prepare(&car).unwrap_err();
    assert!(matches!(
        err,
        SyncError::Field(FieldError::VariableLookup { ref segment, .. }) if segment == "launched"
    ));

    let optional = build(
        DocumentBuilder::new("CarDocument", Index::new("cars"), "Car")
            .field("launched", Field::date()),
    );
    assert_eq!(optional.prepare(&car).unwrap()["launched"], Value::Null);
}

/// Saving a car writes its document with the embedded manufacturer.
#[tokio::test]
async fn test_update_writes_prepared_payload() {
    let garage = Garage::new();
    garage.manufacturer(1, "Peugeot", "FR");
    garage.category(1, "Family Car");
    let car = garage.car(1, "308", Some(1), &[1]);
    garage.ad(1, "Nice 308", 1);

    let (registry, client) = registry(SyncSettings::for_testing());
    registry.update(&car, &registry.default_options()).await.unwrap();

    let stored = client.document("cars", &PrimaryKey::Int(1)).unwrap();
    assert_eq!(
        Value::Object(stored),
        json!({
            "name": "308",
            "country": "FR",
            "manufacturer": {"name": "Peugeot", "country_code": "FR"},
            "categories": [{"title": "Family Car", "slug": "family-car"}],
            "ads": [{"title": "Nice 308"}],
            "launched": "2010-01-01",
            "type": "se"
        })
    );
}

/// Deleting the record with pk 51 emits exactly one delete action.
#[tokio::test]
async fn test_delete_emits_single_action() {
    let garage = Garage::new();
    let car = garage.car(51, "508", None, &[]);
    let (registry, client) = registry(SyncSettings::for_testing());

    registry.delete(&car, &registry.default_options()).await.unwrap();

    let actions = client.actions();
    assert_eq!(actions, vec![BulkAction::delete("cars", PrimaryKey::Int(51))]);
    assert_eq!(
        serde_json::to_value(&actions[0]).unwrap(),
        json!({"_op_type": "delete", "_index": "cars", "_id": 51, "_source": null})
    );
}

/// Preparing the same record twice yields the same payload, and registering
/// more documents does not change it.
#[tokio::test]
async fn test_prepare_is_stable_across_registrations() {
    let garage = Garage::new();
    garage.manufacturer(1, "Peugeot", "FR");
    let car = garage.car(1, "208", Some(1), &[]);

    let (registry, _) = registry_with(SyncSettings::for_testing(), vec![car_document()]);
    let document = registry.document("CarDocument").unwrap();
    let before = document.prepare(&car).unwrap();

    let (_other, _) = registry_with(
        SyncSettings::for_testing(),
        vec![car_document(), manufacturer_document()],
    );

    assert_eq!(document.prepare(&car).unwrap(), before);
    assert_eq!(document.prepare(&car).unwrap(), before);
}

// ============================================================================
// Related Propagation
// ============================================================================

/// Renaming a manufacturer re-indexes its cars and no others.
#[tokio::test]
async fn test_rename_propagates_to_related_documents() {
    let garage = Garage::new();
    garage.manufacturer(1, "Peugeot", "FR");
    garage.manufacturer(2, "Renault", "FR");
    let cars = vec![
        garage.car(1, "208", Some(1), &[]),
        garage.car(2, "308", Some(1), &[]),
        garage.car(3, "Clio", Some(2), &[]),
    ];

    let (registry, client) = registry(SyncSettings::for_testing());
    let options = registry.default_options();
    for car in &cars {
        registry.update(car, &options).await.unwrap();
    }
    client.clear();

    let citroen = garage.manufacturer(1, "Citroën", "FR");
    registry.update(&citroen, &options).await.unwrap();
    registry.update_related(&citroen, &options).await.unwrap();

    let actions = client.actions();
    assert_eq!(
        ids(&actions, "cars"),
        BTreeSet::from([PrimaryKey::Int(1), PrimaryKey::Int(2)])
    );
    for action in actions.iter().filter(|a| a.index == "cars") {
        assert_eq!(action.op_type, ActionKind::Index);
        let source = action.source.as_ref().unwrap();
        assert_eq!(source["manufacturer"]["name"], json!("Citroën"));
    }
    assert_eq!(
        client.document("manufacturers", &PrimaryKey::Int(1)).unwrap()["name"],
        json!("Citroën")
    );
    assert!(client.document("cars", &PrimaryKey::Int(3)).is_none());
}

/// Removing a category re-indexes its cars without it, while it still exists
/// in the source.
#[tokio::test]
async fn test_delete_related_leaves_out_the_removed_record() {
    let garage = Garage::new();
    let family = garage.category(1, "Family");
    garage.category(2, "City");
    garage.car(1, "208", None, &[1, 2]);

    let (registry, client) = registry(SyncSettings::for_testing());
    registry
        .delete_related(&family, &registry.default_options())
        .await
        .unwrap();

    assert!(garage.get("Category", 1).is_some());
    let actions = client.actions();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].op_type, ActionKind::Index);
    assert_eq!(
        actions[0].source.as_ref().unwrap()["categories"],
        json!([{"title": "City", "slug": "city"}])
    );
}

/// Removing a manufacturer empties the embedded manufacturer of its cars.
#[tokio::test]
async fn test_delete_related_foreign_key() {
    let garage = Garage::new();
    let peugeot = garage.manufacturer(1, "Peugeot", "FR");
    garage.car(1, "208", Some(1), &[]);

    let (registry, client) = registry(SyncSettings::for_testing());
    registry
        .delete_related(&peugeot, &registry.default_options())
        .await
        .unwrap();

    let stored = client.document("cars", &PrimaryKey::Int(1)).unwrap();
    assert_eq!(stored["manufacturer"], json!({}));
    assert_eq!(stored["country"], Value::Null);
}

/// A parent with several children triggers one write per child document,
/// even when the resolver reports children more than once.
#[tokio::test]
async fn test_related_fan_out_is_deduplicated() {
    let garage = Garage::new();
    let peugeot = garage.manufacturer(1, "Peugeot", "FR");
    for i in 1..=3 {
        garage.car(i, &format!("car-{}", i), Some(1), &[]);
    }

    let source = garage.source.clone();
    let duplicated = car_document().related_resolver(
        move |related: &helios_search_sync::RecordRef| -> SyncResult<Option<Vec<helios_search_sync::RecordRef>>> {
            let query = helios_search_sync::record::RecordQuery::all("Car")
                .filter("manufacturer", related.primary_key().to_json());
            let mut cars = source.select(&query);
            cars.extend(source.select(&query));
            Ok(Some(cars))
        },
    );
    let (registry, client) = registry_with(SyncSettings::for_testing(), vec![duplicated]);

    registry
        .delete_related(&peugeot, &registry.default_options())
        .await
        .unwrap();

    let calls = client.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        ids(&calls[0].actions, "cars"),
        BTreeSet::from([PrimaryKey::Int(1), PrimaryKey::Int(2), PrimaryKey::Int(3)])
    );
    assert_eq!(calls[0].actions.len(), 3);
}

/// A related record that points at no root record writes nothing.
#[tokio::test]
async fn test_related_record_without_roots() {
    let garage = Garage::new();
    let (registry, client) = registry(SyncSettings::for_testing());
    let ghost = DynamicRecord::new("Ad", 99).into_ref();

    let response = registry
        .update_related(&ghost, &registry.default_options())
        .await
        .unwrap();

    assert_eq!(response.success, 0);
    assert!(client.calls().is_empty());
    assert!(garage.get("Ad", 99).is_none());
}

// ============================================================================
// Propagation Switches
// ============================================================================

/// Documents with `ignore_signals` stay registered but are never written.
#[tokio::test]
async fn test_ignore_signals_document() {
    let garage = Garage::new();
    garage.manufacturer(1, "Peugeot", "FR");
    let car = garage.car(1, "208", Some(1), &[]);

    let (registry, client) = registry_with(
        SyncSettings::for_testing(),
        vec![car_document().ignore_signals(true)],
    );
    let options = registry.default_options();

    registry.update(&car, &options).await.unwrap();
    registry.delete(&car, &options).await.unwrap();

    assert!(client.calls().is_empty());
    let documents = registry.get_documents(Some(&[RecordType::new("Car")]));
    assert_eq!(documents.len(), 1);
    assert!(documents.iter().next().unwrap().ignore_signals());
}

/// With autosync disabled, no mutation reaches the search client.
#[tokio::test]
async fn test_autosync_disabled_blocks_every_event() {
    let garage = Garage::new();
    let peugeot = garage.manufacturer(1, "Peugeot", "FR");
    let category = garage.category(1, "Family");
    let car = garage.car(1, "208", Some(1), &[1]);
    let ad = garage.ad(1, "Nice 208", 1);

    let settings = SyncSettings {
        autosync: false,
        ..SyncSettings::for_testing()
    };
    let (registry, client) = registry(settings);
    let processor = RealTimeProcessor::new(registry);

    let events = vec![
        MutationEvent::Saved(car.clone()),
        MutationEvent::Saved(peugeot.clone()),
        MutationEvent::PreDelete(ad.clone()),
        MutationEvent::PostDelete(ad),
        MutationEvent::RelationChanged {
            record: car.clone(),
            action: RelationAction::PostAdd,
            related_type: RecordType::new("Category"),
        },
        MutationEvent::PreDelete(category.clone()),
        MutationEvent::PostDelete(category),
        MutationEvent::PostDelete(car),
    ];
    for event in &events {
        processor.dispatch(event).await.unwrap();
    }

    assert!(client.calls().is_empty());
}
