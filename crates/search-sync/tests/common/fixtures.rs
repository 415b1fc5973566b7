//! Record fixtures.
//!
//! Relations are not stored as record handles: they look the related records
//! up in the source each time they are read, so replacing a record (a rename)
//! is visible through every relation pointing at it, and removing one makes it
//! disappear from reverse relations.

use std::sync::{Arc, Weak};

use chrono::NaiveDate;

use helios_search_sync::backends::memory::MemoryRecordSource;
use helios_search_sync::record::{
    AttributeKind, DynamicRecord, FieldValue, PrimaryKey, RecordQuery, RecordRef, RecordSchema,
    SchemaCatalog,
};

/// Returns the schema catalog of the fixture data set.
pub fn catalog() -> SchemaCatalog {
    SchemaCatalog::new()
        .with_schema(
            RecordSchema::new("Manufacturer")
                .with_attribute("name", AttributeKind::Char)
                .with_attribute("country_code", AttributeKind::Char)
                .with_attribute("created", AttributeKind::Date)
                .with_attribute("car_set", AttributeKind::Reverse("Car".into())),
        )
        .with_schema(
            RecordSchema::new("Car")
                .with_attribute("name", AttributeKind::Char)
                .with_attribute("launched", AttributeKind::Date)
                .with_attribute("type", AttributeKind::Char)
                .with_attribute("manufacturer", AttributeKind::ForeignKey("Manufacturer".into()))
                .with_attribute("categories", AttributeKind::ManyToMany("Category".into()))
                .with_attribute("ad_set", AttributeKind::Reverse("Ad".into())),
        )
        .with_schema(
            RecordSchema::new("Category")
                .with_attribute("title", AttributeKind::Char)
                .with_attribute("slug", AttributeKind::Slug)
                .with_attribute("car_set", AttributeKind::Reverse("Car".into())),
        )
        .with_schema(
            RecordSchema::new("Ad")
                .with_attribute("title", AttributeKind::Char)
                .with_attribute("description", AttributeKind::Text)
                .with_attribute("url", AttributeKind::Url)
                .with_attribute("car", AttributeKind::ForeignKey("Car".into())),
        )
}

/// The fixture data set.
#[derive(Debug, Clone)]
pub struct Garage {
    /// Record source holding every fixture record.
    pub source: Arc<MemoryRecordSource>,
}

impl Default for Garage {
    fn default() -> Self {
        Self::new()
    }
}

impl Garage {
    /// Creates an empty garage.
    pub fn new() -> Self {
        Self {
            source: Arc::new(MemoryRecordSource::new()),
        }
    }

    fn weak(&self) -> Weak<MemoryRecordSource> {
        Arc::downgrade(&self.source)
    }

    /// Inserts (or replaces) a manufacturer.
    pub fn manufacturer(&self, id: i64, name: &str, country_code: &str) -> RecordRef {
        let record = DynamicRecord::new("Manufacturer", id)
            .with_attribute("name", name)
            .with_attribute("country_code", country_code)
            .with_attribute("created", date(1889, 1, 1))
            .with_attribute(
                "car_set",
                reverse(self.weak(), RecordQuery::all("Car").filter("manufacturer", id)),
            )
            .into_ref();
        self.source.insert(record.clone());
        record
    }

    /// Inserts (or replaces) a category.
    pub fn category(&self, id: i64, title: &str) -> RecordRef {
        let record = DynamicRecord::new("Category", id)
            .with_attribute("title", title)
            .with_attribute("slug", title.to_lowercase().replace(' ', "-"))
            .with_attribute(
                "car_set",
                reverse(self.weak(), RecordQuery::all("Car").filter("categories", id)),
            )
            .into_ref();
        self.source.insert(record.clone());
        record
    }

    /// Inserts (or replaces) a car.
    pub fn car(
        &self,
        id: i64,
        name: &str,
        manufacturer: Option<i64>,
        categories: &[i64],
    ) -> RecordRef {
        let manufacturer = match manufacturer {
            Some(key) => forward(self.weak(), "Manufacturer", key),
            None => FieldValue::Null,
        };
        let category_keys: Vec<PrimaryKey> = categories.iter().map(|k| PrimaryKey::Int(*k)).collect();

        let record = DynamicRecord::new("Car", id)
            .with_attribute("name", name)
            .with_attribute("launched", date(2010, 1, 1))
            .with_attribute("type", "se")
            .with_attribute("manufacturer", manufacturer)
            .with_attribute(
                "categories",
                reverse(self.weak(), RecordQuery::all("Category").keys(category_keys)),
            )
            .with_attribute(
                "ad_set",
                reverse(self.weak(), RecordQuery::all("Ad").filter("car", id)),
            )
            .into_ref();
        self.source.insert(record.clone());
        record
    }

    /// Inserts (or replaces) an ad.
    pub fn ad(&self, id: i64, title: &str, car: i64) -> RecordRef {
        let record = DynamicRecord::new("Ad", id)
            .with_attribute("title", title)
            .with_attribute("description", format!("{} for sale", title))
            .with_attribute("url", format!("http://example.com/ads/{}", id))
            .with_attribute("car", forward(self.weak(), "Car", car))
            .into_ref();
        self.source.insert(record.clone());
        record
    }

    /// Removes a record from the source.
    pub fn remove(&self, record: &RecordRef) {
        self.source
            .remove(record.record_type(), &record.primary_key());
    }

    /// Looks a record up by type and key.
    pub fn get(&self, record_type: &str, key: i64) -> Option<RecordRef> {
        self.source
            .select(&RecordQuery::all(record_type).keys([PrimaryKey::Int(key)]))
            .into_iter()
            .next()
    }
}

/// A foreign key read from the source on access.
fn forward(source: Weak<MemoryRecordSource>, record_type: &'static str, key: i64) -> FieldValue {
    FieldValue::callable(move || {
        source
            .upgrade()
            .and_then(|s| {
                s.select(&RecordQuery::all(record_type).keys([PrimaryKey::Int(key)]))
                    .into_iter()
                    .next()
            })
            .map(FieldValue::Record)
            .unwrap_or_default()
    })
}

/// A to-many relation evaluated against the source on access.
fn reverse(source: Weak<MemoryRecordSource>, query: RecordQuery) -> FieldValue {
    FieldValue::relation(move || {
        source
            .upgrade()
            .map(|s| s.select(&query))
            .unwrap_or_default()
    })
}

fn date(year: i32, month: u32, day: u32) -> FieldValue {
    NaiveDate::from_ymd_opt(year, month, day)
        .map(FieldValue::from)
        .unwrap_or_default()
}

/// Builds `count` cars numbered from 1, all made by manufacturer 1.
pub fn fleet(garage: &Garage, count: i64) -> Vec<RecordRef> {
    garage.manufacturer(1, "Peugeot", "FR");
    (1..=count)
        .map(|i| garage.car(i, &format!("car-{}", i), Some(1), &[]))
        .collect()
}
