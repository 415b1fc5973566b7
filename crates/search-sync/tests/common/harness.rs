//! Documents and registries over the fixture data set.

use std::sync::Arc;

use helios_search_sync::backends::memory::MemorySearchClient;
use helios_search_sync::document::{DocumentBuilder, Index, PathResolver};
use helios_search_sync::fields::Field;
use helios_search_sync::{Document, DocumentRegistry, SyncSettings};

use super::fixtures::catalog;

/// The car document: embeds its manufacturer, categories and ads.
pub fn car_document() -> DocumentBuilder {
    DocumentBuilder::new(
        "CarDocument",
        Index::new("cars").with_setting("number_of_shards", 1),
        "Car",
    )
    .field("name", Field::text())
    .field("country", Field::keyword().attr("manufacturer.country_code"))
    .field(
        "manufacturer",
        Field::object([("name", Field::text()), ("country_code", Field::keyword())]),
    )
    .field(
        "categories",
        Field::nested([("title", Field::text()), ("slug", Field::keyword())]),
    )
    .field("ads", Field::nested([("title", Field::text())]).attr("ad_set"))
    .model_fields(["launched", "type"])
    .related("Manufacturer")
    .related("Category")
    .related("Ad")
    .related_resolver(
        PathResolver::new()
            .route("Manufacturer", "car_set")
            .route("Category", "car_set")
            .route("Ad", "car"),
    )
}

/// The manufacturer document: embeds the names of its cars.
pub fn manufacturer_document() -> DocumentBuilder {
    DocumentBuilder::new("ManufacturerDocument", Index::new("manufacturers"), "Manufacturer")
        .field("name", Field::text())
        .field("country_code", Field::keyword())
        .field("cars", Field::object([("name", Field::text())]).attr("car_set"))
        .model_fields(["created"])
        .related("Car")
        .related_resolver(PathResolver::new().route("Car", "manufacturer"))
}

/// Compiles a document against the fixture catalog.
pub fn build(builder: DocumentBuilder) -> Document {
    match builder.build(&catalog()) {
        Ok(document) => document,
        Err(e) => panic!("fixture document failed to build: {}", e),
    }
}

/// A registry with the car and manufacturer documents.
pub fn registry(settings: SyncSettings) -> (Arc<DocumentRegistry>, Arc<MemorySearchClient>) {
    registry_with(settings, vec![car_document(), manufacturer_document()])
}

/// A registry with the given documents.
pub fn registry_with(
    settings: SyncSettings,
    documents: Vec<DocumentBuilder>,
) -> (Arc<DocumentRegistry>, Arc<MemorySearchClient>) {
    let client = Arc::new(MemorySearchClient::new());
    let mut registry = DocumentRegistry::new(settings, client.clone());
    for builder in documents {
        if let Err(e) = registry.register(build(builder)) {
            panic!("fixture document failed to register: {}", e);
        }
    }
    (Arc::new(registry), client)
}
