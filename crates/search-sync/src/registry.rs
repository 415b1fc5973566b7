//! Document registry.
//!
//! The registry maps record types to the documents rooted on them, record
//! types to the documents that merely reference them, and index names to the
//! documents they host. It is populated once at startup by [`register`] calls
//! and is read-only afterwards, so it needs no locking: share it behind an
//! `Arc` once registration is done.
//!
//! Mutations drive it through four operations:
//!
//! | Operation | Documents touched | Action |
//! |-----------|-------------------|--------|
//! | [`update`] | rooted on the record's type | `index` |
//! | [`delete`] | rooted on the record's type | `delete` |
//! | [`update_related`] | referencing the record's type | `index` |
//! | [`delete_related`] | referencing the record's type | `index`, ignoring the record |
//!
//! [`register`]: DocumentRegistry::register
//! [`update`]: DocumentRegistry::update
//! [`delete`]: DocumentRegistry::delete
//! [`update_related`]: DocumentRegistry::update_related
//! [`delete_related`]: DocumentRegistry::delete_related

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::bulk::{ActionKind, BulkAction, BulkResponse, SearchClient};
use crate::config::SyncSettings;
use crate::document::{Document, Index, UpdateOptions};
use crate::error::{DeclarationError, SyncResult, TaskError};
use crate::record::{PrimaryKey, RecordRef, RecordType};

/// Notification sent after each bulk submission driven by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexNotification {
    /// Document name.
    pub document: String,
    /// Index name.
    pub index: String,
    /// The bulk operation.
    pub action: ActionKind,
    /// Number of actions that succeeded.
    pub success: usize,
    /// Number of actions that failed.
    pub failed: usize,
}

/// Directory of documents, their record types and their indices.
pub struct DocumentRegistry {
    /// Library-wide settings.
    settings: SyncSettings,

    /// Client used for every write.
    client: Arc<dyn SearchClient>,

    /// Shared index per index name.
    indices: BTreeMap<String, Arc<Index>>,

    /// Documents per index name.
    index_documents: BTreeMap<String, BTreeSet<Arc<Document>>>,

    /// Documents rooted on each record type.
    models: HashMap<RecordType, BTreeSet<Arc<Document>>>,

    /// Documents referencing each related record type.
    related_models: HashMap<RecordType, BTreeSet<Arc<Document>>>,

    /// Documents by name.
    by_name: HashMap<String, Arc<Document>>,

    /// Notification channel for completed writes.
    update_tx: broadcast::Sender<IndexNotification>,
}

impl DocumentRegistry {
    /// Creates an empty registry.
    pub fn new(settings: SyncSettings, client: Arc<dyn SearchClient>) -> Self {
        let (update_tx, _) = broadcast::channel(64);
        Self {
            settings,
            client,
            indices: BTreeMap::new(),
            index_documents: BTreeMap::new(),
            models: HashMap::new(),
            related_models: HashMap::new(),
            by_name: HashMap::new(),
            update_tx,
        }
    }

    /// Returns the settings.
    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Returns the search client.
    pub fn client(&self) -> &Arc<dyn SearchClient> {
        &self.client
    }

    /// Returns update options with the registry's defaults.
    pub fn default_options(&self) -> UpdateOptions {
        UpdateOptions::from_settings(&self.settings)
    }

    /// Registers a compiled document.
    ///
    /// The default index settings are merged under the document's index
    /// settings. Documents naming an index that is already registered share
    /// the existing index. Documents without pagination inherit the default.
    pub fn register(&mut self, document: Document) -> SyncResult<Arc<Document>> {
        if self.by_name.contains_key(document.name()) {
            return Err(DeclarationError::DuplicateDocument {
                document: document.name().to_string(),
            }
            .into());
        }

        let index_name = document.index().name().to_string();
        let index = match self.indices.get(&index_name) {
            Some(existing) => existing.clone(),
            None => {
                let merged = Arc::new(
                    document
                        .index()
                        .with_defaults(&self.settings.default_index_settings),
                );
                self.indices.insert(index_name.clone(), merged.clone());
                merged
            }
        };

        let document = Arc::new(document.bind(index, self.settings.pagination));

        self.models
            .entry(document.record_type().clone())
            .or_default()
            .insert(Arc::clone(&document));

        for related in document.related_types() {
            self.related_models
                .entry(related.clone())
                .or_default()
                .insert(Arc::clone(&document));
        }

        self.index_documents
            .entry(index_name.clone())
            .or_default()
            .insert(Arc::clone(&document));

        self.by_name
            .insert(document.name().to_string(), Arc::clone(&document));

        debug!(
            document = %document.name(),
            index = %index_name,
            record_type = %document.record_type(),
            "Registered document"
        );

        Ok(document)
    }

    /// Writes the documents rooted on the record's type with `options.action`.
    ///
    /// Does nothing when autosync is disabled. Documents with `ignore_signals`
    /// are skipped.
    pub async fn update(
        &self,
        record: &RecordRef,
        options: &UpdateOptions,
    ) -> SyncResult<BulkResponse> {
        let mut response = BulkResponse::default();
        if !self.settings.autosync {
            return Ok(response);
        }

        let Some(documents) = self.models.get(record.record_type()) else {
            return Ok(response);
        };

        for document in documents.iter().filter(|d| !d.ignore_signals()) {
            let written = document
                .update(&self.client, [record.clone()], options)
                .await?;
            self.notify(document, options.action, &written);
            response.merge(written);
        }

        Ok(response)
    }

    /// Deletes the documents rooted on the record's type.
    pub async fn delete(
        &self,
        record: &RecordRef,
        options: &UpdateOptions,
    ) -> SyncResult<BulkResponse> {
        let options = options.clone().with_action(ActionKind::Delete);
        self.update(record, &options).await
    }

    /// Deletes the documents of a record that can no longer be loaded.
    pub async fn delete_by_key(
        &self,
        record_type: &RecordType,
        key: &PrimaryKey,
        options: &UpdateOptions,
    ) -> SyncResult<BulkResponse> {
        let mut response = BulkResponse::default();
        if !self.settings.autosync {
            return Ok(response);
        }

        let Some(documents) = self.models.get(record_type) else {
            return Ok(response);
        };

        let options = options.clone().with_action(ActionKind::Delete);
        for document in documents.iter().filter(|d| !d.ignore_signals()) {
            let actions: Vec<BulkAction> = vec![document.delete_key_action(key.clone())];
            let written = document.submit(&self.client, actions, &options).await?;
            self.notify(document, ActionKind::Delete, &written);
            response.merge(written);
        }

        Ok(response)
    }

    /// Re-indexes the documents that embed data from `record`.
    ///
    /// Each referencing document is visited once, however many of its related
    /// types match. Documents with `ignore_signals` are skipped.
    ///
    /// Propagation is a single hop: the re-indexed documents do not trigger
    /// their own related updates, so related declarations may form cycles.
    pub async fn update_related(
        &self,
        record: &RecordRef,
        options: &UpdateOptions,
    ) -> SyncResult<BulkResponse> {
        let options = UpdateOptions {
            action: ActionKind::Index,
            ignore: None,
            ..options.clone()
        };
        self.propagate_related(record, &options).await
    }

    /// Re-indexes the documents that embed data from `record`, leaving it out.
    ///
    /// Called before `record` is removed: referencing documents are refreshed
    /// to drop the stale reference, never deleted.
    pub async fn delete_related(
        &self,
        record: &RecordRef,
        options: &UpdateOptions,
    ) -> SyncResult<BulkResponse> {
        let options = UpdateOptions {
            action: ActionKind::Index,
            ignore: Some(record.clone()),
            ..options.clone()
        };
        self.propagate_related(record, &options).await
    }

    async fn propagate_related(
        &self,
        record: &RecordRef,
        options: &UpdateOptions,
    ) -> SyncResult<BulkResponse> {
        let mut response = BulkResponse::default();
        if !self.settings.autosync {
            return Ok(response);
        }

        for document in self.related_documents(record.record_type()) {
            if document.ignore_signals() {
                continue;
            }
            let Some(related) = self.instances_from_related(&document, record).await? else {
                continue;
            };

            let written = document.update(&self.client, related, options).await?;
            self.notify(&document, options.action, &written);
            response.merge(written);
        }

        Ok(response)
    }

    /// Resolves the root records of `document` that embed `related`.
    ///
    /// A vanished record is treated as nothing to do. Duplicate records are
    /// collapsed. Returns `None` when there is nothing to write.
    pub async fn instances_from_related(
        &self,
        document: &Document,
        related: &RecordRef,
    ) -> SyncResult<Option<Vec<RecordRef>>> {
        let found = match document.instances_from_related(related).await {
            Ok(found) => found,
            Err(e) if e.is_does_not_exist() => {
                debug!(
                    document = %document.name(),
                    related = %related.record_key(),
                    "Related record vanished, nothing to update"
                );
                None
            }
            Err(e) => return Err(e),
        };

        Ok(found.map(|records| {
            let mut seen = HashSet::new();
            records
                .into_iter()
                .filter(|r| seen.insert(r.record_key()))
                .collect()
        }))
    }

    /// Writes records to one named document.
    pub async fn update_document(
        &self,
        name: &str,
        records: Vec<RecordRef>,
        options: &UpdateOptions,
    ) -> SyncResult<BulkResponse> {
        let document = self
            .document(name)
            .ok_or_else(|| TaskError::UnknownDocument {
                document: name.to_string(),
            })?;

        let written = document.update(&self.client, records, options).await?;
        self.notify(&document, options.action, &written);
        Ok(written)
    }

    fn notify(&self, document: &Document, action: ActionKind, response: &BulkResponse) {
        // No subscribers is fine.
        let _ = self.update_tx.send(IndexNotification {
            document: document.name().to_string(),
            index: document.index().name().to_string(),
            action,
            success: response.success,
            failed: response.failed(),
        });
    }

    /// Returns every document, or the documents rooted on `record_types`.
    pub fn get_documents(&self, record_types: Option<&[RecordType]>) -> BTreeSet<Arc<Document>> {
        match record_types {
            Some(types) => types
                .iter()
                .filter_map(|t| self.models.get(t))
                .flatten()
                .cloned()
                .collect(),
            None => self.index_documents.values().flatten().cloned().collect(),
        }
    }

    /// Returns every record type with a document rooted on it.
    pub fn get_models(&self) -> BTreeSet<RecordType> {
        self.models.keys().cloned().collect()
    }

    /// Returns every index, or the indices hosting documents of `record_types`.
    pub fn get_indices(&self, record_types: Option<&[RecordType]>) -> BTreeSet<Arc<Index>> {
        match record_types {
            Some(types) => self
                .index_documents
                .iter()
                .filter(|(_, docs)| docs.iter().any(|d| types.contains(d.record_type())))
                .filter_map(|(name, _)| self.indices.get(name).cloned())
                .collect(),
            None => self.indices.values().cloned().collect(),
        }
    }

    /// Returns a document by name.
    pub fn document(&self, name: &str) -> Option<Arc<Document>> {
        self.by_name.get(name).cloned()
    }

    /// Returns the documents that reference `record_type` as a related type.
    pub fn related_documents(&self, record_type: &RecordType) -> BTreeSet<Arc<Document>> {
        self.related_models
            .get(record_type)
            .cloned()
            .unwrap_or_default()
    }

    /// Subscribes to write notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<IndexNotification> {
        self.update_tx.subscribe()
    }
}

impl std::fmt::Debug for DocumentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentRegistry")
            .field("client", &self.client.client_name())
            .field("documents", &self.by_name.keys().collect::<Vec<_>>())
            .field("indices", &self.indices.keys().collect::<Vec<_>>())
            .field("autosync", &self.settings.autosync)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::MemorySearchClient;
    use crate::document::DocumentBuilder;
    use crate::error::{SourceError, SyncError};
    use crate::fields::Field;
    use crate::record::{AttributeKind, DynamicRecord, RecordSchema, SchemaCatalog};
    use serde_json::json;

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::new()
            .with_schema(
                RecordSchema::new("Car")
                    .with_attribute("name", AttributeKind::Char)
                    .with_attribute("manufacturer", AttributeKind::ForeignKey("Manufacturer".into())),
            )
            .with_schema(RecordSchema::new("Manufacturer").with_attribute("name", AttributeKind::Char))
            .with_schema(RecordSchema::new("Ad").with_attribute("title", AttributeKind::Char))
    }

    fn car(id: i64) -> RecordRef {
        DynamicRecord::new("Car", id)
            .with_attribute("name", format!("car-{}", id))
            .into_ref()
    }

    fn registry(settings: SyncSettings) -> (DocumentRegistry, Arc<MemorySearchClient>) {
        let client = Arc::new(MemorySearchClient::new());
        (DocumentRegistry::new(settings, client.clone()), client)
    }

    fn car_document(name: &str, index: &str) -> DocumentBuilder {
        DocumentBuilder::new(name, Index::new(index), "Car").field("name", Field::text())
    }

    #[test]
    fn test_register_shares_index_by_name() {
        let mut settings = SyncSettings::default();
        settings
            .default_index_settings
            .insert("number_of_replicas".to_string(), json!(0));
        let (mut registry, _) = registry(settings);

        let a = registry
            .register(
                DocumentBuilder::new("CarDocument", Index::new("cars").with_setting("number_of_shards", 1), "Car")
                    .build(&catalog())
                    .unwrap(),
            )
            .unwrap();
        let b = registry
            .register(car_document("CarSummary", "cars").build(&catalog()).unwrap())
            .unwrap();

        assert!(Arc::ptr_eq(a.index(), b.index()));
        assert_eq!(registry.get_indices(None).len(), 1);
        assert_eq!(a.index().settings()["number_of_replicas"], json!(0));
        assert_eq!(a.index().settings()["number_of_shards"], json!(1));
        assert_eq!(registry.get_documents(None).len(), 2);
    }

    #[test]
    fn test_duplicate_document() {
        let (mut registry, _) = registry(SyncSettings::default());
        registry
            .register(car_document("CarDocument", "cars").build(&catalog()).unwrap())
            .unwrap();
        let err = registry
            .register(car_document("CarDocument", "cars").build(&catalog()).unwrap())
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::Declaration(DeclarationError::DuplicateDocument { .. })
        ));
    }

    #[test]
    fn test_read_accessors() {
        let (mut registry, _) = registry(SyncSettings::default());
        registry
            .register(car_document("CarDocument", "cars").build(&catalog()).unwrap())
            .unwrap();
        registry
            .register(
                DocumentBuilder::new("AdDocument", Index::new("ads"), "Ad")
                    .build(&catalog())
                    .unwrap(),
            )
            .unwrap();

        let models: Vec<String> = registry.get_models().iter().map(|t| t.to_string()).collect();
        assert_eq!(models, vec!["Ad", "Car"]);

        let docs = registry.get_documents(Some(&[RecordType::new("Car")]));
        assert_eq!(docs.len(), 1);
        assert_eq!(docs.iter().next().unwrap().name(), "CarDocument");

        let indices = registry.get_indices(Some(&[RecordType::new("Ad")]));
        assert_eq!(indices.iter().next().unwrap().name(), "ads");
        assert!(registry.get_documents(Some(&[RecordType::new("Manufacturer")])).is_empty());
    }

    #[test]
    fn test_inherits_pagination() {
        let settings = SyncSettings {
            pagination: Some(100),
            ..Default::default()
        };
        let (mut registry, _) = registry(settings);
        let inherited = registry
            .register(car_document("CarDocument", "cars").build(&catalog()).unwrap())
            .unwrap();
        let own = registry
            .register(
                car_document("CarSummary", "cars")
                    .pagination(5)
                    .build(&catalog())
                    .unwrap(),
            )
            .unwrap();

        assert_eq!(inherited.pagination(), Some(100));
        assert_eq!(own.pagination(), Some(5));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (mut registry, client) = registry(SyncSettings::default());
        registry
            .register(car_document("CarDocument", "cars").build(&catalog()).unwrap())
            .unwrap();

        let options = registry.default_options();
        registry.update(&car(1), &options).await.unwrap();
        assert_eq!(client.document_count("cars"), 1);

        registry.delete(&car(1), &options).await.unwrap();
        assert_eq!(client.document_count("cars"), 0);
        assert_eq!(client.actions()[1].op_type, ActionKind::Delete);
    }

    #[tokio::test]
    async fn test_autosync_disabled() {
        let settings = SyncSettings {
            autosync: false,
            ..Default::default()
        };
        let (mut registry, client) = registry(settings);
        registry
            .register(car_document("CarDocument", "cars").build(&catalog()).unwrap())
            .unwrap();

        let options = registry.default_options();
        registry.update(&car(1), &options).await.unwrap();
        registry.delete(&car(1), &options).await.unwrap();
        registry.update_related(&car(1), &options).await.unwrap();
        registry.delete_related(&car(1), &options).await.unwrap();
        registry
            .delete_by_key(&RecordType::new("Car"), &PrimaryKey::Int(1), &options)
            .await
            .unwrap();

        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_related_does_not_exist_is_nothing() {
        let (mut registry, client) = registry(SyncSettings::default());
        registry
            .register(
                car_document("CarDocument", "cars")
                    .related("Manufacturer")
                    .related_resolver(|related: &RecordRef| -> SyncResult<Option<Vec<RecordRef>>> {
                        Err(SourceError::DoesNotExist {
                            record_type: related.record_type().clone(),
                            key: related.primary_key(),
                        }
                        .into())
                    })
                    .build(&catalog())
                    .unwrap(),
            )
            .unwrap();

        let manufacturer = DynamicRecord::new("Manufacturer", 1).into_ref();
        let response = registry
            .update_related(&manufacturer, &registry.default_options())
            .await
            .unwrap();

        assert_eq!(response, BulkResponse::default());
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_related_results_are_deduplicated() {
        let (mut registry, client) = registry(SyncSettings::default());
        registry
            .register(
                car_document("CarDocument", "cars")
                    .related("Manufacturer")
                    .related_resolver(|_: &RecordRef| -> SyncResult<Option<Vec<RecordRef>>> {
                        Ok(Some(vec![car(1), car(2), car(1)]))
                    })
                    .build(&catalog())
                    .unwrap(),
            )
            .unwrap();

        let manufacturer = DynamicRecord::new("Manufacturer", 1).into_ref();
        let mut updates = registry.subscribe();
        registry
            .update_related(&manufacturer, &registry.default_options())
            .await
            .unwrap();

        assert_eq!(client.actions().len(), 2);
        let notification = updates.recv().await.unwrap();
        assert_eq!(notification.document, "CarDocument");
        assert_eq!(notification.success, 2);
    }
}
