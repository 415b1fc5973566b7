//! Document descriptors.
//!
//! A [`Document`] binds a set of named fields to one root record type and an
//! index. Documents are declared with a [`DocumentBuilder`] and compiled once:
//! every field's preparation step is chosen at build time, in this order:
//!
//! 1. an override registered with [`DocumentBuilder::prepare_field_with_related`]
//! 2. an override registered with [`DocumentBuilder::prepare_field`]
//! 3. extraction along the field's path
//!
//! A compiled document is immutable and is shared by the registry behind an
//! `Arc`.

mod builder;
mod index;
mod options;
mod pagination;
mod resolver;

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::bulk::{ActionKind, BulkAction, BulkOptions, BulkResponse, SearchClient, bulk, parallel_bulk};
use crate::config::Refresh;
use crate::error::SyncResult;
use crate::fields::Field;
use crate::record::{PrimaryKey, RecordQuery, RecordRef, RecordSource, RecordType};

pub use builder::DocumentBuilder;
pub use index::Index;
pub use options::{IndexingScope, UpdateOptions};
pub use pagination::RecordPager;
pub use resolver::{PathResolver, RelatedResolver};

/// Full manual override of a field's value.
pub type RecordPreparer = Arc<dyn Fn(&RecordRef) -> SyncResult<Value> + Send + Sync>;

/// Override of a field's value that also receives the related record being removed.
pub type RelatedPreparer =
    Arc<dyn Fn(&RecordRef, Option<&RecordRef>) -> SyncResult<Value> + Send + Sync>;

type QuerysetHook = Arc<dyn Fn(RecordQuery) -> RecordQuery + Send + Sync>;
type ShouldIndex = Arc<dyn Fn(&RecordRef) -> bool + Send + Sync>;

#[derive(Clone)]
enum PrepareStep {
    WithRelated(RelatedPreparer),
    Record(RecordPreparer),
    Extract,
}

/// A compiled field: its name, descriptor and preparation step.
#[derive(Clone)]
pub struct PreparedField {
    name: String,
    field: Field,
    step: PrepareStep,
}

impl PreparedField {
    /// The document field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field descriptor.
    pub fn field(&self) -> &Field {
        &self.field
    }

    /// Where the value comes from: `with_related`, `override` or `path`.
    pub fn source(&self) -> &'static str {
        match self.step {
            PrepareStep::WithRelated(_) => "with_related",
            PrepareStep::Record(_) => "override",
            PrepareStep::Extract => "path",
        }
    }

    fn prepare(&self, record: &RecordRef, ignore: Option<&RecordRef>) -> SyncResult<Value> {
        match &self.step {
            PrepareStep::WithRelated(preparer) => preparer(record, ignore),
            PrepareStep::Record(preparer) => preparer(record),
            PrepareStep::Extract => {
                let ignore_key = ignore.map(|r| r.record_key());
                self.field.extract(record, &self.name, ignore_key.as_ref())
            }
        }
    }
}

impl fmt::Debug for PreparedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedField")
            .field("name", &self.name)
            .field("field", &self.field)
            .field("source", &self.source())
            .finish()
    }
}

/// A compiled document descriptor.
///
/// Documents are identified by name.
pub struct Document {
    name: String,
    index: Arc<Index>,
    record_type: RecordType,
    fields: Vec<PreparedField>,
    related: BTreeSet<RecordType>,
    ignore_signals: bool,
    auto_refresh: Option<Refresh>,
    pagination: Option<usize>,
    queryset: Option<QuerysetHook>,
    resolver: Option<Arc<dyn RelatedResolver>>,
    should_index: Option<ShouldIndex>,
}

impl Document {
    /// The document name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The index hosting this document.
    pub fn index(&self) -> &Arc<Index> {
        &self.index
    }

    /// The root record type.
    pub fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    /// The compiled fields, in declaration order.
    pub fn fields(&self) -> &[PreparedField] {
        &self.fields
    }

    /// Record types whose mutations recompute this document.
    pub fn related_types(&self) -> &BTreeSet<RecordType> {
        &self.related
    }

    /// Whether automatic propagation is disabled.
    pub fn ignore_signals(&self) -> bool {
        self.ignore_signals
    }

    /// The document's refresh policy, if set.
    pub fn auto_refresh(&self) -> Option<Refresh> {
        self.auto_refresh
    }

    /// Chunk size for bulk iteration.
    pub fn pagination(&self) -> Option<usize> {
        self.pagination
    }

    /// Binds the document to a shared index and fills in the default pagination.
    pub(crate) fn bind(mut self, index: Arc<Index>, default_pagination: Option<usize>) -> Self {
        self.index = index;
        self.pagination = self.pagination.or(default_pagination);
        self
    }

    /// Prepares the payload of a record.
    pub fn prepare(&self, record: &RecordRef) -> SyncResult<Map<String, Value>> {
        self.prepare_ignoring(record, None)
    }

    /// Prepares the payload of a record, leaving `ignore` out of related values.
    pub fn prepare_ignoring(
        &self,
        record: &RecordRef,
        ignore: Option<&RecordRef>,
    ) -> SyncResult<Map<String, Value>> {
        let mut data = Map::new();
        for field in &self.fields {
            data.insert(field.name.clone(), field.prepare(record, ignore)?);
        }
        Ok(data)
    }

    /// Returns true if the record should be indexed.
    pub fn should_index_record(&self, record: &RecordRef) -> bool {
        self.should_index
            .as_ref()
            .is_none_or(|predicate| predicate(record))
    }

    /// The base query of the document's records.
    pub fn get_queryset(&self) -> RecordQuery {
        let query = RecordQuery::all(self.record_type.clone());
        match &self.queryset {
            Some(hook) => hook(query),
            None => query,
        }
    }

    /// Streams every record of the document in primary-key order.
    pub fn indexing_queryset(&self, source: Arc<dyn RecordSource>) -> RecordPager {
        self.indexing_queryset_scoped(source, &IndexingScope::default())
    }

    /// Streams the records of the document matching `scope`.
    pub fn indexing_queryset_scoped(
        &self,
        source: Arc<dyn RecordSource>,
        scope: &IndexingScope,
    ) -> RecordPager {
        let mut query = self.get_queryset();
        query.filters.extend(scope.filters.iter().cloned());
        query.excludes.extend(scope.excludes.iter().cloned());
        RecordPager::new(source, query, self.pagination, scope.max_records)
    }

    /// Returns the root records to recompute for a related record.
    ///
    /// Documents without a resolver have nothing to recompute.
    pub async fn instances_from_related(
        &self,
        related: &RecordRef,
    ) -> SyncResult<Option<Vec<RecordRef>>> {
        match &self.resolver {
            Some(resolver) => resolver.instances_from_related(related).await,
            None => Ok(None),
        }
    }

    /// Builds one bulk action per record.
    pub fn actions(
        &self,
        records: &[RecordRef],
        action: ActionKind,
        ignore: Option<&RecordRef>,
    ) -> SyncResult<Vec<BulkAction>> {
        let index = self.index.name();
        let mut actions = Vec::with_capacity(records.len());

        for record in records {
            if action != ActionKind::Delete && !self.should_index_record(record) {
                continue;
            }
            let id = record.primary_key();
            actions.push(match action {
                ActionKind::Delete => BulkAction::delete(index, id),
                ActionKind::Index => BulkAction::index(index, id, self.prepare_ignoring(record, ignore)?),
                ActionKind::Update => {
                    BulkAction::update(index, id, self.prepare_ignoring(record, ignore)?)
                }
            });
        }

        Ok(actions)
    }

    /// Builds a delete action for a primary key.
    pub fn delete_key_action(&self, key: PrimaryKey) -> BulkAction {
        BulkAction::delete(self.index.name(), key)
    }

    /// Resolves the refresh policy: explicit, then the document's, then `default`.
    pub fn resolve_refresh(&self, explicit: Option<Refresh>, default: Refresh) -> Refresh {
        explicit.or(self.auto_refresh).unwrap_or(default)
    }

    fn bulk_options(&self, options: &UpdateOptions) -> BulkOptions {
        BulkOptions {
            refresh: self.resolve_refresh(options.refresh, options.default_refresh),
            raise_on_error: options.raise_on_error,
            chunk_size: options
                .chunk_size
                .or(self.pagination)
                .unwrap_or(options.bulk_chunk_size),
            thread_count: options.thread_count,
        }
    }

    /// Submits pre-built actions with this document's options.
    pub async fn submit(
        &self,
        client: &Arc<dyn SearchClient>,
        actions: Vec<BulkAction>,
        options: &UpdateOptions,
    ) -> SyncResult<BulkResponse> {
        let bulk_options = self.bulk_options(options);
        if options.parallel {
            parallel_bulk(client.clone(), actions, &bulk_options).await
        } else {
            bulk(client.as_ref(), actions, &bulk_options).await
        }
    }

    /// Writes the documents of `records` to the search engine.
    pub async fn update(
        &self,
        client: &Arc<dyn SearchClient>,
        records: impl IntoIterator<Item = RecordRef>,
        options: &UpdateOptions,
    ) -> SyncResult<BulkResponse> {
        let records: Vec<RecordRef> = records.into_iter().collect();
        let actions = self.actions(&records, options.action, options.ignore.as_ref())?;

        debug!(
            document = %self.name,
            index = %self.index.name(),
            action = %options.action,
            records = records.len(),
            actions = actions.len(),
            "Updating documents"
        );

        self.submit(client, actions, options).await
    }

    /// Indexes every record of the document, chunk by chunk.
    pub async fn reindex(
        &self,
        client: &Arc<dyn SearchClient>,
        source: Arc<dyn RecordSource>,
        options: &UpdateOptions,
    ) -> SyncResult<BulkResponse> {
        self.reindex_scoped(client, source, &IndexingScope::default(), options)
            .await
    }

    /// Indexes the records of the document matching `scope`, chunk by chunk.
    pub async fn reindex_scoped(
        &self,
        client: &Arc<dyn SearchClient>,
        source: Arc<dyn RecordSource>,
        scope: &IndexingScope,
        options: &UpdateOptions,
    ) -> SyncResult<BulkResponse> {
        let mut pager = self.indexing_queryset_scoped(source, scope);
        let mut response = BulkResponse::default();
        let mut chunks = 0usize;

        while let Some(chunk) = pager.next_chunk().await? {
            chunks += 1;
            response.merge(self.update(client, chunk, options).await?);
        }

        info!(
            document = %self.name,
            index = %self.index.name(),
            chunks,
            indexed = response.success,
            failed = response.failed(),
            "Reindexed document"
        );

        Ok(response)
    }

    /// Renders the search-engine mapping of the document.
    pub fn mapping(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.field.mapping()))
            .collect();
        serde_json::json!({ "properties": properties })
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Document {}

impl Hash for Document {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for Document {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Document {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("name", &self.name)
            .field("index", &self.index.name())
            .field("record_type", &self.record_type)
            .field("fields", &self.fields)
            .field("related", &self.related)
            .field("ignore_signals", &self.ignore_signals)
            .field("auto_refresh", &self.auto_refresh)
            .field("pagination", &self.pagination)
            .finish()
    }
}
