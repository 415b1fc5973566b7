//! Helios Search Sync
//!
//! This crate keeps search-engine documents in sync with relational records.
//! Documents declare which record attributes they index and how; the registry
//! routes every record mutation to the documents it affects, including
//! documents that embed data from related records, and submits bulk writes to
//! the search engine.
//!
//! # Features
//!
//! - **Declarative documents**: field paths through relations, object and
//!   nested fields, per-field overrides, fields inferred from record schemas
//! - **Related propagation**: a change to a related record re-indexes every
//!   document that embeds it, and a pending delete drops the stale reference
//! - **Bulk writes**: sequential or parallel chunked submission with a
//!   configurable partial-failure policy
//! - **Delivery modes**: synchronous, or deferred through a task queue and a
//!   background worker
//!
//! Enable the Elasticsearch client with a feature flag in `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! helios-search-sync = { version = "0.1", features = ["elasticsearch"] }
//! ```
//!
//! # Architecture
//!
//! - [`record`] - Records, schemas and the record source collaborator
//! - [`fields`] - Field descriptors and value extraction
//! - [`document`] - Document declaration, preparation and reindexing
//! - [`bulk`] - Bulk actions and the search client collaborator
//! - [`registry`] - The document registry
//! - [`signals`] - Mutation events and delivery modes
//! - [`backends`] - In-memory and Elasticsearch collaborators
//! - [`config`] - Settings and logging setup
//! - [`error`] - Error types for all operations
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use helios_search_sync::backends::memory::MemorySearchClient;
//! use helios_search_sync::document::{DocumentBuilder, Index};
//! use helios_search_sync::fields::Field;
//! use helios_search_sync::record::{AttributeKind, DynamicRecord, RecordSchema, SchemaCatalog};
//! use helios_search_sync::signals::{RealTimeProcessor, SignalProcessor};
//! use helios_search_sync::{DocumentRegistry, PrimaryKey, SyncSettings};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = SchemaCatalog::new()
//!     .with_schema(RecordSchema::new("Car").with_attribute("name", AttributeKind::Char));
//!
//! let client = Arc::new(MemorySearchClient::new());
//! let mut registry = DocumentRegistry::new(SyncSettings::default(), client.clone());
//! registry.register(
//!     DocumentBuilder::new("CarDocument", Index::new("cars"), "Car")
//!         .field("name", Field::text())
//!         .build(&catalog)?,
//! )?;
//!
//! let processor = RealTimeProcessor::new(Arc::new(registry));
//! let car = DynamicRecord::new("Car", 1).with_attribute("name", "208").into_ref();
//! processor.handle_save(&car).await?;
//!
//! assert_eq!(client.document("cars", &PrimaryKey::Int(1)).unwrap()["name"], "208");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod bulk;
pub mod config;
pub mod document;
pub mod error;
pub mod fields;
pub mod record;
pub mod registry;
pub mod signals;

// Re-export commonly used types at crate root
pub use config::{DeliveryMode, Refresh, SyncSettings};
pub use document::{Document, DocumentBuilder, Index, UpdateOptions};
pub use error::{SyncError, SyncResult};
pub use fields::Field;
pub use record::{PrimaryKey, Record, RecordKey, RecordRef, RecordSource, RecordType};
pub use registry::{DocumentRegistry, IndexNotification};

// Re-export collaborator traits
pub use bulk::{ActionKind, BulkAction, BulkResponse, SearchClient};
pub use signals::{MutationEvent, SignalProcessor};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
