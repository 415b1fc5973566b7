//! Error types for the search synchronization layer.
//!
//! Errors are split by the phase in which they occur:
//!
//! - declaration errors are raised while documents are built and registered
//!   (startup) and always indicate a programming error,
//! - field errors are raised while a record is flattened into a payload,
//! - source errors come from the record datastore,
//! - bulk errors come from the search engine,
//! - task errors come from deferred delivery.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

use crate::record::{PrimaryKey, RecordType};

/// The primary error type for all synchronization operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Registration-time schema errors
    #[error(transparent)]
    Declaration(#[from] DeclarationError),

    /// Field value extraction errors
    #[error(transparent)]
    Field(#[from] FieldError),

    /// Record datastore errors
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Search engine write errors
    #[error(transparent)]
    Bulk(#[from] BulkError),

    /// Deferred delivery errors
    #[error(transparent)]
    Task(#[from] TaskError),
}

impl SyncError {
    /// Returns true if this error reports a record that no longer exists.
    pub fn is_does_not_exist(&self) -> bool {
        matches!(self, SyncError::Source(SourceError::DoesNotExist { .. }))
    }

    /// Returns true if this error came from delivering writes to the search engine.
    ///
    /// Delivery errors are the only category the log-errors policy may tolerate.
    pub fn is_delivery(&self) -> bool {
        matches!(self, SyncError::Bulk(_))
    }
}

/// Errors raised while declaring and registering documents.
#[derive(Error, Debug)]
pub enum DeclarationError {
    /// A declared field collides with one inferred from the record attributes.
    #[error("cannot redeclare the field named '{field}' on {document}")]
    RedeclaredField { document: String, field: String },

    /// A record attribute has no known field kind.
    #[error("cannot convert record attribute '{attribute}' of {record_type} to a search field")]
    ModelFieldNotMapped {
        record_type: RecordType,
        attribute: String,
    },

    /// A field path does not resolve against the record schema graph.
    #[error("field '{field}' of {document}: path segment '{segment}' does not exist on {record_type}")]
    UnresolvablePath {
        document: String,
        field: String,
        segment: String,
        record_type: RecordType,
    },

    /// The record type has no schema in the catalog.
    #[error("no schema registered for record type {record_type}")]
    UnknownRecordType { record_type: RecordType },

    /// A document with the same name is already registered.
    #[error("document '{document}' is already registered")]
    DuplicateDocument { document: String },

    /// A preparation override names a field that is not declared.
    #[error("preparer for unknown field '{field}' on {document}")]
    UnknownPreparer { document: String, field: String },
}

/// Errors raised while extracting a field value from a record.
#[derive(Error, Debug)]
pub enum FieldError {
    /// A required path segment could not be resolved.
    #[error("failed lookup for key [{segment}] in {instance}")]
    VariableLookup { segment: String, instance: String },

    /// A preparation override failed.
    #[error("preparing field '{field}' failed: {message}")]
    Preparation { field: String, message: String },
}

/// Errors raised by the record datastore.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The record does not exist (anymore).
    #[error("record does not exist: {record_type}/{key}")]
    DoesNotExist {
        record_type: RecordType,
        key: PrimaryKey,
    },

    /// The datastore query failed.
    #[error("record query failed for {record_type}: {message}")]
    Query {
        record_type: RecordType,
        message: String,
    },
}

/// Errors raised while writing to the search engine.
#[derive(Error, Debug)]
pub enum BulkError {
    /// Some actions of a bulk request failed.
    #[error("{failed} document(s) failed to index: {first}")]
    PartialFailure { failed: usize, first: String },

    /// The client could not execute the request.
    #[error("search client error: {message}")]
    Client { message: String },

    /// A parallel submission worker did not complete.
    #[error("bulk worker failed: {message}")]
    WorkerPanicked { message: String },
}

/// Errors raised by deferred delivery.
#[derive(Error, Debug)]
pub enum TaskError {
    /// The task queue no longer accepts messages.
    #[error("task queue closed: {message}")]
    QueueClosed { message: String },

    /// A task references a document that is not registered.
    #[error("task references unknown document '{document}'")]
    UnknownDocument { document: String },
}

/// Result type for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FieldError::VariableLookup {
            segment: "country_code".to_string(),
            instance: "Manufacturer/1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed lookup for key [country_code] in Manufacturer/1"
        );

        let err = DeclarationError::RedeclaredField {
            document: "CarDocument".to_string(),
            field: "name".to_string(),
        };
        assert!(err.to_string().contains("redeclare"));
    }

    #[test]
    fn test_error_conversion() {
        let err: SyncError = SourceError::DoesNotExist {
            record_type: RecordType::new("Car"),
            key: PrimaryKey::Int(7),
        }
        .into();
        assert!(err.is_does_not_exist());
        assert!(!err.is_delivery());
        assert_eq!(err.to_string(), "record does not exist: Car/7");

        let err: SyncError = BulkError::Client {
            message: "connection refused".to_string(),
        }
        .into();
        assert!(err.is_delivery());
    }
}
