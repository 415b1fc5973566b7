//! Collaborator implementations.
//!
//! # Available Backends
//!
//! | Backend | Feature | Description |
//! |---------|---------|-------------|
//! | Memory | always | In-process record source and recording search client |
//! | Elasticsearch | `elasticsearch` | Bulk writes through the official client |
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "elasticsearch")]
//! use helios_search_sync::backends::elasticsearch::{ElasticsearchClient, ElasticsearchConfig};
//!
//! # #[cfg(feature = "elasticsearch")]
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ElasticsearchClient::new(ElasticsearchConfig::default())?;
//! # Ok(())
//! # }
//! ```

pub mod memory;

#[cfg(feature = "elasticsearch")]
pub mod elasticsearch;
