//! Library-wide synchronization settings.
//!
//! Settings can be built programmatically, parsed from command line arguments
//! with [`SyncSettings::parse`], read from environment variables with
//! [`SyncSettings::from_env`], or deserialized from a configuration file.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SEARCH_SYNC_AUTOSYNC` | true | Propagate record mutations automatically |
//! | `SEARCH_SYNC_AUTO_REFRESH` | true | Refresh policy (`true`, `false`, `wait_for`) |
//! | `SEARCH_SYNC_INDEX_SETTINGS` | {} | Default index settings (JSON object) |
//! | `SEARCH_SYNC_PAGINATION` | unset | Default chunk size for bulk iteration |
//! | `SEARCH_SYNC_LOG_ERRORS` | false | Log autosync delivery errors instead of raising |
//! | `SEARCH_SYNC_DELIVERY` | synchronous | `synchronous` or `deferred` |
//! | `SEARCH_SYNC_BULK_CHUNK_SIZE` | 500 | Actions per parallel bulk request |
//! | `SEARCH_SYNC_BULK_THREADS` | 4 | Concurrent parallel bulk requests |
//! | `SEARCH_SYNC_LOG_LEVEL` | info | Log level |
//!
//! # Example
//!
//! ```rust
//! use helios_search_sync::config::{Refresh, SyncSettings};
//!
//! let settings = SyncSettings {
//!     auto_refresh: Refresh::WaitFor,
//!     pagination: Some(1000),
//!     ..Default::default()
//! };
//! assert!(settings.validate().is_ok());
//! ```

use std::fmt;
use std::str::FromStr;

use clap::{ArgAction, Parser, ValueEnum};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Index refresh policy applied to bulk writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Refresh {
    /// Refresh the affected shards immediately.
    #[default]
    True,
    /// Do not refresh.
    False,
    /// Block until the writes are visible, without forcing a refresh.
    WaitFor,
}

impl Refresh {
    /// Returns the wire value of the `refresh` parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Refresh::True => "true",
            Refresh::False => "false",
            Refresh::WaitFor => "wait_for",
        }
    }
}

impl fmt::Display for Refresh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Refresh {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Refresh::True),
            "false" | "0" | "no" => Ok(Refresh::False),
            "wait_for" | "wait-for" => Ok(Refresh::WaitFor),
            other => Err(format!(
                "invalid refresh policy '{}': expected true, false or wait_for",
                other
            )),
        }
    }
}

impl From<bool> for Refresh {
    fn from(value: bool) -> Self {
        if value { Refresh::True } else { Refresh::False }
    }
}

impl Serialize for Refresh {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Refresh::True => serializer.serialize_bool(true),
            Refresh::False => serializer.serialize_bool(false),
            Refresh::WaitFor => serializer.serialize_str("wait_for"),
        }
    }
}

impl<'de> Deserialize<'de> for Refresh {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Bool(bool),
            Str(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Bool(b) => Ok(b.into()),
            Repr::Str(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// How mutation events are delivered to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Handlers run inline with the mutation.
    #[default]
    Synchronous,
    /// Handlers enqueue a task processed by a background worker.
    Deferred,
}

/// Library-wide synchronization settings.
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "search-sync")]
#[command(about = "Search index synchronization settings")]
#[serde(default)]
pub struct SyncSettings {
    /// Propagate record mutations to the search engine automatically.
    #[arg(long, env = "SEARCH_SYNC_AUTOSYNC", default_value_t = true, action = ArgAction::Set)]
    pub autosync: bool,

    /// Refresh policy for writes (true, false, wait_for).
    #[arg(long, env = "SEARCH_SYNC_AUTO_REFRESH", default_value = "true")]
    pub auto_refresh: Refresh,

    /// Default index settings (JSON object), merged under per-index settings.
    #[arg(
        long,
        env = "SEARCH_SYNC_INDEX_SETTINGS",
        default_value = "{}",
        value_parser = parse_index_settings
    )]
    pub default_index_settings: Map<String, Value>,

    /// Default chunk size for bulk iteration; unset disables pagination.
    #[arg(long, env = "SEARCH_SYNC_PAGINATION")]
    pub pagination: Option<usize>,

    /// Log autosync delivery errors instead of propagating them.
    #[arg(long, env = "SEARCH_SYNC_LOG_ERRORS", default_value_t = false, action = ArgAction::Set)]
    pub log_errors: bool,

    /// Delivery mode for mutation events.
    #[arg(long, env = "SEARCH_SYNC_DELIVERY", value_enum, default_value = "synchronous")]
    pub delivery: DeliveryMode,

    /// Actions per request when submitting in parallel.
    #[arg(long, env = "SEARCH_SYNC_BULK_CHUNK_SIZE", default_value = "500")]
    pub bulk_chunk_size: usize,

    /// Concurrent requests when submitting in parallel.
    #[arg(long, env = "SEARCH_SYNC_BULK_THREADS", default_value = "4")]
    pub bulk_threads: usize,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "SEARCH_SYNC_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

fn parse_index_settings(raw: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("index settings must be a JSON object".to_string()),
        Err(e) => Err(format!("invalid index settings: {}", e)),
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            autosync: true,
            auto_refresh: Refresh::True,
            default_index_settings: Map::new(),
            pagination: None,
            log_errors: false,
            delivery: DeliveryMode::Synchronous,
            bulk_chunk_size: 500,
            bulk_threads: 4,
            log_level: "info".to_string(),
        }
    }
}

impl SyncSettings {
    /// Creates settings from environment variables only.
    ///
    /// Falls back to the defaults if any variable fails to parse.
    pub fn from_env() -> Self {
        Self::try_parse_from(["search-sync"]).unwrap_or_default()
    }

    /// Validates the settings and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.pagination == Some(0) {
            errors.push("Pagination size cannot be 0".to_string());
        }

        if self.bulk_chunk_size == 0 {
            errors.push("Bulk chunk size cannot be 0".to_string());
        }

        if self.bulk_threads == 0 {
            errors.push("Bulk threads cannot be 0".to_string());
        }

        if !["error", "warn", "info", "debug", "trace"].contains(&self.log_level.as_str()) {
            errors.push(format!("Unknown log level '{}'", self.log_level));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Creates settings suitable for testing.
    pub fn for_testing() -> Self {
        Self {
            log_level: "debug".to_string(),
            bulk_chunk_size: 2,
            bulk_threads: 2,
            ..Default::default()
        }
    }
}

/// Initializes the tracing subscriber with the given log level.
///
/// `RUST_LOG` takes precedence when set.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("helios_search_sync={}", level)));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_settings() {
        let settings = SyncSettings::default();
        assert!(settings.autosync);
        assert_eq!(settings.auto_refresh, Refresh::True);
        assert_eq!(settings.pagination, None);
        assert!(!settings.log_errors);
        assert_eq!(settings.delivery, DeliveryMode::Synchronous);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_parse_args() {
        let settings = SyncSettings::try_parse_from([
            "search-sync",
            "--autosync",
            "false",
            "--auto-refresh",
            "wait_for",
            "--pagination",
            "1000",
            "--delivery",
            "deferred",
            "--default-index-settings",
            r#"{"number_of_shards": 1}"#,
        ])
        .unwrap();

        assert!(!settings.autosync);
        assert_eq!(settings.auto_refresh, Refresh::WaitFor);
        assert_eq!(settings.pagination, Some(1000));
        assert_eq!(settings.delivery, DeliveryMode::Deferred);
        assert_eq!(settings.default_index_settings["number_of_shards"], json!(1));
    }

    #[test]
    fn test_invalid_index_settings() {
        let result = SyncSettings::try_parse_from([
            "search-sync",
            "--default-index-settings",
            "[1, 2]",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_invalid() {
        let settings = SyncSettings {
            pagination: Some(0),
            bulk_threads: 0,
            ..Default::default()
        };
        let errors = settings.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.contains("Pagination")));
    }

    #[test]
    fn test_refresh_serde() {
        assert_eq!(serde_json::to_value(Refresh::True).unwrap(), json!(true));
        assert_eq!(serde_json::to_value(Refresh::WaitFor).unwrap(), json!("wait_for"));
        assert_eq!(serde_json::from_value::<Refresh>(json!(false)).unwrap(), Refresh::False);
        assert_eq!(
            serde_json::from_value::<Refresh>(json!("wait_for")).unwrap(),
            Refresh::WaitFor
        );
        assert!(serde_json::from_value::<Refresh>(json!("sometimes")).is_err());
    }

    #[test]
    fn test_settings_deserialize_with_defaults() {
        let settings: SyncSettings =
            serde_json::from_value(json!({"auto_refresh": "wait_for", "log_errors": true})).unwrap();
        assert_eq!(settings.auto_refresh, Refresh::WaitFor);
        assert!(settings.log_errors);
        assert!(settings.autosync);
        assert_eq!(settings.bulk_chunk_size, 500);
    }
}
