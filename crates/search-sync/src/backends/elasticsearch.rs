//! Elasticsearch search client.
//!
//! Sends bulk actions as an NDJSON `_bulk` request through the official
//! client and reports per-item failures from the response `items`.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use elasticsearch::auth::Credentials;
use elasticsearch::cert::CertificateValidation;
use elasticsearch::http::request::JsonBody;
use elasticsearch::http::transport::{SingleNodeConnectionPool, TransportBuilder};
use elasticsearch::params::Refresh as EsRefresh;
use elasticsearch::{BulkParts, Elasticsearch};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::bulk::{ActionKind, BulkAction, BulkItemError, BulkResponse, SearchClient};
use crate::config::Refresh;
use crate::error::{BulkError, SyncResult};

/// Authentication configuration for Elasticsearch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ElasticsearchAuth {
    /// Basic username/password authentication.
    Basic {
        /// The username for basic auth.
        username: String,
        /// The password for basic auth.
        password: String,
    },
    /// Bearer token authentication.
    Bearer {
        /// The bearer token.
        token: String,
    },
}

/// Configuration for the Elasticsearch client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticsearchConfig {
    /// Node URLs (e.g., `["http://localhost:9200"]`).
    /// Currently uses the first node (single-node connection pool).
    pub nodes: Vec<String>,

    /// Request timeout in milliseconds (default: 30000).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Optional authentication.
    #[serde(default)]
    pub auth: Option<ElasticsearchAuth>,

    /// Whether to disable certificate validation (default: false).
    /// Only use for development/testing.
    #[serde(default)]
    pub disable_certificate_validation: bool,
}

fn default_request_timeout_ms() -> u64 {
    30000
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            nodes: vec!["http://localhost:9200".to_string()],
            request_timeout_ms: default_request_timeout_ms(),
            auth: None,
            disable_certificate_validation: false,
        }
    }
}

/// [`SearchClient`] backed by an Elasticsearch (or OpenSearch) cluster.
pub struct ElasticsearchClient {
    client: Elasticsearch,
    config: ElasticsearchConfig,
}

impl Debug for ElasticsearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticsearchClient")
            .field("nodes", &self.config.nodes)
            .field("request_timeout_ms", &self.config.request_timeout_ms)
            .finish_non_exhaustive()
    }
}

impl ElasticsearchClient {
    /// Creates a client from configuration.
    pub fn new(config: ElasticsearchConfig) -> SyncResult<Self> {
        let client = Self::build_client(&config)?;
        Ok(Self { client, config })
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ElasticsearchConfig {
        &self.config
    }

    fn build_client(config: &ElasticsearchConfig) -> SyncResult<Elasticsearch> {
        let url = config
            .nodes
            .first()
            .cloned()
            .unwrap_or_else(|| "http://localhost:9200".to_string());

        let parsed_url: elasticsearch::http::Url = url.parse().map_err(|e| BulkError::Client {
            message: format!("Invalid URL {}: {}", url, e),
        })?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);

        let mut builder = TransportBuilder::new(conn_pool)
            .timeout(Duration::from_millis(config.request_timeout_ms));

        if config.disable_certificate_validation {
            builder = builder.cert_validation(CertificateValidation::None);
        }

        if let Some(ref auth) = config.auth {
            builder = match auth {
                ElasticsearchAuth::Basic { username, password } => {
                    builder.auth(Credentials::Basic(username.clone(), password.clone()))
                }
                ElasticsearchAuth::Bearer { token } => {
                    builder.auth(Credentials::Bearer(token.clone()))
                }
            };
        }

        let transport = builder.build().map_err(|e| BulkError::Client {
            message: format!("Failed to build transport: {}", e),
        })?;

        Ok(Elasticsearch::new(transport))
    }
}

fn es_refresh(refresh: Refresh) -> EsRefresh {
    match refresh {
        Refresh::True => EsRefresh::True,
        Refresh::False => EsRefresh::False,
        Refresh::WaitFor => EsRefresh::WaitFor,
    }
}

/// Renders actions as alternating header and payload lines.
fn bulk_body(actions: &[BulkAction]) -> Vec<JsonBody<Value>> {
    let mut body = Vec::with_capacity(actions.len() * 2);
    for action in actions {
        let mut header = Map::new();
        header.insert(
            action.op_type.as_str().to_string(),
            json!({ "_index": action.index, "_id": action.id.to_string() }),
        );
        body.push(Value::Object(header).into());

        let source = action.source.clone().unwrap_or_default();
        match action.op_type {
            ActionKind::Index => body.push(Value::Object(source).into()),
            ActionKind::Update => body.push(json!({ "doc": source }).into()),
            ActionKind::Delete => {}
        }
    }
    body
}

/// Folds the response `items` into a [`BulkResponse`].
///
/// Items come back in request order. A delete of a missing document counts as
/// a success.
fn parse_items(actions: &[BulkAction], body: &Value) -> BulkResponse {
    let mut response = BulkResponse::default();
    let items = body
        .get("items")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for (action, item) in actions.iter().zip(items) {
        let result = item.get(action.op_type.as_str()).unwrap_or(item);
        let status = result
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok())
            .unwrap_or(500);

        let ok = (200..300).contains(&status)
            || (status == 404 && action.op_type == ActionKind::Delete);
        if ok {
            response.success += 1;
            continue;
        }

        let reason = result
            .get("error")
            .map(|e| {
                e.get("reason")
                    .and_then(Value::as_str)
                    .or_else(|| e.get("type").and_then(Value::as_str))
                    .map(String::from)
                    .unwrap_or_else(|| e.to_string())
            })
            .unwrap_or_else(|| format!("status {}", status));

        response.errors.push(BulkItemError {
            op_type: action.op_type,
            index: action.index.clone(),
            id: action.id.clone(),
            status,
            reason,
        });
    }

    response
}

#[async_trait]
impl SearchClient for ElasticsearchClient {
    fn client_name(&self) -> &'static str {
        "elasticsearch"
    }

    async fn bulk(&self, actions: Vec<BulkAction>, refresh: Refresh) -> SyncResult<BulkResponse> {
        let response = self
            .client
            .bulk(BulkParts::None)
            .refresh(es_refresh(refresh))
            .body(bulk_body(&actions))
            .send()
            .await
            .map_err(|e| BulkError::Client {
                message: format!("Failed to send bulk request: {}", e),
            })?;

        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BulkError::Client {
                message: format!("Bulk request failed (status {}): {}", status, body),
            }
            .into());
        }

        let body = response.json::<Value>().await.map_err(|e| BulkError::Client {
            message: format!("Failed to read bulk response: {}", e),
        })?;

        let parsed = parse_items(&actions, &body);
        tracing::debug!(
            actions = actions.len(),
            success = parsed.success,
            failed = parsed.failed(),
            "Bulk request completed"
        );
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::PrimaryKey;

    fn payload() -> Map<String, Value> {
        let mut source = Map::new();
        source.insert("name".to_string(), json!("208"));
        source
    }

    #[test]
    fn test_bulk_body_lines() {
        let actions = vec![
            BulkAction::index("cars", PrimaryKey::Int(1), payload()),
            BulkAction::update("cars", PrimaryKey::Int(2), payload()),
            BulkAction::delete("cars", PrimaryKey::Int(3)),
        ];
        assert_eq!(bulk_body(&actions).len(), 5);
    }

    #[test]
    fn test_parse_items() {
        let actions = vec![
            BulkAction::index("cars", PrimaryKey::Int(1), payload()),
            BulkAction::index("cars", PrimaryKey::Int(2), payload()),
            BulkAction::delete("cars", PrimaryKey::Int(3)),
        ];
        let body = json!({
            "errors": true,
            "items": [
                {"index": {"_index": "cars", "_id": "1", "status": 201}},
                {"index": {"_index": "cars", "_id": "2", "status": 400,
                    "error": {"type": "mapper_parsing_exception", "reason": "failed to parse field [name]"}}},
                {"delete": {"_index": "cars", "_id": "3", "status": 404, "result": "not_found"}}
            ]
        });

        let response = parse_items(&actions, &body);
        assert_eq!(response.success, 2);
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].id, PrimaryKey::Int(2));
        assert_eq!(response.errors[0].reason, "failed to parse field [name]");
    }

    #[test]
    fn test_default_config() {
        let config = ElasticsearchConfig::default();
        assert_eq!(config.nodes, vec!["http://localhost:9200"]);
        assert!(ElasticsearchClient::new(config).is_ok());
    }
}
