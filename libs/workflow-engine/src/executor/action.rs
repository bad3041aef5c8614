//! Per-`action.type` executors (§4.3's action table).

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use strata_domain::step::ActionType;

use crate::events::{EventEnvelope, Publisher};
use crate::store::{Store, StoredDocument};

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("HTTP_{0}")]
    HttpStatus(u16),
    #[error("HTTP_TIMEOUT")]
    HttpTimeout,
    #[error("HTTP_REQUEST_ERROR: {0}")]
    HttpRequest(String),
    #[error("EVENT_PUBLISH_ERROR: {0}")]
    EventPublish(String),
    #[error("STORE_ERROR: {0}")]
    Store(String),
    #[error("INVALID_CONFIG: {0}")]
    InvalidConfig(String),
}

impl ActionError {
    #[must_use]
    pub fn code(&self) -> String {
        match self {
            Self::HttpStatus(status) => format!("HTTP_{status}"),
            Self::HttpTimeout => "HTTP_TIMEOUT".to_string(),
            Self::HttpRequest(_) => "HTTP_REQUEST_ERROR".to_string(),
            Self::EventPublish(_) => "EVENT_PUBLISH_ERROR".to_string(),
            Self::Store(_) => "STORE_ERROR".to_string(),
            Self::InvalidConfig(_) => "INVALID_CONFIG".to_string(),
        }
    }
}

/// One action-type handler, resolved settings in, output value or error out.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, settings: &Value) -> Result<Value, ActionError>;
}

fn default_validate_status() -> Vec<u16> {
    vec![200, 201, 202, 204]
}

/// `http_request` (§4.3): URL/headers/body are already resolved by the
/// caller; this only builds and fires the request.
pub struct HttpRequestExecutor {
    client: reqwest::Client,
}

impl HttpRequestExecutor {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ActionExecutor for HttpRequestExecutor {
    async fn execute(&self, settings: &Value) -> Result<Value, ActionError> {
        let url = settings
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| ActionError::InvalidConfig("missing url".to_string()))?;
        let method = settings
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("GET")
            .to_uppercase();
        let timeout_seconds = settings.get("timeoutSeconds").and_then(Value::as_u64).unwrap_or(30);
        let validate_status: Vec<u16> = settings
            .get("validateStatus")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_u64().map(|n| n as u16)).collect())
            .unwrap_or_else(default_validate_status);

        let method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|_| ActionError::InvalidConfig(format!("invalid method {method}")))?;
        let mut request = self
            .client
            .request(method, url)
            .timeout(Duration::from_secs(timeout_seconds));

        if let Some(headers) = settings.get("headers").and_then(Value::as_object) {
            for (key, value) in headers {
                if let Some(v) = value.as_str() {
                    request = request.header(key.as_str(), v);
                }
            }
        }

        match settings.get("auth").and_then(Value::as_object) {
            Some(auth) if auth.get("type").and_then(Value::as_str) == Some("bearer") => {
                if let Some(token) = auth.get("token").and_then(Value::as_str) {
                    request = request.bearer_auth(token);
                }
            }
            Some(auth) if auth.get("type").and_then(Value::as_str) == Some("basic") => {
                let user = auth.get("username").and_then(Value::as_str).unwrap_or_default();
                let pass = auth.get("password").and_then(Value::as_str);
                request = request.basic_auth(user, pass);
            }
            Some(auth) if auth.get("type").and_then(Value::as_str) == Some("api-key") => {
                let header = auth.get("header").and_then(Value::as_str).unwrap_or("X-Api-Key");
                if let Some(key) = auth.get("key").and_then(Value::as_str) {
                    request = request.header(header, key);
                }
            }
            _ => {}
        }

        if let Some(body) = settings.get("body") {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ActionError::HttpTimeout
            } else {
                ActionError::HttpRequest(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if !validate_status.contains(&status) {
            return Err(ActionError::HttpStatus(status));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body_text = response.text().await.map_err(|e| ActionError::HttpRequest(e.to_string()))?;

        let body_value = if content_type.contains("json") {
            serde_json::from_str(&body_text).unwrap_or(Value::String(body_text))
        } else {
            Value::String(body_text)
        };

        Ok(serde_json::json!({ "status": status, "body": body_value }))
    }
}

/// `publish_event` (§4.3).
pub struct PublishEventExecutor {
    publisher: Arc<dyn Publisher>,
}

impl PublishEventExecutor {
    #[must_use]
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl ActionExecutor for PublishEventExecutor {
    async fn execute(&self, settings: &Value) -> Result<Value, ActionError> {
        let event_type = settings
            .get("eventType")
            .and_then(Value::as_str)
            .ok_or_else(|| ActionError::EventPublish("missing eventType".to_string()))?;
        let subject = settings.get("subject").and_then(Value::as_str).map(str::to_string);
        let data = settings.get("data").cloned().unwrap_or(Value::Null);
        let envelope = EventEnvelope::new(event_type, subject, data);
        self.publisher.publish(envelope.clone()).await;
        Ok(serde_json::to_value(&envelope).unwrap_or(Value::Null))
    }
}

/// `cosmos_query` / `cosmos_upsert` / `cosmos_delete` (§4.3): executed
/// against the injected [`Store`]. `cosmos_query`'s `sql`/`params` are
/// opaque to the in-memory reference store (see the store module docs).
pub struct StoreQueryExecutor {
    store: Arc<dyn Store>,
}

impl StoreQueryExecutor {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ActionExecutor for StoreQueryExecutor {
    async fn execute(&self, settings: &Value) -> Result<Value, ActionError> {
        let collection = settings
            .get("collection")
            .and_then(Value::as_str)
            .ok_or_else(|| ActionError::InvalidConfig("missing collection".to_string()))?;
        let partition_key = settings.get("partitionKey").and_then(Value::as_str);
        let query = settings.get("query").and_then(Value::as_str).unwrap_or_default();
        let params = settings.get("params").cloned().unwrap_or(Value::Null);

        let docs = self
            .store
            .query(collection, partition_key, query, &params)
            .await
            .map_err(|e| ActionError::Store(e.to_string()))?;

        let resources: Vec<Value> = docs.into_iter().map(|d| d.data).collect();
        Ok(serde_json::json!({ "resources": resources }))
    }
}

pub struct StoreUpsertExecutor {
    store: Arc<dyn Store>,
}

impl StoreUpsertExecutor {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ActionExecutor for StoreUpsertExecutor {
    async fn execute(&self, settings: &Value) -> Result<Value, ActionError> {
        let collection = settings
            .get("collection")
            .and_then(Value::as_str)
            .ok_or_else(|| ActionError::InvalidConfig("missing collection".to_string()))?;
        let partition_key = settings
            .get("partitionKey")
            .and_then(Value::as_str)
            .ok_or_else(|| ActionError::InvalidConfig("missing partitionKey".to_string()))?;
        let document = settings
            .get("document")
            .cloned()
            .ok_or_else(|| ActionError::InvalidConfig("missing document".to_string()))?;
        let id = document
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ActionError::InvalidConfig("document missing id".to_string()))?
            .to_string();
        let version = document.get("_version").and_then(Value::as_u64).unwrap_or(0);

        let stored = self
            .store
            .upsert(
                collection,
                StoredDocument {
                    id,
                    partition_key: partition_key.to_string(),
                    version,
                    data: document,
                },
            )
            .await
            .map_err(|e| ActionError::Store(e.to_string()))?;

        Ok(serde_json::json!({ "resource": stored.data }))
    }
}

pub struct StoreDeleteExecutor {
    store: Arc<dyn Store>,
}

impl StoreDeleteExecutor {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ActionExecutor for StoreDeleteExecutor {
    async fn execute(&self, settings: &Value) -> Result<Value, ActionError> {
        let collection = settings
            .get("collection")
            .and_then(Value::as_str)
            .ok_or_else(|| ActionError::InvalidConfig("missing collection".to_string()))?;
        let partition_key = settings
            .get("partitionKey")
            .and_then(Value::as_str)
            .ok_or_else(|| ActionError::InvalidConfig("missing partitionKey".to_string()))?;
        let id = settings
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ActionError::InvalidConfig("missing id".to_string()))?;

        self.store
            .delete(collection, id, partition_key)
            .await
            .map_err(|e| ActionError::Store(e.to_string()))?;

        Ok(serde_json::json!({ "deleted": true }))
    }
}

/// `send_command` / `send_notification` / `call_function` (§4.3): "the
/// core's contract is a no-op stub that returns success — actual delivery
/// lives in external collaborators."
pub struct NoopActionExecutor;

#[async_trait]
impl ActionExecutor for NoopActionExecutor {
    async fn execute(&self, settings: &Value) -> Result<Value, ActionError> {
        Ok(serde_json::json!({ "accepted": true, "settings": settings }))
    }
}

/// Dependencies the action dispatcher needs to build any executor.
#[derive(Clone)]
pub struct ActionDeps {
    pub http_client: reqwest::Client,
    pub publisher: Arc<dyn Publisher>,
    pub store: Arc<dyn Store>,
}

#[must_use]
pub fn create_action_executor(action_type: ActionType, deps: &ActionDeps) -> Box<dyn ActionExecutor> {
    match action_type {
        ActionType::HttpRequest => Box::new(HttpRequestExecutor::new(deps.http_client.clone())),
        ActionType::PublishEvent => Box::new(PublishEventExecutor::new(deps.publisher.clone())),
        ActionType::CosmosQuery => Box::new(StoreQueryExecutor::new(deps.store.clone())),
        ActionType::CosmosUpsert => Box::new(StoreUpsertExecutor::new(deps.store.clone())),
        ActionType::CosmosDelete => Box::new(StoreDeleteExecutor::new(deps.store.clone())),
        ActionType::SendCommand | ActionType::SendNotification | ActionType::CallFunction => {
            Box::new(NoopActionExecutor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn noop_executor_always_succeeds() {
        let executor = NoopActionExecutor;
        let result = executor.execute(&serde_json::json!({"to": "x"})).await.unwrap();
        assert_eq!(result["accepted"], Value::Bool(true));
    }

    #[tokio::test]
    async fn store_upsert_then_query_roundtrips() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let upsert = StoreUpsertExecutor::new(store.clone());
        let result = upsert
            .execute(&serde_json::json!({
                "collection": "c",
                "partitionKey": "p",
                "document": {"id": "1", "name": "hi"}
            }))
            .await
            .unwrap();
        assert_eq!(result["resource"]["name"], "hi");

        let query = StoreQueryExecutor::new(store.clone());
        let results = query
            .execute(&serde_json::json!({"collection": "c", "partitionKey": "p"}))
            .await
            .unwrap();
        assert_eq!(results["resources"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn store_delete_removes_document() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        StoreUpsertExecutor::new(store.clone())
            .execute(&serde_json::json!({
                "collection": "c", "partitionKey": "p", "document": {"id": "1"}
            }))
            .await
            .unwrap();
        let delete = StoreDeleteExecutor::new(store.clone());
        let result = delete
            .execute(&serde_json::json!({"collection": "c", "partitionKey": "p", "id": "1"}))
            .await
            .unwrap();
        assert_eq!(result["deleted"], Value::Bool(true));
    }
}
