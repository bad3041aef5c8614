//! Store Abstraction (§2 item 3, §6): partitioned document collections with
//! per-collection partition keys and optional TTL, consumed by every
//! repository in this crate. The real, durable implementation (Cosmos DB or
//! equivalent) is an external collaborator; this module only defines the
//! contract plus an in-memory reference implementation for tests and
//! single-process deployments.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },
    #[error("version conflict writing {collection}/{id}: expected {expected}, found {found}")]
    Conflict {
        collection: String,
        id: String,
        expected: u64,
        found: u64,
    },
    #[error("store backend error: {0}")]
    Backend(String),
}

/// One document as persisted by a `Store`. `version` backs the conditional
/// (ETag-style) writes required by §5's optimistic-concurrency rule.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: String,
    pub partition_key: String,
    pub version: u64,
    pub data: Value,
}

/// Document CRUD + query, partitioned, with optional TTL (§6).
///
/// `query`'s `sql`/`params` mirror the real store's SQL-like query language;
/// the in-memory reference implementation below only honors a partition-key
/// filter and ignores the query text, since interpreting arbitrary SQL is
/// squarely the out-of-scope durable store's job, not the core's.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(
        &self,
        collection: &str,
        id: &str,
        partition_key: &str,
    ) -> Result<Option<StoredDocument>, StoreError>;

    async fn upsert(
        &self,
        collection: &str,
        doc: StoredDocument,
    ) -> Result<StoredDocument, StoreError>;

    async fn query(
        &self,
        collection: &str,
        partition_key: Option<&str>,
        sql: &str,
        params: &Value,
    ) -> Result<Vec<StoredDocument>, StoreError>;

    async fn delete(&self, collection: &str, id: &str, partition_key: &str) -> Result<bool, StoreError>;

    /// Configure a collection's TTL in seconds. The reference implementation
    /// records it but does not evict: expiry enforcement (approvals via
    /// `expireApprovals`, instance retention) is the repositories' job, not
    /// the store's, per §4.6.
    async fn set_ttl(&self, collection: &str, seconds: i64);
}

#[derive(Default)]
struct Collection {
    docs: HashMap<(String, String), StoredDocument>,
    ttl_seconds: Option<i64>,
}

/// In-memory reference `Store`, guarded per-collection by a `RwLock` so
/// concurrent instance/approval writers serialize through conditional
/// writes rather than last-write-wins (§5).
#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get(
        &self,
        collection: &str,
        id: &str,
        partition_key: &str,
    ) -> Result<Option<StoredDocument>, StoreError> {
        let guard = self.collections.read().expect("store lock poisoned");
        Ok(guard
            .get(collection)
            .and_then(|c| c.docs.get(&(partition_key.to_string(), id.to_string())))
            .cloned())
    }

    async fn upsert(
        &self,
        collection: &str,
        doc: StoredDocument,
    ) -> Result<StoredDocument, StoreError> {
        let mut guard = self.collections.write().expect("store lock poisoned");
        let entry = guard.entry(collection.to_string()).or_default();
        let key = (doc.partition_key.clone(), doc.id.clone());

        if let Some(existing) = entry.docs.get(&key) {
            if existing.version != doc.version {
                return Err(StoreError::Conflict {
                    collection: collection.to_string(),
                    id: doc.id.clone(),
                    expected: doc.version,
                    found: existing.version,
                });
            }
        }

        let mut stored = doc;
        stored.version += 1;
        entry.docs.insert(key, stored.clone());
        Ok(stored)
    }

    async fn query(
        &self,
        collection: &str,
        partition_key: Option<&str>,
        _sql: &str,
        _params: &Value,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let guard = self.collections.read().expect("store lock poisoned");
        let Some(entry) = guard.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(entry
            .docs
            .values()
            .filter(|doc| partition_key.map_or(true, |pk| doc.partition_key == pk))
            .cloned()
            .collect())
    }

    async fn delete(&self, collection: &str, id: &str, partition_key: &str) -> Result<bool, StoreError> {
        let mut guard = self.collections.write().expect("store lock poisoned");
        Ok(guard
            .get_mut(collection)
            .map(|c| c.docs.remove(&(partition_key.to_string(), id.to_string())).is_some())
            .unwrap_or(false))
    }

    async fn set_ttl(&self, collection: &str, seconds: i64) {
        let mut guard = self.collections.write().expect("store lock poisoned");
        guard.entry(collection.to_string()).or_default().ttl_seconds = Some(seconds);
    }
}

/// Collection names used by the repositories (§6).
pub mod collections {
    pub const DEFINITIONS: &str = "workflowDefinitions";
    pub const INSTANCES: &str = "workflowInstances";
    pub const TRIGGERS: &str = "workflowTriggers";
    pub const APPROVALS: &str = "workflowApprovals";
    pub const TEMPLATES: &str = "workflowTemplates";
    pub const CANVAS: &str = "workflowCanvas";
}
