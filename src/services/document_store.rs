// src/services/document_store.rs
use std::{cmp::Ordering, collections::HashMap, fmt::Debug, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

pub const FIELD_ID: &str = "$id";
pub const FIELD_CREATED_AT: &str = "$createdAt";
pub const FIELD_UPDATED_AT: &str = "$updatedAt";

const EVENT_BUFFER: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("document {id} not found in {collection}")]
    NotFound { collection: String, id: String },

    #[error("document data must be a JSON object")]
    InvalidData,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "$collectionId")]
    pub collection: String,
    #[serde(rename = "$createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "$updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Document {
    /// Value of a field, with `$id` and the timestamps addressable by name.
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            FIELD_ID => Some(Value::String(self.id.clone())),
            FIELD_CREATED_AT => Some(Value::String(self.created_at.to_rfc3339())),
            FIELD_UPDATED_AT => Some(Value::String(self.updated_at.to_rfc3339())),
            _ => self.data.get(name).cloned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Query {
    Equal(String, Value),
    OrderAsc(String),
    OrderDesc(String),
    Limit(usize),
}

impl Query {
    pub fn equal(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::Equal(field.into(), value.into())
    }

    pub fn order_asc(field: impl Into<String>) -> Self {
        Query::OrderAsc(field.into())
    }

    pub fn order_desc(field: impl Into<String>) -> Self {
        Query::OrderDesc(field.into())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub collection: String,
    pub document_id: String,
    pub kind: ChangeKind,
}

/// Change notifications for a collection, or for one document in it.
pub struct Subscription {
    collection: String,
    document_id: Option<String>,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    fn matches(&self, event: &ChangeEvent) -> bool {
        event.collection == self.collection
            && self.document_id.as_ref().is_none_or(|id| *id == event.document_id)
    }

    /// Next matching event, or `None` once the store is gone.
    /// Lagged receivers skip the dropped events and keep going.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(collection = %self.collection, skipped, "subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Document storage with realtime change notification, as offered by a
/// managed backend.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create(&self, collection: &str, data: Value) -> Result<Document, StoreError>;
    async fn get(&self, collection: &str, id: &str) -> Result<Document, StoreError>;
    /// Shallow-merges `patch` into the stored data.
    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<Document, StoreError>;
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
    async fn list(&self, collection: &str, queries: &[Query]) -> Result<Vec<Document>, StoreError>;
    fn subscribe(&self, collection: &str) -> Subscription;
    fn subscribe_document(&self, collection: &str, id: &str) -> Subscription;
}

#[derive(Default)]
struct Collection {
    docs: HashMap<String, Document>,
    // insertion order, the default listing order
    order: Vec<String>,
}

#[derive(Clone)]
pub struct MemoryDocumentStore {
    inner: Arc<RwLock<HashMap<String, Collection>>>,
    events: broadcast::Sender<ChangeEvent>,
}

impl Debug for MemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDocumentStore")
            .field("subscribers", &self.events.receiver_count())
            .finish()
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self { inner: Arc::new(RwLock::new(HashMap::new())), events }
    }

    fn notify(&self, collection: &str, document_id: &str, kind: ChangeKind) {
        // No subscribers is not an error.
        let _ = self.events.send(ChangeEvent {
            collection: collection.to_string(),
            document_id: document_id.to_string(),
            kind,
        });
    }
}

fn into_object(data: Value) -> Result<Map<String, Value>, StoreError> {
    match data {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::InvalidData),
    }
}

fn not_found(collection: &str, id: &str) -> StoreError {
    StoreError::NotFound { collection: collection.to_string(), id: id.to_string() }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

fn apply_queries(mut docs: Vec<Document>, queries: &[Query]) -> Vec<Document> {
    for query in queries {
        if let Query::Equal(field, value) = query {
            docs.retain(|d| d.field(field).as_ref() == Some(value));
        }
    }

    let sort_keys: Vec<(&str, bool)> = queries
        .iter()
        .filter_map(|q| match q {
            Query::OrderAsc(f) => Some((f.as_str(), true)),
            Query::OrderDesc(f) => Some((f.as_str(), false)),
            _ => None,
        })
        .collect();

    if !sort_keys.is_empty() {
        // Timestamps compare as instants, not strings.
        docs.sort_by(|a, b| {
            for (field, asc) in &sort_keys {
                let ord = match *field {
                    FIELD_CREATED_AT => a.created_at.cmp(&b.created_at),
                    FIELD_UPDATED_AT => a.updated_at.cmp(&b.updated_at),
                    _ => compare_values(a.field(field).as_ref(), b.field(field).as_ref()),
                };
                let ord = if *asc { ord } else { ord.reverse() };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }

    if let Some(limit) = queries.iter().rev().find_map(|q| match q {
        Query::Limit(n) => Some(*n),
        _ => None,
    }) {
        docs.truncate(limit);
    }

    docs
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create(&self, collection: &str, data: Value) -> Result<Document, StoreError> {
        let data = into_object(data)?;
        let now = Utc::now();
        let doc = Document {
            id: Uuid::new_v4().to_string(),
            collection: collection.to_string(),
            created_at: now,
            updated_at: now,
            data,
        };

        {
            let mut guard = self.inner.write().await;
            let entry = guard.entry(collection.to_string()).or_default();
            entry.order.push(doc.id.clone());
            entry.docs.insert(doc.id.clone(), doc.clone());
        }

        self.notify(collection, &doc.id, ChangeKind::Created);
        Ok(doc)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Document, StoreError> {
        let guard = self.inner.read().await;
        guard
            .get(collection)
            .and_then(|c| c.docs.get(id))
            .cloned()
            .ok_or_else(|| not_found(collection, id))
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<Document, StoreError> {
        let patch = into_object(patch)?;
        let doc = {
            let mut guard = self.inner.write().await;
            let doc = guard
                .get_mut(collection)
                .and_then(|c| c.docs.get_mut(id))
                .ok_or_else(|| not_found(collection, id))?;
            doc.data.extend(patch);
            doc.updated_at = Utc::now();
            doc.clone()
        };

        self.notify(collection, id, ChangeKind::Updated);
        Ok(doc)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        {
            let mut guard = self.inner.write().await;
            let entry = guard.get_mut(collection).ok_or_else(|| not_found(collection, id))?;
            entry.docs.remove(id).ok_or_else(|| not_found(collection, id))?;
            entry.order.retain(|d| d != id);
        }

        self.notify(collection, id, ChangeKind::Deleted);
        Ok(())
    }

    async fn list(&self, collection: &str, queries: &[Query]) -> Result<Vec<Document>, StoreError> {
        let docs = {
            let guard = self.inner.read().await;
            match guard.get(collection) {
                Some(c) => c.order.iter().filter_map(|id| c.docs.get(id)).cloned().collect(),
                None => Vec::new(),
            }
        };
        Ok(apply_queries(docs, queries))
    }

    fn subscribe(&self, collection: &str) -> Subscription {
        Subscription { collection: collection.to_string(), document_id: None, rx: self.events.subscribe() }
    }

    fn subscribe_document(&self, collection: &str, id: &str) -> Subscription {
        Subscription {
            collection: collection.to_string(),
            document_id: Some(id.to_string()),
            rx: self.events.subscribe(),
        }
    }
}
