//! Document store layer for PlanPilot data.
//!
//! The hosted document store is modelled as the [`DocumentStore`] trait:
//! hierarchical collections of JSON documents addressed by path
//! (`users/{uid}/goals/{gid}/milestones/{mid}/tasks`), with CRUD operations
//! and per-collection live subscriptions. A subscription delivers the full
//! current document set on registration and again after every mutation of
//! that collection; cancelling a subscription unregisters it synchronously,
//! so no further events are queued once `cancel` returns.
//!
//! [`LocalStore`] is the bundled implementation, persisting the document
//! tree as a single JSON file under the data directory.

pub mod local;

pub use local::LocalStore;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Errors surfaced by document store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("store not initialized at {0}")]
    NotInitialized(String),

    #[error("{0}")]
    Other(String),
}

/// Identifier for a live subscription.
pub type SubscriptionId = Uuid;

/// Canonical path to a collection in the document tree.
///
/// Paths always have an odd number of segments
/// (`users/u1/goals` has 3, `users/u1/goals/g1/milestones` has 5).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// The goals collection for a user.
    pub fn goals(user_id: &str) -> Self {
        Self(format!("users/{}/goals", user_id))
    }

    /// The milestones collection under a goal.
    pub fn milestones(user_id: &str, goal_id: &str) -> Self {
        Self(format!("users/{}/goals/{}/milestones", user_id, goal_id))
    }

    /// The tasks collection under a milestone.
    pub fn tasks(user_id: &str, goal_id: &str, milestone_id: &str) -> Self {
        Self(format!(
            "users/{}/goals/{}/milestones/{}/tasks",
            user_id, goal_id, milestone_id
        ))
    }

    /// Path to a document inside this collection.
    pub fn doc(&self, id: &str) -> DocPath {
        DocPath {
            collection: self.clone(),
            id: id.to_string(),
        }
    }

    /// The final path segment (the collection name).
    pub fn kind(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    /// The canonical slash-joined form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Path to a single document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPath {
    collection: CollectionPath,
    id: String,
}

impl DocPath {
    /// The containing collection.
    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    /// The document id.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Display for DocPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A document as observed from the store: its id plus its JSON fields.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    /// Deserialize into a model type, injecting the document id into the
    /// `id` field.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let mut data = self.data.clone();
        if let Some(obj) = data.as_object_mut() {
            obj.insert("id".to_string(), Value::String(self.id.clone()));
        }
        serde_json::from_value(data)
    }
}

/// A full-collection snapshot pushed to a subscriber.
#[derive(Debug, Clone)]
pub struct SnapshotEvent {
    /// The subscription this snapshot was delivered to
    pub subscription: SubscriptionId,
    /// The collection that changed
    pub path: CollectionPath,
    /// The complete current document set for the collection
    pub docs: Vec<Document>,
}

/// Cancellation handle for a live subscription.
///
/// Cancelling (or dropping) the handle unregisters the listener
/// synchronously; no event is queued after `cancel` returns.
pub struct SubscriptionHandle {
    id: SubscriptionId,
    path: CollectionPath,
    unregister: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionHandle {
    /// Build a handle around an unregister closure.
    pub fn new(
        id: SubscriptionId,
        path: CollectionPath,
        unregister: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            id,
            path,
            unregister: Some(Box::new(unregister)),
        }
    }

    /// The subscription id carried by every event from this subscription.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// The subscribed collection.
    pub fn path(&self) -> &CollectionPath {
        &self.path
    }

    /// Stop delivery. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(unregister) = self.unregister.take() {
            unregister();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("path", &self.path)
            .finish()
    }
}

/// Trait for hierarchical document stores with live subscriptions.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document with a store-assigned id. Returns the new id.
    async fn add_doc(&self, collection: &CollectionPath, data: Value) -> Result<String, StoreError>;

    /// Fetch a single document.
    async fn get_doc(&self, path: &DocPath) -> Result<Document, StoreError>;

    /// Fetch the full document set of a collection. Missing collections
    /// read as empty.
    async fn get_docs(&self, collection: &CollectionPath) -> Result<Vec<Document>, StoreError>;

    /// Shallow-merge `patch` fields into an existing document.
    async fn update_doc(&self, path: &DocPath, patch: Value) -> Result<(), StoreError>;

    /// Delete a document.
    async fn delete_doc(&self, path: &DocPath) -> Result<(), StoreError>;

    /// Register a live subscription on a collection. The current snapshot
    /// is queued immediately; every subsequent mutation of the collection
    /// queues a fresh one.
    fn subscribe(
        &self,
        collection: &CollectionPath,
        events: UnboundedSender<SnapshotEvent>,
    ) -> SubscriptionHandle;

    /// Number of currently registered subscriptions (bookkeeping for
    /// lifecycle tests).
    fn open_subscription_count(&self) -> usize;
}

/// Generate a unique ID for a document.
///
/// Format: `<prefix>-<4 hex chars>`
/// - Goal prefix: "gl"
/// - Milestone prefix: "ms"
/// - Task prefix: "tk"
pub fn generate_id(prefix: &str, seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(
        chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or(0)
            .to_le_bytes(),
    );
    let hash = hasher.finalize();
    let hash_hex = format!("{:x}", hash);
    format!("{}-{}", prefix, &hash_hex[..4])
}

/// Validate that an ID matches the expected format.
pub fn validate_id(id: &str, prefix: &str) -> crate::Result<()> {
    if !id.starts_with(&format!("{}-", prefix)) {
        return Err(crate::Error::InvalidId(format!(
            "ID must start with '{}-', got: {}",
            prefix, id
        )));
    }

    let suffix = &id[prefix.len() + 1..];
    if suffix.len() != 4 || !suffix.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(crate::Error::InvalidId(format!(
            "ID suffix must be 4 hex characters, got: {}",
            suffix
        )));
    }

    Ok(())
}

/// ID prefix for the documents of a collection, by collection name.
pub fn id_prefix(collection: &CollectionPath) -> &'static str {
    match collection.kind() {
        "goals" => "gl",
        "milestones" => "ms",
        "tasks" => "tk",
        _ => "dc",
    }
}
