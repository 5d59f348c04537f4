//! Local document store backend.
//!
//! Holds the full document tree in memory and optionally persists it as a
//! single JSON file (`documents.json`) in the data directory. Mutations are
//! applied under one lock and each one pushes a fresh full snapshot of the
//! touched collection to that collection's subscribers, which matches the
//! delivery contract of the hosted store this backend stands in for.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use super::{
    generate_id, id_prefix, CollectionPath, DocPath, Document, DocumentStore, SnapshotEvent,
    StoreError, SubscriptionHandle, SubscriptionId,
};

const STORE_FILE: &str = "documents.json";

/// Local JSON-file-backed document store with live subscriptions.
#[derive(Clone)]
pub struct LocalStore {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
    /// File the document tree is persisted to; `None` for in-memory stores
    persist: Option<PathBuf>,
}

#[derive(Default)]
struct State {
    /// collection path -> document id -> fields
    collections: BTreeMap<String, BTreeMap<String, Value>>,
    /// collection path -> registered listeners
    subscribers: HashMap<String, Vec<Subscriber>>,
}

struct Subscriber {
    id: SubscriptionId,
    tx: UnboundedSender<SnapshotEvent>,
}

impl LocalStore {
    /// Create a store with no persistence (tests, sync engine unit tests).
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                persist: None,
            }),
        }
    }

    /// Initialize a persistent store in the given data directory.
    pub fn init(data_dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(data_dir)?;
        let file = data_dir.join(STORE_FILE);
        if !file.exists() {
            fs::write(&file, "{}")?;
        }
        Self::open(data_dir)
    }

    /// Open an existing persistent store.
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        let file = data_dir.join(STORE_FILE);
        if !file.exists() {
            return Err(StoreError::NotInitialized(data_dir.display().to_string()));
        }
        let raw = fs::read_to_string(&file)?;
        let collections: BTreeMap<String, BTreeMap<String, Value>> = serde_json::from_str(&raw)?;
        Ok(Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    collections,
                    subscribers: HashMap::new(),
                }),
                persist: Some(file),
            }),
        })
    }

    /// Check whether a persistent store exists in the data directory.
    pub fn exists(data_dir: &Path) -> bool {
        data_dir.join(STORE_FILE).exists()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // Subscriber sends never panic, so the lock cannot be poisoned by
        // store code; recover rather than propagate if a caller did.
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn save(&self, state: &State) -> Result<(), StoreError> {
        if let Some(file) = &self.inner.persist {
            let raw = serde_json::to_string_pretty(&state.collections)?;
            fs::write(file, raw)?;
        }
        Ok(())
    }

    /// Push the current snapshot of `collection` to its subscribers.
    fn notify(state: &mut State, collection: &CollectionPath) {
        let docs = snapshot_docs(state, collection);
        if let Some(subs) = state.subscribers.get_mut(collection.as_str()) {
            // A closed receiver just means the consumer went away.
            subs.retain(|sub| {
                sub.tx
                    .send(SnapshotEvent {
                        subscription: sub.id,
                        path: collection.clone(),
                        docs: docs.clone(),
                    })
                    .is_ok()
            });
        }
    }
}

fn snapshot_docs(state: &State, collection: &CollectionPath) -> Vec<Document> {
    state
        .collections
        .get(collection.as_str())
        .map(|docs| {
            docs.iter()
                .map(|(id, data)| Document {
                    id: id.clone(),
                    data: data.clone(),
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl DocumentStore for LocalStore {
    async fn add_doc(&self, collection: &CollectionPath, data: Value) -> Result<String, StoreError> {
        let mut state = self.lock();
        let docs = state
            .collections
            .entry(collection.as_str().to_string())
            .or_default();

        let prefix = id_prefix(collection);
        let mut id = generate_id(prefix, collection.as_str());
        while docs.contains_key(&id) {
            id = generate_id(prefix, &id);
        }
        docs.insert(id.clone(), data);

        self.save(&state)?;
        Self::notify(&mut state, collection);
        Ok(id)
    }

    async fn get_doc(&self, path: &DocPath) -> Result<Document, StoreError> {
        let state = self.lock();
        state
            .collections
            .get(path.collection().as_str())
            .and_then(|docs| docs.get(path.id()))
            .map(|data| Document {
                id: path.id().to_string(),
                data: data.clone(),
            })
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn get_docs(&self, collection: &CollectionPath) -> Result<Vec<Document>, StoreError> {
        let state = self.lock();
        Ok(snapshot_docs(&state, collection))
    }

    async fn update_doc(&self, path: &DocPath, patch: Value) -> Result<(), StoreError> {
        let mut state = self.lock();
        let doc = state
            .collections
            .get_mut(path.collection().as_str())
            .and_then(|docs| docs.get_mut(path.id()))
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;

        match (doc.as_object_mut(), patch.as_object()) {
            (Some(fields), Some(updates)) => {
                for (key, value) in updates {
                    fields.insert(key.clone(), value.clone());
                }
            }
            _ => *doc = patch,
        }

        self.save(&state)?;
        Self::notify(&mut state, path.collection());
        Ok(())
    }

    async fn delete_doc(&self, path: &DocPath) -> Result<(), StoreError> {
        let mut state = self.lock();
        let removed = state
            .collections
            .get_mut(path.collection().as_str())
            .and_then(|docs| docs.remove(path.id()));
        if removed.is_none() {
            return Err(StoreError::NotFound(path.to_string()));
        }

        self.save(&state)?;
        Self::notify(&mut state, path.collection());
        Ok(())
    }

    fn subscribe(
        &self,
        collection: &CollectionPath,
        events: UnboundedSender<SnapshotEvent>,
    ) -> SubscriptionHandle {
        let id = Uuid::new_v4();
        let mut state = self.lock();

        // Queue the current snapshot right away, then register for changes.
        let _ = events.send(SnapshotEvent {
            subscription: id,
            path: collection.clone(),
            docs: snapshot_docs(&state, collection),
        });
        state
            .subscribers
            .entry(collection.as_str().to_string())
            .or_default()
            .push(Subscriber { id, tx: events });
        drop(state);

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let path_key = collection.as_str().to_string();
        SubscriptionHandle::new(id, collection.clone(), move || {
            if let Some(inner) = weak.upgrade() {
                let mut state = inner
                    .state
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                if let Some(subs) = state.subscribers.get_mut(&path_key) {
                    subs.retain(|sub| sub.id != id);
                }
            }
        })
    }

    fn open_subscription_count(&self) -> usize {
        let state = self.lock();
        state.subscribers.values().map(|subs| subs.len()).sum()
    }
}
