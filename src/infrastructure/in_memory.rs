use crate::domain::ports::RemoteStore;
use crate::domain::schema;
use crate::error::{AtmError, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// A successful write observed by the store, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub path: String,
    pub value: String,
}

#[derive(Default)]
struct Faults {
    bring_up: bool,
    writes: bool,
    unreadable: HashSet<String>,
    unlistable: HashSet<String>,
    unwritable: HashSet<String>,
}

/// A thread-safe in-memory blackboard.
///
/// Holds one JSON tree behind `Arc<RwLock<Value>>` so clones share state.
/// Besides serving as the store for batch runs it records every write and
/// can inject read, write and bring-up failures.
#[derive(Default, Clone)]
pub struct InMemoryRemoteStore {
    tree: Arc<RwLock<Value>>,
    faults: Arc<RwLock<Faults>>,
    history: Arc<RwLock<Vec<RecordedWrite>>>,
    reads: Arc<AtomicUsize>,
}

impl InMemoryRemoteStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Places `value` at `path` without recording a write.
    pub async fn insert(&self, path: &str, value: Value) {
        let mut tree = self.tree.write().await;
        assign(&mut tree, path, value);
    }

    /// Returns a copy of the subtree at `path`.
    pub async fn snapshot(&self, path: &str) -> Option<Value> {
        let tree = self.tree.read().await;
        lookup(&tree, path).filter(|v| !v.is_null()).cloned()
    }

    /// Returns the string stored at `path`, if any.
    pub async fn text(&self, path: &str) -> Option<String> {
        match self.snapshot(path).await? {
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }

    pub async fn writes(&self) -> Vec<RecordedWrite> {
        self.history.read().await.clone()
    }

    /// Values written to `path`, oldest first.
    pub async fn writes_to(&self, path: &str) -> Vec<String> {
        self.history
            .read()
            .await
            .iter()
            .filter(|w| w.path == path)
            .map(|w| w.value.clone())
            .collect()
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub async fn fail_bring_up(&self) {
        self.faults.write().await.bring_up = true;
    }

    pub async fn fail_writes(&self, failing: bool) {
        self.faults.write().await.writes = failing;
    }

    /// Makes every `get` of exactly `path` fail.
    pub async fn fail_reads_at(&self, path: &str) {
        self.faults
            .write()
            .await
            .unreadable
            .insert(schema::normalize(path));
    }

    /// Makes `get_keys` of exactly `collection` fail.
    pub async fn fail_listing_at(&self, collection: &str) {
        self.faults
            .write()
            .await
            .unlistable
            .insert(schema::normalize(collection));
    }

    /// Makes every `put` to `path` or below it fail.
    pub async fn fail_writes_under(&self, path: &str) {
        self.faults
            .write()
            .await
            .unwritable
            .insert(schema::normalize(path));
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn bring_up(&self) -> Result<()> {
        if self.faults.read().await.bring_up {
            return Err(AtmError::NetworkUnavailable(
                "in-memory store configured to refuse bring-up".into(),
            ));
        }
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Value>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.faults.read().await.unreadable.contains(&schema::normalize(path)) {
            return Err(AtmError::RemoteReadFailed {
                path: path.to_string(),
                reason: "injected read fault".into(),
            });
        }
        Ok(self.snapshot(path).await)
    }

    async fn get_keys(&self, collection: &str) -> Result<Vec<String>> {
        if self.faults.read().await.unlistable.contains(&schema::normalize(collection)) {
            return Err(AtmError::RemoteReadFailed {
                path: collection.to_string(),
                reason: "injected listing fault".into(),
            });
        }
        let tree = self.tree.read().await;
        Ok(match lookup(&tree, collection) {
            Some(Value::Object(children)) => children.keys().cloned().collect(),
            _ => Vec::new(),
        })
    }

    async fn put(&self, path: &str, value: &str) -> Result<()> {
        let refused = {
            let faults = self.faults.read().await;
            let path = schema::normalize(path);
            faults.writes
                || faults
                    .unwritable
                    .iter()
                    .any(|p| path == *p || path.starts_with(&format!("{p}/")))
        };
        if refused {
            return Err(AtmError::RemoteWriteFailed {
                path: path.to_string(),
                reason: "injected write fault".into(),
            });
        }
        {
            let mut tree = self.tree.write().await;
            assign(&mut tree, path, Value::String(value.to_string()));
        }
        self.history.write().await.push(RecordedWrite {
            path: schema::normalize(path),
            value: value.to_string(),
        });
        Ok(())
    }
}

fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    schema::segments(path).try_fold(root, |node, segment| node.get(segment))
}

pub(crate) fn assign(root: &mut Value, path: &str, value: Value) {
    let mut node = root;
    for segment in schema::segments(path) {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = &mut node[segment];
    }
    *node = value;
}
