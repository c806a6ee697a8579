use crate::domain::ports::RemoteStore;
use crate::domain::schema;
use crate::error::{AtmError, Result};
use crate::infrastructure::in_memory::assign;
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

/// Column Family holding one entry per leaf of the blackboard tree.
pub const CF_NODES: &str = "nodes";

/// A persistent blackboard backed by RocksDB.
///
/// Every leaf is stored under its normalized path (`/ATM/Users/k/balance`)
/// with a JSON-encoded value. Subtrees are rebuilt from a prefix scan, so a
/// directory record can be fetched in one `get` exactly like the remote
/// service returns it.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbRemoteStore {
    db: Arc<DB>,
}

impl RocksDbRemoteStore {
    /// Opens or creates a RocksDB instance at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_nodes = ColumnFamilyDescriptor::new(CF_NODES, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_nodes])?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Replaces the subtree at `path` with `value`, splitting objects into
    /// leaves. Used to seed directory records.
    pub fn insert(&self, path: &str, value: &Value) -> Result<()> {
        let cf = self.nodes()?;
        let root = schema::normalize(path);
        let mut batch = WriteBatch::default();
        self.clear_subtree(&mut batch, &root)?;

        let mut leaves = Vec::new();
        flatten(&root, value, &mut leaves);
        for (leaf_path, leaf) in leaves {
            batch.put_cf(cf, leaf_path.as_bytes(), serde_json::to_vec(&leaf)?);
        }
        self.db.write(batch)?;
        Ok(())
    }

    fn nodes(&self) -> Result<&ColumnFamily> {
        self.db.cf_handle(CF_NODES).ok_or_else(|| {
            AtmError::InternalError(Box::new(std::io::Error::other(
                "Nodes column family not found",
            )))
        })
    }

    fn leaves_under(&self, root: &str) -> Result<Vec<(String, Value)>> {
        let cf = self.nodes()?;
        let prefix = subtree_prefix(root);
        let mut leaves = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix.as_bytes(), Direction::Forward));

        for item in iter {
            let (key, value) = item?;
            let Ok(path) = std::str::from_utf8(&key) else {
                continue;
            };
            if !path.starts_with(&prefix) {
                break;
            }
            let leaf: Value = serde_json::from_slice(&value)?;
            leaves.push((path.to_string(), leaf));
        }
        Ok(leaves)
    }

    /// Stages deletes for every leaf below `root`, `root` itself, and any
    /// ancestor stored as a leaf.
    fn clear_subtree(&self, batch: &mut WriteBatch, root: &str) -> Result<()> {
        let cf = self.nodes()?;
        for (path, _) in self.leaves_under(root)? {
            batch.delete_cf(cf, path.as_bytes());
        }
        let mut ancestor = String::new();
        for segment in schema::segments(root) {
            ancestor.push('/');
            ancestor.push_str(segment);
            batch.delete_cf(cf, ancestor.as_bytes());
        }
        Ok(())
    }
}

fn subtree_prefix(root: &str) -> String {
    if root == "/" {
        "/".to_string()
    } else {
        format!("{}/", root)
    }
}

fn flatten(path: &str, value: &Value, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(children) if !children.is_empty() => {
            for (key, child) in children {
                flatten(&schema::child(path, key), child, out);
            }
        }
        Value::Null => {}
        leaf => out.push((path.to_string(), leaf.clone())),
    }
}

#[async_trait]
impl RemoteStore for RocksDbRemoteStore {
    async fn get(&self, path: &str) -> Result<Option<Value>> {
        let cf = self.nodes()?;
        let root = schema::normalize(path);

        if let Some(bytes) = self.db.get_cf(cf, root.as_bytes())? {
            return Ok(Some(serde_json::from_slice(&bytes)?));
        }

        let leaves = self.leaves_under(&root)?;
        if leaves.is_empty() {
            return Ok(None);
        }
        let prefix = subtree_prefix(&root);
        let mut tree = Value::Null;
        for (leaf_path, leaf) in leaves {
            assign(&mut tree, &leaf_path[prefix.len()..], leaf);
        }
        Ok(Some(tree))
    }

    async fn get_keys(&self, collection: &str) -> Result<Vec<String>> {
        let root = schema::normalize(collection);
        let prefix = subtree_prefix(&root);
        let keys: BTreeSet<String> = self
            .leaves_under(&root)?
            .into_iter()
            .filter_map(|(path, _)| {
                schema::segments(&path[prefix.len()..])
                    .next()
                    .map(str::to_string)
            })
            .collect();
        Ok(keys.into_iter().collect())
    }

    async fn put(&self, path: &str, value: &str) -> Result<()> {
        let cf = self.nodes()?;
        let root = schema::normalize(path);
        let mut batch = WriteBatch::default();
        self.clear_subtree(&mut batch, &root)?;
        batch.put_cf(
            cf,
            root.as_bytes(),
            serde_json::to_vec(&Value::String(value.to_string()))?,
        );
        self.db.write(batch).map_err(|e| AtmError::RemoteWriteFailed {
            path: root,
            reason: e.to_string(),
        })
    }
}
