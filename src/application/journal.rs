use crate::application::mirror::RemoteMirror;
use crate::domain::schema;
use crate::domain::transaction::PendingWithdrawal;
use crate::error::Result;
use serde_json::Value;
use tracing::warn;

/// Pending-withdrawal intents kept under `/ATM/Pending/<key>`.
///
/// An intent is written before the balance is debited and cleared (set to
/// the empty string) once the dispense has been mirrored as completed.
#[derive(Clone)]
pub struct WithdrawalJournal {
    mirror: RemoteMirror,
}

impl WithdrawalJournal {
    pub fn new(mirror: RemoteMirror) -> Self {
        Self { mirror }
    }

    fn path(key: &str) -> String {
        schema::child(schema::PENDING, key)
    }

    pub async fn open(&self, intent: &PendingWithdrawal) -> Result<bool> {
        let body = serde_json::to_string(intent)?;
        Ok(self.mirror.put(&Self::path(&intent.key), &body).await)
    }

    pub async fn close(&self, key: &str) -> bool {
        self.mirror.put(&Self::path(key), "").await
    }

    /// Lists open intents. Cleared and unparsable entries are skipped, and a
    /// failed listing reads as an empty journal.
    pub async fn pending(&self) -> Vec<PendingWithdrawal> {
        let keys = match self.mirror.store().get_keys(schema::PENDING).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Could not list withdrawal intents");
                return Vec::new();
            }
        };
        let mut intents = Vec::new();
        for key in keys {
            let Some(Value::String(body)) = self.mirror.get(&Self::path(&key)).await else {
                continue;
            };
            if body.is_empty() {
                continue;
            }
            match serde_json::from_str::<PendingWithdrawal>(&body) {
                Ok(intent) => intents.push(intent),
                Err(e) => warn!(%key, error = %e, "Unparsable withdrawal intent"),
            }
        }
        intents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::Balance;
    use crate::infrastructure::in_memory::InMemoryRemoteStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_open_list_close() {
        let store = InMemoryRemoteStore::new();
        let journal = WithdrawalJournal::new(RemoteMirror::new(Arc::new(store.clone())));
        let intent = PendingWithdrawal {
            key: "k1".into(),
            amount: 2000,
            previous_balance: Balance(5000),
            new_balance: Balance(3000),
        };

        assert!(journal.open(&intent).await.unwrap());
        let body = store.text("/ATM/Pending/k1").await.unwrap();
        assert!(body.contains("\"previousBalance\":5000"));
        assert_eq!(journal.pending().await, vec![intent]);

        assert!(journal.close("k1").await);
        assert!(journal.pending().await.is_empty());
    }

    #[tokio::test]
    async fn test_garbage_is_skipped() {
        let store = InMemoryRemoteStore::new();
        store
            .insert("/ATM/Pending/k2", Value::String("{not json".into()))
            .await;
        let journal = WithdrawalJournal::new(RemoteMirror::new(Arc::new(store)));
        assert!(journal.pending().await.is_empty());
    }

    #[tokio::test]
    async fn test_unlistable_journal_reads_as_empty() {
        let store = InMemoryRemoteStore::new();
        store
            .insert("/ATM/Pending/k1", Value::String("{}".into()))
            .await;
        store.fail_listing_at("/ATM/Pending").await;
        let journal = WithdrawalJournal::new(RemoteMirror::new(Arc::new(store)));
        assert!(journal.pending().await.is_empty());
    }
}
