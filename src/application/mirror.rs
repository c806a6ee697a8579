use crate::domain::account::AccountRecord;
use crate::domain::auth::VerifyState;
use crate::domain::ports::SharedStore;
use crate::domain::schema::{self, field};
use serde_json::Value;
use tracing::warn;

/// Best-effort access to the remote blackboard.
///
/// Writes are mirrors of decisions already taken locally: a failed write is
/// logged and reported as `false`, never raised. A failed read is logged and
/// reads as absent.
#[derive(Clone)]
pub struct RemoteMirror {
    store: SharedStore,
}

impl RemoteMirror {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub async fn put(&self, path: &str, value: &str) -> bool {
        match self.store.put(path, value).await {
            Ok(()) => true,
            Err(e) => {
                warn!(path, value, error = %e, "Remote write failed; mirror may be stale");
                false
            }
        }
    }

    pub async fn get(&self, path: &str) -> Option<Value> {
        match self.store.get(path).await {
            Ok(value) => value,
            Err(e) => {
                warn!(path, error = %e, "Remote read failed; treating as absent");
                None
            }
        }
    }

    /// Writes the same value to a device-global path and a per-account field.
    pub async fn put_both(&self, global: &str, account: &AccountRecord, name: &str, value: &str) {
        self.put(global, value).await;
        self.put(&account.field_path(name), value).await;
    }

    /// Publishes tri-state progress and the derived verified flag, globally
    /// and, when an account is matched, on its record.
    pub async fn publish_verify_state(&self, state: VerifyState, account: Option<&AccountRecord>) {
        let verified = schema::flag(state.is_verified());
        self.put(schema::VERIFICATION, state.code()).await;
        self.put(schema::VERIFIED, verified).await;
        if let Some(account) = account {
            self.put(&account.field_path(field::LAST_VERIFY), state.code())
                .await;
            self.put(&account.field_path(field::VERIFIED_FLAG), verified)
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory::InMemoryRemoteStore;
    use serde_json::json;
    use std::sync::Arc;

    fn record() -> AccountRecord {
        AccountRecord::from_value("/ATM/Users", "k1", json!({ "accountNumber": "1" })).unwrap()
    }

    #[tokio::test]
    async fn test_publish_verify_state() {
        let store = InMemoryRemoteStore::new();
        let mirror = RemoteMirror::new(Arc::new(store.clone()));

        mirror
            .publish_verify_state(VerifyState::Fail, Some(&record()))
            .await;
        assert_eq!(store.text("/ATM/Verification").await.as_deref(), Some("2"));
        assert_eq!(store.text("/ATM/Verified").await.as_deref(), Some("0"));
        assert_eq!(store.text("/ATM/Users/k1/lastVerify").await.as_deref(), Some("2"));

        mirror.publish_verify_state(VerifyState::Success, None).await;
        assert_eq!(store.text("/ATM/Verified").await.as_deref(), Some("1"));
        assert_eq!(store.text("/ATM/Users/k1/verifiedFlag").await.as_deref(), Some("0"));
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let store = InMemoryRemoteStore::new();
        let mirror = RemoteMirror::new(Arc::new(store.clone()));

        store.fail_writes(true).await;
        assert!(!mirror.put("/ATM/Welcome", "1").await);

        store.fail_reads_at("/ATM/Welcome").await;
        assert!(mirror.get("/ATM/Welcome").await.is_none());
    }
}
