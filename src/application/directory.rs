use crate::domain::account::AccountRecord;
use crate::domain::ports::{AccountDirectory, SharedStore};
use crate::domain::schema;
use crate::error::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Account directory resolved by linear enumeration.
///
/// The remote collection has no secondary index, so every lookup lists the
/// keys and fetches records one by one until `accountNumber` matches.
///
/// An entry that cannot be fetched is skipped, not retried. A transient read
/// failure can therefore turn into a false "not found"; when that happens the
/// miss is logged with the number of unreadable entries.
pub struct ScanningDirectory {
    store: SharedStore,
    collection: String,
}

impl ScanningDirectory {
    pub fn new(store: SharedStore, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }
}

#[async_trait]
impl AccountDirectory for ScanningDirectory {
    async fn find(&self, account_number: &str) -> Result<Option<AccountRecord>> {
        let keys = match self.store.get_keys(&self.collection).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(collection = %self.collection, error = %e, "Directory listing failed");
                return Ok(None);
            }
        };

        let mut unreadable = 0usize;
        for key in &keys {
            let path = schema::child(&self.collection, key);
            match self.store.get(&path).await {
                Ok(Some(value)) => {
                    if let Some(record) = AccountRecord::from_value(&self.collection, key, value)
                        && record.account_number == account_number
                    {
                        debug!(%key, "Directory match");
                        return Ok(Some(record));
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    unreadable += 1;
                    warn!(%key, error = %e, "Directory entry unreadable; treating as non-match");
                }
            }
        }

        if unreadable > 0 {
            warn!(
                account_number,
                unreadable,
                scanned = keys.len(),
                "Account not found, but some entries could not be read; result may be a false negative"
            );
        }
        Ok(None)
    }
}
