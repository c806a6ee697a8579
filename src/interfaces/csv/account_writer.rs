use crate::domain::ports::RemoteStore;
use crate::domain::schema::{self, field};
use crate::error::Result;
use serde::Serialize;
use serde_json::Value;
use std::io::Write;

/// Per-account state as reported after a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountState {
    pub key: String,
    pub account_number: String,
    pub balance: String,
    pub verified_flag: String,
    pub failed_attempts: String,
    pub transaction_completed: String,
    pub insufficient_balance: String,
}

impl AccountState {
    pub fn from_record(key: &str, record: &Value) -> Self {
        let text = |name: &str| match record.get(name) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        Self {
            key: key.to_string(),
            account_number: text(field::ACCOUNT_NUMBER),
            balance: text(field::BALANCE),
            verified_flag: text(field::VERIFIED_FLAG),
            failed_attempts: text(field::FAILED_ATTEMPTS),
            transaction_completed: text(field::TRANSACTION_COMPLETED),
            insufficient_balance: text(field::INSUFFICIENT_BALANCE),
        }
    }
}

/// Reads every record of `collection`, in key order.
pub async fn collect_states(store: &dyn RemoteStore, collection: &str) -> Result<Vec<AccountState>> {
    let mut keys = store.get_keys(collection).await?;
    keys.sort();
    let mut states = Vec::with_capacity(keys.len());
    for key in keys {
        if let Some(record) = store.get(&schema::child(collection, &key)).await? {
            states.push(AccountState::from_record(&key, &record));
        }
    }
    Ok(states)
}

pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_accounts(&mut self, accounts: impl IntoIterator<Item = AccountState>) -> Result<()> {
        for account in accounts {
            self.writer.serialize(account)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
