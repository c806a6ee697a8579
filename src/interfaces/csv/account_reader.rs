use crate::domain::credential::{CredentialKind, LookupStrategy};
use crate::domain::ports::RemoteStore;
use crate::domain::schema::{self, field};
use crate::error::{AtmError, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::io::Read;
use tracing::{debug, info};

/// Where a seeded record keeps its credentials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CredentialLayout {
    #[default]
    Top,
    Auth,
    AuthData,
}

impl From<CredentialLayout> for LookupStrategy {
    fn from(layout: CredentialLayout) -> Self {
        match layout {
            CredentialLayout::Top => LookupStrategy::TopLevel,
            CredentialLayout::Auth => LookupStrategy::AuthObject,
            CredentialLayout::AuthData => LookupStrategy::AuthDataObject,
        }
    }
}

/// One directory entry as listed in a seed CSV.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountSeed {
    pub key: String,
    pub account_number: String,
    pub balance: u64,
    pub pin: Option<String>,
    pub pattern: Option<String>,
    #[serde(default)]
    pub credential_layout: Option<CredentialLayout>,
}

impl AccountSeed {
    /// Field writes relative to the record path, as the blackboard stores
    /// them: every value is a string.
    pub fn fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            (
                field::ACCOUNT_NUMBER.to_string(),
                self.account_number.clone(),
            ),
            (field::BALANCE.to_string(), self.balance.to_string()),
        ];

        let strategy = LookupStrategy::from(self.credential_layout.unwrap_or_default());
        let credentials = [
            (CredentialKind::Pin, &self.pin),
            (CredentialKind::Pattern, &self.pattern),
        ];
        for (kind, value) in credentials {
            let Some(value) = value else { continue };
            let name = strategy.field(kind);
            let path = match strategy.container() {
                Some(container) => schema::child(container, name),
                None => name.to_string(),
            };
            fields.push((path, value.clone()));
        }
        fields
    }
}

/// Reads directory seeds from a CSV source with the header
/// `key,account_number,balance,pin,pattern[,credential_layout]`.
pub struct AccountReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> AccountReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn accounts(self) -> impl Iterator<Item = Result<AccountSeed>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(AtmError::from))
    }
}

/// Writes seeds into `collection`. Keys already present are left untouched,
/// so re-seeding a persistent store does not reset balances. Returns the
/// number of records written.
pub async fn seed_directory(
    store: &dyn RemoteStore,
    collection: &str,
    seeds: impl IntoIterator<Item = AccountSeed>,
) -> Result<usize> {
    let existing: HashSet<String> = store.get_keys(collection).await?.into_iter().collect();
    let mut written = 0;
    for seed in seeds {
        if existing.contains(&seed.key) {
            debug!(key = %seed.key, "Directory entry exists; seed skipped");
            continue;
        }
        let record = schema::child(collection, &seed.key);
        for (name, value) in seed.fields() {
            store.put(&schema::child(&record, &name), &value).await?;
        }
        written += 1;
    }
    info!(collection, written, "Directory seeded");
    Ok(written)
}
