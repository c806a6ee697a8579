//! Resolution of stored PIN/Pattern credentials.
//!
//! Directory records carry credentials in one of three layouts: a top-level
//! field, a nested `auth` object, or a nested `authData` object. Lookups try
//! them in that order and take the first non-null value.
// TODO: confirm with the directory owners whether `auth`/`authData` are
// migration leftovers; until then the fallback order must stay as is.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    Pin,
    Pattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStrategy {
    TopLevel,
    AuthObject,
    AuthDataObject,
}

impl LookupStrategy {
    pub const PRIORITY: [LookupStrategy; 3] = [
        LookupStrategy::TopLevel,
        LookupStrategy::AuthObject,
        LookupStrategy::AuthDataObject,
    ];

    /// Nested object holding the credential, if any.
    pub fn container(&self) -> Option<&'static str> {
        match self {
            LookupStrategy::TopLevel => None,
            LookupStrategy::AuthObject => Some("auth"),
            LookupStrategy::AuthDataObject => Some("authData"),
        }
    }

    pub fn field(&self, kind: CredentialKind) -> &'static str {
        match (self, kind) {
            (LookupStrategy::AuthDataObject, CredentialKind::Pin) => "pin",
            (LookupStrategy::AuthDataObject, CredentialKind::Pattern) => "pattern",
            (_, CredentialKind::Pin) => "PIN",
            (_, CredentialKind::Pattern) => "Pattern",
        }
    }

    pub fn resolve(&self, record: &Value, kind: CredentialKind) -> Option<String> {
        let scope = match self.container() {
            None => record,
            Some(name) => record.get(name).filter(|v| v.is_object())?,
        };
        scope.get(self.field(kind)).and_then(credential_text)
    }
}

fn credential_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Returns the stored credential and the layout it was found in.
pub fn resolve_credential(
    record: &Value,
    kind: CredentialKind,
) -> Option<(LookupStrategy, String)> {
    LookupStrategy::PRIORITY
        .iter()
        .find_map(|strategy| strategy.resolve(record, kind).map(|v| (*strategy, v)))
}
