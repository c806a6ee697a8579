//! Path layout of the shared remote blackboard.
//!
//! Every persisted value is a string. Device-global paths live directly under
//! `/ATM`; per-account mirrors live under the directory record of the matched
//! account (see [`crate::domain::account::AccountRecord::field_path`]).

pub const WELCOME: &str = "/ATM/Welcome";
pub const SELECTION: &str = "/ATM/Selection";
/// Tri-state progress: `0` checking, `1` success, `2` fail.
pub const VERIFICATION: &str = "/ATM/Verification";
pub const VERIFIED: &str = "/ATM/Verified";
pub const ACCOUNT_TYPE: &str = "/ATM/AccountType";
pub const WITHDRAWAL_AMOUNT: &str = "/ATM/WithdrawalAmount";
pub const TRANSACTION_COMPLETED: &str = "/ATM/TransactionCompleted";
pub const INSUFFICIENT_BALANCE: &str = "/ATM/InsufficientBalance";
pub const ACCOUNT_NUMBER: &str = "/ATM/AccountNumber";
pub const FINGER: &str = "/ATM/Finger";
pub const PENDING: &str = "/ATM/Pending";

pub const DEFAULT_DIRECTORY: &str = "/ATM/Users";

/// Field names inside a directory record.
pub mod field {
    pub const ACCOUNT_NUMBER: &str = "accountNumber";
    pub const BALANCE: &str = "balance";
    pub const VERIFIED_FLAG: &str = "verifiedFlag";
    pub const LAST_VERIFY: &str = "lastVerify";
    pub const LAST_ATTEMPT: &str = "lastAttempt";
    pub const FAILED_ATTEMPTS: &str = "failedAttempts";
    pub const ACCOUNT_TYPE: &str = "accountType";
    pub const WITHDRAWAL_AMOUNT: &str = "withdrawalAmount";
    pub const TRANSACTION_COMPLETED: &str = "transactionCompleted";
    pub const INSUFFICIENT_BALANCE: &str = "insufficientBalance";
}

/// Joins a collection path and a child key.
pub fn child(collection: &str, key: &str) -> String {
    format!("{}/{}", collection.trim_end_matches('/'), key)
}

/// Splits a path into its non-empty segments.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Canonical form of a path: leading slash, no empty segments.
pub fn normalize(path: &str) -> String {
    let joined: Vec<&str> = segments(path).collect();
    format!("/{}", joined.join("/"))
}

/// Encodes a boolean flag the way the blackboard stores it.
pub fn flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}
