use crate::domain::schema::{self, field};
use crate::error::{AtmError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Non-negative account balance in whole currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Balance(pub u64);

/// A strictly positive withdrawal amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Amount(u64);

impl Amount {
    pub fn new(value: u64) -> Result<Self> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(AtmError::InvalidAmount(value))
        }
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for Amount {
    type Error = AtmError;

    fn try_from(value: u64) -> Result<Self> {
        Self::new(value)
    }
}

impl Balance {
    pub const ZERO: Self = Self(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Debits `amount`, refusing to go below zero.
    pub fn debit(&self, amount: Amount) -> Result<Balance> {
        self.0
            .checked_sub(amount.value())
            .map(Balance)
            .ok_or(AtmError::InsufficientBalance {
                requested: amount.value(),
                available: self.0,
            })
    }

    /// Reads a balance the way the blackboard stores it: a decimal string, a
    /// JSON number, or a float string (truncated). Anything else reads as zero.
    pub fn from_value(value: Option<&Value>) -> Self {
        let parsed = match value {
            Some(Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
            Some(Value::String(s)) => {
                let s = s.trim();
                s.parse::<u64>().ok().or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite() && *f >= 0.0)
                        .map(|f| f as u64)
                })
            }
            _ => None,
        };
        Self(parsed.unwrap_or(0))
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
    Savings,
    Current,
}

impl AccountType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(AccountType::Savings),
            2 => Some(AccountType::Current),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AccountType::Savings => "1",
            AccountType::Current => "2",
        }
    }
}

/// A directory entry matched by account number.
///
/// The typed fields are parsed once at match time; `raw` keeps the record
/// exactly as fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountRecord {
    /// Opaque directory key.
    pub key: String,
    /// Path of the record on the remote store.
    pub path: String,
    pub account_number: String,
    pub balance: Balance,
    pub verified_flag: Option<String>,
    pub last_verify: Option<String>,
    pub failed_attempts: Option<u32>,
    raw: Value,
}

impl AccountRecord {
    /// Builds a record from a fetched directory value. Returns `None` when the
    /// value is not an object.
    pub fn from_value(collection: &str, key: &str, raw: Value) -> Option<Self> {
        if !raw.is_object() {
            return None;
        }
        let text = |name: &str| raw.get(name).and_then(plain_text);

        Some(Self {
            key: key.to_string(),
            path: schema::child(collection, key),
            account_number: text(field::ACCOUNT_NUMBER).unwrap_or_default(),
            balance: Balance::from_value(raw.get(field::BALANCE)),
            verified_flag: text(field::VERIFIED_FLAG),
            last_verify: text(field::LAST_VERIFY),
            failed_attempts: text(field::FAILED_ATTEMPTS).and_then(|s| s.parse().ok()),
            raw,
        })
    }

    pub fn field_path(&self, name: &str) -> String {
        schema::child(&self.path, name)
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

fn plain_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(1).is_ok());
        assert!(matches!(Amount::new(0), Err(AtmError::InvalidAmount(0))));
    }

    #[test]
    fn test_balance_debit() {
        let balance = Balance::new(5000);
        assert_eq!(balance.debit(Amount::new(2000).unwrap()).unwrap(), Balance(3000));
        assert_eq!(balance.debit(Amount::new(5000).unwrap()).unwrap(), Balance::ZERO);
        assert!(matches!(
            balance.debit(Amount::new(5001).unwrap()),
            Err(AtmError::InsufficientBalance {
                requested: 5001,
                available: 5000
            })
        ));
    }

    #[test]
    fn test_balance_parsing() {
        assert_eq!(Balance::from_value(Some(&json!("3000"))), Balance(3000));
        assert_eq!(Balance::from_value(Some(&json!(" 42 "))), Balance(42));
        assert_eq!(Balance::from_value(Some(&json!("12.9"))), Balance(12));
        assert_eq!(Balance::from_value(Some(&json!(77))), Balance(77));
        assert_eq!(Balance::from_value(Some(&json!("abc"))), Balance::ZERO);
        assert_eq!(Balance::from_value(Some(&json!("-5"))), Balance::ZERO);
        assert_eq!(Balance::from_value(None), Balance::ZERO);
    }

    #[test]
    fn test_account_type_codes() {
        assert_eq!(AccountType::from_code(1), Some(AccountType::Savings));
        assert_eq!(AccountType::from_code(2), Some(AccountType::Current));
        assert_eq!(AccountType::from_code(3), None);
        assert_eq!(AccountType::Current.code(), "2");
    }

    #[test]
    fn test_record_from_value() {
        let raw = json!({
            "accountNumber": 4821,
            "balance": "5000",
            "failedAttempts": "2",
            "auth": { "PIN": "9137" }
        });
        let record = AccountRecord::from_value("/ATM/Users", "-Nx1", raw).unwrap();
        assert_eq!(record.account_number, "4821");
        assert_eq!(record.balance, Balance(5000));
        assert_eq!(record.failed_attempts, Some(2));
        assert_eq!(record.raw()["auth"]["PIN"], json!("9137"));
        assert_eq!(record.field_path("balance"), "/ATM/Users/-Nx1/balance");

        assert!(AccountRecord::from_value("/ATM/Users", "k", json!("flat")).is_none());
    }
}
