//! Terminal configuration

use crate::domain::ports::BeepPattern;
use crate::domain::schema;
use crate::error::{AtmError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Buzzer patterns for each audible event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BeepConfig {
    /// Between verification attempts, only when another attempt follows
    pub retry: BeepPattern,
    /// Entered PIN/Pattern did not match
    pub code_mismatch: BeepPattern,
    pub account_not_found: BeepPattern,
    pub invalid_amount: BeepPattern,
    pub insufficient_balance: BeepPattern,
    pub dispense: BeepPattern,
}

impl Default for BeepConfig {
    fn default() -> Self {
        Self {
            retry: BeepPattern::new(600, 120),
            code_mismatch: BeepPattern::new(1200, 150),
            account_not_found: BeepPattern::new(1000, 100),
            invalid_amount: BeepPattern::new(800, 120),
            insufficient_balance: BeepPattern::new(1200, 150),
            dispense: BeepPattern::new(5000, 200),
        }
    }
}

/// Terminal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AtmConfig {
    /// Collection holding the account directory
    pub directory_path: String,
    pub max_attempts: u32,
    /// Digits in a PIN or Pattern
    pub code_length: usize,
    pub touch_hold_ms: u64,
    /// How long the fail state stays visible before returning to idle
    pub fail_dwell_ms: u64,
    /// Sampling period for touch and network bring-up polling
    pub poll_interval_ms: u64,
    pub amount_max_digits: usize,
    pub account_number_max_digits: usize,
    pub network_timeout_ms: u64,
    /// Record a pending intent before each debit and reconcile at startup
    pub journal_withdrawals: bool,
    pub dispense_angle: u8,
    pub beeps: BeepConfig,
}

impl Default for AtmConfig {
    fn default() -> Self {
        Self {
            directory_path: schema::DEFAULT_DIRECTORY.to_string(),
            max_attempts: 3,
            code_length: 4,
            touch_hold_ms: 2000,
            fail_dwell_ms: 800,
            poll_interval_ms: 10,
            amount_max_digits: 6,
            account_number_max_digits: 24,
            network_timeout_ms: 15_000,
            journal_withdrawals: false,
            dispense_angle: 180,
            beeps: BeepConfig::default(),
        }
    }
}

impl AtmConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(AtmError::Config("max_attempts must be at least 1".into()));
        }
        if self.code_length == 0 {
            return Err(AtmError::Config("code_length must be at least 1".into()));
        }
        // u64 holds any 18-digit amount
        if !(1..=18).contains(&self.amount_max_digits) {
            return Err(AtmError::Config(
                "amount_max_digits must be between 1 and 18".into(),
            ));
        }
        if self.account_number_max_digits == 0 {
            return Err(AtmError::Config(
                "account_number_max_digits must be at least 1".into(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(AtmError::Config("poll_interval_ms must be positive".into()));
        }
        if self.dispense_angle > 180 {
            return Err(AtmError::Config("dispense_angle must be within 0..=180".into()));
        }
        Ok(())
    }

    pub fn touch_hold(&self) -> Duration {
        Duration::from_millis(self.touch_hold_ms)
    }

    pub fn fail_dwell(&self) -> Duration {
        Duration::from_millis(self.fail_dwell_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_millis(self.network_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AtmConfig::default();
        config.validate().unwrap();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.fail_dwell(), Duration::from_millis(800));
        assert_eq!(config.network_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: AtmConfig =
            serde_json::from_str(r#"{ "max_attempts": 5, "beeps": { "retry": { "duration_ms": 1, "toggle_ms": 1 } } }"#)
                .unwrap();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.code_length, 4);
        assert_eq!(config.beeps.retry, BeepPattern::new(1, 1));
        assert_eq!(config.beeps.dispense, BeepPattern::new(5000, 200));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let config = AtmConfig {
            max_attempts: 0,
            ..AtmConfig::default()
        };
        assert!(matches!(config.validate(), Err(AtmError::Config(_))));

        let config = AtmConfig {
            amount_max_digits: 19,
            ..AtmConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atm.json");
        let config = AtmConfig {
            journal_withdrawals: true,
            ..AtmConfig::default()
        };
        config.save(&path).unwrap();

        let loaded = AtmConfig::load(&path).unwrap();
        assert!(loaded.journal_withdrawals);
        assert_eq!(loaded.directory_path, "/ATM/Users");
    }
}
