use super::account::AccountRecord;
use super::keypad::Key;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Path-addressed key/value blackboard shared with other devices.
///
/// Reads return the JSON subtree at `path`; writes always store strings.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Brings the link to the store up. Called once at startup.
    async fn bring_up(&self) -> Result<()> {
        Ok(())
    }
    async fn get(&self, path: &str) -> Result<Option<Value>>;
    /// Lists the child keys of a collection without fetching the children.
    async fn get_keys(&self, collection: &str) -> Result<Vec<String>>;
    async fn put(&self, path: &str, value: &str) -> Result<()>;
}

/// Keypad and touch sensor.
///
/// Both calls return `AtmError::InputClosed` once the source is exhausted.
#[async_trait]
pub trait InputSource: Send + Sync {
    /// Waits for the next debounced key press.
    async fn next_key(&self) -> Result<Key>;
    /// Samples the touch sensor once.
    async fn touch_active(&self) -> Result<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeepPattern {
    pub duration_ms: u64,
    pub toggle_ms: u64,
}

impl BeepPattern {
    pub const fn new(duration_ms: u64, toggle_ms: u64) -> Self {
        Self {
            duration_ms,
            toggle_ms,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Dispense servo and buzzer.
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Moves the servo; angles above 180 are clamped.
    async fn set_servo_angle(&self, degrees: u8) -> Result<()>;
    async fn set_buzzer(&self, on: bool) -> Result<()>;
    async fn beep(&self, pattern: BeepPattern) -> Result<()>;
}

/// Monotonic time source. All dwell and hold timing goes through it.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock was created.
    fn now(&self) -> Duration;
    async fn sleep(&self, duration: Duration);
}

/// Resolves a typed account number to its directory record.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn find(&self, account_number: &str) -> Result<Option<AccountRecord>>;
}

/// External facial recognition decision.
#[async_trait]
pub trait FacialVerifier: Send + Sync {
    async fn verify(&self, account: &AccountRecord) -> Result<bool>;
}

pub type SharedStore = Arc<dyn RemoteStore>;
pub type SharedInput = Arc<dyn InputSource>;
pub type SharedActuator = Arc<dyn Actuator>;
pub type SharedClock = Arc<dyn Clock>;
pub type SharedDirectory = Arc<dyn AccountDirectory>;
pub type SharedFacialVerifier = Arc<dyn FacialVerifier>;
