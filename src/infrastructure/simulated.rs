//! Simulated collaborators for batch runs and tests.
//!
//! `ManualClock` only advances when something sleeps on it, so hold and dwell
//! timing is exact and instantaneous.

use crate::domain::account::AccountRecord;
use crate::domain::keypad::Key;
use crate::domain::ports::{Actuator, BeepPattern, Clock, FacialVerifier, InputSource};
use crate::error::{AtmError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    micros: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, duration: Duration) {
        self.micros
            .fetch_add(duration.as_micros() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.micros.load(Ordering::SeqCst))
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}

/// Keypad and touch sensor driven by a prepared script.
///
/// Keys and touch samples are consumed in order; once either queue runs dry
/// the corresponding call returns `InputClosed`.
#[derive(Debug, Default, Clone)]
pub struct ScriptedInput {
    keys: Arc<Mutex<VecDeque<Key>>>,
    touch: Arc<Mutex<VecDeque<bool>>>,
}

impl ScriptedInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an input from a key script such as `"4821#3 9137#"`.
    /// Whitespace is skipped; any other non-keypad character is rejected.
    pub fn with_keys(script: &str) -> Result<Self> {
        Ok(Self {
            keys: Arc::new(Mutex::new(parse_keys(script)?.into())),
            touch: Arc::default(),
        })
    }

    pub async fn push_keys(&self, script: &str) -> Result<()> {
        let keys = parse_keys(script)?;
        self.keys.lock().await.extend(keys);
        Ok(())
    }

    pub async fn push_touch(&self, samples: impl IntoIterator<Item = bool>) {
        self.touch.lock().await.extend(samples);
    }

    /// Queues one press: an idle sample, `active_samples` active samples, and
    /// a release.
    pub async fn push_press(&self, active_samples: usize) {
        let mut touch = self.touch.lock().await;
        touch.push_back(false);
        touch.extend(std::iter::repeat_n(true, active_samples));
        touch.push_back(false);
    }

    pub async fn remaining_keys(&self) -> usize {
        self.keys.lock().await.len()
    }
}

fn parse_keys(script: &str) -> Result<Vec<Key>> {
    script
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| {
            Key::try_from(c).map_err(|bad| AtmError::Config(format!("'{bad}' is not a keypad key")))
        })
        .collect()
}

#[async_trait]
impl InputSource for ScriptedInput {
    async fn next_key(&self) -> Result<Key> {
        let key = self.keys.lock().await.pop_front().ok_or(AtmError::InputClosed)?;
        debug!(%key, "key");
        Ok(key)
    }

    async fn touch_active(&self) -> Result<bool> {
        self.touch.lock().await.pop_front().ok_or(AtmError::InputClosed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorEvent {
    Servo(u8),
    Buzzer(bool),
    Beep(BeepPattern),
}

/// Actuator that records every command instead of driving hardware.
#[derive(Debug, Default, Clone)]
pub struct SimulatedActuator {
    events: Arc<Mutex<Vec<ActuatorEvent>>>,
    failing: Arc<AtomicBool>,
    refused_angles: Arc<Mutex<Vec<u8>>>,
}

impl SimulatedActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<ActuatorEvent> {
        self.events.lock().await.clone()
    }

    /// Number of times the servo was driven to `degrees`.
    pub async fn servo_moves_to(&self, degrees: u8) -> usize {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| **e == ActuatorEvent::Servo(degrees))
            .count()
    }

    pub async fn beeps(&self) -> Vec<BeepPattern> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|e| match e {
                ActuatorEvent::Beep(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    /// Makes every subsequent command fail.
    pub fn fail_commands(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Makes every servo move to `degrees` fail; other commands still pass.
    pub async fn refuse_servo_angle(&self, degrees: u8) {
        self.refused_angles.lock().await.push(degrees);
    }

    async fn record(&self, event: ActuatorEvent) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AtmError::Actuator(format!("{event:?} not acknowledged")));
        }
        debug!(?event, "actuator");
        self.events.lock().await.push(event);
        Ok(())
    }
}

#[async_trait]
impl Actuator for SimulatedActuator {
    async fn set_servo_angle(&self, degrees: u8) -> Result<()> {
        let degrees = degrees.min(180);
        if self.refused_angles.lock().await.contains(&degrees) {
            return Err(AtmError::Actuator(format!("servo stuck before {degrees}")));
        }
        self.record(ActuatorEvent::Servo(degrees)).await
    }

    async fn set_buzzer(&self, on: bool) -> Result<()> {
        self.record(ActuatorEvent::Buzzer(on)).await
    }

    async fn beep(&self, pattern: BeepPattern) -> Result<()> {
        self.record(ActuatorEvent::Beep(pattern)).await
    }
}

/// Facial verifier that always returns the same decision.
///
/// `StaticFacialVerifier::default()` refuses everyone, which is how the
/// terminal behaves when no external verifier is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticFacialVerifier {
    pub accept: bool,
}

#[async_trait]
impl FacialVerifier for StaticFacialVerifier {
    async fn verify(&self, account: &AccountRecord) -> Result<bool> {
        debug!(key = %account.key, accept = self.accept, "facial decision");
        Ok(self.accept)
    }
}
