//! Application layer containing the session orchestration.
//!
//! The engines in this module are driven by `Terminal`, which owns one
//! `Collaborators` bundle and runs one account session at a time. Nothing is
//! spawned: every wait on the keypad, the clock or the remote store blocks the
//! session until it completes.

pub mod directory;
pub mod journal;
pub mod mirror;
pub mod session;
pub mod transaction;
pub mod verification;

use crate::domain::ports::{
    BeepPattern, SharedActuator, SharedClock, SharedFacialVerifier, SharedInput, SharedStore,
};
use tracing::warn;

/// The external capabilities a terminal runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub store: SharedStore,
    pub input: SharedInput,
    pub actuator: SharedActuator,
    pub clock: SharedClock,
    pub facial: SharedFacialVerifier,
}

impl Collaborators {
    /// Plays a buzzer pattern. A buzzer fault is logged and otherwise ignored.
    pub async fn sound(&self, pattern: BeepPattern) {
        if let Err(e) = self.actuator.beep(pattern).await {
            warn!(error = %e, ?pattern, "Buzzer fault");
        }
    }
}
