use crate::domain::credential::CredentialKind;
use crate::domain::keypad::Key;
use crate::error::{AtmError, Result};
use serde::{Deserialize, Serialize};

/// Authentication methods offered on the selection menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthMethod {
    Facial,
    Finger,
    Pin,
    Pattern,
}

impl AuthMethod {
    /// Menu keys `1`..`4` select Facial, Finger, PIN and Pattern.
    pub fn from_key(key: Key) -> Option<Self> {
        match key.digit()? {
            1 => Some(AuthMethod::Facial),
            2 => Some(AuthMethod::Finger),
            3 => Some(AuthMethod::Pin),
            4 => Some(AuthMethod::Pattern),
            _ => None,
        }
    }

    pub fn selection_code(&self) -> &'static str {
        match self {
            AuthMethod::Facial => "1",
            AuthMethod::Finger => "2",
            AuthMethod::Pin => "3",
            AuthMethod::Pattern => "4",
        }
    }
}

impl From<CredentialKind> for AuthMethod {
    fn from(kind: CredentialKind) -> Self {
        match kind {
            CredentialKind::Pin => AuthMethod::Pin,
            CredentialKind::Pattern => AuthMethod::Pattern,
        }
    }
}

/// Progress of a single verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerifyState {
    Idle,
    Checking,
    Success,
    Fail,
}

impl VerifyState {
    /// Tri-state code published to the blackboard. Idle and Checking share `0`.
    pub fn code(&self) -> &'static str {
        match self {
            VerifyState::Idle | VerifyState::Checking => "0",
            VerifyState::Success => "1",
            VerifyState::Fail => "2",
        }
    }

    pub fn is_verified(&self) -> bool {
        *self == VerifyState::Success
    }
}

/// Bounded-retry verification state machine for one session.
///
/// `Idle -> Checking -> {Success | Fail}`; a `Fail` is reset to `Idle` before
/// the next attempt. Once `attempt == max_attempts` and the last attempt has
/// failed the session is exhausted.
#[derive(Debug, Clone)]
pub struct AuthSession {
    method: AuthMethod,
    attempt: u32,
    max_attempts: u32,
    state: VerifyState,
}

impl AuthSession {
    pub fn new(method: AuthMethod, max_attempts: u32) -> Self {
        Self {
            method,
            attempt: 0,
            max_attempts,
            state: VerifyState::Idle,
        }
    }

    pub fn method(&self) -> AuthMethod {
        self.method
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn state(&self) -> VerifyState {
        self.state
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
            && matches!(self.state, VerifyState::Idle | VerifyState::Fail)
    }

    pub fn has_attempts_left(&self) -> bool {
        self.attempt < self.max_attempts
    }

    /// Starts the next attempt and returns its 1-based number.
    pub fn begin_attempt(&mut self) -> Result<u32> {
        if self.state != VerifyState::Idle || !self.has_attempts_left() {
            return Err(self.invalid(VerifyState::Checking));
        }
        self.attempt += 1;
        self.state = VerifyState::Checking;
        Ok(self.attempt)
    }

    pub fn succeed(&mut self) -> Result<()> {
        self.transition(VerifyState::Checking, VerifyState::Success)
    }

    pub fn fail(&mut self) -> Result<()> {
        self.transition(VerifyState::Checking, VerifyState::Fail)
    }

    pub fn reset(&mut self) -> Result<()> {
        self.transition(VerifyState::Fail, VerifyState::Idle)
    }

    fn transition(&mut self, from: VerifyState, to: VerifyState) -> Result<()> {
        if self.state != from {
            return Err(self.invalid(to));
        }
        self.state = to;
        Ok(())
    }

    fn invalid(&self, to: VerifyState) -> AtmError {
        AtmError::InvalidTransition {
            from: self.state,
            to,
        }
    }
}
