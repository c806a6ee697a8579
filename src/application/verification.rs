use crate::application::Collaborators;
use crate::application::mirror::RemoteMirror;
use crate::config::AtmConfig;
use crate::domain::account::AccountRecord;
use crate::domain::auth::{AuthMethod, AuthSession, VerifyState};
use crate::domain::credential::{CredentialKind, resolve_credential};
use crate::domain::keypad::{DigitBuffer, Edit};
use crate::domain::ports::BeepPattern;
use crate::domain::schema::{self, field};
use crate::error::Result;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Timing, retry and feedback settings for verification.
#[derive(Debug, Clone)]
pub struct VerificationPolicy {
    pub max_attempts: u32,
    pub code_length: usize,
    pub touch_hold: Duration,
    pub fail_dwell: Duration,
    pub poll_interval: Duration,
    pub retry_beep: BeepPattern,
    pub mismatch_beep: BeepPattern,
}

impl From<&AtmConfig> for VerificationPolicy {
    fn from(config: &AtmConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            code_length: config.code_length,
            touch_hold: config.touch_hold(),
            fail_dwell: config.fail_dwell(),
            poll_interval: config.poll_interval(),
            retry_beep: config.beeps.retry,
            mismatch_beep: config.beeps.code_mismatch,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationReport {
    pub method: AuthMethod,
    pub verified: bool,
    /// Attempts consumed, including the successful one.
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy)]
enum Check {
    Touch { hold: Duration },
    Code { kind: CredentialKind, len: usize },
    Facial,
}

/// Runs one bounded-retry verification per call.
///
/// Every attempt goes `Idle -> Checking -> {Success | Fail}`. A failed attempt
/// is shown as a fail pulse (`"2"` for the dwell, then `"0"`) before the next
/// attempt or before exhaustion is reported. Exhaustion is not an error here:
/// the report carries `verified = false` and the failure counters are written
/// to the account record.
pub struct VerificationEngine {
    collab: Collaborators,
    mirror: RemoteMirror,
    policy: VerificationPolicy,
}

impl VerificationEngine {
    pub fn new(collab: Collaborators, policy: VerificationPolicy) -> Self {
        let mirror = RemoteMirror::new(collab.store.clone());
        Self {
            collab,
            mirror,
            policy,
        }
    }

    pub fn policy(&self) -> &VerificationPolicy {
        &self.policy
    }

    /// Verifies `account` with the configured attempts and timings.
    pub async fn verify(
        &self,
        method: AuthMethod,
        account: &AccountRecord,
    ) -> Result<VerificationReport> {
        let max_attempts = self.policy.max_attempts;
        match method {
            AuthMethod::Finger => {
                self.verify_touch(account, self.policy.touch_hold, max_attempts)
                    .await
            }
            AuthMethod::Pin => {
                self.verify_code(
                    account,
                    CredentialKind::Pin,
                    self.policy.code_length,
                    max_attempts,
                )
                .await
            }
            AuthMethod::Pattern => {
                self.verify_code(
                    account,
                    CredentialKind::Pattern,
                    self.policy.code_length,
                    max_attempts,
                )
                .await
            }
            AuthMethod::Facial => {
                self.run(AuthMethod::Facial, account, Check::Facial, max_attempts)
                    .await
            }
        }
    }

    /// Succeeds when the touch sensor stays active for at least `hold`.
    /// Releasing early fails the attempt.
    pub async fn verify_touch(
        &self,
        account: &AccountRecord,
        hold: Duration,
        max_attempts: u32,
    ) -> Result<VerificationReport> {
        self.run(AuthMethod::Finger, account, Check::Touch { hold }, max_attempts)
            .await
    }

    /// Collects exactly `expected_len` digits and compares them with the
    /// stored PIN or Pattern.
    pub async fn verify_code(
        &self,
        account: &AccountRecord,
        kind: CredentialKind,
        expected_len: usize,
        max_attempts: u32,
    ) -> Result<VerificationReport> {
        let method = AuthMethod::from(kind);
        let check = Check::Code {
            kind,
            len: expected_len,
        };
        self.run(method, account, check, max_attempts).await
    }

    /// Publishes `Fail`, holds it for the dwell, then publishes `Idle`.
    /// Without an account only the device-global paths are written.
    pub async fn fail_pulse(&self, account: Option<&AccountRecord>) {
        self.mirror
            .publish_verify_state(VerifyState::Fail, account)
            .await;
        self.collab.clock.sleep(self.policy.fail_dwell).await;
        self.mirror
            .publish_verify_state(VerifyState::Idle, account)
            .await;
    }

    async fn run(
        &self,
        method: AuthMethod,
        account: &AccountRecord,
        check: Check,
        max_attempts: u32,
    ) -> Result<VerificationReport> {
        let mut session = AuthSession::new(method, max_attempts);
        self.mirror
            .publish_verify_state(VerifyState::Idle, Some(account))
            .await;

        while session.has_attempts_left() {
            let attempt = session.begin_attempt()?;
            info!(?method, attempt, max_attempts, "Verification attempt");

            if self.passes(check, account).await? {
                session.succeed()?;
                self.mirror
                    .publish_verify_state(VerifyState::Success, Some(account))
                    .await;
                if let Check::Touch { .. } = check {
                    self.mirror.put(schema::FINGER, "1").await;
                }
                info!(?method, attempt, "Verification succeeded");
                return Ok(VerificationReport {
                    method,
                    verified: true,
                    attempts: attempt,
                });
            }

            session.fail()?;
            match check {
                Check::Touch { .. } => {
                    self.mirror.put(schema::FINGER, "0").await;
                }
                Check::Code { .. } => self.collab.sound(self.policy.mismatch_beep).await,
                Check::Facial => {}
            }
            self.fail_pulse(Some(account)).await;
            session.reset()?;
            if session.has_attempts_left() {
                self.collab.sound(self.policy.retry_beep).await;
            }
        }

        let attempts = session.attempt();
        self.mirror
            .put(&account.field_path(field::LAST_ATTEMPT), "failed")
            .await;
        self.mirror
            .put(
                &account.field_path(field::FAILED_ATTEMPTS),
                &attempts.to_string(),
            )
            .await;
        warn!(?method, attempts, key = %account.key, "Verification attempts exhausted");
        Ok(VerificationReport {
            method,
            verified: false,
            attempts,
        })
    }

    async fn passes(&self, check: Check, account: &AccountRecord) -> Result<bool> {
        match check {
            Check::Touch { hold } => self.hold_touch(hold).await,
            Check::Code { kind, len } => self.code_matches(account, kind, len).await,
            Check::Facial => match self.collab.facial.verify(account).await {
                Ok(accepted) => Ok(accepted),
                Err(e) => {
                    warn!(error = %e, "Facial verifier failed; counting as a rejection");
                    Ok(false)
                }
            },
        }
    }

    /// Waits for a touch, then samples every poll interval until either
    /// `hold` has elapsed on the clock or the sensor is released.
    async fn hold_touch(&self, hold: Duration) -> Result<bool> {
        let input = &self.collab.input;
        let clock = &self.collab.clock;
        let poll = self.policy.poll_interval;

        while !input.touch_active().await? {
            clock.sleep(poll).await;
        }
        let pressed_at = clock.now();

        loop {
            let held = clock.now().saturating_sub(pressed_at);
            if held >= hold {
                break;
            }
            clock.sleep(poll).await;
            if !input.touch_active().await? {
                debug!(held_ms = held.as_millis() as u64, "Touch released early");
                return Ok(false);
            }
        }

        // the finger has to lift before the sensor is read again
        while input.touch_active().await? {
            clock.sleep(poll).await;
        }
        Ok(true)
    }

    async fn code_matches(
        &self,
        account: &AccountRecord,
        kind: CredentialKind,
        len: usize,
    ) -> Result<bool> {
        let entered = self.collect_code(len).await?;

        let stored = self
            .mirror
            .get(&account.path)
            .await
            .and_then(|record| resolve_credential(&record, kind));
        match stored {
            Some((strategy, expected)) => {
                debug!(?kind, ?strategy, "Credential resolved");
                Ok(expected == entered)
            }
            None => {
                warn!(key = %account.key, ?kind, "No stored credential; counting as a mismatch");
                Ok(false)
            }
        }
    }

    async fn collect_code(&self, len: usize) -> Result<String> {
        let mut buffer = DigitBuffer::code(len);
        loop {
            let key = self.collab.input.next_key().await?;
            match buffer.apply(key) {
                Edit::Confirmed(code) => return Ok(code),
                Edit::Ignored => {}
                _ => debug!(entry = %buffer.masked(), "Code entry"),
            }
        }
    }
}
