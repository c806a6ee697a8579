use crate::application::Collaborators;
use crate::application::directory::ScanningDirectory;
use crate::application::mirror::RemoteMirror;
use crate::application::transaction::TransactionEngine;
use crate::application::verification::VerificationEngine;
use crate::config::AtmConfig;
use crate::domain::account::AccountType;
use crate::domain::auth::AuthMethod;
use crate::domain::keypad::{DigitBuffer, Edit};
use crate::domain::ports::SharedDirectory;
use crate::domain::schema;
use crate::domain::transaction::WithdrawalOutcome;
use crate::error::{AtmError, Result};
use std::sync::Arc;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// How one account session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    AccountNotFound {
        account_number: String,
    },
    Unverified {
        account_number: String,
        method: AuthMethod,
        attempts: u32,
    },
    Withdrawal {
        account_number: String,
        account_type: AccountType,
        outcome: WithdrawalOutcome,
    },
}

/// Progress of the session in flight. Lives for one account number.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub account_number: String,
    pub account_key: Option<String>,
    pub method: Option<AuthMethod>,
    pub account_type: Option<AccountType>,
}

impl SessionContext {
    pub fn new(account_number: String) -> Self {
        Self {
            account_number,
            ..Self::default()
        }
    }
}

/// One physical terminal: runs account sessions back to back.
pub struct Terminal {
    collab: Collaborators,
    config: AtmConfig,
    directory: SharedDirectory,
    mirror: RemoteMirror,
    verification: VerificationEngine,
    transactions: TransactionEngine,
}

impl Terminal {
    /// Builds a terminal that resolves accounts by scanning the configured
    /// directory collection.
    pub fn new(collab: Collaborators, config: AtmConfig) -> Self {
        let directory: SharedDirectory = Arc::new(ScanningDirectory::new(
            collab.store.clone(),
            config.directory_path.clone(),
        ));
        Self::with_directory(collab, config, directory)
    }

    pub fn with_directory(
        collab: Collaborators,
        config: AtmConfig,
        directory: SharedDirectory,
    ) -> Self {
        let mirror = RemoteMirror::new(collab.store.clone());
        let verification = VerificationEngine::new(collab.clone(), (&config).into());
        let mut transactions = TransactionEngine::new(collab.clone(), (&config).into());
        if config.journal_withdrawals {
            transactions = transactions.with_journal();
        }
        Self {
            collab,
            config,
            directory,
            mirror,
            verification,
            transactions,
        }
    }

    /// Brings the remote link up, homes the actuators and reconciles any
    /// interrupted withdrawals.
    pub async fn start(&self) -> Result<()> {
        let timeout = self.config.network_timeout();
        match tokio::time::timeout(timeout, self.collab.store.bring_up()).await {
            Ok(Ok(())) => {}
            Ok(Err(AtmError::NetworkUnavailable(reason))) => {
                return Err(AtmError::NetworkUnavailable(reason));
            }
            Ok(Err(e)) => return Err(AtmError::NetworkUnavailable(e.to_string())),
            Err(_) => {
                return Err(AtmError::NetworkUnavailable(format!(
                    "bring-up did not complete within {timeout:?}"
                )));
            }
        }

        self.collab.actuator.set_servo_angle(0).await?;
        self.collab.actuator.set_buzzer(false).await?;

        if self.config.journal_withdrawals {
            let report = self.transactions.reconcile_pending().await?;
            if !report.unresolved.is_empty() {
                warn!(keys = ?report.unresolved, "Unresolved withdrawal intents");
            }
            info!(
                reverted = report.reverted.len(),
                cleared = report.cleared.len(),
                unresolved = report.unresolved.len(),
                "Withdrawal journal reconciled"
            );
        }
        info!(directory = %self.config.directory_path, "Terminal ready");
        Ok(())
    }

    /// Runs sessions until the input source closes and returns every
    /// completed session's outcome. Errors inside a session are logged and
    /// the terminal goes back to awaiting an account number.
    pub async fn run(&self) -> Result<Vec<SessionOutcome>> {
        let mut outcomes = Vec::new();
        loop {
            let span = info_span!("session", seq = outcomes.len() + 1);
            match self.run_session().instrument(span).await {
                Ok(outcome) => {
                    info!(?outcome, "Session finished");
                    outcomes.push(outcome);
                }
                Err(AtmError::InputClosed) => {
                    info!(sessions = outcomes.len(), "Input closed; terminal stopping");
                    return Ok(outcomes);
                }
                Err(e) => error!(error = %e, "Session aborted"),
            }
        }
    }

    /// Runs one account session from the welcome screen to its terminal
    /// outcome.
    pub async fn run_session(&self) -> Result<SessionOutcome> {
        self.mirror.put(schema::WELCOME, "1").await;
        let account_number = self.read_account_number().await?;
        self.mirror.put(schema::ACCOUNT_NUMBER, &account_number).await;

        let mut ctx = SessionContext::new(account_number);
        match self.serve(&mut ctx).await {
            Err(AtmError::AccountNotFound(account_number)) => {
                info!(%account_number, "Account not found");
                self.verification.fail_pulse(None).await;
                self.collab.sound(self.config.beeps.account_not_found).await;
                Ok(SessionOutcome::AccountNotFound { account_number })
            }
            Err(AtmError::VerificationExhausted { method, attempts }) => {
                Ok(SessionOutcome::Unverified {
                    account_number: ctx.account_number,
                    method,
                    attempts,
                })
            }
            other => other,
        }
    }

    async fn serve(&self, ctx: &mut SessionContext) -> Result<SessionOutcome> {
        let account = self
            .directory
            .find(&ctx.account_number)
            .await?
            .ok_or_else(|| AtmError::AccountNotFound(ctx.account_number.clone()))?;
        info!(key = %account.key, "Account matched");
        ctx.account_key = Some(account.key.clone());

        let method = self.select_method().await?;
        ctx.method = Some(method);
        let report = self.verification.verify(method, &account).await?;
        if !report.verified {
            return Err(AtmError::VerificationExhausted {
                method,
                attempts: report.attempts,
            });
        }

        let account_type = self.transactions.select_account_type(&account).await?;
        ctx.account_type = Some(account_type);
        let outcome = self.transactions.withdraw(&account).await?;

        Ok(SessionOutcome::Withdrawal {
            account_number: ctx.account_number.clone(),
            account_type,
            outcome,
        })
    }

    async fn read_account_number(&self) -> Result<String> {
        let mut buffer = DigitBuffer::number(self.config.account_number_max_digits);
        loop {
            let key = self.collab.input.next_key().await?;
            match buffer.apply(key) {
                Edit::Confirmed(number) => return Ok(number),
                Edit::Ignored => {}
                _ => debug!(entry = buffer.as_str(), "Account number entry"),
            }
        }
    }

    /// Waits for a method key `1`..`4`; other keys are ignored.
    async fn select_method(&self) -> Result<AuthMethod> {
        loop {
            let key = self.collab.input.next_key().await?;
            if let Some(method) = AuthMethod::from_key(key) {
                self.mirror
                    .put(schema::SELECTION, method.selection_code())
                    .await;
                self.mirror.put(schema::WELCOME, "0").await;
                info!(?method, "Verification method selected");
                return Ok(method);
            }
            debug!(%key, "Ignored key during method selection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::Balance;
    use crate::domain::transaction::TransactionResult;
    use crate::infrastructure::in_memory::InMemoryRemoteStore;
    use crate::infrastructure::simulated::{
        ActuatorEvent, ManualClock, ScriptedInput, SimulatedActuator, StaticFacialVerifier,
    };
    use serde_json::json;

    async fn terminal(script: &str) -> (Terminal, InMemoryRemoteStore, SimulatedActuator) {
        let store = InMemoryRemoteStore::new();
        store
            .insert(
                "/ATM/Users/k1",
                json!({ "accountNumber": "4821", "PIN": "9137", "balance": "5000" }),
            )
            .await;
        let actuator = SimulatedActuator::new();
        let collab = Collaborators {
            store: Arc::new(store.clone()),
            input: Arc::new(ScriptedInput::with_keys(script).unwrap()),
            actuator: Arc::new(actuator.clone()),
            clock: Arc::new(ManualClock::new()),
            facial: Arc::new(StaticFacialVerifier::default()),
        };
        (Terminal::new(collab, AtmConfig::default()), store, actuator)
    }

    #[tokio::test]
    async fn test_full_session() {
        let (terminal, store, _) = terminal("4821# 3 9137# 1 2000#").await;
        terminal.start().await.unwrap();
        let outcomes = terminal.run().await.unwrap();

        assert_eq!(
            outcomes,
            vec![SessionOutcome::Withdrawal {
                account_number: "4821".into(),
                account_type: AccountType::Savings,
                outcome: WithdrawalOutcome::Completed(TransactionResult {
                    completed: true,
                    new_balance: Balance(3000),
                }),
            }]
        );
        assert_eq!(store.writes_to("/ATM/Welcome").await, vec!["1", "0", "1"]);
        assert_eq!(store.text("/ATM/Selection").await.as_deref(), Some("3"));
        assert_eq!(store.text("/ATM/AccountNumber").await.as_deref(), Some("4821"));
    }

    #[tokio::test]
    async fn test_account_not_found() {
        let (terminal, store, actuator) = terminal("7777#").await;
        let outcomes = terminal.run().await.unwrap();

        assert_eq!(
            outcomes,
            vec![SessionOutcome::AccountNotFound {
                account_number: "7777".into()
            }]
        );
        assert_eq!(store.writes_to("/ATM/Verification").await, vec!["2", "0"]);
        assert_eq!(
            actuator.beeps().await,
            vec![AtmConfig::default().beeps.account_not_found]
        );
    }

    #[tokio::test]
    async fn test_method_keys_outside_menu_are_ignored() {
        let (terminal, store, _) = terminal("4821# 9 0 * 3 0000# 0000# 0000#").await;
        let outcomes = terminal.run().await.unwrap();

        assert_eq!(
            outcomes,
            vec![SessionOutcome::Unverified {
                account_number: "4821".into(),
                method: AuthMethod::Pin,
                attempts: 3,
            }]
        );
        assert_eq!(store.writes_to("/ATM/Selection").await, vec!["3"]);
        assert!(store.writes_to("/ATM/AccountType").await.is_empty());
    }

    #[tokio::test]
    async fn test_start_homes_actuators() {
        let (terminal, _, actuator) = terminal("").await;
        terminal.start().await.unwrap();
        assert_eq!(
            actuator.events().await,
            vec![ActuatorEvent::Servo(0), ActuatorEvent::Buzzer(false)]
        );
    }

    #[tokio::test]
    async fn test_bring_up_failure_is_fatal() {
        let (terminal, store, _) = terminal("").await;
        store.fail_bring_up().await;
        assert!(matches!(
            terminal.start().await,
            Err(AtmError::NetworkUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_session_error_does_not_stop_terminal() {
        let (terminal, store, actuator) = terminal("4821# 3 9137# 1 100#  4821# 3 9137# 2 100#").await;
        actuator.fail_commands(true);

        let outcomes = terminal.run().await.unwrap();
        // both sessions abort at dispense; the terminal keeps going
        assert!(outcomes.is_empty());
        assert_eq!(store.text("/ATM/Users/k1/balance").await.as_deref(), Some("4800"));
        assert_eq!(store.writes_to("/ATM/AccountType").await, vec!["1", "2"]);
    }
}
