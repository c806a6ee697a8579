use crate::application::Collaborators;
use crate::application::journal::WithdrawalJournal;
use crate::application::mirror::RemoteMirror;
use crate::config::AtmConfig;
use crate::domain::account::{AccountRecord, AccountType, Balance};
use crate::domain::keypad::Edit;
use crate::domain::ports::BeepPattern;
use crate::domain::schema::{self, field};
use crate::domain::transaction::{
    PendingWithdrawal, Settlement, TransactionResult, WithdrawalOutcome, WithdrawalRequest,
};
use crate::error::Result;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct TransactionPolicy {
    pub directory_path: String,
    pub amount_max_digits: usize,
    pub dispense_angle: u8,
    pub invalid_beep: BeepPattern,
    pub insufficient_beep: BeepPattern,
    pub dispense_beep: BeepPattern,
}

impl From<&AtmConfig> for TransactionPolicy {
    fn from(config: &AtmConfig) -> Self {
        Self {
            directory_path: config.directory_path.clone(),
            amount_max_digits: config.amount_max_digits,
            dispense_angle: config.dispense_angle,
            invalid_beep: config.beeps.invalid_amount,
            insufficient_beep: config.beeps.insufficient_balance,
            dispense_beep: config.beeps.dispense,
        }
    }
}

/// What startup reconciliation did with each open intent, by directory key.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Debited but never confirmed as dispensed; the balance was restored.
    pub reverted: Vec<String>,
    /// Stale intents whose outcome was already consistent.
    pub cleared: Vec<String>,
    /// Balance matches neither side of the intent; left for an operator.
    pub unresolved: Vec<String>,
}

/// Amount entry, balance validation, debit and dispense for a verified
/// account.
///
/// The balance is written before the dispense actuates. With a journal
/// attached, an intent is recorded before the debit and cleared after the
/// completion mirrors, so an interrupted withdrawal can be reconciled on the
/// next start.
pub struct TransactionEngine {
    collab: Collaborators,
    mirror: RemoteMirror,
    policy: TransactionPolicy,
    journal: Option<WithdrawalJournal>,
}

impl TransactionEngine {
    pub fn new(collab: Collaborators, policy: TransactionPolicy) -> Self {
        let mirror = RemoteMirror::new(collab.store.clone());
        Self {
            collab,
            mirror,
            policy,
            journal: None,
        }
    }

    pub fn with_journal(mut self) -> Self {
        self.journal = Some(WithdrawalJournal::new(self.mirror.clone()));
        self
    }

    /// Waits for `1` (Savings) or `2` (Current); other keys are ignored.
    pub async fn select_account_type(&self, account: &AccountRecord) -> Result<AccountType> {
        loop {
            let key = self.collab.input.next_key().await?;
            if let Some(account_type) = key.digit().and_then(AccountType::from_code) {
                self.record_account_type(account, account_type).await;
                return Ok(account_type);
            }
            debug!(%key, "Ignored key during account type selection");
        }
    }

    pub async fn record_account_type(&self, account: &AccountRecord, account_type: AccountType) {
        info!(?account_type, key = %account.key, "Account type selected");
        self.mirror
            .put_both(
                schema::ACCOUNT_TYPE,
                account,
                field::ACCOUNT_TYPE,
                account_type.code(),
            )
            .await;
    }

    /// Runs amount entry to confirmation and settles it against the stored
    /// balance.
    pub async fn withdraw(&self, account: &AccountRecord) -> Result<WithdrawalOutcome> {
        let mut request = WithdrawalRequest::new(self.policy.amount_max_digits);
        self.reset_mirrors(account).await;

        loop {
            let key = self.collab.input.next_key().await?;
            let edit = request.apply(key);
            if !edit.is_publishable() {
                continue;
            }
            self.mirror
                .put_both(
                    schema::WITHDRAWAL_AMOUNT,
                    account,
                    field::WITHDRAWAL_AMOUNT,
                    request.amount_buffer(),
                )
                .await;
            if let Edit::Confirmed(_) = edit {
                break;
            }
        }

        // re-read at confirm time; the directory copy may be stale
        let stored = self.mirror.get(&account.field_path(field::BALANCE)).await;
        let balance = Balance::from_value(stored.as_ref());

        match request.settle(balance) {
            Settlement::Rejected { requested } => {
                warn!(requested, "Withdrawal amount rejected");
                self.set_insufficient(account, true).await;
                self.collab.sound(self.policy.invalid_beep).await;
                Ok(WithdrawalOutcome::Rejected { requested })
            }
            Settlement::Insufficient { requested, balance } => {
                info!(requested, %balance, key = %account.key, "Insufficient balance");
                self.set_insufficient(account, true).await;
                self.set_completed(account, false).await;
                self.collab.sound(self.policy.insufficient_beep).await;
                Ok(WithdrawalOutcome::Insufficient { requested, balance })
            }
            Settlement::Debit {
                amount,
                new_balance,
            } => {
                self.set_insufficient(account, false).await;
                if let Some(journal) = &self.journal {
                    let intent = PendingWithdrawal {
                        key: account.key.clone(),
                        amount: amount.value(),
                        previous_balance: balance,
                        new_balance,
                    };
                    if !journal.open(&intent).await? {
                        warn!(
                            key = %account.key,
                            "Withdrawal intent not recorded; debit is unjournaled"
                        );
                    }
                }

                self.mirror
                    .put(&account.field_path(field::BALANCE), &new_balance.to_string())
                    .await;
                self.release_cash().await?;
                self.set_completed(account, true).await;
                if let Some(journal) = &self.journal {
                    journal.close(&account.key).await;
                }
                self.finish_dispense().await?;

                info!(
                    amount = amount.value(),
                    %new_balance,
                    key = %account.key,
                    "Withdrawal completed"
                );
                Ok(WithdrawalOutcome::Completed(TransactionResult {
                    completed: true,
                    new_balance,
                }))
            }
        }
    }

    /// Drives the servo to the dispense angle. Once this succeeds the cash is
    /// out, so completion is recorded before the servo is homed.
    async fn release_cash(&self) -> Result<()> {
        self.collab
            .actuator
            .set_servo_angle(self.policy.dispense_angle)
            .await
    }

    /// Sounds the dispense pattern and returns the servo home.
    async fn finish_dispense(&self) -> Result<()> {
        self.collab.sound(self.policy.dispense_beep).await;
        self.collab.actuator.set_servo_angle(0).await
    }

    /// Resolves intents left open by an interrupted withdrawal. Does nothing
    /// when no journal is attached.
    pub async fn reconcile_pending(&self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let Some(journal) = &self.journal else {
            return Ok(report);
        };

        for intent in journal.pending().await {
            let record = schema::child(&self.policy.directory_path, &intent.key);
            let balance_path = schema::child(&record, field::BALANCE);
            let completed_path = schema::child(&record, field::TRANSACTION_COMPLETED);

            let current = self
                .mirror
                .get(&balance_path)
                .await
                .map(|v| Balance::from_value(Some(&v)));
            let dispensed = self
                .mirror
                .get(&completed_path)
                .await
                .and_then(|v| v.as_str().map(|s| s == "1"))
                .unwrap_or(false);

            match current {
                Some(balance) if balance == intent.new_balance && !dispensed => {
                    warn!(
                        key = %intent.key,
                        amount = intent.amount,
                        restored = %intent.previous_balance,
                        "Reverting debit without a confirmed dispense"
                    );
                    self.mirror
                        .put(&balance_path, &intent.previous_balance.to_string())
                        .await;
                    journal.close(&intent.key).await;
                    report.reverted.push(intent.key);
                }
                Some(balance)
                    if balance == intent.previous_balance || balance == intent.new_balance =>
                {
                    debug!(key = %intent.key, "Clearing settled withdrawal intent");
                    journal.close(&intent.key).await;
                    report.cleared.push(intent.key);
                }
                _ => {
                    warn!(
                        key = %intent.key,
                        expected = %intent.new_balance,
                        current = ?current.map(|b| b.value()),
                        "Withdrawal intent left for manual reconciliation"
                    );
                    report.unresolved.push(intent.key);
                }
            }
        }
        Ok(report)
    }

    async fn reset_mirrors(&self, account: &AccountRecord) {
        self.mirror
            .put_both(schema::WITHDRAWAL_AMOUNT, account, field::WITHDRAWAL_AMOUNT, "")
            .await;
        self.set_completed(account, false).await;
        self.set_insufficient(account, false).await;
    }

    async fn set_completed(&self, account: &AccountRecord, completed: bool) {
        self.mirror
            .put_both(
                schema::TRANSACTION_COMPLETED,
                account,
                field::TRANSACTION_COMPLETED,
                schema::flag(completed),
            )
            .await;
    }

    async fn set_insufficient(&self, account: &AccountRecord, insufficient: bool) {
        self.mirror
            .put_both(
                schema::INSUFFICIENT_BALANCE,
                account,
                field::INSUFFICIENT_BALANCE,
                schema::flag(insufficient),
            )
            .await;
    }
}
