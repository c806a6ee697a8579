use crate::domain::account::{Amount, Balance};
use crate::domain::keypad::{DigitBuffer, Edit, Key};
use serde::{Deserialize, Serialize};

/// Decision taken when a withdrawal amount is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// `0 < A <= balance`: debit to `new_balance` and dispense.
    Debit { amount: Amount, new_balance: Balance },
    /// `A > balance`: no debit.
    Insufficient { requested: u64, balance: Balance },
    /// `A <= 0`: rejected before touching the balance.
    Rejected { requested: u64 },
}

/// Amount entry for one verified session.
#[derive(Debug, Clone)]
pub struct WithdrawalRequest {
    buffer: DigitBuffer,
    insufficient: bool,
}

impl WithdrawalRequest {
    pub fn new(max_digits: usize) -> Self {
        Self {
            buffer: DigitBuffer::amount(max_digits),
            insufficient: false,
        }
    }

    pub fn apply(&mut self, key: Key) -> Edit {
        self.buffer.apply(key)
    }

    pub fn amount_buffer(&self) -> &str {
        self.buffer.as_str()
    }

    pub fn insufficient(&self) -> bool {
        self.insufficient
    }

    /// Parses the confirmed buffer. An unparsable buffer reads as zero.
    pub fn requested(&self) -> u64 {
        self.buffer.as_str().parse().unwrap_or(0)
    }

    /// Settles the confirmed amount against `balance` and updates the
    /// insufficient flag accordingly.
    pub fn settle(&mut self, balance: Balance) -> Settlement {
        let requested = self.requested();
        let settlement = match Amount::new(requested) {
            Err(_) => Settlement::Rejected { requested },
            Ok(amount) => match balance.debit(amount) {
                Ok(new_balance) => Settlement::Debit {
                    amount,
                    new_balance,
                },
                Err(_) => Settlement::Insufficient { requested, balance },
            },
        };
        self.insufficient = !matches!(settlement, Settlement::Debit { .. });
        settlement
    }
}

/// Written once per successful debit and dispense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResult {
    pub completed: bool,
    pub new_balance: Balance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalOutcome {
    Completed(TransactionResult),
    Insufficient { requested: u64, balance: Balance },
    Rejected { requested: u64 },
}

impl WithdrawalOutcome {
    pub fn completed(&self) -> bool {
        matches!(self, WithdrawalOutcome::Completed(r) if r.completed)
    }

    pub fn insufficient_flag(&self) -> bool {
        !matches!(self, WithdrawalOutcome::Completed(_))
    }
}

/// Intent recorded before a debit when the withdrawal journal is enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingWithdrawal {
    pub key: String,
    pub amount: u64,
    pub previous_balance: Balance,
    pub new_balance: Balance,
}
