use crate::domain::accrual::PayPeriod;
use crate::domain::authorization::SignatureEnvelope;
use crate::domain::money::Cents;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WithdrawalStatus {
    Requested,
    Submitted,
    Confirmed,
    Failed,
}

impl WithdrawalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }

    /// Counts toward the period's in-flight total until a terminal state.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Requested | Self::Submitted)
    }
}

/// One earned-wage advance request. Created on request, terminal on
/// `Confirmed` or `Failed`; after that only audit references are attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarnedWageWithdrawal {
    pub id: String,
    pub org_id: String,
    pub employee_id: String,
    pub amount: Cents,
    pub period_start: chrono::NaiveDate,
    pub period_end: chrono::NaiveDate,
    pub status: WithdrawalStatus,
    pub envelope: SignatureEnvelope,
    pub instruction_id: String,
    pub tx_ref: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl EarnedWageWithdrawal {
    pub fn new(
        org_id: String,
        employee_id: String,
        amount: Cents,
        period: PayPeriod,
        envelope: SignatureEnvelope,
        instruction_id: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            org_id,
            employee_id,
            amount,
            period_start: period.start,
            period_end: period.end,
            status: WithdrawalStatus::Requested,
            envelope,
            instruction_id,
            tx_ref: None,
            updated_at: Utc::now(),
        }
    }

    pub fn set_status(&mut self, status: WithdrawalStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// Per-employee, per-period availability snapshot.
///
/// Recomputed from the withdrawal records on every query; this is a cache of
/// derived state, never a source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarnedWageLedgerPeriod {
    pub period_start: chrono::NaiveDate,
    pub period_end: chrono::NaiveDate,
    pub net_period_estimate: Cents,
    pub accrued: Cents,
    pub confirmed_withdrawn: Cents,
    pub pending_withdrawn: Cents,
    pub available: Cents,
}
