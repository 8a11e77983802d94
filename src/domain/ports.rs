use crate::domain::instruction::PayoutInstruction;
use crate::domain::run::PayrollRun;
use crate::domain::timesheet::ContractorTimesheet;
use crate::domain::withdrawal::EarnedWageWithdrawal;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type GatewayRef = Arc<dyn SettlementGateway>;
pub type InstructionStoreRef = Arc<dyn InstructionStore>;
pub type RunStoreRef = Arc<dyn RunStore>;
pub type NonceStoreRef = Arc<dyn NonceStore>;
pub type WithdrawalStoreRef = Arc<dyn WithdrawalStore>;
pub type TimesheetStoreRef = Arc<dyn TimesheetStore>;

/// Treasury balances as seen by the settlement network: payout-asset units
/// plus the native units reserved for fees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances {
    pub asset_units: u128,
    pub reserve_units: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    pub idempotency_key: String,
    pub from_account_ref: String,
    pub to_account_ref: String,
    pub amount_minor_units: u128,
    pub asset_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOutcome {
    pub tx_ref: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub confirmed_at: DateTime<Utc>,
}

/// The external settlement network, behind a narrow interface.
///
/// Implementations MUST treat `idempotency_key` as a deduplication key:
/// repeated `send` calls with the same key resolve to the same transfer.
#[async_trait]
pub trait SettlementGateway: Send + Sync {
    async fn create_account(&self, label: &str) -> Result<String>;
    async fn get_balances(&self, account_ref: &str, asset_ref: &str) -> Result<Balances>;
    async fn send(&self, request: SendRequest) -> Result<SendOutcome>;
    async fn wait_for_confirmation(&self, tx_ref: &str) -> Result<Confirmation>;
    /// Bootstrap/test hook: mints balances onto an account.
    async fn credit(
        &self,
        account_ref: &str,
        asset_ref: &str,
        asset_units: u128,
        reserve_units: u128,
    ) -> Result<()>;
}

/// Instruction CRUD, keyed by instruction id independent of any run grouping.
#[async_trait]
pub trait InstructionStore: Send + Sync {
    async fn put_instruction(&self, instruction: PayoutInstruction) -> Result<()>;
    async fn get_instruction(&self, id: &str) -> Result<Option<PayoutInstruction>>;
    async fn instructions_for_run(&self, run_id: &str) -> Result<Vec<PayoutInstruction>>;
}

#[async_trait]
pub trait RunStore: Send + Sync {
    async fn put_run(&self, run: PayrollRun) -> Result<()>;
    async fn get_run(&self, id: &str) -> Result<Option<PayrollRun>>;
}

/// The used-nonce set. `consume` is the single atomic check-and-mark step that
/// replay protection rests on: it returns `true` exactly once per key.
#[async_trait]
pub trait NonceStore: Send + Sync {
    async fn consume(&self, nonce_key: &str) -> Result<bool>;
    async fn is_used(&self, nonce_key: &str) -> Result<bool>;
}

#[async_trait]
pub trait WithdrawalStore: Send + Sync {
    async fn put_withdrawal(&self, withdrawal: EarnedWageWithdrawal) -> Result<()>;
    async fn get_withdrawal(&self, id: &str) -> Result<Option<EarnedWageWithdrawal>>;
    async fn withdrawals_for_period(
        &self,
        employee_id: &str,
        period_start: NaiveDate,
    ) -> Result<Vec<EarnedWageWithdrawal>>;
}

#[async_trait]
pub trait TimesheetStore: Send + Sync {
    async fn put_timesheet(&self, timesheet: ContractorTimesheet) -> Result<()>;
    async fn get_timesheet(&self, id: &str) -> Result<Option<ContractorTimesheet>>;
    async fn timesheets_for_org(&self, org_id: &str) -> Result<Vec<ContractorTimesheet>>;
}
