use crate::domain::instruction::PayoutInstruction;
use crate::domain::ports::{
    InstructionStore, NonceStore, RunStore, TimesheetStore, WithdrawalStore,
};
use crate::domain::run::PayrollRun;
use crate::domain::timesheet::ContractorTimesheet;
use crate::domain::withdrawal::EarnedWageWithdrawal;
use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory ledger store backing every port.
///
/// Uses `Arc<RwLock<HashMap>>` per entity for shared concurrent access. Nonce
/// consumption takes the write lock for the whole check-and-insert, so two
/// concurrent requests can never both pass replay validation. Ideal for tests
/// and the simulated-ledger CLI path; persistence lives in the RocksDB store.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    instructions: Arc<RwLock<HashMap<String, PayoutInstruction>>>,
    runs: Arc<RwLock<HashMap<String, PayrollRun>>>,
    nonces: Arc<RwLock<HashSet<String>>>,
    withdrawals: Arc<RwLock<HashMap<String, EarnedWageWithdrawal>>>,
    timesheets: Arc<RwLock<HashMap<String, ContractorTimesheet>>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InstructionStore for InMemoryLedgerStore {
    async fn put_instruction(&self, instruction: PayoutInstruction) -> Result<()> {
        let mut instructions = self.instructions.write().await;
        instructions.insert(instruction.id.clone(), instruction);
        Ok(())
    }

    async fn get_instruction(&self, id: &str) -> Result<Option<PayoutInstruction>> {
        let instructions = self.instructions.read().await;
        Ok(instructions.get(id).cloned())
    }

    async fn instructions_for_run(&self, run_id: &str) -> Result<Vec<PayoutInstruction>> {
        let instructions = self.instructions.read().await;
        let mut found: Vec<_> = instructions
            .values()
            .filter(|i| i.run_id.as_deref() == Some(run_id))
            .cloned()
            .collect();
        // HashMap order is arbitrary; keep passes deterministic.
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }
}

#[async_trait]
impl RunStore for InMemoryLedgerStore {
    async fn put_run(&self, run: PayrollRun) -> Result<()> {
        let mut runs = self.runs.write().await;
        runs.insert(run.id.clone(), run);
        Ok(())
    }

    async fn get_run(&self, id: &str) -> Result<Option<PayrollRun>> {
        let runs = self.runs.read().await;
        Ok(runs.get(id).cloned())
    }
}

#[async_trait]
impl NonceStore for InMemoryLedgerStore {
    async fn consume(&self, nonce_key: &str) -> Result<bool> {
        let mut nonces = self.nonces.write().await;
        Ok(nonces.insert(nonce_key.to_string()))
    }

    async fn is_used(&self, nonce_key: &str) -> Result<bool> {
        let nonces = self.nonces.read().await;
        Ok(nonces.contains(nonce_key))
    }
}

#[async_trait]
impl WithdrawalStore for InMemoryLedgerStore {
    async fn put_withdrawal(&self, withdrawal: EarnedWageWithdrawal) -> Result<()> {
        let mut withdrawals = self.withdrawals.write().await;
        withdrawals.insert(withdrawal.id.clone(), withdrawal);
        Ok(())
    }

    async fn get_withdrawal(&self, id: &str) -> Result<Option<EarnedWageWithdrawal>> {
        let withdrawals = self.withdrawals.read().await;
        Ok(withdrawals.get(id).cloned())
    }

    async fn withdrawals_for_period(
        &self,
        employee_id: &str,
        period_start: NaiveDate,
    ) -> Result<Vec<EarnedWageWithdrawal>> {
        let withdrawals = self.withdrawals.read().await;
        Ok(withdrawals
            .values()
            .filter(|w| w.employee_id == employee_id && w.period_start == period_start)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TimesheetStore for InMemoryLedgerStore {
    async fn put_timesheet(&self, timesheet: ContractorTimesheet) -> Result<()> {
        let mut timesheets = self.timesheets.write().await;
        timesheets.insert(timesheet.id.clone(), timesheet);
        Ok(())
    }

    async fn get_timesheet(&self, id: &str) -> Result<Option<ContractorTimesheet>> {
        let timesheets = self.timesheets.read().await;
        Ok(timesheets.get(id).cloned())
    }

    async fn timesheets_for_org(&self, org_id: &str) -> Result<Vec<ContractorTimesheet>> {
        let timesheets = self.timesheets.read().await;
        Ok(timesheets
            .values()
            .filter(|t| t.org_id == org_id)
            .cloned()
            .collect())
    }
}
