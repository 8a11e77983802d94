use crate::application::TreasuryContext;
use crate::application::preflight::preflight_treasury;
use crate::application::worker::{ExecutionReport, ExecutionWorker, WorkerOptions};
use crate::domain::instruction::{InstructionStatus, Payee, PayoutInstruction};
use crate::domain::money::{Amount, Cents};
use crate::domain::ports::{GatewayRef, InstructionStoreRef, RunStoreRef};
use crate::domain::run::{PayrollRun, RunStatus};
use crate::error::{PayoutError, Result};
use log::info;

/// One requested payout within a run, before it becomes an instruction.
#[derive(Debug, Clone)]
pub struct PayoutRequest {
    pub payee: Payee,
    pub account_ref: String,
    pub amount: Amount,
}

/// A run preview: the instructions that would execute, with their idempotency
/// keys derived, and the aggregate the treasury must cover. Nothing persisted.
#[derive(Debug, Clone)]
pub struct RunPreview {
    pub instructions: Vec<PayoutInstruction>,
    pub total: Cents,
}

#[derive(Debug)]
pub struct RunExecution {
    pub run: PayrollRun,
    pub report: ExecutionReport,
}

/// Creates and executes payroll runs: preflight, worker pass, run-level status
/// derivation, all persisted through the stores.
pub struct PayrollService {
    gateway: GatewayRef,
    instructions: InstructionStoreRef,
    runs: RunStoreRef,
}

impl PayrollService {
    pub fn new(gateway: GatewayRef, instructions: InstructionStoreRef, runs: RunStoreRef) -> Self {
        Self {
            gateway,
            instructions,
            runs,
        }
    }

    fn build_instructions(
        treasury: &TreasuryContext,
        run_id: Option<String>,
        period_label: &str,
        requests: &[PayoutRequest],
    ) -> Result<(Vec<PayoutInstruction>, Cents)> {
        let mut total = Cents::ZERO;
        let mut instructions = Vec::with_capacity(requests.len());
        for req in requests {
            total += req.amount.cents();
            instructions.push(PayoutInstruction::new(
                run_id.clone(),
                treasury.org_id.clone(),
                req.payee.clone(),
                treasury.treasury_account_ref.clone(),
                req.account_ref.clone(),
                req.amount.cents(),
                treasury.asset_ref.clone(),
                period_label,
                "payroll_run",
            )?);
        }
        Ok((instructions, total))
    }

    /// Derives the run's instructions without persisting anything. Re-deriving
    /// a preview yields the same idempotency keys as the eventual run.
    pub fn preview(
        &self,
        treasury: &TreasuryContext,
        period_label: &str,
        requests: &[PayoutRequest],
    ) -> Result<RunPreview> {
        let (instructions, total) =
            Self::build_instructions(treasury, None, period_label, requests)?;
        Ok(RunPreview {
            instructions,
            total,
        })
    }

    /// Persists a new `Pending` run and its instructions.
    pub async fn create_run(
        &self,
        treasury: &TreasuryContext,
        period_label: &str,
        requests: &[PayoutRequest],
    ) -> Result<PayrollRun> {
        if requests.is_empty() {
            return Err(PayoutError::Validation(
                "a run needs at least one payout request".to_string(),
            ));
        }
        let run = PayrollRun::new(treasury.org_id.clone());
        let (instructions, total) =
            Self::build_instructions(treasury, Some(run.id.clone()), period_label, requests)?;
        for instruction in instructions {
            self.instructions.put_instruction(instruction).await?;
        }
        self.runs.put_run(run.clone()).await?;
        info!(
            "created run {} for org {} ({} payouts, {total} cents)",
            run.id,
            treasury.org_id,
            requests.len()
        );
        Ok(run)
    }

    /// Executes a run end to end: preflight, worker pass, status derivation.
    ///
    /// Re-executing a completed run is a no-op pass: the worker skips every
    /// confirmed instruction, so it returns zero receipts and the status stays
    /// `Completed`. A preflight failure fails every outstanding instruction,
    /// halts the run and surfaces the reasons.
    pub async fn execute_run(
        &self,
        run_id: &str,
        treasury: &TreasuryContext,
        options: &WorkerOptions,
    ) -> Result<RunExecution> {
        let mut run = self
            .runs
            .get_run(run_id)
            .await?
            .ok_or_else(|| PayoutError::RunNotExecutable(format!("unknown run {run_id}")))?;
        if run.status == RunStatus::Executing {
            return Err(PayoutError::RunNotExecutable(format!(
                "run {run_id} is already executing"
            )));
        }
        let mut instructions = self.instructions.instructions_for_run(run_id).await?;
        if instructions.is_empty() {
            return Err(PayoutError::RunNotExecutable(format!(
                "run {run_id} has no instructions"
            )));
        }

        run.status = RunStatus::Executing;
        run.updated_at = chrono::Utc::now();
        self.runs.put_run(run.clone()).await?;

        // Only the outstanding amount needs covering; confirmed instructions
        // are settled money.
        let required: u128 = instructions
            .iter()
            .filter(|i| i.status != InstructionStatus::Confirmed)
            .map(|i| i.amount.as_units())
            .sum();

        if required > 0
            && let Err(err) = preflight_treasury(
                &self.gateway,
                &treasury.treasury_account_ref,
                &treasury.asset_ref,
                required,
                treasury.min_native_reserve,
            )
            .await
        {
            let code = err.to_string();
            for instruction in instructions
                .iter_mut()
                .filter(|i| !i.status.is_terminal())
            {
                instruction.mark_failed(code.clone())?;
                self.instructions.put_instruction(instruction.clone()).await?;
            }
            run.status = RunStatus::Halted;
            run.updated_at = chrono::Utc::now();
            self.runs.put_run(run).await?;
            return Err(err);
        }

        let worker = ExecutionWorker::new(self.gateway.clone(), self.instructions.clone());
        let report = worker.execute(instructions, options).await?;

        // The breaker flag lives on the report; run status follows strictly
        // from the per-instruction tallies. An empty pass (everything already
        // confirmed) derives Completed.
        run.status = RunStatus::derive(report.failed_count(), report.receipts.len());
        run.updated_at = chrono::Utc::now();
        self.runs.put_run(run.clone()).await?;
        info!(
            "run {} finished as {} (failure rate {:.2})",
            run.id, run.status, report.failure_rate
        );

        Ok(RunExecution { run, report })
    }
}
