use crate::application::TreasuryContext;
use crate::application::preflight::preflight_treasury;
use crate::application::worker::{ExecutionWorker, WorkerOptions};
use crate::domain::authorization::{self, SignatureEnvelope};
use crate::domain::instruction::{InstructionStatus, Payee, PayoutInstruction};
use crate::domain::money::{Amount, Cents};
use crate::domain::ports::{GatewayRef, InstructionStoreRef, NonceStoreRef, TimesheetStoreRef};
use crate::domain::timesheet::{ContractorTimesheet, TimesheetEntry, TimesheetStatus, compute_total};
use crate::error::{PayoutError, Result};
use chrono::{DateTime, Utc};
use log::info;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Serialize)]
struct SubmitPayload<'a> {
    org_id: &'a str,
    contractor_id: &'a str,
    entries: &'a [TimesheetEntry],
    total_cents: i64,
}

#[derive(Serialize)]
struct DisputePayload<'a> {
    timesheet_id: &'a str,
    reason: &'a str,
    prior_status: String,
}

#[derive(Serialize)]
struct ResolvePayload<'a> {
    timesheet_id: &'a str,
    entries: &'a [TimesheetEntry],
    total_cents: i64,
    prior_dispute_reason: Option<&'a str>,
}

#[derive(Serialize)]
struct ApprovePayload<'a> {
    timesheet_id: &'a str,
    contractor_id: &'a str,
    total_cents: i64,
}

#[derive(Serialize)]
struct TransitionRecord<'a> {
    timesheet_id: &'a str,
    status: String,
    at: DateTime<Utc>,
}

/// The two-party timesheet handshake: contractor submits and resolves,
/// employer disputes and approves, both sides signing each transition.
///
/// Totals never come from the caller; they are recomputed from the entries
/// and the stored hourly rate on every submit and resolve. Each transition
/// appends a settlement anchor reference for audit.
pub struct TimesheetService {
    gateway: GatewayRef,
    instructions: InstructionStoreRef,
    timesheets: TimesheetStoreRef,
    nonces: NonceStoreRef,
}

impl TimesheetService {
    pub fn new(
        gateway: GatewayRef,
        instructions: InstructionStoreRef,
        timesheets: TimesheetStoreRef,
        nonces: NonceStoreRef,
    ) -> Self {
        Self {
            gateway,
            instructions,
            timesheets,
            nonces,
        }
    }

    /// Verifies the envelope over `payload` and spends its nonce, as one
    /// logical step. Everything a transition mutates happens after this.
    async fn authorize<T: Serialize>(
        &self,
        payload: &T,
        envelope: &SignatureEnvelope,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let hash = authorization::payload_hash(payload)?;
        authorization::verify(&hash, envelope, now)?;
        if !self.nonces.consume(&envelope.nonce_key(&hash)).await? {
            return Err(PayoutError::SignatureNonceReplayed);
        }
        Ok(())
    }

    fn anchor(timesheet_id: &str, status: TimesheetStatus, at: DateTime<Utc>) -> Result<String> {
        authorization::payload_hash(&TransitionRecord {
            timesheet_id,
            status: status.to_string(),
            at,
        })
    }

    /// A timesheet line is payable only for strictly positive hours; zero or
    /// negative hours would flow through to a non-positive payout total.
    fn check_entries(entries: &[TimesheetEntry], what: &str) -> Result<()> {
        if entries.is_empty() {
            return Err(PayoutError::Validation(format!(
                "a {what} needs at least one entry"
            )));
        }
        if entries.iter().any(|e| e.hours <= Decimal::ZERO) {
            return Err(PayoutError::Validation(format!(
                "{what} entry hours must be positive"
            )));
        }
        Ok(())
    }

    async fn load(&self, timesheet_id: &str) -> Result<ContractorTimesheet> {
        self.timesheets
            .get_timesheet(timesheet_id)
            .await?
            .ok_or_else(|| PayoutError::NotFound(format!("timesheet {timesheet_id}")))
    }

    /// Contractor submits worked hours; the signed payload binds the entries
    /// and the server-computed total.
    pub async fn submit(
        &self,
        org_id: &str,
        contractor_id: &str,
        hourly_rate: Cents,
        entries: Vec<TimesheetEntry>,
        envelope: SignatureEnvelope,
        now: DateTime<Utc>,
    ) -> Result<ContractorTimesheet> {
        Self::check_entries(&entries, "timesheet")?;
        let total = compute_total(&entries, hourly_rate);
        self.authorize(
            &SubmitPayload {
                org_id,
                contractor_id,
                entries: &entries,
                total_cents: total.value(),
            },
            &envelope,
            now,
        )
        .await?;

        let mut timesheet = ContractorTimesheet::new(
            org_id.to_string(),
            contractor_id.to_string(),
            hourly_rate,
            entries,
        );
        timesheet.push_anchor(Self::anchor(&timesheet.id, timesheet.status, now)?);
        self.timesheets.put_timesheet(timesheet.clone()).await?;
        info!(
            "timesheet {} submitted by contractor {contractor_id} ({} cents)",
            timesheet.id, timesheet.total
        );
        Ok(timesheet)
    }

    /// Employer disputes a submitted timesheet; the signed payload binds the
    /// reason and the status it was disputed from.
    pub async fn dispute(
        &self,
        timesheet_id: &str,
        reason: &str,
        envelope: SignatureEnvelope,
        now: DateTime<Utc>,
    ) -> Result<ContractorTimesheet> {
        let mut timesheet = self.load(timesheet_id).await?;
        if !timesheet.can_dispute() {
            return Err(PayoutError::TimesheetNotDisputable(
                timesheet.status.to_string(),
            ));
        }
        self.authorize(
            &DisputePayload {
                timesheet_id,
                reason,
                prior_status: timesheet.status.to_string(),
            },
            &envelope,
            now,
        )
        .await?;

        timesheet.dispute_reason = Some(reason.to_string());
        timesheet.set_status(TimesheetStatus::Disputed);
        timesheet.push_anchor(Self::anchor(timesheet_id, timesheet.status, now)?);
        self.timesheets.put_timesheet(timesheet.clone()).await?;
        Ok(timesheet)
    }

    /// Contractor resolves a dispute with corrected entries. The total is
    /// recomputed strictly from the new entries and the stored rate;
    /// caller-submitted totals are ignored.
    pub async fn resolve(
        &self,
        timesheet_id: &str,
        entries: Vec<TimesheetEntry>,
        envelope: SignatureEnvelope,
        now: DateTime<Utc>,
    ) -> Result<ContractorTimesheet> {
        let mut timesheet = self.load(timesheet_id).await?;
        if !timesheet.can_resolve() {
            return Err(PayoutError::TimesheetNotResolvable(
                timesheet.status.to_string(),
            ));
        }
        Self::check_entries(&entries, "resolution")?;
        let total = compute_total(&entries, timesheet.hourly_rate);
        self.authorize(
            &ResolvePayload {
                timesheet_id,
                entries: &entries,
                total_cents: total.value(),
                prior_dispute_reason: timesheet.dispute_reason.as_deref(),
            },
            &envelope,
            now,
        )
        .await?;

        timesheet.replace_entries(entries);
        timesheet.dispute_reason = None;
        timesheet.set_status(TimesheetStatus::Resubmitted);
        timesheet.push_anchor(Self::anchor(timesheet_id, timesheet.status, now)?);
        self.timesheets.put_timesheet(timesheet.clone()).await?;
        Ok(timesheet)
    }

    /// Employer approves and pays. Creates exactly one standalone instruction,
    /// preflights the treasury, and settles through the worker. A preflight or
    /// settlement failure parks the timesheet in `PayoutFailed`; approval must
    /// be re-issued, nothing retries automatically.
    pub async fn approve(
        &self,
        treasury: &TreasuryContext,
        timesheet_id: &str,
        account_ref: &str,
        envelope: SignatureEnvelope,
        now: DateTime<Utc>,
        options: &WorkerOptions,
    ) -> Result<ContractorTimesheet> {
        let mut timesheet = self.load(timesheet_id).await?;
        if !timesheet.can_approve() {
            return Err(PayoutError::TimesheetNotApprovable(
                timesheet.status.to_string(),
            ));
        }
        self.authorize(
            &ApprovePayload {
                timesheet_id,
                contractor_id: &timesheet.contractor_id,
                total_cents: timesheet.total.value(),
            },
            &envelope,
            now,
        )
        .await?;

        // Approval is the moment money is committed; a non-positive total
        // must never become an instruction.
        let amount = Amount::new(timesheet.total)?;

        timesheet.set_status(TimesheetStatus::Approved);
        timesheet.push_anchor(Self::anchor(timesheet_id, timesheet.status, now)?);
        self.timesheets.put_timesheet(timesheet.clone()).await?;

        let mut instruction = PayoutInstruction::new(
            None,
            timesheet.org_id.clone(),
            Payee::Contractor {
                contractor_id: timesheet.contractor_id.clone(),
            },
            treasury.treasury_account_ref.clone(),
            account_ref.to_string(),
            amount.cents(),
            treasury.asset_ref.clone(),
            timesheet_id,
            "contractor_timesheet",
        )?;
        self.instructions.put_instruction(instruction.clone()).await?;

        if let Err(err) = preflight_treasury(
            &self.gateway,
            &treasury.treasury_account_ref,
            &treasury.asset_ref,
            amount.cents().as_units(),
            treasury.min_native_reserve,
        )
        .await
        {
            instruction.mark_failed(err.to_string())?;
            self.instructions.put_instruction(instruction).await?;
            timesheet.set_status(TimesheetStatus::PayoutFailed);
            timesheet.push_anchor(Self::anchor(timesheet_id, timesheet.status, now)?);
            self.timesheets.put_timesheet(timesheet).await?;
            return Err(err);
        }

        let worker = ExecutionWorker::new(self.gateway.clone(), self.instructions.clone());
        let report = worker.execute(vec![instruction], options).await?;
        let executed = report
            .instructions
            .into_iter()
            .next()
            .ok_or_else(|| PayoutError::Storage("worker returned no instruction".to_string()))?;

        match executed.status {
            InstructionStatus::Confirmed => {
                timesheet.set_status(TimesheetStatus::Paid);
                if let Some(tx_ref) = &executed.tx_ref {
                    timesheet.push_anchor(tx_ref.clone());
                }
                info!(
                    "timesheet {} paid ({} cents, tx {})",
                    timesheet.id,
                    timesheet.total,
                    executed.tx_ref.as_deref().unwrap_or("?")
                );
            }
            _ => {
                timesheet.set_status(TimesheetStatus::PayoutFailed);
                timesheet.push_anchor(Self::anchor(timesheet_id, timesheet.status, now)?);
            }
        }
        self.timesheets.put_timesheet(timesheet.clone()).await?;
        Ok(timesheet)
    }
}
