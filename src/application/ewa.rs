use crate::application::TreasuryContext;
use crate::application::preflight::preflight_treasury;
use crate::application::worker::{ExecutionWorker, WorkerOptions};
use crate::domain::accrual::{self, PayPeriod};
use crate::domain::authorization::{self, SignatureEnvelope};
use crate::domain::instruction::{InstructionStatus, Payee, PayoutInstruction};
use crate::domain::money::{Amount, Cents};
use crate::domain::ports::{GatewayRef, InstructionStoreRef, NonceStoreRef, WithdrawalStoreRef};
use crate::domain::withdrawal::{EarnedWageLedgerPeriod, EarnedWageWithdrawal, WithdrawalStatus};
use crate::error::{PayoutError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use log::info;
use serde::{Deserialize, Serialize};

/// The employment facts availability is computed from. Owned by the caller
/// (org onboarding is out of scope); the service only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeProfile {
    pub org_id: String,
    pub employee_id: String,
    pub wallet_address: String,
    pub account_ref: String,
    pub annual_salary: Cents,
    pub extra_withholding: Cents,
    /// First day of the employee's first pay period.
    pub anchor_date: NaiveDate,
    /// Share of accrued net pay that may be advanced, in percent.
    pub accrual_cap_percent: u8,
}

/// What the employee's wallet signs when requesting an advance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancePayload {
    pub org_id: String,
    pub employee_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub amount_cents: i64,
}

impl AdvancePayload {
    pub fn new(profile: &EmployeeProfile, period: PayPeriod, amount: Cents) -> Self {
        Self {
            org_id: profile.org_id.clone(),
            employee_id: profile.employee_id.clone(),
            period_start: period.start,
            period_end: period.end,
            amount_cents: amount.value(),
        }
    }
}

/// Earned-wage advances: availability queries and the signed request flow.
pub struct EwaService {
    gateway: GatewayRef,
    instructions: InstructionStoreRef,
    withdrawals: WithdrawalStoreRef,
    nonces: NonceStoreRef,
}

impl EwaService {
    pub fn new(
        gateway: GatewayRef,
        instructions: InstructionStoreRef,
        withdrawals: WithdrawalStoreRef,
        nonces: NonceStoreRef,
    ) -> Self {
        Self {
            gateway,
            instructions,
            withdrawals,
            nonces,
        }
    }

    /// Recomputes the employee's period ledger from the withdrawal records.
    ///
    /// The snapshot is derived state: the withdrawals are the source of truth
    /// and every query rebuilds the totals from them.
    pub async fn availability(
        &self,
        profile: &EmployeeProfile,
        as_of: NaiveDate,
    ) -> Result<EarnedWageLedgerPeriod> {
        let period = accrual::period_for(profile.anchor_date, as_of);
        let days = accrual::days_elapsed(period, as_of);
        let net = accrual::net_estimate(profile.annual_salary, profile.extra_withholding);

        let mut confirmed = Cents::ZERO;
        let mut pending = Cents::ZERO;
        for withdrawal in self
            .withdrawals
            .withdrawals_for_period(&profile.employee_id, period.start)
            .await?
        {
            match withdrawal.status {
                WithdrawalStatus::Confirmed => confirmed += withdrawal.amount,
                s if s.is_pending() => pending += withdrawal.amount,
                _ => {}
            }
        }

        Ok(EarnedWageLedgerPeriod {
            period_start: period.start,
            period_end: period.end,
            net_period_estimate: net,
            accrued: accrual::accrued(net, days),
            confirmed_withdrawn: confirmed,
            pending_withdrawn: pending,
            available: accrual::available(
                net,
                days,
                profile.accrual_cap_percent,
                confirmed,
                pending,
            ),
        })
    }

    /// Processes one signed advance request end to end.
    ///
    /// Verification order: signature, then availability, then the atomic
    /// nonce consumption that commits the request. A replayed envelope fails
    /// with `SIGNATURE_NONCE_REPLAYED` and creates nothing.
    pub async fn request_advance(
        &self,
        treasury: &TreasuryContext,
        profile: &EmployeeProfile,
        amount: Amount,
        as_of: NaiveDate,
        envelope: SignatureEnvelope,
        now: DateTime<Utc>,
        options: &WorkerOptions,
    ) -> Result<EarnedWageWithdrawal> {
        let period = accrual::period_for(profile.anchor_date, as_of);
        let payload = AdvancePayload::new(profile, period, amount.cents());
        let hash = authorization::payload_hash(&payload)?;
        authorization::verify(&hash, &envelope, now)?;

        let snapshot = self.availability(profile, as_of).await?;
        if amount.cents() > snapshot.available {
            return Err(PayoutError::InsufficientAccrual {
                requested: amount.cents().value(),
                available: snapshot.available.value(),
            });
        }

        // Single atomic step: the nonce is spent here or the request dies.
        if !self.nonces.consume(&envelope.nonce_key(&hash)).await? {
            return Err(PayoutError::SignatureNonceReplayed);
        }

        let scope = format!("{}..{}", period.start, period.end);
        let mut instruction = PayoutInstruction::new(
            None,
            profile.org_id.clone(),
            Payee::EmployeeEwa {
                employee_id: profile.employee_id.clone(),
            },
            treasury.treasury_account_ref.clone(),
            profile.account_ref.clone(),
            amount.cents(),
            treasury.asset_ref.clone(),
            &scope,
            "ewa_advance",
        )?;
        let mut withdrawal = EarnedWageWithdrawal::new(
            profile.org_id.clone(),
            profile.employee_id.clone(),
            amount.cents(),
            period,
            envelope,
            instruction.id.clone(),
        );
        self.instructions.put_instruction(instruction.clone()).await?;
        self.withdrawals.put_withdrawal(withdrawal.clone()).await?;

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
            withdrawal.set_status(WithdrawalStatus::Failed);
            self.withdrawals.put_withdrawal(withdrawal).await?;
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
                withdrawal.set_status(WithdrawalStatus::Confirmed);
                withdrawal.tx_ref = executed.tx_ref.clone();
                info!(
                    "advance of {} cents confirmed for employee {} (tx {})",
                    withdrawal.amount,
                    withdrawal.employee_id,
                    executed.tx_ref.as_deref().unwrap_or("?")
                );
            }
            _ => {
                withdrawal.set_status(WithdrawalStatus::Failed);
            }
        }
        self.withdrawals.put_withdrawal(withdrawal.clone()).await?;
        Ok(withdrawal)
    }
}
