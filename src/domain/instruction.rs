use crate::domain::authorization::payload_hash;
use crate::domain::money::Cents;
use crate::error::{PayoutError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who an instruction pays. Tagged by payee kind; each variant carries its own
/// reference rather than sharing optional fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Payee {
    EmployeePayroll { employee_id: String },
    EmployeeEwa { employee_id: String },
    Contractor { contractor_id: String },
}

impl Payee {
    pub fn id(&self) -> &str {
        match self {
            Self::EmployeePayroll { employee_id } | Self::EmployeeEwa { employee_id } => {
                employee_id
            }
            Self::Contractor { contractor_id } => contractor_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmployeePayroll { .. } => "EMPLOYEE_PAYROLL",
            Self::EmployeeEwa { .. } => "EMPLOYEE_EWA",
            Self::Contractor { .. } => "CONTRACTOR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstructionStatus {
    Pending,
    Submitted,
    Confirmed,
    Failed,
}

impl InstructionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }
}

impl std::fmt::Display for InstructionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Submitted => "SUBMITTED",
            Self::Confirmed => "CONFIRMED",
            Self::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

/// Content hash of a payment's logical identity: org + payee + scope + purpose.
///
/// Re-deriving a preview or re-running an approved flow yields the same key,
/// so a duplicate submission resolves to the same settlement at the gateway
/// instead of a second transfer. The instruction id never participates.
pub fn idempotency_key(org_id: &str, payee: &Payee, scope: &str, purpose: &str) -> Result<String> {
    #[derive(Serialize)]
    struct Intent<'a> {
        org_id: &'a str,
        payee_kind: &'a str,
        payee_id: &'a str,
        scope: &'a str,
        purpose: &'a str,
    }
    payload_hash(&Intent {
        org_id,
        payee_kind: payee.kind(),
        payee_id: payee.id(),
        scope,
        purpose,
    })
}

/// One intended transfer from treasury to a payee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutInstruction {
    pub id: String,
    /// Grouping key for payroll runs; standalone EWA and contractor
    /// instructions carry no run id.
    pub run_id: Option<String>,
    pub org_id: String,
    pub payee: Payee,
    /// Treasury account the transfer draws from.
    pub treasury_ref: String,
    /// Payee settlement account the transfer lands on.
    pub account_ref: String,
    pub amount: Cents,
    pub asset_ref: String,
    pub idempotency_key: String,
    pub status: InstructionStatus,
    pub attempts: u32,
    pub tx_ref: Option<String>,
    pub error_code: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl PayoutInstruction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        run_id: Option<String>,
        org_id: String,
        payee: Payee,
        treasury_ref: String,
        account_ref: String,
        amount: Cents,
        asset_ref: String,
        scope: &str,
        purpose: &str,
    ) -> Result<Self> {
        let key = idempotency_key(&org_id, &payee, scope, purpose)?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            run_id,
            org_id,
            payee,
            treasury_ref,
            account_ref,
            amount,
            asset_ref,
            idempotency_key: key,
            status: InstructionStatus::Pending,
            attempts: 0,
            tx_ref: None,
            error_code: None,
            updated_at: Utc::now(),
        })
    }

    /// Moves the instruction to `next`. Transitions are monotonic: a confirmed
    /// instruction never changes again, and a failed one only re-enters via
    /// `Submitted` on an explicit new attempt.
    pub fn transition(&mut self, next: InstructionStatus) -> Result<()> {
        let allowed = match (self.status, next) {
            (InstructionStatus::Pending, InstructionStatus::Submitted) => true,
            // Preflight rejection fails an instruction before any submission.
            (InstructionStatus::Pending, InstructionStatus::Failed) => true,
            (InstructionStatus::Submitted, InstructionStatus::Confirmed)
            | (InstructionStatus::Submitted, InstructionStatus::Failed) => true,
            // Unknown-outcome reconciliation: a re-send with the same
            // idempotency key is safe, so re-entering Submitted is allowed.
            (InstructionStatus::Submitted, InstructionStatus::Submitted) => true,
            // A new attempt after a recorded failure.
            (InstructionStatus::Failed, InstructionStatus::Submitted) => true,
            _ => false,
        };
        if !allowed {
            return Err(PayoutError::Validation(format!(
                "illegal instruction transition {} -> {}",
                self.status, next
            )));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_confirmed(&mut self, tx_ref: String) -> Result<()> {
        self.transition(InstructionStatus::Confirmed)?;
        self.tx_ref = Some(tx_ref);
        self.error_code = None;
        Ok(())
    }

    pub fn mark_failed(&mut self, error_code: String) -> Result<()> {
        self.transition(InstructionStatus::Failed)?;
        self.error_code = Some(error_code);
        Ok(())
    }
}
