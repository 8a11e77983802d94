use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Pending,
    Executing,
    Completed,
    PartialFailure,
    Halted,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Executing => "EXECUTING",
            Self::Completed => "COMPLETED",
            Self::PartialFailure => "PARTIAL_FAILURE",
            Self::Halted => "HALTED",
        };
        write!(f, "{s}")
    }
}

impl RunStatus {
    /// Run-level outcome from per-instruction tallies. The worker reports raw
    /// counts; interpreting them is the caller's job.
    pub fn derive(failed: usize, total: usize) -> Self {
        if failed == 0 {
            Self::Completed
        } else if failed == total {
            Self::Halted
        } else {
            Self::PartialFailure
        }
    }
}

/// One payroll run: a grouping of instructions executed as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayrollRun {
    pub id: String,
    pub org_id: String,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PayrollRun {
    pub fn new(org_id: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            org_id,
            status: RunStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}
