use crate::domain::money::Cents;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimesheetStatus {
    Submitted,
    Disputed,
    Resubmitted,
    Approved,
    Paid,
    PayoutFailed,
}

impl std::fmt::Display for TimesheetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Submitted => "SUBMITTED",
            Self::Disputed => "DISPUTED",
            Self::Resubmitted => "RESUBMITTED",
            Self::Approved => "APPROVED",
            Self::Paid => "PAID",
            Self::PayoutFailed => "PAYOUT_FAILED",
        };
        write!(f, "{s}")
    }
}

/// One worked line on a timesheet. Hours are fractional (7.5h is common), so
/// they ride on `Decimal`; money stays integer cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimesheetEntry {
    pub date: NaiveDate,
    pub hours: Decimal,
    pub note: Option<String>,
}

/// A contractor's biweekly timesheet and its co-signature state.
///
/// Totals are always recomputed from the entries and the stored hourly rate;
/// a caller-supplied total is never trusted. Every state transition appends a
/// settlement anchor reference for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractorTimesheet {
    pub id: String,
    pub org_id: String,
    pub contractor_id: String,
    pub hourly_rate: Cents,
    pub entries: Vec<TimesheetEntry>,
    pub total: Cents,
    pub status: TimesheetStatus,
    pub dispute_reason: Option<String>,
    pub anchor_refs: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl ContractorTimesheet {
    pub fn new(
        org_id: String,
        contractor_id: String,
        hourly_rate: Cents,
        entries: Vec<TimesheetEntry>,
    ) -> Self {
        let total = compute_total(&entries, hourly_rate);
        Self {
            id: Uuid::new_v4().to_string(),
            org_id,
            contractor_id,
            hourly_rate,
            entries,
            total,
            status: TimesheetStatus::Submitted,
            dispute_reason: None,
            anchor_refs: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn can_dispute(&self) -> bool {
        matches!(
            self.status,
            TimesheetStatus::Submitted | TimesheetStatus::Resubmitted
        )
    }

    pub fn can_resolve(&self) -> bool {
        self.status == TimesheetStatus::Disputed
    }

    /// Approval is allowed straight from submission, after a resolve, or again
    /// after a failed payout; `Paid` is terminal.
    pub fn can_approve(&self) -> bool {
        matches!(
            self.status,
            TimesheetStatus::Submitted | TimesheetStatus::Resubmitted | TimesheetStatus::PayoutFailed
        )
    }

    /// Replaces the entries and recomputes the total from the stored rate.
    pub fn replace_entries(&mut self, entries: Vec<TimesheetEntry>) {
        self.total = compute_total(&entries, self.hourly_rate);
        self.entries = entries;
    }

    pub fn set_status(&mut self, status: TimesheetStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    pub fn push_anchor(&mut self, anchor_ref: String) {
        self.anchor_refs.push(anchor_ref);
    }
}

/// Sum of floor(hours x rate) per entry, in cents. Per-entry floor keeps the
/// total independent of entry ordering.
pub fn compute_total(entries: &[TimesheetEntry], hourly_rate: Cents) -> Cents {
    let total: i64 = entries
        .iter()
        .map(|e| {
            (e.hours * Decimal::from(hourly_rate.value()))
                .floor()
                .to_i64()
                .unwrap_or(0)
        })
        .sum();
    Cents::new(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(hours: Decimal) -> TimesheetEntry {
        TimesheetEntry {
            date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            hours,
            note: None,
        }
    }

    #[test]
    fn test_total_eight_hours_at_fifty() {
        let total = compute_total(&[entry(dec!(8))], Cents::new(5_000));
        assert_eq!(total, Cents::new(40_000));
    }

    #[test]
    fn test_total_fractional_hours_floor() {
        let total = compute_total(&[entry(dec!(7.5))], Cents::new(5_000));
        assert_eq!(total, Cents::new(37_500));
        // 0.333h * $0.50 = 16.65 cents, floored per entry.
        let odd = compute_total(&[entry(dec!(0.333)), entry(dec!(0.333))], Cents::new(50));
        assert_eq!(odd, Cents::new(32));
    }

    #[test]
    fn test_new_timesheet_recomputes_total() {
        let ts = ContractorTimesheet::new(
            "org-1".to_string(),
            "con-1".to_string(),
            Cents::new(5_000),
            vec![entry(dec!(8))],
        );
        assert_eq!(ts.total, Cents::new(40_000));
        assert_eq!(ts.status, TimesheetStatus::Submitted);
        assert!(ts.anchor_refs.is_empty());
    }

    #[test]
    fn test_replace_entries_ignores_caller_total() {
        let mut ts = ContractorTimesheet::new(
            "org-1".to_string(),
            "con-1".to_string(),
            Cents::new(5_000),
            vec![entry(dec!(8))],
        );
        ts.replace_entries(vec![entry(dec!(7.5))]);
        assert_eq!(ts.total, Cents::new(37_500));
    }

    #[test]
    fn test_guards_follow_status() {
        let mut ts = ContractorTimesheet::new(
            "org-1".to_string(),
            "con-1".to_string(),
            Cents::new(5_000),
            vec![entry(dec!(8))],
        );
        assert!(ts.can_dispute());
        assert!(ts.can_approve());
        assert!(!ts.can_resolve());

        ts.set_status(TimesheetStatus::Disputed);
        assert!(ts.can_resolve());
        assert!(!ts.can_dispute());
        assert!(!ts.can_approve());

        ts.set_status(TimesheetStatus::Paid);
        assert!(!ts.can_approve());

        ts.set_status(TimesheetStatus::PayoutFailed);
        assert!(ts.can_approve());
    }
}
