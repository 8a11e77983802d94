use crate::domain::money::Cents;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Length of one pay period in whole days.
pub const PERIOD_DAYS: i64 = 14;

/// Flat withholding estimate applied to gross period pay, in percent.
const TAX_RATE_PERCENT: i64 = 22;

/// Pay periods per year under a biweekly schedule.
const PERIODS_PER_YEAR: i64 = 26;

/// Inclusive bounds of one biweekly pay period, whole UTC calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Finds the 14-day window anchored at `anchor` that contains `as_of`.
///
/// The window index is the floor-division of the day offset by 14, so dates
/// before the anchor land in negative-index windows rather than clamping.
/// Time-of-day never enters the math; callers pass whole UTC dates.
pub fn period_for(anchor: NaiveDate, as_of: NaiveDate) -> PayPeriod {
    let offset = (as_of - anchor).num_days();
    let k = offset.div_euclid(PERIOD_DAYS);
    let shift = k * PERIOD_DAYS;
    let start = if shift >= 0 {
        anchor + Days::new(shift as u64)
    } else {
        anchor - Days::new(shift.unsigned_abs())
    };
    PayPeriod {
        start,
        end: start + Days::new((PERIOD_DAYS - 1) as u64),
    }
}

/// Inclusive 1-based count of days elapsed in the period as of `as_of`.
///
/// Returns 0 before the period starts; `as_of` past the period end counts as
/// the full 14 days.
pub fn days_elapsed(period: PayPeriod, as_of: NaiveDate) -> i64 {
    if as_of < period.start {
        return 0;
    }
    let clamped = as_of.min(period.end);
    (clamped - period.start).num_days() + 1
}

/// Estimated net pay for one biweekly period.
///
/// gross = floor(annual / 26); tax = floor(gross * 22%); net clamped >= 0.
/// Floor is used uniformly so the engine never over-promises availability.
pub fn net_estimate(annual_salary: Cents, extra_withholding: Cents) -> Cents {
    let gross = annual_salary.value() / PERIODS_PER_YEAR;
    let tax = gross * TAX_RATE_PERCENT / 100;
    Cents::new(gross - tax - extra_withholding.value()).clamped()
}

/// Portion of the period's net pay earned after `days` elapsed days.
pub fn accrued(net_period_estimate: Cents, days: i64) -> Cents {
    let days = days.clamp(0, PERIOD_DAYS);
    Cents::new(net_period_estimate.value() * days / PERIOD_DAYS)
}

/// Advance availability: capped accrual minus withdrawals already taken or in
/// flight this period. Never negative.
pub fn available(
    net_period_estimate: Cents,
    days: i64,
    accrual_cap_percent: u8,
    confirmed: Cents,
    pending: Cents,
) -> Cents {
    let capped = accrued(net_period_estimate, days).value() * i64::from(accrual_cap_percent) / 100;
    Cents::new(capped - confirmed.value() - pending.value()).clamped()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_period_for_contains_as_of() {
        let anchor = date(2024, 1, 1);
        let period = period_for(anchor, date(2024, 1, 10));
        assert_eq!(period.start, date(2024, 1, 1));
        assert_eq!(period.end, date(2024, 1, 14));

        let next = period_for(anchor, date(2024, 1, 15));
        assert_eq!(next.start, date(2024, 1, 15));
        assert_eq!(next.end, date(2024, 1, 28));
    }

    #[test]
    fn test_period_for_before_anchor() {
        // Dates before the anchor floor into the previous window.
        let anchor = date(2024, 1, 15);
        let period = period_for(anchor, date(2024, 1, 10));
        assert_eq!(period.start, date(2024, 1, 1));
        assert_eq!(period.end, date(2024, 1, 14));
    }

    #[test]
    fn test_days_elapsed_bounds() {
        let period = period_for(date(2024, 1, 1), date(2024, 1, 1));
        assert_eq!(days_elapsed(period, date(2023, 12, 31)), 0);
        assert_eq!(days_elapsed(period, date(2024, 1, 1)), 1);
        assert_eq!(days_elapsed(period, date(2024, 1, 7)), 7);
        assert_eq!(days_elapsed(period, date(2024, 1, 14)), 14);
        // Past the end clamps to the full period.
        assert_eq!(days_elapsed(period, date(2024, 2, 1)), 14);
    }

    #[test]
    fn test_net_estimate_salary_120k() {
        // $120,000/yr: gross 461538, tax 101538, net 360000.
        let net = net_estimate(Cents::new(12_000_000), Cents::ZERO);
        assert_eq!(net, Cents::new(360_000));
    }

    #[test]
    fn test_net_estimate_clamps_to_zero() {
        let net = net_estimate(Cents::new(12_000_000), Cents::new(10_000_000));
        assert_eq!(net, Cents::ZERO);
    }

    #[test]
    fn test_accrued_halfway() {
        assert_eq!(accrued(Cents::new(360_000), 7), Cents::new(180_000));
        assert_eq!(accrued(Cents::new(360_000), 0), Cents::ZERO);
        assert_eq!(accrued(Cents::new(360_000), 14), Cents::new(360_000));
    }

    #[test]
    fn test_available_monotonic_in_days() {
        let net = Cents::new(360_000);
        let mut last = Cents::ZERO;
        for day in 0..=14 {
            let now = available(net, day, 100, Cents::ZERO, Cents::ZERO);
            assert!(now >= last, "availability regressed at day {day}");
            last = now;
        }
    }

    #[test]
    fn test_available_subtracts_withdrawals_and_clamps() {
        let net = Cents::new(360_000);
        let free = available(net, 7, 100, Cents::new(100_000), Cents::new(50_000));
        assert_eq!(free, Cents::new(30_000));
        let overdrawn = available(net, 7, 100, Cents::new(200_000), Cents::new(50_000));
        assert_eq!(overdrawn, Cents::ZERO);
    }

    #[test]
    fn test_available_respects_cap() {
        let net = Cents::new(360_000);
        let capped = available(net, 14, 50, Cents::ZERO, Cents::ZERO);
        assert_eq!(capped, Cents::new(180_000));
    }
}
