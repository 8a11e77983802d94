mod common;

use chrono::{Duration, NaiveDate, Utc};
use common::{Harness, worker_options};
use payrail::application::ewa::{AdvancePayload, EmployeeProfile, EwaService};
use payrail::domain::accrual;
use payrail::domain::authorization::{SignatureEnvelope, payload_hash};
use payrail::domain::money::{Amount, Cents};
use payrail::domain::ports::WithdrawalStore;
use payrail::domain::withdrawal::WithdrawalStatus;
use payrail::error::PayoutError;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// $120,000/yr, biweekly anchor on 2024-01-01, full accrual cap.
fn profile(account_ref: String) -> EmployeeProfile {
    EmployeeProfile {
        org_id: "org-1".to_string(),
        employee_id: "emp-1".to_string(),
        wallet_address: "0xEmp1".to_string(),
        account_ref,
        annual_salary: Cents::new(12_000_000),
        extra_withholding: Cents::ZERO,
        anchor_date: date(2024, 1, 1),
        accrual_cap_percent: 100,
    }
}

fn signed_advance(
    profile: &EmployeeProfile,
    as_of: NaiveDate,
    amount: Cents,
    nonce: &str,
) -> SignatureEnvelope {
    let period = accrual::period_for(profile.anchor_date, as_of);
    let payload = AdvancePayload::new(profile, period, amount);
    let hash = payload_hash(&payload).unwrap();
    SignatureEnvelope::issue(
        &profile.wallet_address,
        nonce,
        Utc::now() + Duration::hours(1),
        &hash,
    )
    .unwrap()
}

#[tokio::test]
async fn test_availability_halfway_through_period() {
    let harness = Harness::funded(1_000_000, 0).await;
    let ewa = harness.ewa();
    let profile = profile(harness.payee_account("emp-1").await);

    // Day 7 of 14: half of the 360000-cent net estimate has accrued.
    let snapshot = ewa.availability(&profile, date(2024, 1, 7)).await.unwrap();
    assert_eq!(snapshot.net_period_estimate, Cents::new(360_000));
    assert_eq!(snapshot.accrued, Cents::new(180_000));
    assert_eq!(snapshot.available, Cents::new(180_000));
    assert_eq!(snapshot.period_start, date(2024, 1, 1));
    assert_eq!(snapshot.period_end, date(2024, 1, 14));
}

#[tokio::test]
async fn test_availability_monotonic_within_period() {
    let harness = Harness::funded(1_000_000, 0).await;
    let ewa = harness.ewa();
    let profile = profile(harness.payee_account("emp-1").await);

    let mut last = Cents::ZERO;
    for day in 1..=14 {
        let snapshot = ewa.availability(&profile, date(2024, 1, day)).await.unwrap();
        assert!(snapshot.available >= last, "availability fell on day {day}");
        last = snapshot.available;
    }
}

#[tokio::test]
async fn test_advance_round_trip_and_replay_rejected() {
    let harness = Harness::funded(1_000_000, 0).await;
    let ewa = harness.ewa();
    let profile = profile(harness.payee_account("emp-1").await);
    let as_of = date(2024, 1, 7);
    let amount = Cents::new(90_000);

    let envelope = signed_advance(&profile, as_of, amount, "nonce-1");
    let withdrawal = ewa
        .request_advance(
            &harness.treasury,
            &profile,
            Amount::try_from(amount.value()).unwrap(),
            as_of,
            envelope.clone(),
            Utc::now(),
            &worker_options(3),
        )
        .await
        .unwrap();
    assert_eq!(withdrawal.status, WithdrawalStatus::Confirmed);
    assert!(withdrawal.tx_ref.is_some());
    assert_eq!(harness.asset_balance(&profile.account_ref).await, 90_000);

    // Identical signed payload again: the nonce is spent.
    let replay = ewa
        .request_advance(
            &harness.treasury,
            &profile,
            Amount::try_from(amount.value()).unwrap(),
            as_of,
            envelope,
            Utc::now(),
            &worker_options(3),
        )
        .await
        .unwrap_err();
    assert!(matches!(replay, PayoutError::SignatureNonceReplayed));
    // Exactly one settlement happened.
    assert_eq!(harness.asset_balance(&profile.account_ref).await, 90_000);
}

#[tokio::test]
async fn test_confirmed_withdrawal_reduces_availability() {
    let harness = Harness::funded(1_000_000, 0).await;
    let ewa = harness.ewa();
    let profile = profile(harness.payee_account("emp-1").await);
    let as_of = date(2024, 1, 7);

    let before = ewa.availability(&profile, as_of).await.unwrap().available;
    let amount = Cents::new(50_000);
    ewa.request_advance(
        &harness.treasury,
        &profile,
        Amount::try_from(amount.value()).unwrap(),
        as_of,
        signed_advance(&profile, as_of, amount, "nonce-1"),
        Utc::now(),
        &worker_options(3),
    )
    .await
    .unwrap();

    let after = ewa.availability(&profile, as_of).await.unwrap();
    assert_eq!(after.confirmed_withdrawn, amount);
    assert_eq!(after.available, before - amount);
}

#[tokio::test]
async fn test_advance_over_accrual_rejected() {
    let harness = Harness::funded(1_000_000, 0).await;
    let ewa = harness.ewa();
    let profile = profile(harness.payee_account("emp-1").await);
    let as_of = date(2024, 1, 7);

    let amount = Cents::new(180_001);
    let err = ewa
        .request_advance(
            &harness.treasury,
            &profile,
            Amount::try_from(amount.value()).unwrap(),
            as_of,
            signed_advance(&profile, as_of, amount, "nonce-1"),
            Utc::now(),
            &worker_options(3),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PayoutError::InsufficientAccrual {
            requested: 180_001,
            available: 180_000
        }
    ));
    // Nothing settled, and the nonce is still fresh for a corrected request.
    assert_eq!(harness.asset_balance(&profile.account_ref).await, 0);
}

#[tokio::test]
async fn test_expired_envelope_rejected() {
    let harness = Harness::funded(1_000_000, 0).await;
    let ewa = harness.ewa();
    let profile = profile(harness.payee_account("emp-1").await);
    let as_of = date(2024, 1, 7);
    let amount = Cents::new(10_000);

    let period = accrual::period_for(profile.anchor_date, as_of);
    let hash = payload_hash(&AdvancePayload::new(&profile, period, amount)).unwrap();
    let stale = SignatureEnvelope::issue(
        &profile.wallet_address,
        "nonce-1",
        Utc::now() - Duration::minutes(5),
        &hash,
    )
    .unwrap();

    let err = ewa
        .request_advance(
            &harness.treasury,
            &profile,
            Amount::try_from(amount.value()).unwrap(),
            as_of,
            stale,
            Utc::now(),
            &worker_options(3),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PayoutError::SignatureExpired));
}

#[tokio::test]
async fn test_underfunded_treasury_fails_preflight() {
    let harness = Harness::funded(1_000, 0).await;
    let ewa = harness.ewa();
    let profile = profile(harness.payee_account("emp-1").await);
    let as_of = date(2024, 1, 7);
    let amount = Cents::new(90_000);

    let err = ewa
        .request_advance(
            &harness.treasury,
            &profile,
            Amount::try_from(amount.value()).unwrap(),
            as_of,
            signed_advance(&profile, as_of, amount, "nonce-1"),
            Utc::now(),
            &worker_options(3),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("PREFLIGHT_FAILED:"));

    // The withdrawal is recorded as failed, not dropped.
    let withdrawals = harness
        .store
        .withdrawals_for_period(&profile.employee_id, date(2024, 1, 1))
        .await
        .unwrap();
    assert_eq!(withdrawals.len(), 1);
    assert_eq!(withdrawals[0].status, WithdrawalStatus::Failed);
}

#[tokio::test]
async fn test_availability_ignores_failed_withdrawals() {
    let harness = Harness::funded(1_000, 0).await;
    let ewa = harness.ewa();
    let profile = profile(harness.payee_account("emp-1").await);
    let as_of = date(2024, 1, 7);
    let amount = Cents::new(90_000);

    // Preflight kills this one; it must not count against availability.
    let _ = ewa
        .request_advance(
            &harness.treasury,
            &profile,
            Amount::try_from(amount.value()).unwrap(),
            as_of,
            signed_advance(&profile, as_of, amount, "nonce-1"),
            Utc::now(),
            &worker_options(3),
        )
        .await;

    let snapshot = ewa.availability(&profile, as_of).await.unwrap();
    assert_eq!(snapshot.available, Cents::new(180_000));
}

// Keeps the service construction honest for the availability-only path.
#[tokio::test]
async fn test_service_usable_without_funding() {
    let harness = Harness::funded(0, 0).await;
    let ewa: EwaService = harness.ewa();
    let profile = profile("acct-unused".to_string());
    let snapshot = ewa.availability(&profile, date(2024, 3, 1)).await.unwrap();
    assert_eq!(snapshot.period_start, date(2024, 2, 26));
}
