//! Outstanding balance reporting.

use billing_core::{
    clock::FixedClock,
    codes::SeededCodeGenerator,
    config::PricingConfig,
    engine::BillingEngine,
    error::BillingError,
    model::{Installment, PaidStatus},
    outstanding::compute_outstanding,
    repository::MemoryRepository,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

fn build() -> (BillingEngine<MemoryRepository>, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(t0()));
    let mut engine = BillingEngine::new(
        MemoryRepository::new(),
        Box::new(clock.clone()),
        Box::new(SeededCodeGenerator::new(7)),
    );
    engine
        .seed_default_pricing(&PricingConfig { interest_rate: 24.0, admin_rate: 5.0 })
        .unwrap();
    (engine, clock)
}

fn installment(sequence: u32, principal: f64, interest: f64) -> Installment {
    Installment {
        id: format!("inst-{sequence}"),
        loan_id: "loan-1".into(),
        user_id: "user-1".into(),
        sequence,
        installment_amount: principal + interest,
        interest_amount: interest,
        principal_amount: principal,
        outstanding_amount: 0.0,
        due_date: t0() + Duration::days(7 * sequence as i64),
        paid_status: PaidStatus::Pending,
        paid_amount_installment: 0.0,
        paid_amount_interest: 0.0,
        paid_amount_principal: 0.0,
        updated_at: t0(),
    }
}

#[test]
fn fresh_loan_reports_full_schedule() {
    let (mut engine, _) = build();
    let loan = engine.create_loan("user-1", 1_000_000.0, 10).unwrap();

    let report = engine.get_outstanding(&loan.id).unwrap();
    assert_eq!(report.outstanding_total, 1_076_837.90);
    assert_eq!(report.outstanding_principal, 1_049_999.96);
    assert_eq!(report.outstanding_interest, 26_837.94);
    assert_eq!(report.next_due_date, Some(t0() + Duration::days(7)));
    assert_eq!(report.past_due_count, 0);
    assert!(!report.is_delinquent);
}

#[test]
fn past_due_count_follows_the_clock() {
    let (mut engine, clock) = build();
    let loan = engine.create_loan("user-1", 1_000_000.0, 10).unwrap();

    // Due exactly now is not yet past due.
    clock.advance_days(7);
    assert_eq!(engine.get_outstanding(&loan.id).unwrap().past_due_count, 0);

    clock.advance_days(1);
    let report = engine.get_outstanding(&loan.id).unwrap();
    assert_eq!(report.past_due_count, 1);
    assert!(!report.is_delinquent);

    clock.advance_days(7);
    let report = engine.get_outstanding(&loan.id).unwrap();
    assert_eq!(report.past_due_count, 2);
    assert!(report.is_delinquent);
    // Still reports the earliest unpaid installment.
    assert_eq!(report.next_due_date, Some(t0() + Duration::days(7)));
}

#[test]
fn partial_payment_reduces_both_components() {
    let (mut engine, _) = build();
    let loan = engine.create_loan("user-1", 1_000_000.0, 10).unwrap();
    let first = engine.loan_detail(&loan.id).unwrap().installments[0].clone();

    engine.apply_payment(&loan.id, 50_000.0).unwrap();

    let report = engine.get_outstanding(&loan.id).unwrap();
    assert!((report.outstanding_total - (1_076_837.90 - 50_000.0)).abs() < 0.011);
    let interest_paid = first.interest_amount * 50_000.0 / first.installment_amount;
    assert!((report.outstanding_interest - (26_837.94 - interest_paid)).abs() < 0.011);
    assert_eq!(report.next_due_date, Some(first.due_date));
}

#[test]
fn principal_above_financed_total_is_reported_as_interest() {
    let pending = vec![
        installment(1, 16.67, 0.0),
        installment(2, 16.67, 0.0),
        installment(3, 16.67, 0.0),
    ];

    let report = compute_outstanding(&pending, t0(), 50.0);
    assert_eq!(report.outstanding_principal, 50.0);
    assert_eq!(report.outstanding_interest, 0.01);
    assert_eq!(report.outstanding_total, 50.01);
}

#[test]
fn paid_installments_are_ignored() {
    let mut first = installment(1, 100.0, 10.0);
    first.paid_status = PaidStatus::Paid;
    first.paid_amount_installment = 110.0;
    first.paid_amount_principal = 100.0;
    first.paid_amount_interest = 10.0;
    let pending = vec![first, installment(2, 100.0, 5.0)];

    let report = compute_outstanding(&pending, t0() + Duration::days(30), 200.0);
    assert_eq!(report.outstanding_total, 105.0);
    assert_eq!(report.past_due_count, 1);
    assert_eq!(report.next_due_date, Some(t0() + Duration::days(14)));
}

#[test]
fn unknown_loan_has_no_report() {
    let (engine, _) = build();
    assert!(matches!(
        engine.get_outstanding("nope"),
        Err(BillingError::LoanNotFound { .. })
    ));
}
