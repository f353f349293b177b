//! Payment application: waterfall allocation, validation, lifecycle closure.

use billing_core::{
    clock::FixedClock,
    codes::SeededCodeGenerator,
    config::PricingConfig,
    engine::BillingEngine,
    error::BillingError,
    event::BillingEvent,
    model::{Installment, Loan, LoanStatus, PaidStatus},
    repository::{LoanRepository, MemoryRepository, WriteSet},
};
use billing_core::money::to_cents;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

fn build() -> (BillingEngine<MemoryRepository>, Arc<FixedClock>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let clock = Arc::new(FixedClock::new(t0()));
    let mut engine = BillingEngine::new(
        MemoryRepository::new(),
        Box::new(clock.clone()),
        Box::new(SeededCodeGenerator::new(42)),
    );
    engine
        .seed_default_pricing(&PricingConfig { interest_rate: 24.0, admin_rate: 5.0 })
        .unwrap();
    (engine, clock)
}

/// A loan with one pending installment of 500 (480 principal + 20 interest).
fn seed_single_installment_loan(engine: &mut BillingEngine<MemoryRepository>) -> String {
    let pricing = engine.repository().load_pricing().unwrap().unwrap();
    let loan = Loan {
        id: "loan-500".into(),
        user_id: "user-500".into(),
        pricing_id: pricing.id,
        loan_code: "LOA-20260302-500".into(),
        status: LoanStatus::Active,
        principal: 480.0,
        term_in_periods: 1,
        financed_total: 480.0,
        admin_total: 0.0,
        created_at: t0(),
        updated_at: t0(),
    };
    let inst = Installment {
        id: "inst-500".into(),
        loan_id: loan.id.clone(),
        user_id: loan.user_id.clone(),
        sequence: 1,
        installment_amount: 500.0,
        interest_amount: 20.0,
        principal_amount: 480.0,
        outstanding_amount: 0.0,
        due_date: t0() + Duration::days(7),
        paid_status: PaidStatus::Pending,
        paid_amount_installment: 0.0,
        paid_amount_interest: 0.0,
        paid_amount_principal: 0.0,
        updated_at: t0(),
    };
    let writes = WriteSet {
        new_loan: Some(loan.clone()),
        new_installments: vec![inst],
        ..WriteSet::default()
    };
    engine.repository_mut().apply_atomically(writes).unwrap();
    loan.id
}

#[test]
fn partial_payment_keeps_principal_interest_ratio() {
    let (mut engine, _) = build();
    let loan_id = seed_single_installment_loan(&mut engine);

    let payment = engine.apply_payment(&loan_id, 300.0).unwrap();
    assert_eq!(payment.amount, 300.0);

    let inst = &engine.repository().load_installments(&loan_id).unwrap()[0];
    assert_eq!(inst.paid_amount_principal, 288.0);
    assert_eq!(inst.paid_amount_interest, 12.0);
    assert_eq!(inst.paid_amount_installment, 300.0);
    assert_eq!(inst.paid_status, PaidStatus::Pending);

    let loan = engine.repository().load_loan(&loan_id).unwrap().unwrap();
    assert_eq!(loan.status, LoanStatus::Active);
}

#[test]
fn paying_the_rest_settles_and_closes() {
    let (mut engine, _) = build();
    let loan_id = seed_single_installment_loan(&mut engine);

    engine.apply_payment(&loan_id, 300.0).unwrap();
    engine.apply_payment(&loan_id, 200.0).unwrap();

    let inst = &engine.repository().load_installments(&loan_id).unwrap()[0];
    assert_eq!(inst.paid_status, PaidStatus::Paid);
    assert_eq!(inst.paid_amount_installment, 500.0);
    let loan = engine.repository().load_loan(&loan_id).unwrap().unwrap();
    assert_eq!(loan.status, LoanStatus::Closed);
}

#[test]
fn full_outstanding_payment_closes_loan() {
    let (mut engine, _) = build();
    let loan = engine.create_loan("user-1", 1_000_000.0, 10).unwrap();

    let outstanding = engine.get_outstanding(&loan.id).unwrap();
    engine.apply_payment(&loan.id, outstanding.outstanding_total).unwrap();

    let installments = engine.repository().load_installments(&loan.id).unwrap();
    assert_eq!(installments.len(), 10);
    assert!(installments.iter().all(|i| i.paid_status == PaidStatus::Paid));
    assert!(installments.iter().all(|i| i.paid_amount_installment == i.installment_amount));

    let closed = engine.repository().load_loan(&loan.id).unwrap().unwrap();
    assert_eq!(closed.status, LoanStatus::Closed);
    assert!(engine.repository().load_pending_installments(&loan.id).unwrap().is_empty());
}

#[test]
fn one_installment_payment_reduces_principal_by_its_share() {
    let (mut engine, _) = build();
    let loan = engine.create_loan("user-1", 1_000_000.0, 10).unwrap();
    let before = engine.get_outstanding(&loan.id).unwrap();
    let first = engine.loan_detail(&loan.id).unwrap().installments[0].clone();

    engine.apply_payment(&loan.id, first.installment_amount).unwrap();

    let detail = engine.loan_detail(&loan.id).unwrap();
    assert_eq!(detail.installments[0].paid_status, PaidStatus::Paid);
    assert_eq!(detail.installments[1].paid_status, PaidStatus::Pending);
    assert_eq!(detail.installments[1].paid_amount_installment, 0.0);

    let after = engine.get_outstanding(&loan.id).unwrap();
    let drop = before.outstanding_principal - after.outstanding_principal;
    assert!(
        (drop - first.principal_amount).abs() < 0.005,
        "principal dropped by {drop}, expected {}",
        first.principal_amount
    );
    assert_eq!(after.next_due_date, Some(detail.installments[1].due_date));
}

#[test]
fn payment_spills_into_next_installment() {
    let (mut engine, _) = build();
    let loan = engine.create_loan("user-1", 1_000_000.0, 10).unwrap();
    let plan = engine.loan_detail(&loan.id).unwrap().installments;
    let amount = plan[0].installment_amount + 50_000.0;

    engine.apply_payment(&loan.id, amount).unwrap();

    let detail = engine.loan_detail(&loan.id).unwrap().installments;
    assert_eq!(detail[0].paid_status, PaidStatus::Paid);
    assert_eq!(detail[1].paid_status, PaidStatus::Pending);
    assert!((detail[1].paid_amount_installment - 50_000.0).abs() < 0.01);
    let expected_interest = plan[1].interest_amount * 50_000.0 / plan[1].installment_amount;
    assert!((detail[1].paid_amount_interest - expected_interest).abs() < 0.01);
    assert_eq!(detail[2].paid_amount_installment, 0.0);
}

#[test]
fn payment_above_outstanding_rejected_with_totals() {
    let (mut engine, _) = build();
    let loan_id = seed_single_installment_loan(&mut engine);

    let err = engine.apply_payment(&loan_id, 500.01).unwrap_err();
    match err {
        BillingError::PaymentExceedsOutstanding { attempted, outstanding } => {
            assert_eq!(attempted, 500.01);
            assert_eq!(outstanding, 500.0);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(engine.repository().payment_count(), 0);
}

#[test]
fn non_positive_amounts_rejected() {
    let (mut engine, _) = build();
    let loan_id = seed_single_installment_loan(&mut engine);
    for amount in [0.0, -10.0, f64::NAN, 0.001] {
        assert!(matches!(
            engine.apply_payment(&loan_id, amount),
            Err(BillingError::InvalidPayment { .. })
        ));
    }
}

#[test]
fn unknown_loan_rejected() {
    let (mut engine, _) = build();
    assert!(matches!(
        engine.apply_payment("missing", 10.0),
        Err(BillingError::LoanNotFound { .. })
    ));
}

#[test]
fn closed_loan_has_nothing_to_pay() {
    let (mut engine, _) = build();
    let loan_id = seed_single_installment_loan(&mut engine);
    engine.apply_payment(&loan_id, 500.0).unwrap();

    assert!(matches!(
        engine.apply_payment(&loan_id, 1.0),
        Err(BillingError::NoPendingInstallments { .. })
    ));
}

#[test]
fn failed_apply_leaves_no_partial_state() {
    let (mut engine, _) = build();
    let loan = engine.create_loan("user-1", 1_000.0, 4).unwrap();
    let before = engine.loan_detail(&loan.id).unwrap();

    engine.repository_mut().fail_next_apply();
    let outstanding = engine.get_outstanding(&loan.id).unwrap().outstanding_total;
    let err = engine.apply_payment(&loan.id, outstanding).unwrap_err();
    assert!(matches!(err, BillingError::PersistenceFailure { .. }));

    let after = engine.loan_detail(&loan.id).unwrap();
    assert_eq!(before, after);
    assert_eq!(after.loan.status, LoanStatus::Active);
    assert_eq!(engine.repository().payment_count(), 0);

    // The same payment goes through once the store recovers.
    engine.apply_payment(&loan.id, outstanding).unwrap();
    let closed = engine.repository().load_loan(&loan.id).unwrap().unwrap();
    assert_eq!(closed.status, LoanStatus::Closed);
}

#[test]
fn payment_is_recorded_in_ledger_and_history() {
    let (mut engine, clock) = build();
    let loan_id = seed_single_installment_loan(&mut engine);
    clock.advance_days(3);

    let payment = engine.apply_payment(&loan_id, 500.0).unwrap();
    assert!(payment.payment_code.starts_with("PAY-20260305-"));
    assert_eq!(payment.created_at, t0() + Duration::days(3));

    let ledger = engine.repository().load_payments(&loan_id).unwrap();
    assert_eq!(ledger, vec![payment.clone()]);

    let history = engine.loan_history(&loan_id).unwrap();
    assert!(matches!(history[0], BillingEvent::PaymentApplied { amount, .. } if amount == 500.0));
    assert!(matches!(history[1], BillingEvent::InstallmentPaid { sequence: 1, .. }));
    assert!(matches!(history[2], BillingEvent::LoanClosed { .. }));
}

fn assert_installment_invariants(installments: &[Installment], step: usize) {
    for i in installments {
        let ctx = format!("step {step} seq {}", i.sequence);
        assert!(to_cents(i.paid_amount_principal) <= to_cents(i.principal_amount), "{ctx}");
        assert!(to_cents(i.paid_amount_interest) <= to_cents(i.interest_amount), "{ctx}");
        assert!(to_cents(i.paid_amount_installment) <= to_cents(i.installment_amount), "{ctx}");
        assert!(i.paid_amount_principal >= 0.0 && i.paid_amount_interest >= 0.0, "{ctx}");
        assert_eq!(
            to_cents(i.paid_amount_principal) + to_cents(i.paid_amount_interest),
            to_cents(i.paid_amount_installment),
            "{ctx}: paid parts do not add up"
        );
        assert_eq!(i.paid_status == PaidStatus::Paid, i.is_settled(), "{ctx}");
        if i.paid_status == PaidStatus::Pending {
            assert!(to_cents(i.remaining_due()) > 0, "{ctx}: pending with nothing due");
        }
    }
}

#[test]
fn irregular_partial_payments_keep_installment_invariants() {
    let (mut engine, _) = build();
    let loan = engine.create_loan("user-1", 1_000_000.0, 10).unwrap();
    let amounts: [f64; 9] = [0.01, 1_234.57, 99_999.99, 0.03, 33_333.33, 7.77, 150_000.05, 0.5, 12_345.67];

    let mut step = 0;
    loop {
        let owed = engine.get_outstanding(&loan.id).unwrap().outstanding_total;
        if owed == 0.0 {
            break;
        }
        let amount = amounts[step % amounts.len()].min(owed);
        engine.apply_payment(&loan.id, amount).unwrap();
        step += 1;

        let installments = engine.repository().load_installments(&loan.id).unwrap();
        assert_installment_invariants(&installments, step);
        assert!(step < 500, "loan never paid off");
    }

    let closed = engine.repository().load_loan(&loan.id).unwrap().unwrap();
    assert_eq!(closed.status, LoanStatus::Closed);
    let paid: f64 = engine
        .repository()
        .load_payments(&loan.id)
        .unwrap()
        .iter()
        .map(|p| p.amount)
        .sum();
    assert_eq!(to_cents(paid), to_cents(1_076_837.90));
}
