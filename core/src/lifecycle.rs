//! Loan lifecycle: ACTIVE on creation, CLOSED once nothing is pending.
//!
//! CLOSED is terminal. A user holds at most one non-CLOSED loan.

use crate::{
    error::{BillingError, BillingResult},
    model::{Installment, Loan, LoanStatus, PaidStatus, Pricing},
    schedule::Schedule,
    types::{new_entity_id, Timestamp},
};

impl LoanStatus {
    /// The only edge in the state machine is ACTIVE -> CLOSED.
    pub fn can_transition_to(&self, next: LoanStatus) -> bool {
        matches!((self, next), (LoanStatus::Active, LoanStatus::Closed))
    }
}

/// Reject a new loan while the user still has one open.
pub fn ensure_can_open(user_id: &str, existing: Option<&Loan>) -> BillingResult<()> {
    match existing {
        Some(loan) if !loan.is_closed() => Err(BillingError::ActiveLoanExists {
            user_id: user_id.to_string(),
            loan_id: loan.id.clone(),
        }),
        _ => Ok(()),
    }
}

/// Materialize a loan and its installments from a generated schedule.
pub fn open_loan(
    user_id: &str,
    pricing: &Pricing,
    schedule: &Schedule,
    loan_code: String,
    now: Timestamp,
) -> (Loan, Vec<Installment>) {
    let loan = Loan {
        id:              new_entity_id(),
        user_id:         user_id.to_string(),
        pricing_id:      pricing.id.clone(),
        loan_code,
        status:          LoanStatus::Active,
        principal:       schedule.principal,
        term_in_periods: schedule.term_in_periods,
        financed_total:  schedule.financed_total,
        admin_total:     schedule.admin_total,
        created_at:      now,
        updated_at:      now,
    };

    let installments = schedule
        .installments
        .iter()
        .map(|s| Installment {
            id:                      new_entity_id(),
            loan_id:                 loan.id.clone(),
            user_id:                 user_id.to_string(),
            sequence:                s.sequence,
            installment_amount:      s.installment_amount,
            interest_amount:         s.interest_amount,
            principal_amount:        s.principal_amount,
            outstanding_amount:      s.outstanding_amount,
            due_date:                s.due_date,
            paid_status:             PaidStatus::Pending,
            paid_amount_installment: 0.0,
            paid_amount_interest:    0.0,
            paid_amount_principal:   0.0,
            updated_at:              now,
        })
        .collect();

    (loan, installments)
}

/// The closed loan, if `still_pending` says the loan is settled.
pub fn close_if_settled(loan: &Loan, still_pending: usize, now: Timestamp) -> Option<Loan> {
    if still_pending > 0 || !loan.status.can_transition_to(LoanStatus::Closed) {
        return None;
    }
    let mut closed = loan.clone();
    closed.status = LoanStatus::Closed;
    closed.updated_at = now;
    Some(closed)
}
