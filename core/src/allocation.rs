//! Payment allocator: greedy waterfall, earliest due first.
//!
//! Pure: takes the pending installments and a payment amount and
//! returns the new installment states. The caller validates the amount
//! (see `engine::BillingEngine::apply_payment`) and persists the result.
//!
//! Each installment is either settled in full or, for the last one
//! touched, paid partially with principal and interest reduced in the
//! same ratio as their remaining due. A partial payment is credited in
//! whole cents: the interest share is rounded and principal takes the
//! rest, so `paid_principal + paid_interest == paid_installment` exactly.

use crate::{
    model::{Installment, PaidStatus},
    money::{from_cents, to_cents, MONEY_EPSILON},
    types::Timestamp,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    /// Installments whose paid amounts changed, in sequence order.
    pub updated:   Vec<Installment>,
    /// Sequences that reached PAID with this payment.
    pub settled:   Vec<u32>,
    /// Pending installments left after the allocation.
    pub still_pending: usize,
}

pub fn allocate(pending: &[Installment], amount: f64, now: Timestamp) -> Allocation {
    let mut ordered: Vec<&Installment> = pending.iter().filter(|i| i.is_pending()).collect();
    ordered.sort_by_key(|i| i.sequence);

    let mut remaining = amount;
    let mut updated = Vec::new();
    let mut settled = Vec::new();

    for inst in &ordered {
        if remaining < MONEY_EPSILON {
            break;
        }
        let due_principal = inst.remaining_principal();
        let due_interest = inst.remaining_interest();
        let due_total = due_principal + due_interest;

        let mut next = (*inst).clone();
        if remaining + MONEY_EPSILON >= due_total {
            next.paid_amount_principal = next.principal_amount;
            next.paid_amount_interest = next.interest_amount;
            next.paid_amount_installment = next.installment_amount;
            next.paid_status = PaidStatus::Paid;
            remaining = (remaining - due_total).max(0.0);
            settled.push(next.sequence);
            log::debug!(
                "allocation: loan={} seq={} settled ({due_total:.2})",
                next.loan_id, next.sequence
            );
        } else {
            let ratio = remaining / due_total;
            let paid_total = to_cents(next.paid_amount_installment + remaining);
            // Interest share, bounded so the principal share stays within
            // [0, principal_amount].
            let paid_interest = to_cents(next.paid_amount_interest + due_interest * ratio)
                .max(paid_total - to_cents(next.principal_amount))
                .min(to_cents(next.interest_amount))
                .min(paid_total);
            next.paid_amount_installment = from_cents(paid_total);
            next.paid_amount_interest = from_cents(paid_interest);
            next.paid_amount_principal = from_cents(paid_total - paid_interest);
            log::debug!(
                "allocation: loan={} seq={} partial {remaining:.2} of {due_total:.2}",
                next.loan_id, next.sequence
            );
            remaining = 0.0;
            if next.is_settled() {
                next.paid_status = PaidStatus::Paid;
                settled.push(next.sequence);
            }
        }
        next.updated_at = now;
        updated.push(next);
    }

    Allocation {
        still_pending: ordered.len() - settled.len(),
        updated,
        settled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn inst(sequence: u32, principal: f64, interest: f64) -> Installment {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        Installment {
            id: format!("i-{sequence}"),
            loan_id: "loan-1".into(),
            user_id: "user-1".into(),
            sequence,
            installment_amount: principal + interest,
            interest_amount: interest,
            principal_amount: principal,
            outstanding_amount: 0.0,
            due_date: at + Duration::days(7 * sequence as i64),
            paid_status: PaidStatus::Pending,
            paid_amount_installment: 0.0,
            paid_amount_interest: 0.0,
            paid_amount_principal: 0.0,
            updated_at: at,
        }
    }

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn partial_payment_splits_in_due_ratio() {
        let a = allocate(&[inst(1, 480.0, 20.0)], 300.0, now());
        assert_eq!(a.updated.len(), 1);
        let i = &a.updated[0];
        assert_eq!(i.paid_amount_principal, 288.0);
        assert_eq!(i.paid_amount_interest, 12.0);
        assert_eq!(i.paid_amount_installment, 300.0);
        assert_eq!(i.paid_status, PaidStatus::Pending);
        assert!(a.settled.is_empty());
        assert_eq!(a.still_pending, 1);
    }

    #[test]
    fn waterfall_settles_earliest_first() {
        let list = vec![inst(2, 90.0, 10.0), inst(1, 95.0, 5.0), inst(3, 99.0, 1.0)];
        let a = allocate(&list, 150.0, now());
        assert_eq!(a.settled, vec![1]);
        assert_eq!(a.updated[0].sequence, 1);
        assert_eq!(a.updated[0].paid_status, PaidStatus::Paid);
        assert_eq!(a.updated[1].sequence, 2);
        assert_eq!(a.updated[1].paid_amount_installment, 50.0);
        assert_eq!(a.updated[1].paid_amount_principal, 45.0);
        assert_eq!(a.updated[1].paid_amount_interest, 5.0);
        assert_eq!(a.updated.len(), 2, "third installment must be untouched");
    }

    #[test]
    fn second_partial_builds_on_first() {
        let first = allocate(&[inst(1, 480.0, 20.0)], 300.0, now());
        let second = allocate(&first.updated, 200.0, now());
        let i = &second.updated[0];
        assert_eq!(i.paid_status, PaidStatus::Paid);
        assert_eq!(i.paid_amount_principal, 480.0);
        assert_eq!(i.paid_amount_interest, 20.0);
        assert_eq!(second.still_pending, 0);
    }

    #[test]
    fn paid_installments_are_skipped() {
        let mut paid = inst(1, 95.0, 5.0);
        paid.paid_status = PaidStatus::Paid;
        paid.paid_amount_installment = 100.0;
        let a = allocate(&[paid, inst(2, 95.0, 5.0)], 100.0, now());
        assert_eq!(a.settled, vec![2]);
        assert_eq!(a.still_pending, 0);
    }

    #[test]
    fn partial_credit_splits_whole_cents() {
        // Both shares sit on half a cent; only one may round up.
        let a = allocate(&[inst(1, 0.01, 0.01)], 0.01, now());
        let i = &a.updated[0];
        assert_eq!(i.paid_amount_installment, 0.01);
        assert_eq!(
            to_cents(i.paid_amount_principal) + to_cents(i.paid_amount_interest),
            to_cents(i.paid_amount_installment)
        );
        assert_eq!(i.paid_status, PaidStatus::Pending);
        assert_eq!(to_cents(i.remaining_due()), 1);

        let rest = allocate(&a.updated, 0.01, now());
        assert_eq!(rest.settled, vec![1]);
        assert_eq!(rest.updated[0].paid_amount_installment, 0.02);
    }

    #[test]
    fn odd_partials_keep_cent_identity() {
        let mut state = vec![inst(1, 102_837.64, 4_846.15)];
        for amount in [0.03, 1_234.57, 0.01, 99.99, 33_333.33, 0.05] {
            let a = allocate(&state, amount, now());
            state = a.updated;
            let i = &state[0];
            assert_eq!(
                to_cents(i.paid_amount_principal) + to_cents(i.paid_amount_interest),
                to_cents(i.paid_amount_installment),
                "after paying {amount}"
            );
            assert!(i.paid_amount_principal <= i.principal_amount);
            assert!(i.paid_amount_interest <= i.interest_amount);
        }
    }
}
