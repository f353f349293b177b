//! Outstanding calculator.
//!
//! Remaining principal and interest across pending installments, with
//! reported principal capped at the loan's financed total: any excess
//! from cumulative rounding is reported as interest instead.

use crate::{
    model::Installment,
    money::round_money,
    types::Timestamp,
};
use serde::{Deserialize, Serialize};

/// Past-due pending installments at which the loan reports delinquent.
pub const DELINQUENT_PAST_DUE_COUNT: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutstandingReport {
    #[serde(rename = "outstanding_installment")]
    pub outstanding_total:     f64,
    pub outstanding_principal: f64,
    pub outstanding_interest:  f64,
    /// Earliest pending installment's due date.
    #[serde(rename = "due_date")]
    pub next_due_date:         Option<Timestamp>,
    pub is_delinquent:         bool,
    pub past_due_count:        usize,
}

/// Unrounded sum of remaining principal + interest over pending installments.
pub fn total_remaining_due(installments: &[Installment]) -> f64 {
    installments
        .iter()
        .filter(|i| i.is_pending())
        .map(Installment::remaining_due)
        .sum()
}

pub fn compute_outstanding(
    installments: &[Installment],
    now: Timestamp,
    financed_total: f64,
) -> OutstandingReport {
    let mut principal_total = 0.0;
    let mut interest_total = 0.0;
    let mut past_due_count = 0;
    let mut next_due: Option<&Installment> = None;

    for inst in installments.iter().filter(|i| i.is_pending()) {
        principal_total += inst.remaining_principal();
        interest_total += inst.remaining_interest();
        if inst.due_date < now {
            past_due_count += 1;
        }
        if next_due.map_or(true, |n| inst.sequence < n.sequence) {
            next_due = Some(inst);
        }
    }

    if principal_total > financed_total {
        let diff = principal_total - financed_total;
        interest_total += diff;
        principal_total -= diff;
    }

    OutstandingReport {
        outstanding_total:     round_money(principal_total + interest_total),
        outstanding_principal: round_money(principal_total),
        outstanding_interest:  round_money(interest_total),
        next_due_date:         next_due.map(|i| i.due_date),
        is_delinquent:         past_due_count >= DELINQUENT_PAST_DUE_COUNT,
        past_due_count,
    }
}
