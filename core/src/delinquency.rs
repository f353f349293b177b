//! Delinquency evaluator.
//!
//! An installment is overdue once it has been pending for at least
//! `OVERDUE_GRACE_DAYS` past its due date. Curing requires paying the
//! full installment amount of every overdue installment, regardless of
//! partial payments already applied to them.

use crate::{
    model::Installment,
    money::round_money,
    types::Timestamp,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};

pub const OVERDUE_GRACE_DAYS: i64 = 14;
/// Overdue installments at which the loan is delinquent.
pub const DELINQUENT_OVERDUE_COUNT: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelinquencyReport {
    pub minimum_payment_required: f64,
    pub overdue_installments:     Vec<Installment>,
    pub is_delinquent:            bool,
}

impl DelinquencyReport {
    pub fn has_overdue(&self) -> bool {
        !self.overdue_installments.is_empty()
    }
}

pub fn is_overdue(inst: &Installment, now: Timestamp) -> bool {
    inst.is_pending() && now.signed_duration_since(inst.due_date) >= Duration::days(OVERDUE_GRACE_DAYS)
}

pub fn evaluate(installments: &[Installment], now: Timestamp) -> DelinquencyReport {
    let mut overdue: Vec<Installment> = installments
        .iter()
        .filter(|i| is_overdue(i, now))
        .cloned()
        .collect();
    overdue.sort_by_key(|i| i.sequence);

    let minimum: f64 = overdue.iter().map(|i| i.installment_amount).sum();

    DelinquencyReport {
        minimum_payment_required: round_money(minimum),
        is_delinquent: overdue.len() >= DELINQUENT_OVERDUE_COUNT,
        overdue_installments: overdue,
    }
}
