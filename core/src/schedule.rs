//! Schedule generator: fixed weekly payment and the installment plan.
//!
//! The running balance is amortized at full precision; each installment
//! is stored at cent precision with `principal = installment - interest`.
//! The last period is not forced to clear the residual, so the sum of
//! principal portions matches the financed total within a cent per period.

use crate::{
    error::{BillingError, BillingResult},
    model::Pricing,
    money::round_money,
    types::Timestamp,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};

pub const WEEKS_PER_YEAR: f64 = 52.0;
pub const PERIOD_DAYS: i64 = 7;
/// First installment falls due one period after creation.
pub const FIRST_DUE_OFFSET_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledInstallment {
    pub sequence:           u32,
    pub installment_amount: f64,
    pub interest_amount:    f64,
    pub principal_amount:   f64,
    pub outstanding_amount: f64,
    pub due_date:           Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub principal:        f64,
    pub term_in_periods:  u32,
    pub admin_total:      f64,
    pub financed_total:   f64,
    pub periodic_rate:    f64,
    /// Unrounded annuity payment.
    pub periodic_payment: f64,
    pub installments:     Vec<ScheduledInstallment>,
}

/// Annual percent to weekly fraction.
pub fn periodic_rate(annual_rate_percent: f64) -> f64 {
    (annual_rate_percent / 100.0) / WEEKS_PER_YEAR
}

/// Fixed payment that amortizes `pv` over `nper` periods at `rate`.
pub fn pmt(rate: f64, nper: u32, pv: f64) -> f64 {
    if rate == 0.0 {
        return pv / nper as f64;
    }
    (pv * rate) / (1.0 - (1.0 + rate).powi(-(nper as i32)))
}

pub fn generate_schedule(
    principal: f64,
    term_in_periods: i64,
    pricing: Option<&Pricing>,
    today: Timestamp,
) -> BillingResult<Schedule> {
    let term = match u32::try_from(term_in_periods) {
        Ok(t) if t > 0 && t <= i32::MAX as u32 && principal.is_finite() && principal > 0.0 => t,
        _ => {
            return Err(BillingError::InvalidLoanParameters {
                principal,
                term: term_in_periods,
            })
        }
    };
    let pricing = pricing.ok_or(BillingError::NoPricingAvailable)?;
    pricing.validate()?;

    let admin_total = round_money(principal * (pricing.admin_rate / 100.0));
    let financed_total = principal + admin_total;
    let rate = periodic_rate(pricing.interest_rate);
    let payment = pmt(rate, term, financed_total);
    let installment_amount = round_money(payment);

    let base_date = today + Duration::days(FIRST_DUE_OFFSET_DAYS);
    let mut balance = financed_total;
    let mut installments = Vec::with_capacity(term as usize);

    for i in 1..=term {
        let interest = balance * rate;
        let principal_part = payment - interest;
        balance -= principal_part;

        let interest_amount = round_money(interest);
        installments.push(ScheduledInstallment {
            sequence: i,
            installment_amount,
            interest_amount,
            principal_amount: round_money(installment_amount - interest_amount),
            outstanding_amount: round_money(balance.max(0.0)),
            due_date: base_date + Duration::days((i as i64 - 1) * PERIOD_DAYS),
        });
    }

    log::debug!(
        "schedule: principal={principal:.2} term={term} financed={financed_total:.2} payment={payment:.4}"
    );

    Ok(Schedule {
        principal,
        term_in_periods: term,
        admin_total,
        financed_total,
        periodic_rate: rate,
        periodic_payment: payment,
        installments,
    })
}
