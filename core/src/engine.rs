//! The billing engine: the operations exposed to a calling layer.
//!
//! Creation path:  pricing -> schedule -> lifecycle (open).
//! Payment path:   outstanding + delinquency (validate) -> allocation
//!                 -> lifecycle (maybe close).
//!
//! RULES:
//!   - Every operation reads through the repository, computes in memory,
//!     and hands one `WriteSet` to `apply_atomically`.
//!   - Nothing is retried here; a failed apply is returned as is.
//!   - `now` comes from the injected clock, never from the system.

use crate::{
    allocation::allocate,
    clock::{Clock, SystemClock},
    codes::{CodeGenerator, SeededCodeGenerator, LOAN_CODE_PREFIX, PAYMENT_CODE_PREFIX},
    config::PricingConfig,
    delinquency::{evaluate, DelinquencyReport},
    error::{BillingError, BillingResult},
    event::BillingEvent,
    lifecycle::{close_if_settled, ensure_can_open, open_loan},
    model::{Installment, Loan, Payment, Pricing},
    money::{round_money, to_cents},
    outstanding::{compute_outstanding, total_remaining_due, OutstandingReport},
    pricing::{prepare_upsert, PricingRequest},
    repository::{LoanRepository, Page, WriteSet},
    schedule::generate_schedule,
    types::{new_entity_id, Timestamp},
};
use serde::{Deserialize, Serialize};

/// Draws per display code before giving up on a crowded day.
const MAX_CODE_DRAWS: usize = 64;

/// A loan with its full installment plan and payment ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanDetail {
    #[serde(flatten)]
    pub loan:         Loan,
    pub installments: Vec<Installment>,
    pub payments:     Vec<Payment>,
}

pub struct BillingEngine<R: LoanRepository> {
    repo:  R,
    clock: Box<dyn Clock>,
    codes: Box<dyn CodeGenerator>,
}

impl<R: LoanRepository> BillingEngine<R> {
    pub fn new(repo: R, clock: Box<dyn Clock>, codes: Box<dyn CodeGenerator>) -> Self {
        Self { repo, clock, codes }
    }

    /// Wall clock and a code stream; seeded from entropy when `code_seed` is None.
    pub fn build(repo: R, code_seed: Option<u64>) -> Self {
        let codes = match code_seed {
            Some(seed) => SeededCodeGenerator::new(seed),
            None => SeededCodeGenerator::from_entropy(),
        };
        Self::new(repo, Box::new(SystemClock), Box::new(codes))
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn repository_mut(&mut self) -> &mut R {
        &mut self.repo
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    // ── Loans ──────────────────────────────────────────────────────

    /// Open a loan for `user_id` against the default pricing.
    pub fn create_loan(
        &mut self,
        user_id: &str,
        principal: f64,
        term_in_periods: i64,
    ) -> BillingResult<Loan> {
        let now = self.clock.now();

        let existing = self.repo.load_active_loan(user_id)?;
        if let Err(e) = ensure_can_open(user_id, existing.as_ref()) {
            log::warn!("user={user_id} create_loan rejected: {e}");
            return Err(e);
        }

        let pricing = self.repo.load_pricing()?;
        let schedule = generate_schedule(principal, term_in_periods, pricing.as_ref(), now)
            .inspect_err(|e| log::warn!("user={user_id} create_loan rejected: {e}"))?;
        let pricing = pricing.ok_or(BillingError::NoPricingAvailable)?;

        let loan_code = self.issue_code(LOAN_CODE_PREFIX, now)?;
        let (loan, installments) = open_loan(user_id, &pricing, &schedule, loan_code, now);

        let writes = WriteSet {
            events: vec![BillingEvent::LoanOpened {
                at:             now,
                loan_id:        loan.id.clone(),
                user_id:        loan.user_id.clone(),
                pricing_id:     pricing.id.clone(),
                principal:      loan.principal,
                financed_total: loan.financed_total,
                term:           loan.term_in_periods,
            }],
            new_loan: Some(loan.clone()),
            new_installments: installments,
            ..WriteSet::default()
        };
        self.repo.apply_atomically(writes)?;

        log::info!(
            "loan={} user={user_id} opened: principal={:.2} financed={:.2} term={} installment={:.2}",
            loan.loan_code,
            loan.principal,
            loan.financed_total,
            loan.term_in_periods,
            round_money(schedule.periodic_payment),
        );
        Ok(loan)
    }

    pub fn loan_detail(&self, loan_id: &str) -> BillingResult<LoanDetail> {
        let loan = self.require_loan(loan_id)?;
        let installments = self.repo.load_installments(loan_id)?;
        let payments = self.repo.load_payments(loan_id)?;
        Ok(LoanDetail { loan, installments, payments })
    }

    pub fn list_loans(&self, page: Page) -> BillingResult<Vec<Loan>> {
        self.repo.list_loans(page)
    }

    pub fn loan_history(&self, loan_id: &str) -> BillingResult<Vec<BillingEvent>> {
        self.require_loan(loan_id)?;
        self.repo.load_events(loan_id)
    }

    // ── Reporting ──────────────────────────────────────────────────

    pub fn get_outstanding(&self, loan_id: &str) -> BillingResult<OutstandingReport> {
        let loan = self.require_loan(loan_id)?;
        let pending = self.repo.load_pending_installments(loan_id)?;
        Ok(compute_outstanding(&pending, self.clock.now(), loan.financed_total))
    }

    pub fn get_delinquency(&self, loan_id: &str) -> BillingResult<DelinquencyReport> {
        self.require_loan(loan_id)?;
        let pending = self.repo.load_pending_installments(loan_id)?;
        Ok(evaluate(&pending, self.clock.now()))
    }

    // ── Payments ───────────────────────────────────────────────────

    /// Apply a payment to the loan's pending installments.
    ///
    /// The caller must serialize payments per loan (row lock, per-loan
    /// mutex or optimistic retry): two payments computed against the same
    /// installment set would both be accepted against one balance.
    pub fn apply_payment(&mut self, loan_id: &str, amount: f64) -> BillingResult<Payment> {
        if !amount.is_finite() || to_cents(amount) <= 0 {
            log::warn!("loan={loan_id} payment rejected: invalid amount {amount}");
            return Err(BillingError::InvalidPayment { amount });
        }
        let now = self.clock.now();
        let loan = self.require_loan(loan_id)?;

        let pending = self.repo.load_pending_installments(loan_id)?;
        if pending.is_empty() {
            log::warn!("loan={loan_id} payment rejected: no pending installments");
            return Err(BillingError::NoPendingInstallments { loan_id: loan_id.to_string() });
        }

        let total_outstanding = total_remaining_due(&pending);
        if to_cents(amount) > to_cents(total_outstanding) {
            log::warn!(
                "loan={loan_id} payment rejected: {amount:.2} exceeds outstanding {total_outstanding:.2}"
            );
            return Err(BillingError::PaymentExceedsOutstanding {
                attempted:   amount,
                outstanding: round_money(total_outstanding),
            });
        }

        // The reported minimum counts full installment amounts; it can
        // only be demanded up to what is actually still owed.
        let delinquency = evaluate(&pending, now);
        if delinquency.has_overdue() {
            let required = delinquency.minimum_payment_required.min(round_money(total_outstanding));
            if to_cents(amount) < to_cents(required) {
                log::warn!(
                    "loan={loan_id} payment rejected: {amount:.2} below overdue minimum {:.2}",
                    delinquency.minimum_payment_required
                );
                return Err(BillingError::PaymentBelowMinimumOverdue {
                    attempted: amount,
                    minimum:   delinquency.minimum_payment_required,
                });
            }
        }

        let allocation = allocate(&pending, amount, now);
        let payment = Payment {
            id:           new_entity_id(),
            user_id:      loan.user_id.clone(),
            loan_id:      loan.id.clone(),
            payment_code: self.issue_code(PAYMENT_CODE_PREFIX, now)?,
            amount,
            created_at:   now,
        };
        let closed = close_if_settled(&loan, allocation.still_pending, now);

        let mut events = vec![BillingEvent::PaymentApplied {
            at:         now,
            loan_id:    loan.id.clone(),
            payment_id: payment.id.clone(),
            amount,
        }];
        events.extend(allocation.settled.iter().map(|&sequence| BillingEvent::InstallmentPaid {
            at: now,
            loan_id: loan.id.clone(),
            sequence,
        }));
        if closed.is_some() {
            events.push(BillingEvent::LoanClosed { at: now, loan_id: loan.id.clone() });
        }

        let writes = WriteSet {
            updated_installments: allocation.updated,
            updated_loan: closed.clone(),
            new_payment: Some(payment.clone()),
            events,
            ..WriteSet::default()
        };
        self.repo.apply_atomically(writes)?;

        log::info!(
            "loan={} payment {} of {amount:.2} applied: {} installment(s) settled, {} pending",
            loan.loan_code,
            payment.payment_code,
            allocation.settled.len(),
            allocation.still_pending,
        );
        if closed.is_some() {
            log::info!("loan={} closed", loan.loan_code);
        }
        Ok(payment)
    }

    // ── Pricing ────────────────────────────────────────────────────

    pub fn upsert_pricing(&mut self, request: &PricingRequest) -> BillingResult<Pricing> {
        let now = self.clock.now();
        let pricing = prepare_upsert(&self.repo, request, now)
            .inspect_err(|e| log::warn!("pricing upsert rejected: {e}"))?;

        let writes = WriteSet {
            events: vec![BillingEvent::PricingUpserted {
                at:            now,
                pricing_id:    pricing.id.clone(),
                interest_rate: pricing.interest_rate,
                admin_rate:    pricing.admin_rate,
            }],
            upserted_pricing: Some(pricing.clone()),
            ..WriteSet::default()
        };
        self.repo.apply_atomically(writes)?;

        log::info!(
            "pricing={} interest_rate={:.2} admin_rate={:.2}",
            pricing.id, pricing.interest_rate, pricing.admin_rate
        );
        Ok(pricing)
    }

    /// Create the configured default pricing when none exists yet.
    pub fn seed_default_pricing(&mut self, config: &PricingConfig) -> BillingResult<Option<Pricing>> {
        if self.repo.load_pricing()?.is_some() {
            return Ok(None);
        }
        let request = PricingRequest {
            id:            None,
            interest_rate: config.interest_rate,
            admin_rate:    config.admin_rate,
        };
        self.upsert_pricing(&request).map(Some)
    }

    /// A display code no stored loan or payment carries yet.
    fn issue_code(&mut self, prefix: &str, now: Timestamp) -> BillingResult<String> {
        for _ in 0..MAX_CODE_DRAWS {
            let code = self.codes.next_code(prefix, now);
            if !self.repo.code_exists(&code)? {
                return Ok(code);
            }
            log::debug!("code {code} already issued, drawing again");
        }
        Err(BillingError::PersistenceFailure {
            reason: format!("no free {prefix} code for {}", now.format("%Y%m%d")),
        })
    }

    fn require_loan(&self, loan_id: &str) -> BillingResult<Loan> {
        self.repo
            .load_loan(loan_id)?
            .ok_or_else(|| BillingError::LoanNotFound { loan_id: loan_id.to_string() })
    }
}
