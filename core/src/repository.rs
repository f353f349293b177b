//! Persistence boundary.
//!
//! RULE: the core reads through `LoanRepository` and writes only by
//! handing a `WriteSet` to `apply_atomically`. An implementation must
//! apply every intent in the set or none of them.

use crate::{
    error::{BillingError, BillingResult},
    event::{BillingEvent, EventLogEntry},
    model::{Installment, Loan, Payment, Pricing},
    money::approx_eq,
};
use std::collections::HashMap;

/// Write intents produced by one core operation.
#[derive(Debug, Clone, Default)]
pub struct WriteSet {
    pub new_loan:             Option<Loan>,
    pub new_installments:     Vec<Installment>,
    pub updated_installments: Vec<Installment>,
    /// Lifecycle transition of an existing loan.
    pub updated_loan:         Option<Loan>,
    pub new_payment:          Option<Payment>,
    /// Inserted when new, replaced when the id exists.
    pub upserted_pricing:     Option<Pricing>,
    pub events:               Vec<BillingEvent>,
}

impl WriteSet {
    pub fn record_count(&self) -> usize {
        self.new_loan.iter().count()
            + self.new_installments.len()
            + self.updated_installments.len()
            + self.updated_loan.iter().count()
            + self.new_payment.iter().count()
            + self.upserted_pricing.iter().count()
            + self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }
}

/// One page of the loan listing, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page:  u32,
    pub limit: u32,
}

impl Page {
    pub const DEFAULT_LIMIT: u32 = 10;

    /// Out-of-range values fall back to page 1 / limit 10.
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page:  u32::try_from(page).ok().filter(|p| *p > 0).unwrap_or(1),
            limit: u32::try_from(limit).ok().filter(|l| *l > 0).unwrap_or(Self::DEFAULT_LIMIT),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }
}

impl Default for Page {
    fn default() -> Self {
        Self { page: 1, limit: Self::DEFAULT_LIMIT }
    }
}

pub trait LoanRepository {
    /// The user's loan that is not CLOSED, if any.
    fn load_active_loan(&self, user_id: &str) -> BillingResult<Option<Loan>>;

    fn load_loan(&self, loan_id: &str) -> BillingResult<Option<Loan>>;

    /// The default pricing record (earliest created).
    fn load_pricing(&self) -> BillingResult<Option<Pricing>>;

    fn load_pricing_by_id(&self, pricing_id: &str) -> BillingResult<Option<Pricing>>;

    fn find_pricing_by_rates(&self, interest_rate: f64, admin_rate: f64)
        -> BillingResult<Option<Pricing>>;

    /// True when any loan references the pricing record.
    fn pricing_in_use(&self, pricing_id: &str) -> BillingResult<bool>;

    /// PENDING installments ordered by sequence ascending.
    fn load_pending_installments(&self, loan_id: &str) -> BillingResult<Vec<Installment>>;

    /// All installments ordered by sequence ascending.
    fn load_installments(&self, loan_id: &str) -> BillingResult<Vec<Installment>>;

    /// Newest first.
    fn list_loans(&self, page: Page) -> BillingResult<Vec<Loan>>;

    fn load_payments(&self, loan_id: &str) -> BillingResult<Vec<Payment>>;

    fn load_events(&self, loan_id: &str) -> BillingResult<Vec<BillingEvent>>;

    /// True when a loan or payment already carries this display code.
    fn code_exists(&self, code: &str) -> BillingResult<bool>;

    fn apply_atomically(&mut self, writes: WriteSet) -> BillingResult<()>;
}

// ── In-memory implementation ───────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct MemoryState {
    pricings:     Vec<Pricing>,
    loans:        Vec<Loan>,
    installments: HashMap<String, Installment>,
    payments:     Vec<Payment>,
    events:       Vec<EventLogEntry>,
}

/// In-memory repository (used in tests).
/// Writes are applied to a copy of the state that replaces the live
/// state only when every intent succeeded.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state:           MemoryState,
    fail_next_apply: bool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `apply_atomically` call fail with a persistence error.
    pub fn fail_next_apply(&mut self) {
        self.fail_next_apply = true;
    }

    pub fn payment_count(&self) -> usize {
        self.state.payments.len()
    }

    fn apply_to(state: &mut MemoryState, writes: WriteSet) -> BillingResult<()> {
        if let Some(pricing) = writes.upserted_pricing {
            match state.pricings.iter_mut().find(|p| p.id == pricing.id) {
                Some(existing) => *existing = pricing,
                None => state.pricings.push(pricing),
            }
        }

        if let Some(loan) = writes.new_loan {
            if state.loans.iter().any(|l| l.id == loan.id || l.loan_code == loan.loan_code) {
                return Err(conflict(format!("loan {} already exists", loan.id)));
            }
            if !loan.is_closed()
                && state.loans.iter().any(|l| l.user_id == loan.user_id && !l.is_closed())
            {
                return Err(conflict(format!("user {} already has an open loan", loan.user_id)));
            }
            state.loans.push(loan);
        }

        for inst in writes.new_installments {
            if !state.loans.iter().any(|l| l.id == inst.loan_id) {
                return Err(conflict(format!("installment {} has no loan", inst.id)));
            }
            if state.installments.contains_key(&inst.id) {
                return Err(conflict(format!("installment {} already exists", inst.id)));
            }
            state.installments.insert(inst.id.clone(), inst);
        }

        for inst in writes.updated_installments {
            match state.installments.get_mut(&inst.id) {
                Some(existing) => *existing = inst,
                None => return Err(conflict(format!("installment {} not found", inst.id))),
            }
        }

        if let Some(loan) = writes.updated_loan {
            match state.loans.iter_mut().find(|l| l.id == loan.id) {
                Some(existing) => *existing = loan,
                None => return Err(conflict(format!("loan {} not found", loan.id))),
            }
        }

        if let Some(payment) = writes.new_payment {
            if state.payments.iter().any(|p| p.payment_code == payment.payment_code) {
                return Err(conflict(format!("payment code {} already used", payment.payment_code)));
            }
            state.payments.push(payment);
        }

        for event in &writes.events {
            let mut entry = EventLogEntry::from_event(event)?;
            entry.id = Some(state.events.len() as i64 + 1);
            state.events.push(entry);
        }
        Ok(())
    }

    fn sorted_installments(&self, loan_id: &str, pending_only: bool) -> Vec<Installment> {
        let mut out: Vec<Installment> = self
            .state
            .installments
            .values()
            .filter(|i| i.loan_id == loan_id && (!pending_only || i.is_pending()))
            .cloned()
            .collect();
        out.sort_by_key(|i| i.sequence);
        out
    }
}

fn conflict(reason: String) -> BillingError {
    BillingError::PersistenceFailure { reason }
}

impl LoanRepository for MemoryRepository {
    fn load_active_loan(&self, user_id: &str) -> BillingResult<Option<Loan>> {
        Ok(self
            .state
            .loans
            .iter()
            .find(|l| l.user_id == user_id && !l.is_closed())
            .cloned())
    }

    fn load_loan(&self, loan_id: &str) -> BillingResult<Option<Loan>> {
        Ok(self.state.loans.iter().find(|l| l.id == loan_id).cloned())
    }

    fn load_pricing(&self) -> BillingResult<Option<Pricing>> {
        Ok(self.state.pricings.first().cloned())
    }

    fn load_pricing_by_id(&self, pricing_id: &str) -> BillingResult<Option<Pricing>> {
        Ok(self.state.pricings.iter().find(|p| p.id == pricing_id).cloned())
    }

    fn find_pricing_by_rates(
        &self,
        interest_rate: f64,
        admin_rate: f64,
    ) -> BillingResult<Option<Pricing>> {
        Ok(self
            .state
            .pricings
            .iter()
            .find(|p| approx_eq(p.interest_rate, interest_rate) && approx_eq(p.admin_rate, admin_rate))
            .cloned())
    }

    fn pricing_in_use(&self, pricing_id: &str) -> BillingResult<bool> {
        Ok(self.state.loans.iter().any(|l| l.pricing_id == pricing_id))
    }

    fn load_pending_installments(&self, loan_id: &str) -> BillingResult<Vec<Installment>> {
        Ok(self.sorted_installments(loan_id, true))
    }

    fn load_installments(&self, loan_id: &str) -> BillingResult<Vec<Installment>> {
        Ok(self.sorted_installments(loan_id, false))
    }

    fn list_loans(&self, page: Page) -> BillingResult<Vec<Loan>> {
        let mut loans: Vec<Loan> = self.state.loans.iter().rev().cloned().collect();
        loans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(loans
            .into_iter()
            .skip(page.offset())
            .take(page.limit as usize)
            .collect())
    }

    fn load_payments(&self, loan_id: &str) -> BillingResult<Vec<Payment>> {
        Ok(self
            .state
            .payments
            .iter()
            .filter(|p| p.loan_id == loan_id)
            .cloned()
            .collect())
    }

    fn load_events(&self, loan_id: &str) -> BillingResult<Vec<BillingEvent>> {
        self.state
            .events
            .iter()
            .filter(|e| e.loan_id.as_deref() == Some(loan_id))
            .map(|e| e.event().map_err(Into::into))
            .collect()
    }

    fn code_exists(&self, code: &str) -> BillingResult<bool> {
        Ok(self.state.loans.iter().any(|l| l.loan_code == code)
            || self.state.payments.iter().any(|p| p.payment_code == code))
    }

    fn apply_atomically(&mut self, writes: WriteSet) -> BillingResult<()> {
        if self.fail_next_apply {
            self.fail_next_apply = false;
            return Err(conflict("injected failure".into()));
        }
        let mut next = self.state.clone();
        Self::apply_to(&mut next, writes)?;
        self.state = next;
        Ok(())
    }
}
