//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! The core calls it through `LoanRepository`; every write goes through
//! `apply_atomically`, which runs the whole `WriteSet` in one transaction.

mod event;
mod installment;
mod loan;
mod payment;
mod pricing;

use crate::{
    error::BillingResult,
    event::BillingEvent,
    model::{Installment, Loan, LoanStatus, PaidStatus, Payment, Pricing},
    repository::{LoanRepository, Page, WriteSet},
};
use rusqlite::{
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
    Connection,
};

pub struct SqliteStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl SqliteStore {
    pub fn open(path: &str) -> BillingResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> BillingResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> BillingResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_billing.sql"))?;
        Ok(())
    }
}

impl LoanRepository for SqliteStore {
    fn load_active_loan(&self, user_id: &str) -> BillingResult<Option<Loan>> {
        self.active_loan_for_user(user_id)
    }

    fn load_loan(&self, loan_id: &str) -> BillingResult<Option<Loan>> {
        self.loan_by_id(loan_id)
    }

    fn load_pricing(&self) -> BillingResult<Option<Pricing>> {
        self.default_pricing()
    }

    fn load_pricing_by_id(&self, pricing_id: &str) -> BillingResult<Option<Pricing>> {
        self.pricing_by_id(pricing_id)
    }

    fn find_pricing_by_rates(
        &self,
        interest_rate: f64,
        admin_rate: f64,
    ) -> BillingResult<Option<Pricing>> {
        self.pricing_by_rates(interest_rate, admin_rate)
    }

    fn pricing_in_use(&self, pricing_id: &str) -> BillingResult<bool> {
        self.pricing_reference_count(pricing_id).map(|n| n > 0)
    }

    fn load_pending_installments(&self, loan_id: &str) -> BillingResult<Vec<Installment>> {
        self.installments_for_loan(loan_id, Some(PaidStatus::Pending))
    }

    fn load_installments(&self, loan_id: &str) -> BillingResult<Vec<Installment>> {
        self.installments_for_loan(loan_id, None)
    }

    fn list_loans(&self, page: Page) -> BillingResult<Vec<Loan>> {
        self.loans_page(page)
    }

    fn load_payments(&self, loan_id: &str) -> BillingResult<Vec<Payment>> {
        self.payments_for_loan(loan_id)
    }

    fn load_events(&self, loan_id: &str) -> BillingResult<Vec<BillingEvent>> {
        self.events_for_loan(loan_id)?
            .iter()
            .map(|e| e.event().map_err(Into::into))
            .collect()
    }

    fn code_exists(&self, code: &str) -> BillingResult<bool> {
        self.display_code_taken(code)
    }

    fn apply_atomically(&mut self, writes: WriteSet) -> BillingResult<()> {
        let count = writes.record_count();
        let tx = self.conn.transaction()?;

        if let Some(pricing) = &writes.upserted_pricing {
            Self::upsert_pricing(&tx, pricing)?;
        }
        if let Some(loan) = &writes.new_loan {
            Self::insert_loan(&tx, loan)?;
        }
        for inst in &writes.new_installments {
            Self::insert_installment(&tx, inst)?;
        }
        for inst in &writes.updated_installments {
            Self::update_installment(&tx, inst)?;
        }
        if let Some(loan) = &writes.updated_loan {
            Self::update_loan(&tx, loan)?;
        }
        if let Some(payment) = &writes.new_payment {
            Self::insert_payment(&tx, payment)?;
        }
        for event in &writes.events {
            Self::append_event(&tx, event)?;
        }

        // Dropping `tx` on any early return above rolls everything back.
        tx.commit()?;
        log::debug!("store: applied {count} records");
        Ok(())
    }
}

// ── Column conversions ─────────────────────────────────────────────

impl ToSql for LoanStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for LoanStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        LoanStatus::parse(s).ok_or_else(|| FromSqlError::Other(format!("unknown loan status {s}").into()))
    }
}

impl ToSql for PaidStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for PaidStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        PaidStatus::parse(s).ok_or_else(|| FromSqlError::Other(format!("unknown paid status {s}").into()))
    }
}
