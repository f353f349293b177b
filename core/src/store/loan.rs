use super::SqliteStore;
use crate::{error::BillingResult, model::Loan, repository::Page};
use rusqlite::{params, Connection, OptionalExtension, Row};

const LOAN_COLUMNS: &str = "loan_id, user_id, pricing_id, loan_code, loan_status, loan_amount,
    loan_length, ntf_total, admin_total, created_at, updated_at";

fn loan_from_row(row: &Row<'_>) -> rusqlite::Result<Loan> {
    Ok(Loan {
        id:              row.get(0)?,
        user_id:         row.get(1)?,
        pricing_id:      row.get(2)?,
        loan_code:       row.get(3)?,
        status:          row.get(4)?,
        principal:       row.get(5)?,
        term_in_periods: row.get(6)?,
        financed_total:  row.get(7)?,
        admin_total:     row.get(8)?,
        created_at:      row.get(9)?,
        updated_at:      row.get(10)?,
    })
}

impl SqliteStore {
    // ── Loan ──────────────────────────────────────────────────────

    pub(super) fn insert_loan(conn: &Connection, l: &Loan) -> BillingResult<()> {
        conn.execute(
            "INSERT INTO loan (
                loan_id, user_id, pricing_id, loan_code, loan_status, loan_amount,
                loan_length, ntf_total, admin_total, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                l.id,
                l.user_id,
                l.pricing_id,
                l.loan_code,
                l.status,
                l.principal,
                l.term_in_periods,
                l.financed_total,
                l.admin_total,
                l.created_at,
                l.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Only the lifecycle fields of a loan ever change.
    pub(super) fn update_loan(conn: &Connection, l: &Loan) -> BillingResult<()> {
        let changed = conn.execute(
            "UPDATE loan SET loan_status = ?1, updated_at = ?2 WHERE loan_id = ?3",
            params![l.status, l.updated_at, l.id],
        )?;
        if changed != 1 {
            return Err(rusqlite::Error::QueryReturnedNoRows.into());
        }
        Ok(())
    }

    pub(super) fn loan_by_id(&self, loan_id: &str) -> BillingResult<Option<Loan>> {
        let sql = format!("SELECT {LOAN_COLUMNS} FROM loan WHERE loan_id = ?1");
        Ok(self.conn.query_row(&sql, params![loan_id], loan_from_row).optional()?)
    }

    pub(super) fn active_loan_for_user(&self, user_id: &str) -> BillingResult<Option<Loan>> {
        let sql = format!(
            "SELECT {LOAN_COLUMNS} FROM loan
             WHERE user_id = ?1 AND loan_status != 'CLOSED'
             ORDER BY created_at DESC LIMIT 1"
        );
        Ok(self.conn.query_row(&sql, params![user_id], loan_from_row).optional()?)
    }

    pub(super) fn loans_page(&self, page: Page) -> BillingResult<Vec<Loan>> {
        let sql = format!(
            "SELECT {LOAN_COLUMNS} FROM loan
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?1 OFFSET ?2"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let loans = stmt
            .query_map(params![page.limit as i64, page.offset() as i64], loan_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(loans)
    }

    /// Loan and payment codes share one namespace.
    pub(super) fn display_code_taken(&self, code: &str) -> BillingResult<bool> {
        let taken: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM loan WHERE loan_code = ?1)
                 OR EXISTS(SELECT 1 FROM payment WHERE payment_code = ?1)",
            params![code],
            |row| row.get(0),
        )?;
        Ok(taken)
    }
}
