use super::SqliteStore;
use crate::{error::BillingResult, model::Payment};
use rusqlite::{params, Connection};

impl SqliteStore {
    // ── Payment ───────────────────────────────────────────────────

    pub(super) fn insert_payment(conn: &Connection, p: &Payment) -> BillingResult<()> {
        conn.execute(
            "INSERT INTO payment (payment_id, user_id, loan_id, payment_code, payment_amount, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![p.id, p.user_id, p.loan_id, p.payment_code, p.amount, p.created_at],
        )?;
        Ok(())
    }

    pub(super) fn payments_for_loan(&self, loan_id: &str) -> BillingResult<Vec<Payment>> {
        let mut stmt = self.conn.prepare(
            "SELECT payment_id, user_id, loan_id, payment_code, payment_amount, created_at
             FROM payment WHERE loan_id = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let payments = stmt
            .query_map(params![loan_id], |row| {
                Ok(Payment {
                    id:           row.get(0)?,
                    user_id:      row.get(1)?,
                    loan_id:      row.get(2)?,
                    payment_code: row.get(3)?,
                    amount:       row.get(4)?,
                    created_at:   row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(payments)
    }
}
