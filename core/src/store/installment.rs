use super::SqliteStore;
use crate::{
    error::BillingResult,
    model::{Installment, PaidStatus},
};
use rusqlite::{params, Connection, Row};

const INSTALLMENT_COLUMNS: &str = "installment_id, loan_id, user_id, sequence,
    installment_amount, interest_amount, principal_amount, outstanding_amount, due_date,
    paid_status, paid_amount_installment, paid_amount_interest, paid_amount_principal, updated_at";

fn installment_from_row(row: &Row<'_>) -> rusqlite::Result<Installment> {
    Ok(Installment {
        id:                      row.get(0)?,
        loan_id:                 row.get(1)?,
        user_id:                 row.get(2)?,
        sequence:                row.get(3)?,
        installment_amount:      row.get(4)?,
        interest_amount:         row.get(5)?,
        principal_amount:        row.get(6)?,
        outstanding_amount:      row.get(7)?,
        due_date:                row.get(8)?,
        paid_status:             row.get(9)?,
        paid_amount_installment: row.get(10)?,
        paid_amount_interest:    row.get(11)?,
        paid_amount_principal:   row.get(12)?,
        updated_at:              row.get(13)?,
    })
}

impl SqliteStore {
    // ── Installment ───────────────────────────────────────────────

    pub(super) fn insert_installment(conn: &Connection, i: &Installment) -> BillingResult<()> {
        conn.execute(
            "INSERT INTO installment (
                installment_id, loan_id, user_id, sequence, installment_amount,
                interest_amount, principal_amount, outstanding_amount, due_date, paid_status,
                paid_amount_installment, paid_amount_interest, paid_amount_principal, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                i.id,
                i.loan_id,
                i.user_id,
                i.sequence,
                i.installment_amount,
                i.interest_amount,
                i.principal_amount,
                i.outstanding_amount,
                i.due_date,
                i.paid_status,
                i.paid_amount_installment,
                i.paid_amount_interest,
                i.paid_amount_principal,
                i.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Only payment state is mutable; the schedule itself never changes.
    pub(super) fn update_installment(conn: &Connection, i: &Installment) -> BillingResult<()> {
        let changed = conn.execute(
            "UPDATE installment SET
                paid_status = ?1, paid_amount_installment = ?2,
                paid_amount_interest = ?3, paid_amount_principal = ?4, updated_at = ?5
             WHERE installment_id = ?6",
            params![
                i.paid_status,
                i.paid_amount_installment,
                i.paid_amount_interest,
                i.paid_amount_principal,
                i.updated_at,
                i.id,
            ],
        )?;
        if changed != 1 {
            return Err(rusqlite::Error::QueryReturnedNoRows.into());
        }
        log::debug!("store: installment {} seq={} -> {}", i.id, i.sequence, i.paid_status.as_str());
        Ok(())
    }

    pub(super) fn installments_for_loan(
        &self,
        loan_id: &str,
        status: Option<PaidStatus>,
    ) -> BillingResult<Vec<Installment>> {
        let rows = match status {
            Some(status) => {
                let sql = format!(
                    "SELECT {INSTALLMENT_COLUMNS} FROM installment
                     WHERE loan_id = ?1 AND paid_status = ?2 ORDER BY sequence ASC"
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![loan_id, status], installment_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let sql = format!(
                    "SELECT {INSTALLMENT_COLUMNS} FROM installment
                     WHERE loan_id = ?1 ORDER BY sequence ASC"
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![loan_id], installment_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(rows)
    }
}
