use super::SqliteStore;
use crate::{error::BillingResult, model::Pricing, money::MONEY_EPSILON};
use rusqlite::{params, Connection, OptionalExtension, Row};

const PRICING_COLUMNS: &str = "pricing_id, interest_rate, admin_rate, created_at, updated_at";

fn pricing_from_row(row: &Row<'_>) -> rusqlite::Result<Pricing> {
    Ok(Pricing {
        id:            row.get(0)?,
        interest_rate: row.get(1)?,
        admin_rate:    row.get(2)?,
        created_at:    row.get(3)?,
        updated_at:    row.get(4)?,
    })
}

impl SqliteStore {
    // ── Pricing ───────────────────────────────────────────────────

    pub(super) fn upsert_pricing(conn: &Connection, p: &Pricing) -> BillingResult<()> {
        conn.execute(
            "INSERT INTO pricing (pricing_id, interest_rate, admin_rate, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(pricing_id) DO UPDATE SET
                interest_rate = excluded.interest_rate,
                admin_rate    = excluded.admin_rate,
                updated_at    = excluded.updated_at",
            params![p.id, p.interest_rate, p.admin_rate, p.created_at, p.updated_at],
        )?;
        Ok(())
    }

    pub(super) fn default_pricing(&self) -> BillingResult<Option<Pricing>> {
        let sql = format!(
            "SELECT {PRICING_COLUMNS} FROM pricing ORDER BY created_at ASC, rowid ASC LIMIT 1"
        );
        Ok(self.conn.query_row(&sql, [], pricing_from_row).optional()?)
    }

    pub(super) fn pricing_by_id(&self, pricing_id: &str) -> BillingResult<Option<Pricing>> {
        let sql = format!("SELECT {PRICING_COLUMNS} FROM pricing WHERE pricing_id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![pricing_id], pricing_from_row)
            .optional()?)
    }

    pub(super) fn pricing_by_rates(
        &self,
        interest_rate: f64,
        admin_rate: f64,
    ) -> BillingResult<Option<Pricing>> {
        let sql = format!(
            "SELECT {PRICING_COLUMNS} FROM pricing
             WHERE ABS(interest_rate - ?1) < ?3 AND ABS(admin_rate - ?2) < ?3
             ORDER BY created_at ASC, rowid ASC LIMIT 1"
        );
        Ok(self
            .conn
            .query_row(&sql, params![interest_rate, admin_rate, MONEY_EPSILON], pricing_from_row)
            .optional()?)
    }

    pub(super) fn pricing_reference_count(&self, pricing_id: &str) -> BillingResult<i64> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM loan WHERE pricing_id = ?1",
            params![pricing_id],
            |row| row.get(0),
        )?;
        Ok(n)
    }
}
