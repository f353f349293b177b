use super::SqliteStore;
use crate::{
    error::BillingResult,
    event::{BillingEvent, EventLogEntry},
};
use rusqlite::{params, Connection};

impl SqliteStore {
    // ── Event log ─────────────────────────────────────────────────

    pub(super) fn append_event(conn: &Connection, event: &BillingEvent) -> BillingResult<()> {
        let entry = EventLogEntry::from_event(event)?;
        conn.execute(
            "INSERT INTO event_log (loan_id, event_type, payload, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![entry.loan_id, entry.event_type, entry.payload, entry.created_at],
        )?;
        Ok(())
    }

    pub fn events_for_loan(&self, loan_id: &str) -> BillingResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, loan_id, event_type, payload, created_at
             FROM event_log WHERE loan_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![loan_id], |row| {
                Ok(EventLogEntry {
                    id:         Some(row.get(0)?),
                    loan_id:    row.get(1)?,
                    event_type: row.get(2)?,
                    payload:    row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn event_count(&self) -> BillingResult<i64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM event_log", [], |row| row.get(0))?;
        Ok(n)
    }
}
