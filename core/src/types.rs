//! Shared primitive types used across the entire billing core.

use chrono::{DateTime, Utc};

/// A stable, unique identifier for any record (loan, installment,
/// payment, pricing). UUID v4 text.
pub type EntityId = String;

/// Identifier of a borrower. Users live outside the core.
pub type UserId = String;

/// A point in time. All times are UTC.
pub type Timestamp = DateTime<Utc>;

/// Generate a fresh entity id.
pub fn new_entity_id() -> EntityId {
    uuid::Uuid::new_v4().to_string()
}
