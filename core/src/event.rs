//! Audit log of accepted state changes.
//!
//! Events are written in the same atomic unit as the records they
//! describe, so the log never mentions a change that was rolled back.

use crate::types::{EntityId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BillingEvent {
    LoanOpened {
        at:             Timestamp,
        loan_id:        EntityId,
        user_id:        UserId,
        pricing_id:     EntityId,
        principal:      f64,
        financed_total: f64,
        term:           u32,
    },
    PaymentApplied {
        at:         Timestamp,
        loan_id:    EntityId,
        payment_id: EntityId,
        amount:     f64,
    },
    InstallmentPaid {
        at:       Timestamp,
        loan_id:  EntityId,
        sequence: u32,
    },
    LoanClosed {
        at:      Timestamp,
        loan_id: EntityId,
    },
    PricingUpserted {
        at:            Timestamp,
        pricing_id:    EntityId,
        interest_rate: f64,
        admin_rate:    f64,
    },
}

impl BillingEvent {
    /// Stable name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::LoanOpened { .. }      => "loan_opened",
            Self::PaymentApplied { .. }  => "payment_applied",
            Self::InstallmentPaid { .. } => "installment_paid",
            Self::LoanClosed { .. }      => "loan_closed",
            Self::PricingUpserted { .. } => "pricing_upserted",
        }
    }

    /// Loan the event belongs to; pricing events have none.
    pub fn loan_id(&self) -> Option<&str> {
        match self {
            Self::LoanOpened { loan_id, .. }
            | Self::PaymentApplied { loan_id, .. }
            | Self::InstallmentPaid { loan_id, .. }
            | Self::LoanClosed { loan_id, .. } => Some(loan_id),
            Self::PricingUpserted { .. } => None,
        }
    }

    pub fn at(&self) -> Timestamp {
        match self {
            Self::LoanOpened { at, .. }
            | Self::PaymentApplied { at, .. }
            | Self::InstallmentPaid { at, .. }
            | Self::LoanClosed { at, .. }
            | Self::PricingUpserted { at, .. } => *at,
        }
    }
}

/// The event log entry as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id:         Option<i64>,
    pub loan_id:    Option<EntityId>,
    pub event_type: String,
    pub payload:    String, // JSON-serialized BillingEvent
    pub created_at: Timestamp,
}

impl EventLogEntry {
    pub fn from_event(event: &BillingEvent) -> serde_json::Result<Self> {
        Ok(Self {
            id:         None,
            loan_id:    event.loan_id().map(str::to_string),
            event_type: event.type_name().to_string(),
            payload:    serde_json::to_string(event)?,
            created_at: event.at(),
        })
    }

    pub fn event(&self) -> serde_json::Result<BillingEvent> {
        serde_json::from_str(&self.payload)
    }
}
