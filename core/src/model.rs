//! Billing records.
//!
//! Field names on the wire follow the surrounding service:
//! `loan_amount`, `loan_length`, `ntf_total`, `admin_total`,
//! `installment_amount`, `paid_amount_*`, `payment_amount`.

use crate::{
    money::approx_eq,
    types::{EntityId, Timestamp, UserId},
};
use serde::{Deserialize, Serialize};

// ── Pricing ────────────────────────────────────────────────────────

/// Interest and admin rate parameters, both in percent.
/// `interest_rate` is per year; `admin_rate` is a one-off share of principal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub id:            EntityId,
    pub interest_rate: f64,
    pub admin_rate:    f64,
    pub created_at:    Timestamp,
    pub updated_at:    Timestamp,
}

// ── Loan ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    Active,
    Closed,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Closed => "CLOSED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(Self::Active),
            "CLOSED" => Some(Self::Closed),
            _        => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id:         EntityId,
    pub user_id:    UserId,
    pub pricing_id: EntityId,
    pub loan_code:  String,
    #[serde(rename = "loan_status")]
    pub status:     LoanStatus,
    #[serde(rename = "loan_amount")]
    pub principal:  f64,
    #[serde(rename = "loan_length")]
    pub term_in_periods: u32,
    /// `principal + admin_total`, the amount actually amortized.
    #[serde(rename = "ntf_total")]
    pub financed_total: f64,
    pub admin_total: f64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Loan {
    pub fn is_closed(&self) -> bool {
        self.status == LoanStatus::Closed
    }
}

// ── Installment ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaidStatus {
    Pending,
    Paid,
}

impl PaidStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid    => "PAID",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "PAID"    => Some(Self::Paid),
            _         => None,
        }
    }
}

/// One scheduled weekly obligation within a loan's term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub id:                      EntityId,
    pub loan_id:                 EntityId,
    pub user_id:                 UserId,
    pub sequence:                u32,
    pub installment_amount:      f64,
    pub interest_amount:         f64,
    pub principal_amount:        f64,
    /// Scheduled balance left after this installment is paid.
    pub outstanding_amount:      f64,
    pub due_date:                Timestamp,
    pub paid_status:             PaidStatus,
    pub paid_amount_installment: f64,
    pub paid_amount_interest:    f64,
    pub paid_amount_principal:   f64,
    pub updated_at:              Timestamp,
}

impl Installment {
    pub fn is_pending(&self) -> bool {
        self.paid_status == PaidStatus::Pending
    }

    pub fn remaining_principal(&self) -> f64 {
        self.principal_amount - self.paid_amount_principal
    }

    pub fn remaining_interest(&self) -> f64 {
        self.interest_amount - self.paid_amount_interest
    }

    pub fn remaining_due(&self) -> f64 {
        self.remaining_principal() + self.remaining_interest()
    }

    pub fn is_settled(&self) -> bool {
        approx_eq(self.paid_amount_installment, self.installment_amount)
    }
}

// ── Payment ────────────────────────────────────────────────────────

/// Append-only ledger entry, one per accepted payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id:             EntityId,
    pub user_id:        UserId,
    pub loan_id:        EntityId,
    pub payment_code:   String,
    #[serde(rename = "payment_amount")]
    pub amount:         f64,
    pub created_at:     Timestamp,
}
