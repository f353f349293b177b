use crate::types::{EntityId, UserId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Invalid loan parameters: principal {principal}, term {term}")]
    InvalidLoanParameters { principal: f64, term: i64 },

    #[error("No pricing available")]
    NoPricingAvailable,

    #[error("User {user_id} has an active loan {loan_id}, cannot create new loan")]
    ActiveLoanExists { user_id: UserId, loan_id: EntityId },

    #[error("Loan {loan_id} not found")]
    LoanNotFound { loan_id: EntityId },

    #[error("No pending installments for loan {loan_id}")]
    NoPendingInstallments { loan_id: EntityId },

    #[error("Payment amount {attempted:.2} exceeds total outstanding {outstanding:.2}")]
    PaymentExceedsOutstanding { attempted: f64, outstanding: f64 },

    #[error("Payment {attempted:.2} must cover at least overdue amount: {minimum:.2}")]
    PaymentBelowMinimumOverdue { attempted: f64, minimum: f64 },

    #[error("Invalid payment amount: {amount}")]
    InvalidPayment { amount: f64 },

    #[error("Invalid pricing: {reason}")]
    InvalidPricing { reason: String },

    #[error("Pricing {pricing_id} not found")]
    PricingNotFound { pricing_id: EntityId },

    #[error("Pricing {pricing_id} is referenced by a loan and cannot be changed")]
    PricingInUse { pricing_id: EntityId },

    #[error("Pricing with the same rates already exists: {pricing_id}")]
    DuplicatePricing { pricing_id: EntityId },

    #[error("Persistence failure: {reason}")]
    PersistenceFailure { reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for BillingError {
    fn from(e: rusqlite::Error) -> Self {
        BillingError::PersistenceFailure { reason: e.to_string() }
    }
}

pub type BillingResult<T> = Result<T, BillingError>;
