//! Pricing policy: rate validation and the versioning guard.
//!
//! A pricing record may be edited only while no loan references it.
//! Once used, new rates must be published as a new record.

use crate::{
    error::{BillingError, BillingResult},
    model::Pricing,
    repository::LoanRepository,
    types::{new_entity_id, EntityId, Timestamp},
};
use serde::{Deserialize, Serialize};

/// Request to create (no `id`) or edit (`id`) a pricing record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingRequest {
    #[serde(default)]
    pub id:            Option<EntityId>,
    pub interest_rate: f64,
    pub admin_rate:    f64,
}

impl Pricing {
    pub fn validate(&self) -> BillingResult<()> {
        validate_rates(self.interest_rate, self.admin_rate)
    }
}

pub fn validate_rates(interest_rate: f64, admin_rate: f64) -> BillingResult<()> {
    for (name, value) in [("interest_rate", interest_rate), ("admin_rate", admin_rate)] {
        if !value.is_finite() || value < 0.0 {
            return Err(BillingError::InvalidPricing {
                reason: format!("{name} must be a non-negative number, got {value}"),
            });
        }
    }
    Ok(())
}

/// Resolve an upsert request against the repository.
/// Returns the record to write; nothing is persisted here.
pub fn prepare_upsert<R: LoanRepository + ?Sized>(
    repo: &R,
    request: &PricingRequest,
    now: Timestamp,
) -> BillingResult<Pricing> {
    validate_rates(request.interest_rate, request.admin_rate)?;

    match &request.id {
        Some(id) => {
            let mut pricing = repo
                .load_pricing_by_id(id)?
                .ok_or_else(|| BillingError::PricingNotFound { pricing_id: id.clone() })?;
            if repo.pricing_in_use(id)? {
                return Err(BillingError::PricingInUse { pricing_id: id.clone() });
            }
            pricing.interest_rate = request.interest_rate;
            pricing.admin_rate = request.admin_rate;
            pricing.updated_at = now;
            Ok(pricing)
        }
        None => {
            if let Some(existing) =
                repo.find_pricing_by_rates(request.interest_rate, request.admin_rate)?
            {
                return Err(BillingError::DuplicatePricing { pricing_id: existing.id });
            }
            Ok(Pricing {
                id:            new_entity_id(),
                interest_rate: request.interest_rate,
                admin_rate:    request.admin_rate,
                created_at:    now,
                updated_at:    now,
            })
        }
    }
}
