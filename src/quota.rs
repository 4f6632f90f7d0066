use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{EngineError, Result};
use crate::types::TenantId;

/// plan-derived ceilings for a tenant; -1 denotes unlimited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    pub max_products: i64,
    pub max_active_loans: i64,
    /// ceiling on the tenant's summed outstanding balance, in minor units
    pub max_outstanding_amount: i64,
}

impl PlanLimits {
    pub const UNLIMITED: i64 = -1;

    pub fn unlimited() -> Self {
        Self {
            max_products: Self::UNLIMITED,
            max_active_loans: Self::UNLIMITED,
            max_outstanding_amount: Self::UNLIMITED,
        }
    }
}

/// supplies plan limits per tenant; seam to the external subscription service
pub trait PlanProvider {
    fn limits(&self, tenant_id: TenantId) -> PlanLimits;
}

/// tenant usage measured inside the gating operation, never from a cache
#[derive(Debug, Clone, Copy, Default)]
pub struct TenantUsage {
    pub active_product_count: i64,
    pub active_loan_count: i64,
    pub outstanding_total: Money,
}

/// gate for CreateProduct
pub fn check_product_quota(usage: &TenantUsage, limits: &PlanLimits) -> Result<()> {
    check_count("products", usage.active_product_count, limits.max_products)
}

/// gate for CreateLoan: loan count and outstanding exposure
pub fn check_loan_quota(usage: &TenantUsage, limits: &PlanLimits) -> Result<()> {
    check_count("active_loans", usage.active_loan_count, limits.max_active_loans)?;
    check_count(
        "outstanding_balance",
        usage.outstanding_total.minor(),
        limits.max_outstanding_amount,
    )
}

fn check_count(resource: &'static str, current: i64, limit: i64) -> Result<()> {
    if limit != PlanLimits::UNLIMITED && current >= limit {
        return Err(EngineError::QuotaExceeded {
            resource,
            current,
            limit,
        });
    }
    Ok(())
}
