use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{EngineError, Result};
use crate::types::{Fee, InterestType, ProductId, TenantId, TermPeriod};

/// lending terms offered by a tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanProduct {
    pub id: ProductId,
    pub tenant_id: TenantId,
    pub name: String,
    /// loan-code prefix, 2-8 chars of A-Z0-9, unique per tenant
    pub prefix: String,
    pub min_amount: Money,
    pub max_amount: Money,
    pub interest_rate: Rate,
    pub interest_type: InterestType,
    pub max_term: u32,
    pub term_period: TermPeriod,
    pub late_penalty_rate: Option<Rate>,
    pub application_fee: Fee,
    pub processing_fee: Fee,
    pub guarantor_required: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoanProduct {
    pub fn from_input(
        id: ProductId,
        tenant_id: TenantId,
        input: ProductInput,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            name: input.name,
            prefix: input.prefix,
            min_amount: input.min_amount,
            max_amount: input.max_amount,
            interest_rate: Rate::from_percent(input.interest_rate_percent),
            interest_type: input.interest_type,
            max_term: input.max_term,
            term_period: input.term_period,
            late_penalty_rate: input.late_penalty_rate_percent.map(Rate::from_percent),
            application_fee: input.application_fee,
            processing_fee: input.processing_fee,
            guarantor_required: input.guarantor_required,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// overwrite the editable terms; existing loans keep their snapshots
    pub fn apply_input(&mut self, input: ProductInput, now: DateTime<Utc>) {
        self.name = input.name;
        self.prefix = input.prefix;
        self.min_amount = input.min_amount;
        self.max_amount = input.max_amount;
        self.interest_rate = Rate::from_percent(input.interest_rate_percent);
        self.interest_type = input.interest_type;
        self.max_term = input.max_term;
        self.term_period = input.term_period;
        self.late_penalty_rate = input.late_penalty_rate_percent.map(Rate::from_percent);
        self.application_fee = input.application_fee;
        self.processing_fee = input.processing_fee;
        self.guarantor_required = input.guarantor_required;
        self.updated_at = now;
    }

    /// principal bounds check for a loan request
    pub fn principal_in_bounds(&self, principal: Money) -> bool {
        principal >= self.min_amount && principal <= self.max_amount
    }
}

/// input for creating or updating a product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub prefix: String,
    pub min_amount: Money,
    pub max_amount: Money,
    /// annual rate in percent form, 0-99.999
    pub interest_rate_percent: Decimal,
    pub interest_type: InterestType,
    pub max_term: u32,
    pub term_period: TermPeriod,
    /// per-day percent applied to overdue principal
    pub late_penalty_rate_percent: Option<Decimal>,
    pub application_fee: Fee,
    pub processing_fee: Fee,
    pub guarantor_required: bool,
}

const MAX_RATE_PERCENT: Decimal = dec!(99.999);

impl ProductInput {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::Validation {
                field: "name",
                message: "product name must not be empty".to_string(),
            });
        }

        if self.prefix.len() < 2 || self.prefix.len() > 8 {
            return Err(EngineError::Validation {
                field: "prefix",
                message: format!("prefix must be 2-8 characters, got {}", self.prefix.len()),
            });
        }
        if !self
            .prefix
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        {
            return Err(EngineError::Validation {
                field: "prefix",
                message: "prefix must contain only A-Z and 0-9".to_string(),
            });
        }

        if !self.min_amount.is_positive() {
            return Err(EngineError::Validation {
                field: "min_amount",
                message: "minimum amount must be positive".to_string(),
            });
        }
        if self.max_amount < self.min_amount {
            return Err(EngineError::Validation {
                field: "max_amount",
                message: format!(
                    "maximum amount {} is below minimum amount {}",
                    self.max_amount, self.min_amount
                ),
            });
        }

        validate_rate_percent("interest_rate", self.interest_rate_percent)?;
        if let Some(penalty) = self.late_penalty_rate_percent {
            validate_rate_percent("late_penalty_rate", penalty)?;
        }

        if self.max_term == 0 {
            return Err(EngineError::Validation {
                field: "max_term",
                message: "maximum term must be at least 1".to_string(),
            });
        }

        validate_fee("application_fee", &self.application_fee)?;
        validate_fee("processing_fee", &self.processing_fee)?;

        Ok(())
    }
}

fn validate_rate_percent(field: &'static str, percent: Decimal) -> Result<()> {
    if percent.is_sign_negative() || percent > MAX_RATE_PERCENT {
        return Err(EngineError::Validation {
            field,
            message: format!("rate must be between 0 and {}, got {}", MAX_RATE_PERCENT, percent),
        });
    }
    Ok(())
}

fn validate_fee(field: &'static str, fee: &Fee) -> Result<()> {
    match fee {
        Fee::Fixed(amount) if amount.is_negative() => Err(EngineError::Validation {
            field,
            message: "fixed fee must not be negative".to_string(),
        }),
        Fee::Percentage(percent)
            if percent.is_sign_negative() || *percent > Decimal::ONE_HUNDRED =>
        {
            Err(EngineError::Validation {
                field,
                message: format!("fee percentage must be between 0 and 100, got {}", percent),
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_input() -> ProductInput {
        ProductInput {
            name: "Staff Loan".to_string(),
            prefix: "STF".to_string(),
            min_amount: Money::from_minor(10_000),
            max_amount: Money::from_minor(500_000),
            interest_rate_percent: dec!(10),
            interest_type: InterestType::Flat,
            max_term: 12,
            term_period: TermPeriod::Months,
            late_penalty_rate_percent: None,
            application_fee: Fee::Fixed(Money::ZERO),
            processing_fee: Fee::Percentage(dec!(1)),
            guarantor_required: false,
        }
    }

    #[test]
    fn test_valid_input_passes() {
        assert!(valid_input().validate().is_ok());
    }

    #[test]
    fn test_prefix_rules() {
        let mut input = valid_input();
        input.prefix = "S".to_string();
        assert!(matches!(
            input.validate(),
            Err(EngineError::Validation { field: "prefix", .. })
        ));

        input.prefix = "TOOLONGPFX".to_string();
        assert!(input.validate().is_err());

        input.prefix = "stf".to_string();
        assert!(input.validate().is_err());

        input.prefix = "ST-1".to_string();
        assert!(input.validate().is_err());

        input.prefix = "STF01".to_string();
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_amount_bounds_rejected_not_persisted() {
        let mut input = valid_input();
        input.max_amount = Money::from_minor(5_000);
        assert!(matches!(
            input.validate(),
            Err(EngineError::Validation { field: "max_amount", .. })
        ));

        input.max_amount = input.min_amount;
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_rate_range() {
        let mut input = valid_input();
        input.interest_rate_percent = dec!(100);
        assert!(input.validate().is_err());

        input.interest_rate_percent = dec!(99.999);
        assert!(input.validate().is_ok());

        input.interest_rate_percent = dec!(0);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_fee_validation() {
        let mut input = valid_input();
        input.application_fee = Fee::Percentage(dec!(101));
        assert!(input.validate().is_err());

        input.application_fee = Fee::Fixed(Money::from_minor(-1));
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_product_edit_keeps_identity() {
        let now = Utc::now();
        let id = ProductId::new_v4();
        let tenant = TenantId::new_v4();
        let mut product = LoanProduct::from_input(id, tenant, valid_input(), now);
        assert!(product.is_active);

        let mut edit = valid_input();
        edit.interest_rate_percent = dec!(15);
        product.apply_input(edit, now);

        assert_eq!(product.id, id);
        assert_eq!(product.tenant_id, tenant);
        assert_eq!(product.interest_rate, Rate::from_percent(dec!(15)));
    }
}
