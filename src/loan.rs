use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{EngineError, Result};
use crate::product::LoanProduct;
use crate::types::{Fee, InterestType, LoanId, LoanStatus, MemberId, ProductId, TenantId, TermPeriod};

/// a member's loan; product terms are snapshotted at creation so later
/// catalog edits never alter them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub tenant_id: TenantId,
    /// product prefix + per-product sequence, e.g. STF00042
    pub loan_code: String,
    pub member_id: MemberId,
    pub product_id: ProductId,
    pub principal: Money,
    pub term: u32,
    pub term_period: TermPeriod,

    // terms snapshotted from the product
    pub interest_rate: Rate,
    pub interest_type: InterestType,
    pub late_penalty_rate: Option<Rate>,
    pub guarantor_required: bool,
    pub application_fee: Fee,
    pub processing_fee: Fee,

    /// application fee computed at creation, due at disbursement
    pub application_fee_due: Money,
    /// processing fee computed at approval, due at disbursement
    pub processing_fee_due: Money,

    /// total schedule interest, set at approval
    pub interest_amount: Money,
    /// principal + interest, set at approval
    pub total_payable: Money,
    pub amount_paid: Money,
    /// posted penalties not yet collected, outside total_payable
    pub accrued_penalty: Money,

    pub status: LoanStatus,
    /// opaque references into the external document store
    pub document_refs: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub disbursed_at: Option<DateTime<Utc>>,
}

impl Loan {
    pub fn new(
        id: LoanId,
        loan_code: String,
        member_id: MemberId,
        product: &LoanProduct,
        principal: Money,
        term: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tenant_id: product.tenant_id,
            loan_code,
            member_id,
            product_id: product.id,
            principal,
            term,
            term_period: product.term_period,
            interest_rate: product.interest_rate,
            interest_type: product.interest_type,
            late_penalty_rate: product.late_penalty_rate,
            guarantor_required: product.guarantor_required,
            application_fee: product.application_fee,
            processing_fee: product.processing_fee,
            application_fee_due: product.application_fee.amount(principal),
            processing_fee_due: Money::ZERO,
            interest_amount: Money::ZERO,
            total_payable: Money::ZERO,
            amount_paid: Money::ZERO,
            accrued_penalty: Money::ZERO,
            status: LoanStatus::Pending,
            document_refs: Vec::new(),
            created_at: now,
            approved_at: None,
            disbursed_at: None,
        }
    }

    /// total_payable minus amount_paid, never negative
    pub fn outstanding_balance(&self) -> Money {
        (self.total_payable - self.amount_paid).max(Money::ZERO)
    }

    /// total due right now, including posted penalties
    pub fn amount_due(&self) -> Money {
        self.outstanding_balance() + self.accrued_penalty
    }

    /// move through the closed transition table; anything else is rejected
    pub fn transition(&mut self, to: LoanStatus, operation: &'static str) -> Result<()> {
        let allowed = matches!(
            (self.status, to),
            (LoanStatus::Pending, LoanStatus::Declined)
                | (LoanStatus::Pending, LoanStatus::Disbursed)
                | (LoanStatus::Disbursed, LoanStatus::Repaid)
                | (LoanStatus::Disbursed, LoanStatus::Defaulted)
        );
        if !allowed {
            return Err(EngineError::InvalidStateTransition {
                current: format!("{:?}", self.status),
                operation,
            });
        }
        self.status = to;
        Ok(())
    }

    /// guard for operations that only apply to a pending loan
    pub fn require_pending(&self, operation: &'static str) -> Result<()> {
        if self.status != LoanStatus::Pending {
            return Err(EngineError::InvalidStateTransition {
                current: format!("{:?}", self.status),
                operation,
            });
        }
        Ok(())
    }

    /// guard for operations that only apply to a disbursed loan
    pub fn require_disbursed(&self, operation: &'static str) -> Result<()> {
        if self.status != LoanStatus::Disbursed {
            return Err(EngineError::InvalidStateTransition {
                current: format!("{:?}", self.status),
                operation,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::{LoanProduct, ProductInput};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn product() -> LoanProduct {
        let input = ProductInput {
            name: "Asset Finance".to_string(),
            prefix: "AF".to_string(),
            min_amount: Money::from_minor(10_000),
            max_amount: Money::from_minor(1_000_000),
            interest_rate_percent: dec!(18),
            interest_type: InterestType::ReducingBalance,
            max_term: 24,
            term_period: TermPeriod::Months,
            late_penalty_rate_percent: Some(dec!(0.5)),
            application_fee: Fee::Percentage(dec!(1)),
            processing_fee: Fee::Fixed(Money::from_minor(2_500)),
            guarantor_required: true,
        };
        LoanProduct::from_input(Uuid::new_v4(), Uuid::new_v4(), input, Utc::now())
    }

    fn loan() -> Loan {
        Loan::new(
            Uuid::new_v4(),
            "AF00001".to_string(),
            Uuid::new_v4(),
            &product(),
            Money::from_minor(300_000),
            12,
            Utc::now(),
        )
    }

    #[test]
    fn test_new_loan_snapshots_product_terms() {
        let loan = loan();
        assert_eq!(loan.status, LoanStatus::Pending);
        assert_eq!(loan.interest_rate, Rate::from_percent(dec!(18)));
        assert_eq!(loan.interest_type, InterestType::ReducingBalance);
        assert!(loan.guarantor_required);
        // 1% of 300_000
        assert_eq!(loan.application_fee_due, Money::from_minor(3_000));
        assert_eq!(loan.processing_fee_due, Money::ZERO);
        assert_eq!(loan.outstanding_balance(), Money::ZERO);
    }

    #[test]
    fn test_transition_table() {
        let mut loan = loan();
        assert!(loan.transition(LoanStatus::Repaid, "settle").is_err());
        assert!(loan.transition(LoanStatus::Disbursed, "approve loan").is_ok());
        assert!(loan.transition(LoanStatus::Declined, "decline loan").is_err());
        assert!(loan.transition(LoanStatus::Repaid, "settle").is_ok());
        assert!(loan.transition(LoanStatus::Defaulted, "default").is_err());
    }

    #[test]
    fn test_transition_error_carries_current_state() {
        let mut loan = loan();
        loan.transition(LoanStatus::Declined, "decline loan").unwrap();
        let err = loan
            .transition(LoanStatus::Disbursed, "approve loan")
            .unwrap_err();
        match err {
            EngineError::InvalidStateTransition { current, operation } => {
                assert_eq!(current, "Declined");
                assert_eq!(operation, "approve loan");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_outstanding_never_negative() {
        let mut loan = loan();
        loan.total_payable = Money::from_minor(100_000);
        loan.amount_paid = Money::from_minor(100_000);
        assert_eq!(loan.outstanding_balance(), Money::ZERO);

        loan.accrued_penalty = Money::from_minor(750);
        assert_eq!(loan.amount_due(), Money::from_minor(750));
    }
}
