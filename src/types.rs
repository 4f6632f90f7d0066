use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;

/// tenant (cooperative society) identifier
pub type TenantId = Uuid;
/// member identifier, owned by the external member directory
pub type MemberId = Uuid;
pub type ProductId = Uuid;
pub type LoanId = Uuid;
pub type GuarantorId = Uuid;
pub type PaymentId = Uuid;

/// interest computation method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestType {
    /// interest computed once on the original principal, spread evenly
    Flat,
    /// interest recomputed each period on the remaining balance
    ReducingBalance,
}

/// unit in which a loan term is expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermPeriod {
    Days,
    Weeks,
    Months,
    Years,
}

impl TermPeriod {
    /// payment periods in one year, used for periodic rates and term-years
    pub fn periods_per_year(&self) -> u32 {
        match self {
            TermPeriod::Days => 365,
            TermPeriod::Weeks => 52,
            TermPeriod::Months => 12,
            TermPeriod::Years => 1,
        }
    }
}

/// how a product fee is charged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fee {
    /// fixed minor-unit amount
    Fixed(Money),
    /// percentage of the loan principal
    Percentage(Decimal),
}

impl Fee {
    /// fee due for the given principal, rounded to a minor unit
    pub fn amount(&self, principal: Money) -> Money {
        match self {
            Fee::Fixed(amount) => *amount,
            Fee::Percentage(percent) => principal.percentage(*percent),
        }
    }
}

/// loan lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    /// created, collecting guarantors, awaiting a decision
    Pending,
    /// declined by an administrator
    Declined,
    /// approved, schedule generated, funds released
    Disbursed,
    /// fully paid off
    Repaid,
    /// unpaid past the external grace window
    Defaulted,
}

impl LoanStatus {
    /// counts toward the tenant's active-loan quota
    pub fn is_active(&self) -> bool {
        matches!(self, LoanStatus::Pending | LoanStatus::Disbursed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoanStatus::Declined | LoanStatus::Repaid | LoanStatus::Defaulted
        )
    }
}

/// guarantor invitation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuarantorStatus {
    Pending,
    Accepted,
    Rejected,
}

impl GuarantorStatus {
    /// decided invitations are immutable
    pub fn is_decided(&self) -> bool {
        matches!(self, GuarantorStatus::Accepted | GuarantorStatus::Rejected)
    }
}

/// repayment schedule entry status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentStatus {
    Pending,
    Partial,
    Paid,
    Overdue,
}

/// breakdown of how one payment was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PaymentAllocation {
    pub to_penalty: Money,
    pub to_interest: Money,
    pub to_principal: Money,
}

impl PaymentAllocation {
    pub fn total_applied(&self) -> Money {
        self.to_penalty + self.to_interest + self.to_principal
    }

    /// portion that counts against the loan's total_payable
    pub fn to_ledger(&self) -> Money {
        self.to_interest + self.to_principal
    }
}
