use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::amortization::ScheduleEntry;
use crate::decimal::Money;
use crate::types::{InstallmentStatus, LoanId, PaymentAllocation, PaymentId};

/// confirmed payment applied against a loan's schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub loan_id: LoanId,
    pub amount: Money,
    pub applied_at: DateTime<Utc>,
    pub allocation: PaymentAllocation,
}

/// application of one payment to one schedule entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryApplication {
    /// index into the loan's ordered schedule
    pub index: usize,
    pub amount: Money,
    pub interest_portion: Money,
    pub principal_portion: Money,
}

/// full plan for applying a payment, computed before anything is mutated
/// so the operation stays all-or-nothing
#[derive(Debug, Clone)]
pub struct AllocationPlan {
    pub allocation: PaymentAllocation,
    pub entry_applications: Vec<EntryApplication>,
}

/// allocate a payment: accrued penalty first, then schedule entries
/// oldest-due-first, interest before principal within each entry
pub fn plan_allocation(
    amount: Money,
    accrued_penalty: Money,
    entries: &[ScheduleEntry],
) -> AllocationPlan {
    let mut remaining = amount;

    let to_penalty = remaining.min(accrued_penalty);
    remaining -= to_penalty;

    let mut to_interest = Money::ZERO;
    let mut to_principal = Money::ZERO;
    let mut entry_applications = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        if remaining.is_zero() {
            break;
        }
        let outstanding = entry.outstanding();
        if outstanding.is_zero() {
            continue;
        }

        let applied = remaining.min(outstanding);
        let interest_unpaid = entry.interest_due - entry.interest_paid();
        let interest_portion = applied.min(interest_unpaid);
        let principal_portion = applied - interest_portion;

        to_interest += interest_portion;
        to_principal += principal_portion;
        entry_applications.push(EntryApplication {
            index,
            amount: applied,
            interest_portion,
            principal_portion,
        });
        remaining -= applied;
    }

    AllocationPlan {
        allocation: PaymentAllocation {
            to_penalty,
            to_interest,
            to_principal,
        },
        entry_applications,
    }
}

/// entry status after a payment lands on it; a late entry that is only
/// partially covered stays overdue
pub fn entry_status_after(entry: &ScheduleEntry, amount_paid: Money) -> InstallmentStatus {
    if amount_paid >= entry.total_due() {
        InstallmentStatus::Paid
    } else if entry.status == InstallmentStatus::Overdue {
        InstallmentStatus::Overdue
    } else if amount_paid.is_positive() {
        InstallmentStatus::Partial
    } else {
        InstallmentStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn entry(no: u32, principal: i64, interest: i64, paid: i64) -> ScheduleEntry {
        ScheduleEntry {
            loan_id: Uuid::nil(),
            installment_no: no,
            due_date: Utc::now(),
            principal_due: Money::from_minor(principal),
            interest_due: Money::from_minor(interest),
            amount_paid: Money::from_minor(paid),
            status: if paid > 0 {
                InstallmentStatus::Partial
            } else {
                InstallmentStatus::Pending
            },
        }
    }

    #[test]
    fn test_penalty_then_interest_then_principal() {
        let entries = vec![entry(1, 10_000, 1_000, 0), entry(2, 10_000, 1_000, 0)];
        let plan = plan_allocation(Money::from_minor(1_500), Money::from_minor(250), &entries);

        // 250 penalty, then entry 1: 1_000 interest + 250 principal
        assert_eq!(plan.allocation.to_penalty, Money::from_minor(250));
        assert_eq!(plan.allocation.to_interest, Money::from_minor(1_000));
        assert_eq!(plan.allocation.to_principal, Money::from_minor(250));
        assert_eq!(plan.entry_applications.len(), 1);
        assert_eq!(plan.entry_applications[0].index, 0);
        assert_eq!(plan.entry_applications[0].amount, Money::from_minor(1_250));
    }

    #[test]
    fn test_allocation_walks_oldest_first() {
        let entries = vec![
            entry(1, 10_000, 1_000, 11_000), // settled
            entry(2, 10_000, 1_000, 400),
            entry(3, 10_000, 1_000, 0),
        ];
        let plan = plan_allocation(Money::from_minor(12_000), Money::ZERO, &entries);

        // entry 2 takes its remaining 10_600, entry 3 takes 1_400
        assert_eq!(plan.entry_applications.len(), 2);
        assert_eq!(plan.entry_applications[0].index, 1);
        assert_eq!(plan.entry_applications[0].amount, Money::from_minor(10_600));
        assert_eq!(plan.entry_applications[1].index, 2);
        assert_eq!(plan.entry_applications[1].amount, Money::from_minor(1_400));

        // entry 2 already covered 400 of its 1_000 interest
        assert_eq!(plan.entry_applications[0].interest_portion, Money::from_minor(600));
        assert_eq!(plan.allocation.to_interest, Money::from_minor(1_600));
        assert_eq!(plan.allocation.to_principal, Money::from_minor(10_400));
    }

    #[test]
    fn test_entry_status_progression() {
        let e = entry(1, 10_000, 1_000, 0);
        assert_eq!(entry_status_after(&e, Money::ZERO), InstallmentStatus::Pending);
        assert_eq!(
            entry_status_after(&e, Money::from_minor(5_000)),
            InstallmentStatus::Partial
        );
        assert_eq!(
            entry_status_after(&e, Money::from_minor(11_000)),
            InstallmentStatus::Paid
        );

        let mut late = entry(1, 10_000, 1_000, 0);
        late.status = InstallmentStatus::Overdue;
        assert_eq!(
            entry_status_after(&late, Money::from_minor(5_000)),
            InstallmentStatus::Overdue
        );
        assert_eq!(
            entry_status_after(&late, Money::from_minor(11_000)),
            InstallmentStatus::Paid
        );
    }
}
