use chrono::{DateTime, Duration, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{EngineError, Result};
use crate::types::{InstallmentStatus, InterestType, LoanId, TermPeriod};

/// one installment of a repayment schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub loan_id: LoanId,
    /// 1..=N, unique per loan, ordered by due_date
    pub installment_no: u32,
    pub due_date: DateTime<Utc>,
    pub principal_due: Money,
    pub interest_due: Money,
    pub amount_paid: Money,
    pub status: InstallmentStatus,
}

impl ScheduleEntry {
    pub fn total_due(&self) -> Money {
        self.principal_due + self.interest_due
    }

    pub fn outstanding(&self) -> Money {
        (self.total_due() - self.amount_paid).max(Money::ZERO)
    }

    /// interest portion already covered; payments fill interest first
    pub fn interest_paid(&self) -> Money {
        self.amount_paid.min(self.interest_due)
    }

    pub fn principal_paid(&self) -> Money {
        self.amount_paid - self.interest_paid()
    }
}

/// compute a full repayment schedule; pure and deterministic
pub fn compute_schedule(
    loan_id: LoanId,
    principal: Money,
    rate: Rate,
    term: u32,
    term_period: TermPeriod,
    interest_type: InterestType,
    disbursed_at: DateTime<Utc>,
) -> Result<Vec<ScheduleEntry>> {
    if term == 0 {
        return Err(EngineError::Validation {
            field: "term",
            message: "term must be at least 1".to_string(),
        });
    }
    if !principal.is_positive() {
        return Err(EngineError::Validation {
            field: "principal",
            message: "principal must be positive".to_string(),
        });
    }

    match interest_type {
        InterestType::Flat => flat_schedule(loan_id, principal, rate, term, term_period, disbursed_at),
        InterestType::ReducingBalance => {
            reducing_schedule(loan_id, principal, rate, term, term_period, disbursed_at)
        }
    }
}

/// flat: interest once on the original principal, both components split
/// evenly with the rounding remainder folded into the final installment
fn flat_schedule(
    loan_id: LoanId,
    principal: Money,
    rate: Rate,
    term: u32,
    term_period: TermPeriod,
    disbursed_at: DateTime<Utc>,
) -> Result<Vec<ScheduleEntry>> {
    let n = i64::from(term);
    let term_years = Decimal::from(term) / Decimal::from(term_period.periods_per_year());
    let total_interest =
        Money::from_decimal_round(principal.as_decimal() * rate.as_fraction() * term_years);

    let principal_each = principal.minor() / n;
    let interest_each = total_interest.minor() / n;

    let mut entries = Vec::with_capacity(term as usize);
    for i in 1..=term {
        let last = i == term;
        let principal_due = if last {
            principal.minor() - principal_each * (n - 1)
        } else {
            principal_each
        };
        let interest_due = if last {
            total_interest.minor() - interest_each * (n - 1)
        } else {
            interest_each
        };

        entries.push(ScheduleEntry {
            loan_id,
            installment_no: i,
            due_date: due_date_after(disbursed_at, term_period, i)?,
            principal_due: Money::from_minor(principal_due),
            interest_due: Money::from_minor(interest_due),
            amount_paid: Money::ZERO,
            status: InstallmentStatus::Pending,
        });
    }
    Ok(entries)
}

/// reducing balance: fixed annuity installment, interest on the remaining
/// balance each period, final principal set to the exact remainder
fn reducing_schedule(
    loan_id: LoanId,
    principal: Money,
    rate: Rate,
    term: u32,
    term_period: TermPeriod,
    disbursed_at: DateTime<Utc>,
) -> Result<Vec<ScheduleEntry>> {
    let r = rate.periodic(term_period.periods_per_year());
    if r.is_zero() {
        // degenerates to an even principal split with no interest
        return flat_schedule(loan_id, principal, Rate::ZERO, term, term_period, disbursed_at);
    }

    // A = P * r(1+r)^N / ((1+r)^N - 1)
    let mut factor = Decimal::ONE;
    let base = Decimal::ONE + r;
    for _ in 0..term {
        factor *= base;
    }
    let installment = Money::from_decimal_round(
        principal.as_decimal() * r * factor / (factor - Decimal::ONE),
    );

    let mut entries = Vec::with_capacity(term as usize);
    let mut balance = principal;
    for i in 1..=term {
        let interest_due = Money::from_decimal_round(balance.as_decimal() * r);
        let principal_due = if i == term {
            balance
        } else {
            (installment - interest_due).max(Money::ZERO).min(balance)
        };
        balance -= principal_due;

        entries.push(ScheduleEntry {
            loan_id,
            installment_no: i,
            due_date: due_date_after(disbursed_at, term_period, i)?,
            principal_due,
            interest_due,
            amount_paid: Money::ZERO,
            status: InstallmentStatus::Pending,
        });
    }
    Ok(entries)
}

/// due date n periods after disbursement; calendar-aware for months/years
fn due_date_after(start: DateTime<Utc>, period: TermPeriod, n: u32) -> Result<DateTime<Utc>> {
    let date = match period {
        TermPeriod::Days => Some(start + Duration::days(i64::from(n))),
        TermPeriod::Weeks => Some(start + Duration::weeks(i64::from(n))),
        TermPeriod::Months => start.checked_add_months(Months::new(n)),
        TermPeriod::Years => start.checked_add_months(Months::new(n * 12)),
    };
    date.ok_or_else(|| EngineError::Validation {
        field: "term",
        message: format!("due date overflows the calendar {} periods out", n),
    })
}

/// penalty on overdue principal, exposed for the external recalculation pass
pub fn late_penalty(overdue_principal: Money, late_penalty_rate: Rate, days_late: u32) -> Money {
    Money::from_decimal_round(
        overdue_principal.as_decimal() * late_penalty_rate.as_fraction() * Decimal::from(days_late),
    )
}


#[cfg(test)]
mod proptests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    proptest! {
        #[test]
        fn schedule_principal_sum_is_exact(
            principal in 1i64..2_000_000_000i64,
            rate_millipercent in 0u32..99_999u32,
            term in 1u32..=120u32,
            reducing in proptest::bool::ANY,
        ) {
            let rate = Rate::from_percent(Decimal::new(i64::from(rate_millipercent), 3));
            let interest_type = if reducing {
                InterestType::ReducingBalance
            } else {
                InterestType::Flat
            };
            let entries = compute_schedule(
                Uuid::new_v4(),
                Money::from_minor(principal),
                rate,
                term,
                TermPeriod::Months,
                interest_type,
                Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap(),
            ).unwrap();

            let total: i64 = entries.iter().map(|e| e.principal_due.minor()).sum();
            prop_assert_eq!(total, principal);
            prop_assert_eq!(entries.len() as u32, term);
        }

        #[test]
        fn flat_interest_sum_is_exact(
            principal in 1i64..2_000_000_000i64,
            rate_millipercent in 0u32..99_999u32,
            term in 1u32..=120u32,
        ) {
            let rate = Rate::from_percent(Decimal::new(i64::from(rate_millipercent), 3));
            let entries = compute_schedule(
                Uuid::new_v4(),
                Money::from_minor(principal),
                rate,
                term,
                TermPeriod::Months,
                InterestType::Flat,
                Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap(),
            ).unwrap();

            let term_years = Decimal::from(term) / Decimal::from(12u32);
            let expected = Money::from_decimal_round(
                Money::from_minor(principal).as_decimal() * rate.as_fraction() * term_years,
            );
            let total: i64 = entries.iter().map(|e| e.interest_due.minor()).sum();
            prop_assert_eq!(total, expected.minor());
        }
    }
}
