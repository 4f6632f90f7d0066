use std::collections::HashMap;

use chrono::{DateTime, Utc};
use hourglass_rs::SafeTimeProvider;
use tracing::{debug, info};
use uuid::Uuid;

use crate::amortization::{compute_schedule, ScheduleEntry};
use crate::decimal::Money;
use crate::errors::{EngineError, Result};
use crate::events::{DomainEvent, EventStore};
use crate::guarantor::Guarantor;
use crate::ledger::{plan_allocation, entry_status_after, Payment};
use crate::loan::Loan;
use crate::product::{LoanProduct, ProductInput};
use crate::quota::{check_loan_quota, check_product_quota, PlanProvider, TenantUsage};
use crate::types::{
    GuarantorId, GuarantorStatus, InstallmentStatus, LoanId, LoanStatus, MemberId, ProductId,
    TenantId,
};

/// member identity lookup; seam to the external member directory
pub trait MemberDirectory {
    fn member_exists(&self, tenant_id: TenantId, member_id: MemberId) -> bool;
}

/// request to open a loan against a product
#[derive(Debug, Clone)]
pub struct CreateLoanRequest {
    pub tenant_id: TenantId,
    pub member_id: MemberId,
    pub product_id: ProductId,
    pub principal: Money,
    pub term: u32,
}

/// the loan origination and repayment engine; owns all persisted state
///
/// Every mutating operation validates fully against current state before
/// the first write, so a failure leaves nothing behind. Mutations go
/// through `&mut self`, which serializes them; `approve` re-checks the
/// loan status at call time so the loser of a concurrent double-approve
/// fails instead of regenerating a schedule.
#[derive(Debug, Default)]
pub struct LoanEngine {
    pub(crate) products: HashMap<ProductId, LoanProduct>,
    pub(crate) loans: HashMap<LoanId, Loan>,
    pub(crate) guarantors: HashMap<GuarantorId, Guarantor>,
    pub(crate) schedules: HashMap<LoanId, Vec<ScheduleEntry>>,
    pub(crate) payments: HashMap<LoanId, Vec<Payment>>,
    pub(crate) sequences: HashMap<ProductId, u32>,
    pub(crate) events: EventStore,
}

impl LoanEngine {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- loan product catalog ----

    pub fn create_product(
        &mut self,
        tenant_id: TenantId,
        input: ProductInput,
        plans: &dyn PlanProvider,
        time: &SafeTimeProvider,
    ) -> Result<ProductId> {
        input.validate()?;
        self.check_prefix_free(tenant_id, &input.prefix, None)?;
        check_product_quota(&self.product_usage(tenant_id), &plans.limits(tenant_id))?;

        let product_id = Uuid::new_v4();
        let product = LoanProduct::from_input(product_id, tenant_id, input, time.now());
        info!(product = %product_id, prefix = %product.prefix, "loan product created");
        self.products.insert(product_id, product);
        Ok(product_id)
    }

    pub fn update_product(
        &mut self,
        product_id: ProductId,
        input: ProductInput,
        time: &SafeTimeProvider,
    ) -> Result<()> {
        input.validate()?;
        let tenant_id = self
            .products
            .get(&product_id)
            .ok_or(EngineError::NotFound {
                entity: "product",
                id: product_id,
            })?
            .tenant_id;
        self.check_prefix_free(tenant_id, &input.prefix, Some(product_id))?;

        let now = time.now();
        if let Some(product) = self.products.get_mut(&product_id) {
            product.apply_input(input, now);
        }
        Ok(())
    }

    /// flip is_active; existing loans are unaffected
    pub fn toggle_active(&mut self, product_id: ProductId, time: &SafeTimeProvider) -> Result<bool> {
        let now = time.now();
        let product = self
            .products
            .get_mut(&product_id)
            .ok_or(EngineError::NotFound {
                entity: "product",
                id: product_id,
            })?;
        product.is_active = !product.is_active;
        product.updated_at = now;
        Ok(product.is_active)
    }

    /// deletion is blocked while any loan references the product
    pub fn delete_product(&mut self, product_id: ProductId) -> Result<()> {
        if !self.products.contains_key(&product_id) {
            return Err(EngineError::NotFound {
                entity: "product",
                id: product_id,
            });
        }
        if self.loans.values().any(|l| l.product_id == product_id) {
            return Err(EngineError::Validation {
                field: "product_id",
                message: "product is referenced by existing loans".to_string(),
            });
        }
        self.products.remove(&product_id);
        self.sequences.remove(&product_id);
        Ok(())
    }

    // ---- loan application & underwriting ----

    pub fn create_loan(
        &mut self,
        request: CreateLoanRequest,
        plans: &dyn PlanProvider,
        directory: &dyn MemberDirectory,
        time: &SafeTimeProvider,
    ) -> Result<LoanId> {
        let product = self
            .products
            .get(&request.product_id)
            .filter(|p| p.tenant_id == request.tenant_id)
            .ok_or(EngineError::NotFound {
                entity: "product",
                id: request.product_id,
            })?
            .clone();

        if !product.is_active {
            return Err(EngineError::Validation {
                field: "product_id",
                message: "product is not active".to_string(),
            });
        }
        if !directory.member_exists(request.tenant_id, request.member_id) {
            return Err(EngineError::NotFound {
                entity: "member",
                id: request.member_id,
            });
        }
        if !product.principal_in_bounds(request.principal) {
            return Err(EngineError::Validation {
                field: "principal",
                message: format!(
                    "principal {} outside product bounds {}..{}",
                    request.principal, product.min_amount, product.max_amount
                ),
            });
        }
        if request.term == 0 || request.term > product.max_term {
            return Err(EngineError::Validation {
                field: "term",
                message: format!(
                    "term {} outside product limit of {} {:?}",
                    request.term, product.max_term, product.term_period
                ),
            });
        }

        // quota re-check against current state, inside the same operation
        check_loan_quota(
            &self.loan_usage(request.tenant_id),
            &plans.limits(request.tenant_id),
        )?;

        let sequence = self.sequences.entry(product.id).or_insert(0);
        *sequence += 1;
        let loan_code = format!("{}{:05}", product.prefix, sequence);

        let now = time.now();
        let loan_id = Uuid::new_v4();
        let loan = Loan::new(
            loan_id,
            loan_code.clone(),
            request.member_id,
            &product,
            request.principal,
            request.term,
            now,
        );

        info!(loan = %loan_id, code = %loan_code, "loan created");
        self.events.emit(DomainEvent::LoanCreated {
            loan_id,
            tenant_id: request.tenant_id,
            member_id: request.member_id,
            loan_code,
            principal: request.principal,
            timestamp: now,
        });
        self.loans.insert(loan_id, loan);
        Ok(loan_id)
    }

    /// approve and disburse in one atomic operation: re-validates the
    /// guarantor condition, runs the amortization engine once, persists
    /// the schedule, and transitions pending -> disbursed
    pub fn approve(&mut self, loan_id: LoanId, time: &SafeTimeProvider) -> Result<()> {
        let loan = self.loans.get(&loan_id).ok_or(EngineError::NotFound {
            entity: "loan",
            id: loan_id,
        })?;
        loan.require_pending("approve loan")?;

        // re-read committed guarantor rows at decision time
        let mut any_accepted = false;
        for guarantor in self.guarantors.values().filter(|g| g.loan_id == loan_id) {
            match guarantor.status {
                GuarantorStatus::Pending => {
                    return Err(EngineError::InvalidStateTransition {
                        current: format!("{:?}", loan.status),
                        operation: "approve loan with undecided guarantors",
                    });
                }
                GuarantorStatus::Accepted => any_accepted = true,
                GuarantorStatus::Rejected => {}
            }
        }
        if loan.guarantor_required && !any_accepted {
            return Err(EngineError::InvalidStateTransition {
                current: format!("{:?}", loan.status),
                operation: "approve loan without an accepted guarantor",
            });
        }

        let now = time.now();
        let schedule = compute_schedule(
            loan_id,
            loan.principal,
            loan.interest_rate,
            loan.term,
            loan.term_period,
            loan.interest_type,
            now,
        )?;
        let interest_amount = schedule
            .iter()
            .map(|e| e.interest_due)
            .fold(Money::ZERO, |acc, x| acc + x);

        let loan = self
            .loans
            .get_mut(&loan_id)
            .ok_or(EngineError::NotFound {
                entity: "loan",
                id: loan_id,
            })?;
        loan.transition(LoanStatus::Disbursed, "approve loan")?;
        loan.interest_amount = interest_amount;
        loan.total_payable = loan.principal + interest_amount;
        loan.processing_fee_due = loan.processing_fee.amount(loan.principal);
        loan.approved_at = Some(now);
        loan.disbursed_at = Some(now);

        let principal = loan.principal;
        let total_payable = loan.total_payable;
        let fees_due = loan.application_fee_due + loan.processing_fee_due;
        self.schedules.insert(loan_id, schedule);

        info!(loan = %loan_id, %total_payable, "loan approved and disbursed");
        self.events.emit(DomainEvent::LoanApproved {
            loan_id,
            interest_amount,
            total_payable,
            timestamp: now,
        });
        self.events.emit(DomainEvent::LoanDisbursed {
            loan_id,
            principal,
            fees_due,
            timestamp: now,
        });
        Ok(())
    }

    pub fn decline(&mut self, loan_id: LoanId, time: &SafeTimeProvider) -> Result<()> {
        let loan = self.loans.get_mut(&loan_id).ok_or(EngineError::NotFound {
            entity: "loan",
            id: loan_id,
        })?;
        loan.transition(LoanStatus::Declined, "decline loan")?;
        info!(loan = %loan_id, "loan declined");
        self.events.emit(DomainEvent::LoanDeclined {
            loan_id,
            timestamp: time.now(),
        });
        Ok(())
    }

    /// external default signal for a disbursed loan left unpaid past the
    /// grace window; detection cadence lives outside the engine
    pub fn mark_defaulted(&mut self, loan_id: LoanId, time: &SafeTimeProvider) -> Result<()> {
        let loan = self.loans.get_mut(&loan_id).ok_or(EngineError::NotFound {
            entity: "loan",
            id: loan_id,
        })?;
        loan.transition(LoanStatus::Defaulted, "mark loan defaulted")?;
        let outstanding = loan.outstanding_balance();
        info!(loan = %loan_id, %outstanding, "loan defaulted");
        self.events.emit(DomainEvent::LoanDefaulted {
            loan_id,
            outstanding,
            timestamp: time.now(),
        });
        Ok(())
    }

    /// store an opaque reference into the external document store
    pub fn attach_document(&mut self, loan_id: LoanId, reference: String) -> Result<()> {
        let loan = self.loans.get_mut(&loan_id).ok_or(EngineError::NotFound {
            entity: "loan",
            id: loan_id,
        })?;
        loan.document_refs.push(reference);
        Ok(())
    }

    // ---- guarantor workflow ----

    pub fn add_guarantor(
        &mut self,
        loan_id: LoanId,
        member_id: MemberId,
        directory: &dyn MemberDirectory,
        time: &SafeTimeProvider,
    ) -> Result<GuarantorId> {
        let loan = self.loans.get(&loan_id).ok_or(EngineError::NotFound {
            entity: "loan",
            id: loan_id,
        })?;
        loan.require_pending("add guarantor")?;

        if !directory.member_exists(loan.tenant_id, member_id) {
            return Err(EngineError::NotFound {
                entity: "member",
                id: member_id,
            });
        }
        if member_id == loan.member_id {
            return Err(EngineError::GuarantorConflict {
                loan_id,
                message: "a member cannot guarantee their own loan".to_string(),
            });
        }
        if self
            .guarantors
            .values()
            .any(|g| g.loan_id == loan_id && g.member_id == member_id)
        {
            return Err(EngineError::GuarantorConflict {
                loan_id,
                message: format!("member {} is already invited on this loan", member_id),
            });
        }

        let now = time.now();
        let guarantor_id = Uuid::new_v4();
        self.guarantors
            .insert(guarantor_id, Guarantor::new(guarantor_id, loan_id, member_id, now));
        self.events.emit(DomainEvent::GuarantorInvited {
            loan_id,
            guarantor_id,
            member_id,
            timestamp: now,
        });
        Ok(guarantor_id)
    }

    /// delete a pending or rejected invitation; the re-invite path.
    /// accepted rows are immutable
    pub fn remove_guarantor(&mut self, guarantor_id: GuarantorId) -> Result<()> {
        let guarantor = self
            .guarantors
            .get(&guarantor_id)
            .ok_or(EngineError::NotFound {
                entity: "guarantor",
                id: guarantor_id,
            })?;
        let loan = self
            .loans
            .get(&guarantor.loan_id)
            .ok_or(EngineError::NotFound {
                entity: "loan",
                id: guarantor.loan_id,
            })?;
        loan.require_pending("remove guarantor")?;
        if guarantor.status == GuarantorStatus::Accepted {
            return Err(EngineError::InvalidStateTransition {
                current: format!("{:?}", guarantor.status),
                operation: "remove guarantor",
            });
        }
        self.guarantors.remove(&guarantor_id);
        Ok(())
    }

    pub fn accept_guarantor(
        &mut self,
        guarantor_id: GuarantorId,
        time: &SafeTimeProvider,
    ) -> Result<()> {
        self.decide_guarantor(guarantor_id, true, time)
    }

    pub fn reject_guarantor(
        &mut self,
        guarantor_id: GuarantorId,
        time: &SafeTimeProvider,
    ) -> Result<()> {
        self.decide_guarantor(guarantor_id, false, time)
    }

    fn decide_guarantor(
        &mut self,
        guarantor_id: GuarantorId,
        accepted: bool,
        time: &SafeTimeProvider,
    ) -> Result<()> {
        let loan_id = self
            .guarantors
            .get(&guarantor_id)
            .ok_or(EngineError::NotFound {
                entity: "guarantor",
                id: guarantor_id,
            })?
            .loan_id;
        let loan = self.loans.get(&loan_id).ok_or(EngineError::NotFound {
            entity: "loan",
            id: loan_id,
        })?;
        loan.require_pending("decide guarantor invitation")?;

        let now = time.now();
        if let Some(guarantor) = self.guarantors.get_mut(&guarantor_id) {
            guarantor.decide(accepted, now)?;
        }
        let event = if accepted {
            DomainEvent::GuarantorAccepted {
                loan_id,
                guarantor_id,
                timestamp: now,
            }
        } else {
            DomainEvent::GuarantorRejected {
                loan_id,
                guarantor_id,
                timestamp: now,
            }
        };
        self.events.emit(event);
        Ok(())
    }

    // ---- repayment ledger ----

    /// apply a confirmed payment: penalty first, then entries oldest-due-first
    /// (interest before principal within each entry), all-or-nothing
    pub fn apply_payment(
        &mut self,
        loan_id: LoanId,
        amount: Money,
        applied_at: DateTime<Utc>,
    ) -> Result<Payment> {
        let loan = self.loans.get(&loan_id).ok_or(EngineError::NotFound {
            entity: "loan",
            id: loan_id,
        })?;
        loan.require_disbursed("apply payment")?;

        if !amount.is_positive() {
            return Err(EngineError::Validation {
                field: "amount",
                message: "payment amount must be positive".to_string(),
            });
        }
        if amount > loan.amount_due() {
            return Err(EngineError::Validation {
                field: "amount",
                message: format!(
                    "payment {} exceeds amount due {} (outstanding {} plus penalty {})",
                    amount,
                    loan.amount_due(),
                    loan.outstanding_balance(),
                    loan.accrued_penalty
                ),
            });
        }

        let entries = self.schedules.get_mut(&loan_id).ok_or(EngineError::NotFound {
            entity: "schedule",
            id: loan_id,
        })?;
        let plan = plan_allocation(amount, loan.accrued_penalty, entries);

        // commit
        for application in &plan.entry_applications {
            let entry = &mut entries[application.index];
            entry.amount_paid += application.amount;
            entry.status = entry_status_after(entry, entry.amount_paid);
        }
        let loan = self.loans.get_mut(&loan_id).ok_or(EngineError::NotFound {
            entity: "loan",
            id: loan_id,
        })?;
        loan.accrued_penalty -= plan.allocation.to_penalty;
        loan.amount_paid += plan.allocation.to_ledger();

        let outstanding_after = loan.outstanding_balance();
        debug!(
            loan = %loan_id,
            %amount,
            to_penalty = %plan.allocation.to_penalty,
            to_interest = %plan.allocation.to_interest,
            to_principal = %plan.allocation.to_principal,
            %outstanding_after,
            "payment allocated"
        );

        if outstanding_after.is_zero() {
            loan.transition(LoanStatus::Repaid, "settle loan")?;
            info!(loan = %loan_id, "loan fully repaid");
            self.events.emit(DomainEvent::LoanRepaid {
                loan_id,
                timestamp: applied_at,
            });
        }

        let payment = Payment {
            id: Uuid::new_v4(),
            loan_id,
            amount,
            applied_at,
            allocation: plan.allocation,
        };
        self.events.emit(DomainEvent::PaymentApplied {
            loan_id,
            payment_id: payment.id,
            amount,
            allocation: plan.allocation,
            outstanding_after,
            timestamp: applied_at,
        });
        self.payments.entry(loan_id).or_default().push(payment.clone());
        Ok(payment)
    }

    /// flag unpaid entries past their due date; called by the external
    /// overdue-detection pass, returns how many entries were flagged
    pub fn mark_overdue(&mut self, loan_id: LoanId, as_of: DateTime<Utc>) -> Result<u32> {
        let loan = self.loans.get(&loan_id).ok_or(EngineError::NotFound {
            entity: "loan",
            id: loan_id,
        })?;
        if loan.status != LoanStatus::Disbursed {
            return Ok(0);
        }

        let mut flagged = 0;
        if let Some(entries) = self.schedules.get_mut(&loan_id) {
            for entry in entries.iter_mut() {
                let unpaid = matches!(
                    entry.status,
                    InstallmentStatus::Pending | InstallmentStatus::Partial
                );
                if unpaid && entry.due_date < as_of {
                    entry.status = InstallmentStatus::Overdue;
                    flagged += 1;
                }
            }
        }
        Ok(flagged)
    }

    /// post a penalty computed by the external pass (see
    /// `amortization::late_penalty`) into the loan's penalty bucket
    pub fn post_penalty(&mut self, loan_id: LoanId, amount: Money) -> Result<()> {
        let loan = self.loans.get_mut(&loan_id).ok_or(EngineError::NotFound {
            entity: "loan",
            id: loan_id,
        })?;
        loan.require_disbursed("post penalty")?;
        if !amount.is_positive() {
            return Err(EngineError::Validation {
                field: "amount",
                message: "penalty amount must be positive".to_string(),
            });
        }
        loan.accrued_penalty += amount;
        debug!(loan = %loan_id, %amount, "penalty posted");
        Ok(())
    }

    // ---- reads ----

    pub fn product(&self, product_id: ProductId) -> Result<&LoanProduct> {
        self.products.get(&product_id).ok_or(EngineError::NotFound {
            entity: "product",
            id: product_id,
        })
    }

    pub fn loan(&self, loan_id: LoanId) -> Result<&Loan> {
        self.loans.get(&loan_id).ok_or(EngineError::NotFound {
            entity: "loan",
            id: loan_id,
        })
    }

    /// ordered repayment schedule for a disbursed loan
    pub fn get_schedule(&self, loan_id: LoanId) -> Result<&[ScheduleEntry]> {
        self.schedules
            .get(&loan_id)
            .map(Vec::as_slice)
            .ok_or(EngineError::NotFound {
                entity: "schedule",
                id: loan_id,
            })
    }

    pub fn payments(&self, loan_id: LoanId) -> &[Payment] {
        self.payments.get(&loan_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn guarantors_for(&self, loan_id: LoanId) -> Vec<&Guarantor> {
        let mut rows: Vec<&Guarantor> = self
            .guarantors
            .values()
            .filter(|g| g.loan_id == loan_id)
            .collect();
        rows.sort_by_key(|g| g.invited_at);
        rows
    }

    /// drain collected domain events for external dispatch
    pub fn take_events(&mut self) -> Vec<DomainEvent> {
        self.events.take_events()
    }

    // ---- quota usage, measured against current state ----

    fn product_usage(&self, tenant_id: TenantId) -> TenantUsage {
        TenantUsage {
            active_product_count: self
                .products
                .values()
                .filter(|p| p.tenant_id == tenant_id && p.is_active)
                .count() as i64,
            ..Default::default()
        }
    }

    fn loan_usage(&self, tenant_id: TenantId) -> TenantUsage {
        let tenant_loans = self.loans.values().filter(|l| l.tenant_id == tenant_id);
        let mut active_loan_count = 0;
        let mut outstanding_total = Money::ZERO;
        for loan in tenant_loans {
            if loan.status.is_active() {
                active_loan_count += 1;
            }
            outstanding_total += loan.outstanding_balance();
        }
        TenantUsage {
            active_product_count: 0,
            active_loan_count,
            outstanding_total,
        }
    }

    fn check_prefix_free(
        &self,
        tenant_id: TenantId,
        prefix: &str,
        exclude: Option<ProductId>,
    ) -> Result<()> {
        let taken = self.products.values().any(|p| {
            p.tenant_id == tenant_id && p.prefix == prefix && Some(p.id) != exclude
        });
        if taken {
            return Err(EngineError::Validation {
                field: "prefix",
                message: format!("prefix {} is already in use", prefix),
            });
        }
        Ok(())
    }
}
