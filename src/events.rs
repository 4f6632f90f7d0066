use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{GuarantorId, LoanId, MemberId, PaymentAllocation, PaymentId, TenantId};

/// domain events emitted for the external notification service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DomainEvent {
    LoanCreated {
        loan_id: LoanId,
        tenant_id: TenantId,
        member_id: MemberId,
        loan_code: String,
        principal: Money,
        timestamp: DateTime<Utc>,
    },
    GuarantorInvited {
        loan_id: LoanId,
        guarantor_id: GuarantorId,
        member_id: MemberId,
        timestamp: DateTime<Utc>,
    },
    GuarantorAccepted {
        loan_id: LoanId,
        guarantor_id: GuarantorId,
        timestamp: DateTime<Utc>,
    },
    GuarantorRejected {
        loan_id: LoanId,
        guarantor_id: GuarantorId,
        timestamp: DateTime<Utc>,
    },
    LoanApproved {
        loan_id: LoanId,
        interest_amount: Money,
        total_payable: Money,
        timestamp: DateTime<Utc>,
    },
    LoanDisbursed {
        loan_id: LoanId,
        principal: Money,
        fees_due: Money,
        timestamp: DateTime<Utc>,
    },
    LoanDeclined {
        loan_id: LoanId,
        timestamp: DateTime<Utc>,
    },
    PaymentApplied {
        loan_id: LoanId,
        payment_id: PaymentId,
        amount: Money,
        allocation: PaymentAllocation,
        outstanding_after: Money,
        timestamp: DateTime<Utc>,
    },
    LoanRepaid {
        loan_id: LoanId,
        timestamp: DateTime<Utc>,
    },
    LoanDefaulted {
        loan_id: LoanId,
        outstanding: Money,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<DomainEvent>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    /// drain collected events for external dispatch
    pub fn take_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[DomainEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
