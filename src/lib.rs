pub mod amortization;
pub mod decimal;
pub mod engine;
pub mod errors;
pub mod events;
pub mod guarantor;
pub mod ledger;
pub mod loan;
pub mod product;
pub mod quota;
pub mod snapshot;
pub mod types;

// re-export key types
pub use amortization::{compute_schedule, late_penalty, ScheduleEntry};
pub use decimal::{Money, Rate};
pub use engine::{CreateLoanRequest, LoanEngine, MemberDirectory};
pub use errors::{EngineError, Result};
pub use events::{DomainEvent, EventStore};
pub use guarantor::Guarantor;
pub use ledger::{plan_allocation, AllocationPlan, Payment};
pub use loan::Loan;
pub use product::{LoanProduct, ProductInput};
pub use quota::{PlanLimits, PlanProvider, TenantUsage};
pub use snapshot::EngineSnapshot;
pub use types::{
    Fee, GuarantorId, GuarantorStatus, InstallmentStatus, InterestType, LoanId, LoanStatus,
    MemberId, PaymentAllocation, PaymentId, ProductId, TenantId, TermPeriod,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
