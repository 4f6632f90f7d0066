use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, Result};
use crate::types::{GuarantorId, GuarantorStatus, LoanId, MemberId};

/// guarantor invitation on a pending loan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guarantor {
    pub id: GuarantorId,
    pub loan_id: LoanId,
    pub member_id: MemberId,
    pub status: GuarantorStatus,
    pub invited_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl Guarantor {
    pub fn new(
        id: GuarantorId,
        loan_id: LoanId,
        member_id: MemberId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            loan_id,
            member_id,
            status: GuarantorStatus::Pending,
            invited_at: now,
            decided_at: None,
        }
    }

    /// record the member's decision; terminal, no reversal
    pub fn decide(&mut self, accepted: bool, now: DateTime<Utc>) -> Result<()> {
        if self.status.is_decided() {
            return Err(EngineError::InvalidStateTransition {
                current: format!("{:?}", self.status),
                operation: "decide guarantor invitation",
            });
        }
        self.status = if accepted {
            GuarantorStatus::Accepted
        } else {
            GuarantorStatus::Rejected
        };
        self.decided_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn invitation() -> Guarantor {
        Guarantor::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn test_accept_is_terminal() {
        let mut g = invitation();
        assert!(g.decide(true, Utc::now()).is_ok());
        assert_eq!(g.status, GuarantorStatus::Accepted);
        assert!(g.decided_at.is_some());

        // no reversal, no re-decision
        assert!(g.decide(false, Utc::now()).is_err());
        assert_eq!(g.status, GuarantorStatus::Accepted);
    }

    #[test]
    fn test_reject_is_terminal() {
        let mut g = invitation();
        assert!(g.decide(false, Utc::now()).is_ok());
        assert_eq!(g.status, GuarantorStatus::Rejected);
        assert!(g.decide(true, Utc::now()).is_err());
    }
}
