use serde::{Deserialize, Serialize};

use crate::amortization::ScheduleEntry;
use crate::engine::LoanEngine;
use crate::guarantor::Guarantor;
use crate::ledger::Payment;
use crate::loan::Loan;
use crate::product::LoanProduct;
use crate::types::ProductId;

/// serializable view of the engine's authoritative state
///
/// Callers persist or ship this as JSON and rebuild the engine from it;
/// in-flight domain events are not part of the snapshot.
#[derive(Debug, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub products: Vec<LoanProduct>,
    pub loans: Vec<Loan>,
    pub guarantors: Vec<Guarantor>,
    pub schedules: Vec<ScheduleEntry>,
    pub payments: Vec<Payment>,
    pub sequences: Vec<(ProductId, u32)>,
}

impl EngineSnapshot {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl LoanEngine {
    /// capture the full persisted state, ordered for stable output
    pub fn snapshot(&self) -> EngineSnapshot {
        let mut products: Vec<LoanProduct> = self.products.values().cloned().collect();
        products.sort_by_key(|p| (p.created_at, p.id));

        let mut loans: Vec<Loan> = self.loans.values().cloned().collect();
        loans.sort_by_key(|l| (l.created_at, l.id));

        let mut guarantors: Vec<Guarantor> = self.guarantors.values().cloned().collect();
        guarantors.sort_by_key(|g| (g.invited_at, g.id));

        let mut schedules: Vec<ScheduleEntry> = self
            .schedules
            .values()
            .flat_map(|entries| entries.iter().cloned())
            .collect();
        schedules.sort_by_key(|e| (e.loan_id, e.installment_no));

        let mut payments: Vec<Payment> = self
            .payments
            .values()
            .flat_map(|rows| rows.iter().cloned())
            .collect();
        payments.sort_by_key(|p| (p.applied_at, p.id));

        let mut sequences: Vec<(ProductId, u32)> =
            self.sequences.iter().map(|(k, v)| (*k, *v)).collect();
        sequences.sort();

        EngineSnapshot {
            products,
            loans,
            guarantors,
            schedules,
            payments,
            sequences,
        }
    }

    /// rebuild an engine from a snapshot
    pub fn from_snapshot(snapshot: EngineSnapshot) -> Self {
        let mut engine = LoanEngine::new();
        for product in snapshot.products {
            engine.products.insert(product.id, product);
        }
        for loan in snapshot.loans {
            engine.loans.insert(loan.id, loan);
        }
        for guarantor in snapshot.guarantors {
            engine.guarantors.insert(guarantor.id, guarantor);
        }
        for entry in snapshot.schedules {
            engine.schedules.entry(entry.loan_id).or_default().push(entry);
        }
        for entries in engine.schedules.values_mut() {
            entries.sort_by_key(|e| e.installment_no);
        }
        for payment in snapshot.payments {
            engine.payments.entry(payment.loan_id).or_default().push(payment);
        }
        for (product_id, sequence) in snapshot.sequences {
            engine.sequences.insert(product_id, sequence);
        }
        engine
    }
}
