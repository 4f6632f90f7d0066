use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("validation failed on {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("quota exceeded for {resource}: usage {current} of limit {limit}")]
    QuotaExceeded {
        resource: &'static str,
        current: i64,
        limit: i64,
    },

    #[error("cannot {operation}: current state is {current}")]
    InvalidStateTransition {
        current: String,
        operation: &'static str,
    },

    #[error("guarantor conflict on loan {loan_id}: {message}")]
    GuarantorConflict { loan_id: Uuid, message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },
}

pub type Result<T> = std::result::Result<T, EngineError>;
