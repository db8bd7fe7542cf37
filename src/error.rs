use crate::updates::model::UpdateStatus;

/// All errors the reconciliation engine can surface.
///
/// `TaskNotFound`, `UpdateNotFound`, `InvalidTransition`, and
/// `SelfReviewDenied` are caller errors: surfaced immediately, never
/// retried. `ConcurrentModification` means the atomic read-recompute-write
/// precondition was violated by another writer; recomputation is idempotent
/// and side-effect-free, so the workflow layer may simply retry the call.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("update not found: {0}")]
    UpdateNotFound(String),

    #[error("invalid review transition: {attempted} requires a {required} update, but it is {from}")]
    InvalidTransition {
        from: UpdateStatus,
        attempted: &'static str,
        required: UpdateStatus,
    },

    #[error("reviewer {0} cannot review their own update")]
    SelfReviewDenied(String),

    #[error("task was modified concurrently; reload and retry")]
    ConcurrentModification,

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("payload encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("corrupt stored record: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
