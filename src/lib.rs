//! # Questline
//!
//! A gamified work-tracking engine. Workers report progress against tasks
//! through discrete, reviewable updates; reviewers approve, reject, or
//! cancel them; the engine deterministically recomputes each task's
//! aggregate completion from its full ordered history of approved updates
//! and converts the marginal progress of every approval into a point award.
//!
//! ## Update flow
//! 1. A worker submits an update (`PENDING_REVIEW`)
//! 2. A reviewer approves or rejects it
//! 3. On approval the task's checklist, progress, and status are recomputed
//!    from scratch over the full approved history
//! 4. The points attributed to that specific update are returned for the
//!    external ledger to credit
//! 5. An approved update may be cancelled back to `PENDING_REVIEW`, which
//!    recomputes the task without it and emits a negative point delta
//!
//! ## Modules
//! - `tasks`: Task aggregate, checklist reconciler, progress + points calculators
//! - `updates`: TaskUpdate model and the review state machine
//! - `engine`: review workflow surface (submit/approve/reject/cancel/recalculate)
//! - `storage`: SQLite-backed task/update store with optimistic concurrency

pub mod config;
pub mod engine;
pub mod error;
pub mod storage;
pub mod tasks;
pub mod updates;

pub use config::EngineConfig;
pub use engine::ReviewEngine;
pub use error::{EngineError, Result};
