//! Review state machine for task updates.
//!
//! Pure transition functions: each takes the update by value and returns
//! the transitioned update or an `InvalidTransition` error. Illegal
//! transitions never silently no-op. The functions perform no I/O; the
//! engine persists the result and triggers recomputation.

use chrono::Utc;

use crate::error::EngineError;
use crate::updates::model::{ReviewOverrides, TaskUpdate, UpdateStatus};

/// Approve a pending update. Records reviewer metadata and, if supplied,
/// applies reviewer overrides to the submitted payload before aggregation.
pub fn approve(
    mut update: TaskUpdate,
    reviewer_id: &str,
    review_note: Option<String>,
    overrides: Option<ReviewOverrides>,
) -> Result<TaskUpdate, EngineError> {
    match update.status {
        UpdateStatus::PendingReview => {
            if let Some(ov) = overrides {
                if let Some(absolute) = ov.absolute {
                    update.payload.absolute = Some(absolute);
                }
                if let Some(checklist) = ov.checklist {
                    update.checklist = checklist;
                }
                if let Some(participants) = ov.participants {
                    update.participants = participants;
                }
            }
            update.status = UpdateStatus::Approved;
            update.reviewed_by = Some(reviewer_id.to_string());
            update.review_note = review_note;
            update.reviewed_at = Some(Utc::now());
            Ok(update)
        }
        from => Err(EngineError::InvalidTransition {
            from,
            attempted: "approve",
            required: UpdateStatus::PendingReview,
        }),
    }
}

/// Reject a pending update. Rejected updates are inert history; the task
/// never needs recomputation because they never counted.
pub fn reject(
    mut update: TaskUpdate,
    reviewer_id: &str,
    review_note: Option<String>,
) -> Result<TaskUpdate, EngineError> {
    match update.status {
        UpdateStatus::PendingReview => {
            update.status = UpdateStatus::Rejected;
            update.reviewed_by = Some(reviewer_id.to_string());
            update.review_note = review_note;
            update.reviewed_at = Some(Utc::now());
            Ok(update)
        }
        from => Err(EngineError::InvalidTransition {
            from,
            attempted: "reject",
            required: UpdateStatus::PendingReview,
        }),
    }
}

/// Cancel an approved update back to `PENDING_REVIEW`, clearing reviewer
/// metadata and the attributed percent. The update becomes inert again and
/// the task must be recomputed without it.
pub fn cancel(mut update: TaskUpdate) -> Result<TaskUpdate, EngineError> {
    match update.status {
        UpdateStatus::Approved => {
            update.status = UpdateStatus::PendingReview;
            update.reviewed_by = None;
            update.review_note = None;
            update.reviewed_at = None;
            update.progress_percent = 0.0;
            Ok(update)
        }
        from => Err(EngineError::InvalidTransition {
            from,
            attempted: "cancel",
            required: UpdateStatus::Approved,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::updates::model::{ChecklistMark, UpdateDraft};

    fn make_update() -> TaskUpdate {
        TaskUpdate::new("t1", "g1", "worker-1", UpdateDraft::default())
    }

    #[test]
    fn test_approve_pending() {
        let update = make_update();
        let approved = approve(update, "reviewer-1", Some("lgtm".into()), None).unwrap();
        assert_eq!(approved.status, UpdateStatus::Approved);
        assert_eq!(approved.reviewed_by.as_deref(), Some("reviewer-1"));
        assert!(approved.reviewed_at.is_some());
    }

    #[test]
    fn test_approve_applies_overrides() {
        let mut update = make_update();
        update.payload.absolute = Some(40.0);
        update.checklist = vec![ChecklistMark { id: "a".into(), checked: true }];

        let overrides = ReviewOverrides {
            absolute: Some(35.0),
            checklist: Some(vec![ChecklistMark { id: "b".into(), checked: true }]),
            participants: None,
        };
        let approved = approve(update, "reviewer-1", None, Some(overrides)).unwrap();
        assert_eq!(approved.payload.absolute, Some(35.0));
        assert_eq!(approved.checklist[0].id, "b");
    }

    #[test]
    fn test_approve_twice_is_invalid() {
        let update = make_update();
        let approved = approve(update, "reviewer-1", None, None).unwrap();
        let err = approve(approved, "reviewer-2", None, None).unwrap_err();
        match err {
            EngineError::InvalidTransition { from, attempted, .. } => {
                assert_eq!(from, UpdateStatus::Approved);
                assert_eq!(attempted, "approve");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_reject_then_approve_is_invalid() {
        let update = make_update();
        let rejected = reject(update, "reviewer-1", Some("incomplete".into())).unwrap();
        assert_eq!(rejected.status, UpdateStatus::Rejected);
        assert!(approve(rejected, "reviewer-1", None, None).is_err());
    }

    #[test]
    fn test_cancel_approved_resets_review_metadata() {
        let mut update = make_update();
        update = approve(update, "reviewer-1", Some("ok".into()), None).unwrap();
        update.progress_percent = 60.0;

        let cancelled = cancel(update).unwrap();
        assert_eq!(cancelled.status, UpdateStatus::PendingReview);
        assert!(cancelled.reviewed_by.is_none());
        assert!(cancelled.review_note.is_none());
        assert!(cancelled.reviewed_at.is_none());
        assert_eq!(cancelled.progress_percent, 0.0);
    }

    #[test]
    fn test_cancel_pending_is_invalid() {
        let update = make_update();
        let err = cancel(update).unwrap_err();
        match err {
            EngineError::InvalidTransition { from, attempted, required } => {
                assert_eq!(from, UpdateStatus::PendingReview);
                assert_eq!(attempted, "cancel");
                assert_eq!(required, UpdateStatus::Approved);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
