//! Review workflow surface.
//!
//! `ReviewEngine` owns the only writers of a task's cached progress and of
//! update review state. Every mutation runs the same pipeline: load the
//! task and its full ordered update history, apply one pure state-machine
//! transition, recompute progress and per-update attribution from scratch,
//! and commit task + updates atomically. Nothing is patched incrementally,
//! so a cancellation or rejection in the middle of the history simply falls
//! out of the next recompute.
//!
//! Point awards are returned to the caller (positive on approval, negative
//! on cancellation); crediting a ledger is the caller's concern.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, info};

use crate::config::ReviewConfig;
use crate::error::{EngineError, Result};
use crate::storage::{ActivityEntry, TaskStore};
use crate::tasks::model::{Task, TaskProgress};
use crate::tasks::{checklist, points, progress};
use crate::updates::model::{ReviewOverrides, TaskUpdate, UpdateDraft, UpdateStatus};
use crate::updates::review;

/// Result of approving an update: the transitioned update, the recomputed
/// task, and the points this specific approval is worth.
#[derive(Debug, Clone)]
pub struct ApproveOutcome {
    pub update: TaskUpdate,
    pub task: Task,
    pub points_awarded: i64,
}

/// Result of cancelling an approved update. `points_delta` is negative:
/// the award the cancelled update previously earned, to be debited by the
/// external ledger.
#[derive(Debug, Clone)]
pub struct CancelOutcome {
    pub update: TaskUpdate,
    pub task: Task,
    pub points_delta: i64,
}

pub struct ReviewEngine<S: TaskStore> {
    store: S,
    review: ReviewConfig,
}

impl<S: TaskStore> ReviewEngine<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, ReviewConfig::default())
    }

    pub fn with_config(store: S, review: ReviewConfig) -> Self {
        Self { store, review }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Submit a new update against a task. The update starts in
    /// `PENDING_REVIEW` and contributes nothing until approved.
    pub async fn submit_update(
        &self,
        task_id: &str,
        submitted_by: &str,
        draft: UpdateDraft,
    ) -> Result<TaskUpdate> {
        let task = self.store.load_task(task_id).await?;

        let mut update = TaskUpdate::new(&task.id, &task.game_id, submitted_by, draft);
        self.store.insert_update(&mut update).await?;
        self.store
            .log_activity(&ActivityEntry::new(
                submitted_by,
                task_id,
                Some(&update.id),
                "submitted",
                None,
            ))
            .await?;

        info!(task_id, update_id = %update.id, seq = update.seq, "update submitted");
        Ok(update)
    }

    /// Approve a pending update and recompute the task over its full
    /// approved history. Returns the points attributed to this approval.
    pub async fn approve_update(
        &self,
        task_id: &str,
        update_id: &str,
        reviewer_id: &str,
        review_note: Option<String>,
        overrides: Option<ReviewOverrides>,
    ) -> Result<ApproveOutcome> {
        let mut task = self.store.load_task(task_id).await?;
        let update = self.store.load_update(task_id, update_id).await?;
        self.check_reviewer(reviewer_id, &update)?;

        let approved = review::approve(update, reviewer_id, review_note, overrides)?;

        let mut updates = self.store.load_ordered_updates(task_id).await?;
        substitute(&mut updates, approved);
        let awards = recompute(&mut task, &mut updates);
        self.store.commit_recomputation(&mut task, &updates).await?;

        let points_awarded = awards.get(update_id).copied().unwrap_or(0);
        let update = find_by_id(&updates, update_id)?;
        self.store
            .log_activity(&ActivityEntry::new(
                reviewer_id,
                task_id,
                Some(update_id),
                "approved",
                Some(format!(
                    "attributed {}%, awarded {} points",
                    update.progress_percent, points_awarded
                )),
            ))
            .await?;

        info!(
            task_id,
            update_id,
            reviewer_id,
            percent = task.progress.percent,
            points_awarded,
            status = %task.status,
            "update approved"
        );
        Ok(ApproveOutcome {
            update,
            task,
            points_awarded,
        })
    }

    /// Reject a pending update. Rejected updates never counted, so the
    /// task's cached progress is untouched.
    pub async fn reject_update(
        &self,
        task_id: &str,
        update_id: &str,
        reviewer_id: &str,
        review_note: Option<String>,
    ) -> Result<TaskUpdate> {
        // Load the task first so a bad task id reports TaskNotFound,
        // not UpdateNotFound.
        self.store.load_task(task_id).await?;
        let update = self.store.load_update(task_id, update_id).await?;
        self.check_reviewer(reviewer_id, &update)?;

        let rejected = review::reject(update, reviewer_id, review_note)?;
        self.store.save_update(&rejected).await?;
        self.store
            .log_activity(&ActivityEntry::new(
                reviewer_id,
                task_id,
                Some(update_id),
                "rejected",
                rejected.review_note.clone(),
            ))
            .await?;

        info!(task_id, update_id, reviewer_id, "update rejected");
        Ok(rejected)
    }

    /// Cancel an approved update back to `PENDING_REVIEW` and recompute the
    /// task without its contribution. Returns the negative of the points it
    /// previously earned.
    pub async fn cancel_update(&self, task_id: &str, update_id: &str) -> Result<CancelOutcome> {
        let mut task = self.store.load_task(task_id).await?;
        let update = self.store.load_update(task_id, update_id).await?;
        let actor = update.reviewed_by.clone().unwrap_or_else(|| "engine".to_string());

        // What the update earned while approved, recomputed from history
        // rather than read from a ledger.
        let updates = self.store.load_ordered_updates(task_id).await?;
        let revoked = {
            let approved: Vec<&TaskUpdate> = updates
                .iter()
                .filter(|u| u.status == UpdateStatus::Approved)
                .collect();
            let attributions =
                progress::attribute_progress(task.total_expected, &task.checklist, &approved);
            let awards = points::award_sequence(task.reward_points, &attributions);
            attributions
                .iter()
                .zip(awards)
                .find(|(a, _)| a.update_id == update_id)
                .map(|(_, pts)| pts)
                .unwrap_or(0)
        };

        let cancelled = review::cancel(update)?;

        let mut updates = updates;
        substitute(&mut updates, cancelled);
        recompute(&mut task, &mut updates);
        self.store.commit_recomputation(&mut task, &updates).await?;

        let update = find_by_id(&updates, update_id)?;
        self.store
            .log_activity(&ActivityEntry::new(
                &actor,
                task_id,
                Some(update_id),
                "cancelled",
                Some(format!("revoked {} points", revoked)),
            ))
            .await?;

        info!(
            task_id,
            update_id,
            percent = task.progress.percent,
            points_delta = -revoked,
            "update cancelled"
        );
        Ok(CancelOutcome {
            update,
            task,
            points_delta: -revoked,
        })
    }

    /// Recompute a task's cached progress from scratch. Idempotent, safe
    /// to call redundantly for repair or backfill.
    pub async fn recalculate_task(&self, task_id: &str) -> Result<Task> {
        let mut task = self.store.load_task(task_id).await?;
        let mut updates = self.store.load_ordered_updates(task_id).await?;
        recompute(&mut task, &mut updates);
        self.store.commit_recomputation(&mut task, &updates).await?;

        debug!(task_id, percent = task.progress.percent, "task recalculated");
        Ok(task)
    }

    fn check_reviewer(&self, reviewer_id: &str, update: &TaskUpdate) -> Result<()> {
        if self.review.forbid_self_review && reviewer_id == update.submitted_by {
            return Err(EngineError::SelfReviewDenied(reviewer_id.to_string()));
        }
        Ok(())
    }
}

/// Replace the stored copy of a just-transitioned update in the ordered
/// history, keeping submission order intact.
fn substitute(updates: &mut [TaskUpdate], transitioned: TaskUpdate) {
    if let Some(slot) = updates.iter_mut().find(|u| u.id == transitioned.id) {
        *slot = transitioned;
    }
}

fn find_by_id(updates: &[TaskUpdate], update_id: &str) -> Result<TaskUpdate> {
    updates
        .iter()
        .find(|u| u.id == update_id)
        .cloned()
        .ok_or_else(|| EngineError::UpdateNotFound(update_id.to_string()))
}

/// The full recompute: reconcile the checklist, refresh the task's cached
/// progress/status, and re-attribute every approved update's percent share.
/// Returns the point award each approved update is worth under the current
/// history, keyed by update id.
fn recompute(task: &mut Task, updates: &mut [TaskUpdate]) -> HashMap<String, i64> {
    let (computed, reconciled, attributions) = {
        let approved: Vec<&TaskUpdate> = updates
            .iter()
            .filter(|u| u.status == UpdateStatus::Approved)
            .collect();
        (
            progress::compute_progress(task.total_expected, &task.checklist, &approved),
            checklist::reconcile(&task.checklist, &approved),
            progress::attribute_progress(task.total_expected, &task.checklist, &approved),
        )
    };

    for item in &mut task.checklist {
        if let Some(checked) = reconciled.get(&item.id) {
            item.checked = *checked;
        }
    }

    let now = Utc::now();
    task.progress = TaskProgress {
        absolute: computed.absolute,
        percent: computed.percent,
        updated_at: now,
    };
    task.status = computed.status;
    task.updated_at = now;

    let awards = points::award_sequence(task.reward_points, &attributions);
    let percent_by_id: HashMap<&str, f64> = attributions
        .iter()
        .map(|a| (a.update_id.as_str(), a.percent))
        .collect();
    for update in updates.iter_mut() {
        update.progress_percent = percent_by_id.get(update.id.as_str()).copied().unwrap_or(0.0);
    }

    attributions
        .into_iter()
        .zip(awards)
        .map(|(a, pts)| (a.update_id, pts))
        .collect()
}
