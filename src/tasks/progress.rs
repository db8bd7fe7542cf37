//! Progress calculators.
//!
//! Two deterministic views of the same approved-update history:
//!
//! - [`compute_progress`] produces the task's cached `{absolute, percent,
//!   status}` by branching on the task's goal shape (quantitative,
//!   checklist, combined, or qualitative fallback). It is reconciler-backed
//!   for checklists, so a later un-check lowers the cached percent.
//! - [`attribute_progress`] assigns each approved update the marginal
//!   percent it consumed from a running 100-point budget, in submission
//!   order. The attributed shares are what point awards are computed from,
//!   and their sum can never exceed 100.
//!
//! Both are pure folds over an explicit ordered list. Recomputing with the
//! same inputs always yields the same result. Cancellations and rejections
//! in the middle of the sequence are handled by recomputing from scratch,
//! never by incremental patching.

use std::collections::BTreeSet;

use crate::tasks::checklist;
use crate::tasks::model::{ChecklistItem, TaskStatus};
use crate::updates::model::TaskUpdate;

/// Output of a full-history progress recomputation.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedProgress {
    pub absolute: Option<f64>,
    pub percent: f64,
    pub status: TaskStatus,
}

/// Marginal percent attributed to one approved update.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribution {
    pub update_id: String,
    pub percent: f64,
}

/// Round half away from zero to the nearest integer.
/// (`f64::round` already has these semantics; named for clarity at call sites.)
fn round_percent(value: f64) -> f64 {
    value.round()
}

/// Round to 2 decimal places so the running budget cannot accumulate float
/// drift into a non-terminating tail.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A quantitative goal only counts when present and strictly positive.
fn quantitative_goal(total_expected: Option<f64>) -> Option<f64> {
    total_expected.filter(|t| *t > 0.0)
}

/// Sum of reported measurements across approved updates, clamped to
/// `[0, goal]`. Percent is always derived from this clamped value, never
/// from summing individually-rounded per-update percentages, so cumulative
/// rounding can't reach 100 before the measurement does.
fn clamped_absolute(goal: f64, approved_in_order: &[&TaskUpdate]) -> f64 {
    let sum: f64 = approved_in_order
        .iter()
        .map(|u| u.payload.absolute.unwrap_or(0.0))
        .sum();
    sum.clamp(0.0, goal)
}

/// Recompute `{absolute, percent, status}` for a task from its goal shape
/// and the ordered sequence of approved updates.
///
/// Branch priority: quantitative > checklist-only > combined > qualitative.
pub fn compute_progress(
    total_expected: Option<f64>,
    definition: &[ChecklistItem],
    approved_in_order: &[&TaskUpdate],
) -> ComputedProgress {
    let goal = quantitative_goal(total_expected);
    let has_checklist = !definition.is_empty();

    let (absolute, percent) = match (goal, has_checklist) {
        // Quantitative: measurement sum against the goal.
        (Some(goal), false) => {
            let absolute = clamped_absolute(goal, approved_in_order);
            let percent = round_percent(absolute / goal * 100.0).min(100.0);
            (Some(absolute), percent)
        }
        // Checklist-only: share of reconciled checked items.
        (None, true) => {
            let state = checklist::reconcile(definition, approved_in_order);
            let checked = checklist::checked_count(&state);
            let percent =
                round_percent(checked as f64 / definition.len() as f64 * 100.0).min(100.0);
            (Some(checked as f64), percent)
        }
        // Combined: both halves weighted equally; absolute stays quantitative.
        (Some(goal), true) => {
            let absolute = clamped_absolute(goal, approved_in_order);
            let quant_percent = round_percent(absolute / goal * 100.0).min(100.0);
            let state = checklist::reconcile(definition, approved_in_order);
            let checked = checklist::checked_count(&state);
            let check_percent =
                round_percent(checked as f64 / definition.len() as f64 * 100.0).min(100.0);
            let percent = round_percent(quant_percent / 2.0 + check_percent / 2.0).min(100.0);
            (Some(absolute), percent)
        }
        // Qualitative fallback: any approved update completes the task.
        (None, false) => {
            let percent = if approved_in_order.is_empty() { 0.0 } else { 100.0 };
            (None, percent)
        }
    };

    ComputedProgress {
        absolute,
        percent,
        status: crate::tasks::model::Task::status_for(percent),
    }
}

/// Attribute each approved update its marginal percent, consuming a running
/// budget that starts at 100.
///
/// The nominal contribution of one update is evaluated against only that
/// update's payload: for quantitative goals its reported measurement over
/// the goal; for checklists its newly-checked items (items no strictly
/// earlier approved update had checked) over the item count; combined goals
/// take half of each; goal-less tasks are worth the full budget at once.
/// The attributed share is `min(nominal, remaining)`, so once the budget is
/// exhausted no later update earns further positive percent. Re-checking an
/// item a previous update already consumed earns nothing; historical
/// contributions stay paid for even if the item is later un-checked.
pub fn attribute_progress(
    total_expected: Option<f64>,
    definition: &[ChecklistItem],
    approved_in_order: &[&TaskUpdate],
) -> Vec<Attribution> {
    let goal = quantitative_goal(total_expected);
    let total_items = definition.len();
    let known_ids: BTreeSet<&str> = definition.iter().map(|i| i.id.as_str()).collect();

    let mut ever_checked: BTreeSet<String> = BTreeSet::new();
    let mut remaining: f64 = 100.0;
    let mut attributions = Vec::with_capacity(approved_in_order.len());

    for update in approved_in_order {
        let quant_part = goal.map(|goal| {
            let reported = update.payload.absolute.unwrap_or(0.0).max(0.0);
            reported / goal * 100.0
        });

        let check_part = if total_items > 0 {
            let mut newly = 0usize;
            for mark in &update.checklist {
                if mark.checked
                    && known_ids.contains(mark.id.as_str())
                    && ever_checked.insert(mark.id.clone())
                {
                    newly += 1;
                }
            }
            Some(newly as f64 / total_items as f64 * 100.0)
        } else {
            None
        };

        let nominal = match (quant_part, check_part) {
            (Some(q), None) => q,
            (None, Some(c)) => c,
            (Some(q), Some(c)) => q / 2.0 + c / 2.0,
            (None, None) => 100.0,
        };

        let attributed = round2(nominal.clamp(0.0, remaining));
        remaining = round2(remaining - attributed);

        attributions.push(Attribution {
            update_id: update.id.clone(),
            percent: attributed,
        });
    }

    attributions
}
