//! Property tests for the pure progress and points math.
//!
//! The invariants worth fuzzing are the conservation laws: no history of
//! approvals, however adversarial, may attribute more than 100% of a task
//! or pay out more than its reward.

use proptest::prelude::*;
use questline::tasks::model::ChecklistItem;
use questline::tasks::points::award_sequence;
use questline::tasks::progress::{attribute_progress, compute_progress, Attribution};
use questline::updates::model::{ChecklistMark, TaskUpdate, UpdateDraft, UpdateStatus};

fn approved_measurement(task_id: &str, seq: i64, absolute: f64) -> TaskUpdate {
    let mut u = TaskUpdate::new(
        task_id,
        "game-1",
        "worker-1",
        UpdateDraft {
            absolute: Some(absolute),
            ..Default::default()
        },
    );
    u.seq = seq;
    u.status = UpdateStatus::Approved;
    u
}

fn approved_marks(task_id: &str, seq: i64, marks: Vec<ChecklistMark>) -> TaskUpdate {
    let mut u = TaskUpdate::new(
        task_id,
        "game-1",
        "worker-1",
        UpdateDraft {
            checklist: marks,
            ..Default::default()
        },
    );
    u.seq = seq;
    u.status = UpdateStatus::Approved;
    u
}

fn definition(n: usize) -> Vec<ChecklistItem> {
    (0..n)
        .map(|i| ChecklistItem::new(&format!("item-{i}"), &format!("Item {i}")))
        .collect()
}

/// Marks over a fixed item universe: (index, checked) pairs.
fn marks_strategy(items: usize) -> impl Strategy<Value = Vec<ChecklistMark>> {
    prop::collection::vec((0..items, any::<bool>()), 0..=items).prop_map(|pairs| {
        pairs
            .into_iter()
            .map(|(i, checked)| ChecklistMark {
                id: format!("item-{i}"),
                checked,
            })
            .collect()
    })
}

proptest! {
    // Attributed percents never exceed the 100% budget, no matter how far
    // the raw measurements overshoot the goal.
    #[test]
    fn quantitative_attribution_conserves_the_budget(
        goal in 1.0f64..5_000.0,
        amounts in prop::collection::vec(0.0f64..2_000.0, 0..25),
    ) {
        let updates: Vec<TaskUpdate> = amounts
            .iter()
            .enumerate()
            .map(|(i, &a)| approved_measurement("t", i as i64 + 1, a))
            .collect();
        let refs: Vec<&TaskUpdate> = updates.iter().collect();

        let attributions = attribute_progress(Some(goal), &[], &refs);
        let total: f64 = attributions.iter().map(|a| a.percent).sum();
        prop_assert!(total <= 100.0 + 1e-9, "attributed {total}%");
        prop_assert!(attributions.iter().all(|a| a.percent >= 0.0));
    }

    // Same law for checklist histories, including re-checks and un-checks.
    #[test]
    fn checklist_attribution_conserves_the_budget(
        items in 1usize..8,
        histories in prop::collection::vec(marks_strategy(8), 0..15),
    ) {
        let def = definition(items);
        let updates: Vec<TaskUpdate> = histories
            .into_iter()
            .enumerate()
            .map(|(i, marks)| approved_marks("t", i as i64 + 1, marks))
            .collect();
        let refs: Vec<&TaskUpdate> = updates.iter().collect();

        let attributions = attribute_progress(None, &def, &refs);
        let total: f64 = attributions.iter().map(|a| a.percent).sum();
        prop_assert!(total <= 100.0 + 1e-9, "attributed {total}%");
        prop_assert!(attributions.iter().all(|a| a.percent >= 0.0));
    }

    // The cached percent is always an integer in [0, 100] and matches the
    // completion status.
    #[test]
    fn computed_percent_stays_in_range(
        goal in prop::option::of(1.0f64..5_000.0),
        items in 0usize..6,
        amounts in prop::collection::vec(0.0f64..2_000.0, 0..10),
    ) {
        let def = definition(items);
        let updates: Vec<TaskUpdate> = amounts
            .iter()
            .enumerate()
            .map(|(i, &a)| approved_measurement("t", i as i64 + 1, a))
            .collect();
        let refs: Vec<&TaskUpdate> = updates.iter().collect();

        let computed = compute_progress(goal, &def, &refs);
        prop_assert!(computed.percent >= 0.0 && computed.percent <= 100.0);
        prop_assert_eq!(computed.percent, computed.percent.round());
        prop_assert_eq!(
            computed.status == questline::tasks::model::TaskStatus::Completed,
            computed.percent >= 100.0
        );
    }

    // Total payout never exceeds the reward, even for attribution sequences
    // the calculator would never produce (tiny slivers that each round up).
    #[test]
    fn award_sequence_never_overpays(
        reward in 0i64..10_000,
        percents in prop::collection::vec(0.0f64..60.0, 0..50),
    ) {
        let attributions: Vec<Attribution> = percents
            .iter()
            .enumerate()
            .map(|(i, &p)| Attribution {
                update_id: format!("u-{i}"),
                percent: p,
            })
            .collect();

        let awards = award_sequence(reward, &attributions);
        prop_assert_eq!(awards.len(), attributions.len());
        prop_assert!(awards.iter().all(|&a| a >= 0));
        prop_assert!(awards.iter().sum::<i64>() <= reward);
    }

    // Recomputing over the same history is a fixed point.
    #[test]
    fn attribution_is_deterministic(
        goal in 1.0f64..1_000.0,
        amounts in prop::collection::vec(0.0f64..500.0, 0..15),
    ) {
        let updates: Vec<TaskUpdate> = amounts
            .iter()
            .enumerate()
            .map(|(i, &a)| approved_measurement("t", i as i64 + 1, a))
            .collect();
        let refs: Vec<&TaskUpdate> = updates.iter().collect();

        let first = attribute_progress(Some(goal), &[], &refs);
        let second = attribute_progress(Some(goal), &[], &refs);
        prop_assert_eq!(first, second);
    }
}
