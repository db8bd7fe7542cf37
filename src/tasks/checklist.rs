//! Checklist reconciler.
//!
//! Merges the partial checklist contributions of an ordered sequence of
//! approved updates into one current checked/unchecked state per definition
//! item. Deterministic: replaying the same sequence always yields the same
//! map, so the task's cached checklist state can be rebuilt from scratch at
//! any time.

use std::collections::BTreeMap;

use tracing::warn;

use crate::tasks::model::ChecklistItem;
use crate::updates::model::TaskUpdate;

/// Fold approved updates (in submission order) over the checklist
/// definition. Every definition item starts unchecked; each update sets the
/// items it addresses to its reported value, so later updates override
/// earlier ones per item (last write wins). An item can be explicitly
/// un-checked again by a later update, which is how corrections work.
///
/// Marks referencing an id absent from the definition are ignored: a stale
/// client talking about a removed item must not poison aggregation.
pub fn reconcile(
    definition: &[ChecklistItem],
    approved_in_order: &[&TaskUpdate],
) -> BTreeMap<String, bool> {
    let mut state: BTreeMap<String, bool> = definition
        .iter()
        .map(|item| (item.id.clone(), false))
        .collect();

    for update in approved_in_order {
        for mark in &update.checklist {
            match state.get_mut(&mark.id) {
                Some(slot) => *slot = mark.checked,
                None => warn!(
                    update_id = %update.id,
                    item_id = %mark.id,
                    "update references checklist item not in task definition; ignoring"
                ),
            }
        }
    }

    state
}

/// Count of checked items in a reconciled state.
pub fn checked_count(state: &BTreeMap<String, bool>) -> usize {
    state.values().filter(|checked| **checked).count()
}
