use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two states of a task's completion lifecycle.
/// `Completed` holds iff cached progress percent >= 100.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Active,
    Completed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_else(|| format!("{:?}", self));
        write!(f, "{}", s)
    }
}

/// One item of a task's checklist definition. `checked` is the cached
/// reconciled state, derived from the approved-update history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChecklistItem {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub checked: bool,
}

impl ChecklistItem {
    pub fn new(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            checked: false,
        }
    }
}

/// Cached aggregate progress. Derived, never hand-edited: always equals
/// the progress calculator applied to the full approved-update history at
/// the time of last recomputation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskProgress {
    pub absolute: Option<f64>,
    /// Integer-valued percent in [0, 100].
    pub percent: f64,
    pub updated_at: DateTime<Utc>,
}

impl TaskProgress {
    pub fn empty() -> Self {
        Self {
            absolute: None,
            percent: 0.0,
            updated_at: Utc::now(),
        }
    }
}

/// The long-lived aggregate being completed.
///
/// The target definition (`total_expected` and/or `checklist`) is set at
/// creation and by convention immutable once meaningful progress exists.
/// Both, either, or neither may be present; the progress calculator
/// branches accordingly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub game_id: String,
    pub title: String,
    /// Quantitative goal. `Some(x)` with x > 0 enables measurement-based
    /// progress; `None` or zero means no quantitative target.
    pub total_expected: Option<f64>,
    /// Qualitative goal: ordered checklist definition. Empty = no checklist.
    pub checklist: Vec<ChecklistItem>,
    /// Full point value awarded across the task's lifetime at 100%.
    pub reward_points: i64,
    pub progress: TaskProgress,
    pub status: TaskStatus,
    /// Optimistic-concurrency guard, bumped on every committed recompute.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        game_id: &str,
        title: &str,
        reward_points: i64,
        total_expected: Option<f64>,
        checklist: Vec<ChecklistItem>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            game_id: game_id.to_string(),
            title: title.to_string(),
            total_expected: total_expected.filter(|t| *t > 0.0),
            checklist,
            reward_points: reward_points.max(0),
            progress: TaskProgress::empty(),
            status: TaskStatus::Active,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Status implied by a percent value. The `completed ⇔ percent >= 100`
    /// invariant lives here so every writer agrees.
    pub fn status_for(percent: f64) -> TaskStatus {
        if percent >= 100.0 {
            TaskStatus::Completed
        } else {
            TaskStatus::Active
        }
    }
}
