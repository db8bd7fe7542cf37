use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Review states of a task update.
///
/// Cancellation is not a fourth state: it is the `APPROVED → PENDING_REVIEW`
/// transition (see `review::cancel`), after which the update is inert again.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateStatus {
    PendingReview,
    Approved,
    Rejected,
}

impl std::fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_else(|| format!("{:?}", self));
        write!(f, "{}", s)
    }
}

/// One checked/unchecked mark an update reports against a checklist item.
/// An update carries only the items it addresses (a partial view).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChecklistMark {
    pub id: String,
    pub checked: bool,
}

/// The progress figures a worker reports in one update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdatePayload {
    /// Raw measurement contributed toward the task's quantitative goal.
    pub absolute: Option<f64>,
    /// Worker-claimed percent. Informational only; the engine derives its own.
    pub percent: Option<f64>,
    pub hours: Option<f64>,
    pub note: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl UpdatePayload {
    pub fn new(absolute: Option<f64>) -> Self {
        Self {
            absolute,
            percent: None,
            hours: None,
            note: None,
            updated_at: Utc::now(),
        }
    }
}

/// Everything a worker supplies when submitting an update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDraft {
    pub absolute: Option<f64>,
    pub percent: Option<f64>,
    pub hours: Option<f64>,
    pub note: Option<String>,
    #[serde(default)]
    pub checklist: Vec<ChecklistMark>,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub photos: Vec<String>,
}

/// Reviewer adjustments applied at approval time, before aggregation.
/// Any field left `None` keeps the submitted value.
#[derive(Debug, Clone, Default)]
pub struct ReviewOverrides {
    pub absolute: Option<f64>,
    pub checklist: Option<Vec<ChecklistMark>>,
    pub participants: Option<Vec<String>>,
}

/// One worker-submitted contribution to a task, carrying its own review
/// state. Only `APPROVED` updates ever contribute to task progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub id: String,
    pub task_id: String,
    pub game_id: String,
    pub status: UpdateStatus,
    /// Explicit submission order. Assigned by the store on insert;
    /// all aggregation is defined over `(seq, id)` ascending.
    pub seq: i64,
    pub submitted_by: String,
    pub payload: UpdatePayload,
    pub checklist: Vec<ChecklistMark>,
    pub participants: Vec<String>,
    pub photos: Vec<String>,
    pub reviewed_by: Option<String>,
    pub review_note: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Share of the task's percent budget this update consumed once
    /// approved. Written by the progress calculator, never by the submitter.
    pub progress_percent: f64,
    pub created_at: DateTime<Utc>,
}

impl TaskUpdate {
    /// Create a new pending update from a submission draft.
    /// `seq` is a placeholder until the store assigns the real value.
    pub fn new(task_id: &str, game_id: &str, submitted_by: &str, draft: UpdateDraft) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            task_id: task_id.to_string(),
            game_id: game_id.to_string(),
            status: UpdateStatus::PendingReview,
            seq: 0,
            submitted_by: submitted_by.to_string(),
            payload: UpdatePayload {
                absolute: draft.absolute,
                percent: draft.percent,
                hours: draft.hours,
                note: draft.note,
                updated_at: Utc::now(),
            },
            checklist: draft.checklist,
            participants: draft.participants,
            photos: draft.photos,
            reviewed_by: None,
            review_note: None,
            reviewed_at: None,
            progress_percent: 0.0,
            created_at: Utc::now(),
        }
    }
}
