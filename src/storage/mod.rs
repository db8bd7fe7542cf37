//! SQLite-backed task/update store.
//!
//! The engine talks to storage through the [`TaskStore`] trait; this module
//! provides the production implementation on sqlx + SQLite (WAL mode).
//! Nested payloads (checklists, participants, photos) are stored as JSON in
//! TEXT columns; timestamps are RFC 3339 TEXT.
//!
//! `commit_recomputation` is the one transactional write: it persists the
//! task's cached progress and every touched update atomically, guarded by
//! the task's `version` column. A stale version surfaces
//! [`EngineError::ConcurrentModification`], which callers may retry since
//! recomputation is pure.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteConnectOptions, ConnectOptions, SqlitePool};
use std::{path::Path, str::FromStr};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::tasks::model::{ChecklistItem, Task, TaskProgress, TaskStatus};
use crate::updates::model::{ChecklistMark, TaskUpdate, UpdatePayload, UpdateStatus};

// ─── Activity log ─────────────────────────────────────────────────────────────

/// One audit entry for a review transition (submit/approve/reject/cancel)
/// or a manual recalculation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ActivityEntry {
    pub id: String,
    pub ts: DateTime<Utc>,
    pub actor: String,
    pub task_id: String,
    pub update_id: Option<String>,
    pub action: String,
    pub detail: Option<String>,
}

impl ActivityEntry {
    pub fn new(actor: &str, task_id: &str, update_id: Option<&str>, action: &str, detail: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ts: Utc::now(),
            actor: actor.to_string(),
            task_id: task_id.to_string(),
            update_id: update_id.map(String::from),
            action: action.to_string(),
            detail,
        }
    }
}

// ─── TaskStore trait ──────────────────────────────────────────────────────────

/// Persistence seam between the review engine and storage.
///
/// Precondition carried by implementations: the read-recompute-write
/// sequence for one task must be atomic with respect to other writers of
/// the same task (here: the `version` guard in `commit_recomputation`).
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn load_task(&self, task_id: &str) -> Result<Task>;
    async fn load_update(&self, task_id: &str, update_id: &str) -> Result<TaskUpdate>;
    /// All updates of a task in submission order (seq, then id).
    async fn load_ordered_updates(&self, task_id: &str) -> Result<Vec<TaskUpdate>>;
    async fn insert_task(&self, task: &Task) -> Result<()>;
    /// Insert a new update, assigning it the next `seq` for its task.
    async fn insert_update(&self, update: &mut TaskUpdate) -> Result<()>;
    /// Persist one update outside a recompute (e.g. a rejection).
    async fn save_update(&self, update: &TaskUpdate) -> Result<()>;
    /// Atomically persist the recomputed task and every touched update.
    /// Bumps `task.version` on success; a stale version means another
    /// writer got there first.
    async fn commit_recomputation(&self, task: &mut Task, updates: &[TaskUpdate]) -> Result<()>;
    async fn log_activity(&self, entry: &ActivityEntry) -> Result<()>;
    async fn list_activity(&self, task_id: &str) -> Result<Vec<ActivityEntry>>;
}

// ─── Row types ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
struct TaskRow {
    id: String,
    game_id: String,
    title: String,
    total_expected: Option<f64>,
    checklist: String,
    reward_points: i64,
    progress_absolute: Option<f64>,
    progress_percent: f64,
    progress_updated_at: String,
    status: String,
    version: i64,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct UpdateRow {
    id: String,
    task_id: String,
    game_id: String,
    status: String,
    seq: i64,
    submitted_by: String,
    absolute: Option<f64>,
    percent: Option<f64>,
    hours: Option<f64>,
    note: Option<String>,
    payload_updated_at: String,
    checklist: String,
    participants: String,
    photos: String,
    reviewed_by: Option<String>,
    review_note: Option<String>,
    reviewed_at: Option<String>,
    progress_percent: f64,
    created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ActivityRow {
    id: String,
    ts: String,
    actor: String,
    task_id: String,
    update_id: Option<String>,
    action: String,
    detail: Option<String>,
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .map_err(|e| EngineError::Corrupt(format!("bad timestamp {raw:?}: {e}")))
}

fn parse_status(raw: &str) -> Result<TaskStatus> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| EngineError::Corrupt(format!("bad task status {raw:?}")))
}

fn parse_update_status(raw: &str) -> Result<UpdateStatus> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| EngineError::Corrupt(format!("bad update status {raw:?}")))
}

impl TryFrom<TaskRow> for Task {
    type Error = EngineError;

    fn try_from(row: TaskRow) -> Result<Task> {
        let checklist: Vec<ChecklistItem> = serde_json::from_str(&row.checklist)?;
        Ok(Task {
            total_expected: row.total_expected,
            checklist,
            reward_points: row.reward_points,
            progress: TaskProgress {
                absolute: row.progress_absolute,
                percent: row.progress_percent,
                updated_at: parse_ts(&row.progress_updated_at)?,
            },
            status: parse_status(&row.status)?,
            version: row.version,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
            id: row.id,
            game_id: row.game_id,
            title: row.title,
        })
    }
}

impl TryFrom<UpdateRow> for TaskUpdate {
    type Error = EngineError;

    fn try_from(row: UpdateRow) -> Result<TaskUpdate> {
        let checklist: Vec<ChecklistMark> = serde_json::from_str(&row.checklist)?;
        let participants: Vec<String> = serde_json::from_str(&row.participants)?;
        let photos: Vec<String> = serde_json::from_str(&row.photos)?;
        Ok(TaskUpdate {
            status: parse_update_status(&row.status)?,
            seq: row.seq,
            payload: UpdatePayload {
                absolute: row.absolute,
                percent: row.percent,
                hours: row.hours,
                note: row.note,
                updated_at: parse_ts(&row.payload_updated_at)?,
            },
            checklist,
            participants,
            photos,
            reviewed_at: row.reviewed_at.as_deref().map(parse_ts).transpose()?,
            reviewed_by: row.reviewed_by,
            review_note: row.review_note,
            progress_percent: row.progress_percent,
            created_at: parse_ts(&row.created_at)?,
            id: row.id,
            task_id: row.task_id,
            game_id: row.game_id,
            submitted_by: row.submitted_by,
        })
    }
}

// ─── SqliteTaskStore ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct SqliteTaskStore {
    pool: SqlitePool,
}

impl SqliteTaskStore {
    /// Open (or create) the database under `data_dir` and run migrations.
    pub async fn connect(data_dir: &Path) -> Result<Self> {
        Self::connect_with_slow_query(data_dir, 0).await
    }

    /// Like [`connect`](Self::connect), with slow-query logging enabled.
    /// Queries exceeding `slow_query_ms` are logged at WARN; 0 disables.
    pub async fn connect_with_slow_query(data_dir: &Path, slow_query_ms: u64) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .map_err(|e| EngineError::Storage(sqlx::Error::Io(e)))?;
        let db_path = data_dir.join("questline.db");
        let mut opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .create_if_missing(true);

        if slow_query_ms > 0 {
            opts = opts.log_slow_statements(
                log::LevelFilter::Warn,
                std::time::Duration::from_millis(slow_query_ms),
            );
        }

        let pool = SqlitePool::connect_with(opts).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool. The caller is responsible for migrations.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(pool: &SqlitePool) -> Result<()> {
        sqlx::migrate!("src/storage/migrations")
            .run(pool)
            .await
            .map_err(|e| EngineError::Storage(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Return a clone of the connection pool (Arc-backed, cheap).
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    /// All tasks in a game, newest first.
    pub async fn list_tasks(&self, game_id: &str) -> Result<Vec<Task>> {
        let rows: Vec<TaskRow> =
            sqlx::query_as("SELECT * FROM tasks WHERE game_id = ? ORDER BY created_at DESC")
                .bind(game_id)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(Task::try_from).collect()
    }

    /// Aggregate counts for a game's tasks.
    pub async fn summary(&self, game_id: &str) -> Result<serde_json::Value> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks WHERE game_id = ?")
            .bind(game_id)
            .fetch_one(&self.pool)
            .await?;

        let completed: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM tasks WHERE game_id = ? AND status = 'completed'")
                .bind(game_id)
                .fetch_one(&self.pool)
                .await?;

        let avg_percent: (Option<f64>,) =
            sqlx::query_as("SELECT AVG(progress_percent) FROM tasks WHERE game_id = ?")
                .bind(game_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(serde_json::json!({
            "total": total.0,
            "completed": completed.0,
            "active": total.0 - completed.0,
            "avg_percent": avg_percent.0,
        }))
    }

    /// Bind every mutable update column. Shared by `save_update` and
    /// `commit_recomputation` so the two writers cannot drift apart.
    fn update_write_query<'q>(
        update: &'q TaskUpdate,
        checklist_json: &'q str,
        participants_json: &'q str,
        photos_json: &'q str,
        status: &'q str,
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        sqlx::query(
            "UPDATE task_updates
             SET status = ?, absolute = ?, percent = ?, hours = ?, note = ?,
                 payload_updated_at = ?, checklist = ?, participants = ?, photos = ?,
                 reviewed_by = ?, review_note = ?, reviewed_at = ?, progress_percent = ?
             WHERE id = ?",
        )
        .bind(status)
        .bind(update.payload.absolute)
        .bind(update.payload.percent)
        .bind(update.payload.hours)
        .bind(update.payload.note.as_deref())
        .bind(update.payload.updated_at.to_rfc3339())
        .bind(checklist_json)
        .bind(participants_json)
        .bind(photos_json)
        .bind(update.reviewed_by.as_deref())
        .bind(update.review_note.as_deref())
        .bind(update.reviewed_at.map(|t| t.to_rfc3339()))
        .bind(update.progress_percent)
        .bind(&update.id)
    }
}

fn status_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Active => "active",
        TaskStatus::Completed => "completed",
    }
}

fn update_status_str(status: UpdateStatus) -> &'static str {
    match status {
        UpdateStatus::PendingReview => "PENDING_REVIEW",
        UpdateStatus::Approved => "APPROVED",
        UpdateStatus::Rejected => "REJECTED",
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn load_task(&self, task_id: &str) -> Result<Task> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or_else(|| EngineError::TaskNotFound(task_id.to_string()))?
            .try_into()
    }

    async fn load_update(&self, task_id: &str, update_id: &str) -> Result<TaskUpdate> {
        let row: Option<UpdateRow> =
            sqlx::query_as("SELECT * FROM task_updates WHERE id = ? AND task_id = ?")
                .bind(update_id)
                .bind(task_id)
                .fetch_optional(&self.pool)
                .await?;
        row.ok_or_else(|| EngineError::UpdateNotFound(update_id.to_string()))?
            .try_into()
    }

    async fn load_ordered_updates(&self, task_id: &str) -> Result<Vec<TaskUpdate>> {
        let rows: Vec<UpdateRow> =
            sqlx::query_as("SELECT * FROM task_updates WHERE task_id = ? ORDER BY seq ASC, id ASC")
                .bind(task_id)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(TaskUpdate::try_from).collect()
    }

    async fn insert_task(&self, task: &Task) -> Result<()> {
        let checklist_json = serde_json::to_string(&task.checklist)?;
        sqlx::query(
            "INSERT INTO tasks
             (id, game_id, title, total_expected, checklist, reward_points,
              progress_absolute, progress_percent, progress_updated_at,
              status, version, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&task.id)
        .bind(&task.game_id)
        .bind(&task.title)
        .bind(task.total_expected)
        .bind(&checklist_json)
        .bind(task.reward_points)
        .bind(task.progress.absolute)
        .bind(task.progress.percent)
        .bind(task.progress.updated_at.to_rfc3339())
        .bind(status_str(task.status))
        .bind(task.version)
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_update(&self, update: &mut TaskUpdate) -> Result<()> {
        let checklist_json = serde_json::to_string(&update.checklist)?;
        let participants_json = serde_json::to_string(&update.participants)?;
        let photos_json = serde_json::to_string(&update.photos)?;

        // Next seq per task; callers hold the per-task serialization
        // precondition, so MAX+1 cannot race for the same task.
        sqlx::query(
            "INSERT INTO task_updates
             (id, task_id, game_id, status, seq, submitted_by,
              absolute, percent, hours, note, payload_updated_at,
              checklist, participants, photos,
              reviewed_by, review_note, reviewed_at, progress_percent, created_at)
             VALUES (?, ?, ?, ?,
                     (SELECT COALESCE(MAX(seq), 0) + 1 FROM task_updates WHERE task_id = ?),
                     ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&update.id)
        .bind(&update.task_id)
        .bind(&update.game_id)
        .bind(update_status_str(update.status))
        .bind(&update.task_id)
        .bind(&update.submitted_by)
        .bind(update.payload.absolute)
        .bind(update.payload.percent)
        .bind(update.payload.hours)
        .bind(update.payload.note.as_deref())
        .bind(update.payload.updated_at.to_rfc3339())
        .bind(&checklist_json)
        .bind(&participants_json)
        .bind(&photos_json)
        .bind(update.reviewed_by.as_deref())
        .bind(update.review_note.as_deref())
        .bind(update.reviewed_at.map(|t| t.to_rfc3339()))
        .bind(update.progress_percent)
        .bind(update.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        let (seq,): (i64,) = sqlx::query_as("SELECT seq FROM task_updates WHERE id = ?")
            .bind(&update.id)
            .fetch_one(&self.pool)
            .await?;
        update.seq = seq;
        Ok(())
    }

    async fn save_update(&self, update: &TaskUpdate) -> Result<()> {
        let checklist_json = serde_json::to_string(&update.checklist)?;
        let participants_json = serde_json::to_string(&update.participants)?;
        let photos_json = serde_json::to_string(&update.photos)?;
        let affected = Self::update_write_query(
            update,
            &checklist_json,
            &participants_json,
            &photos_json,
            update_status_str(update.status),
        )
        .execute(&self.pool)
        .await?
        .rows_affected();
        if affected == 0 {
            return Err(EngineError::UpdateNotFound(update.id.clone()));
        }
        Ok(())
    }

    async fn commit_recomputation(&self, task: &mut Task, updates: &[TaskUpdate]) -> Result<()> {
        let checklist_json = serde_json::to_string(&task.checklist)?;
        let mut tx = self.pool.begin().await?;

        let affected = sqlx::query(
            "UPDATE tasks
             SET checklist = ?, progress_absolute = ?, progress_percent = ?,
                 progress_updated_at = ?, status = ?, updated_at = ?,
                 version = version + 1
             WHERE id = ? AND version = ?",
        )
        .bind(&checklist_json)
        .bind(task.progress.absolute)
        .bind(task.progress.percent)
        .bind(task.progress.updated_at.to_rfc3339())
        .bind(status_str(task.status))
        .bind(task.updated_at.to_rfc3339())
        .bind(&task.id)
        .bind(task.version)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if affected == 0 {
            // The task was either deleted or bumped by another writer since
            // we loaded it. Both mean: reload and retry.
            tx.rollback().await?;
            return Err(EngineError::ConcurrentModification);
        }

        for update in updates {
            let checklist_json = serde_json::to_string(&update.checklist)?;
            let participants_json = serde_json::to_string(&update.participants)?;
            let photos_json = serde_json::to_string(&update.photos)?;
            Self::update_write_query(
                update,
                &checklist_json,
                &participants_json,
                &photos_json,
                update_status_str(update.status),
            )
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        task.version += 1;
        Ok(())
    }

    async fn log_activity(&self, entry: &ActivityEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO review_activity (id, ts, actor, task_id, update_id, action, detail)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(entry.ts.to_rfc3339())
        .bind(&entry.actor)
        .bind(&entry.task_id)
        .bind(entry.update_id.as_deref())
        .bind(&entry.action)
        .bind(entry.detail.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_activity(&self, task_id: &str) -> Result<Vec<ActivityEntry>> {
        let rows: Vec<ActivityRow> =
            sqlx::query_as("SELECT * FROM review_activity WHERE task_id = ? ORDER BY ts ASC, id ASC")
                .bind(task_id)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter()
            .map(|row| {
                Ok(ActivityEntry {
                    ts: parse_ts(&row.ts)?,
                    id: row.id,
                    actor: row.actor,
                    task_id: row.task_id,
                    update_id: row.update_id,
                    action: row.action,
                    detail: row.detail,
                })
            })
            .collect()
    }
}
