// [libs/infra/mesh-store/src/repositories/task.rs]
/*!
 * Task persistence. `put` is the store's compare-and-set primitive: the
 * `ON CONFLICT ... DO UPDATE ... WHERE` guard means a write older than the
 * row already on disk is silently discarded inside the same statement that
 * would otherwise apply it, rather than racing a separate read-then-write.
 */

use crate::client::MeshStoreClient;
use crate::errors::{Result, StoreError};
use fleetmesh_domain::{AgentId, Task, TaskId, TaskStatus};
use libsql::{params, Row};
use std::collections::BTreeSet;
use tracing::instrument;
use uuid::Uuid;

pub struct TaskRepository {
    client: MeshStoreClient,
}

impl TaskRepository {
    pub fn new(client: MeshStoreClient) -> Self {
        Self { client }
    }

    /// Write `task`, applying last-writer-wins at the row level: the update
    /// branch of the upsert only fires when `excluded.lamport_ts` is
    /// strictly greater than the stored one. Returns `true` if the write was
    /// applied, `false` if a newer row was already present.
    #[instrument(skip(self, task), fields(task_id = %task.id, lamport_ts = task.lamport_ts))]
    pub async fn put(&self, task: &Task) -> Result<bool> {
        let conn = self.client.connection()?;
        let caps = serde_json::to_string(&task.required_capabilities)
            .map_err(|e| StoreError::MappingError(e.to_string()))?;
        let deps = serde_json::to_string(&task.dependency_ids)
            .map_err(|e| StoreError::MappingError(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO tasks (
                id, title, description, priority, required_capabilities, creator,
                assignee, assigned_node, status, result, error, progress,
                parent_id, dependency_ids, git_branch, merge_attempts, archived,
                lamport_ts, created_at, updated_at, completed_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21
            )
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                priority = excluded.priority,
                required_capabilities = excluded.required_capabilities,
                assignee = excluded.assignee,
                assigned_node = excluded.assigned_node,
                status = excluded.status,
                result = excluded.result,
                error = excluded.error,
                progress = excluded.progress,
                dependency_ids = excluded.dependency_ids,
                git_branch = excluded.git_branch,
                merge_attempts = excluded.merge_attempts,
                archived = excluded.archived,
                lamport_ts = excluded.lamport_ts,
                updated_at = excluded.updated_at,
                completed_at = excluded.completed_at
            WHERE excluded.lamport_ts > tasks.lamport_ts
            "#,
            params![
                task.id.to_string(),
                task.title.clone(),
                task.description.clone(),
                task.priority,
                caps,
                task.creator.clone(),
                task.assignee.map(|a| a.to_string()),
                task.assigned_node.map(|n| n.to_string()),
                status_str(task.status),
                task.result.clone(),
                task.error.clone(),
                task.progress.map(|p| p as f64),
                task.parent_id.map(|p| p.to_string()),
                deps,
                task.git_branch.clone(),
                task.merge_attempts,
                task.archived as i64,
                task.lamport_ts,
                task.created_at.to_rfc3339(),
                task.updated_at.to_rfc3339(),
                task.completed_at.map(|c| c.to_rfc3339()),
            ],
        )
        .await?;

        Ok(conn.changes() > 0)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: TaskId) -> Result<Option<Task>> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query("SELECT * FROM tasks WHERE id = ?1", params![id.to_string()])
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_task(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn list_active(&self) -> Result<Vec<Task>> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query("SELECT * FROM tasks WHERE archived = 0 ORDER BY lamport_ts ASC", ())
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_task(&row)?);
        }
        Ok(out)
    }

    #[instrument(skip(self))]
    pub async fn list_since(&self, lamport_ts: i64) -> Result<Vec<Task>> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT * FROM tasks WHERE lamport_ts > ?1 ORDER BY lamport_ts ASC",
                params![lamport_ts],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_task(&row)?);
        }
        Ok(out)
    }

    /// Same as [`Self::list_since`] but excludes archived rows — the
    /// authority-asymmetry filter a leader applies to its own sync
    /// responses so a lagging worker can't resurrect an archived task.
    #[instrument(skip(self))]
    pub async fn list_since_excluding_archived(&self, lamport_ts: i64) -> Result<Vec<Task>> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT * FROM tasks WHERE lamport_ts > ?1 AND archived = 0 ORDER BY lamport_ts ASC",
                params![lamport_ts],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_task(&row)?);
        }
        Ok(out)
    }

    #[instrument(skip(self))]
    pub async fn max_lamport_ts(&self) -> Result<i64> {
        let conn = self.client.connection()?;
        let mut rows = conn.query("SELECT COALESCE(MAX(lamport_ts), 0) FROM tasks", ()).await?;
        let row = rows.next().await?.ok_or_else(|| StoreError::MappingError("missing aggregate row".into()))?;
        row.get(0).map_err(|e| StoreError::MappingError(e.to_string()))
    }
}

fn status_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::Planning => "planning",
        TaskStatus::Claimed => "claimed",
        TaskStatus::InProgress => "in_progress",
        TaskStatus::WaitingInput => "waiting_input",
        TaskStatus::PendingReview => "pending_review",
        TaskStatus::Merging => "merging",
        TaskStatus::Completed => "completed",
        TaskStatus::Failed => "failed",
        TaskStatus::Cancelled => "cancelled",
    }
}

fn status_from_str(s: &str) -> Result<TaskStatus> {
    Ok(match s {
        "pending" => TaskStatus::Pending,
        "planning" => TaskStatus::Planning,
        "claimed" => TaskStatus::Claimed,
        "in_progress" => TaskStatus::InProgress,
        "waiting_input" => TaskStatus::WaitingInput,
        "pending_review" => TaskStatus::PendingReview,
        "merging" => TaskStatus::Merging,
        "completed" => TaskStatus::Completed,
        "failed" => TaskStatus::Failed,
        "cancelled" => TaskStatus::Cancelled,
        other => return Err(StoreError::MappingError(format!("unknown task status '{other}'"))),
    })
}

fn row_to_task(row: &Row) -> Result<Task> {
    let map_err = |e: libsql::Error| StoreError::MappingError(e.to_string());

    let id: String = row.get(0).map_err(map_err)?;
    let title: String = row.get(1).map_err(map_err)?;
    let description: String = row.get(2).map_err(map_err)?;
    let priority: i32 = row.get(3).map_err(map_err)?;
    let caps_json: String = row.get(4).map_err(map_err)?;
    let creator: String = row.get(5).map_err(map_err)?;
    let assignee: Option<String> = row.get(6).map_err(map_err)?;
    let assigned_node: Option<String> = row.get(7).map_err(map_err)?;
    let status: String = row.get(8).map_err(map_err)?;
    let result: Option<String> = row.get(9).map_err(map_err)?;
    let error: Option<String> = row.get(10).map_err(map_err)?;
    let progress: Option<f64> = row.get(11).map_err(map_err)?;
    let parent_id: Option<String> = row.get(12).map_err(map_err)?;
    let deps_json: String = row.get(13).map_err(map_err)?;
    let git_branch: Option<String> = row.get(14).map_err(map_err)?;
    let merge_attempts: i64 = row.get(15).map_err(map_err)?;
    let archived: i64 = row.get(16).map_err(map_err)?;
    let lamport_ts: i64 = row.get(17).map_err(map_err)?;
    let created_at: String = row.get(18).map_err(map_err)?;
    let updated_at: String = row.get(19).map_err(map_err)?;
    let completed_at: Option<String> = row.get(20).map_err(map_err)?;

    let required_capabilities: BTreeSet<String> =
        serde_json::from_str(&caps_json).map_err(|e| StoreError::MappingError(e.to_string()))?;
    let dependency_ids: Vec<TaskId> =
        serde_json::from_str(&deps_json).map_err(|e| StoreError::MappingError(e.to_string()))?;

    Ok(Task {
        id: TaskId(Uuid::parse_str(&id).map_err(|e| StoreError::MappingError(e.to_string()))?),
        title,
        description,
        priority,
        required_capabilities,
        creator,
        assignee: assignee
            .map(|a| Uuid::parse_str(&a).map(AgentId))
            .transpose()
            .map_err(|e| StoreError::MappingError(e.to_string()))?,
        assigned_node: assigned_node
            .map(|n| Uuid::parse_str(&n))
            .transpose()
            .map_err(|e| StoreError::MappingError(e.to_string()))?,
        status: status_from_str(&status)?,
        result,
        error,
        progress: progress.map(|p| p as f32),
        parent_id: parent_id
            .map(|p| Uuid::parse_str(&p).map(TaskId))
            .transpose()
            .map_err(|e| StoreError::MappingError(e.to_string()))?,
        dependency_ids,
        git_branch,
        merge_attempts: merge_attempts as u32,
        archived: archived != 0,
        lamport_ts,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
        completed_at: completed_at.as_deref().map(parse_ts).transpose()?,
    })
}

fn parse_ts(s: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| StoreError::MappingError(e.to_string()))
}
