// [libs/domain/mesh-domain/src/task.rs]
/*!
 * Task — the unit of work dispatched by the leader and executed by an
 * agent hosted on some worker. `Task` is an immutable value object: every
 * mutation in the gossip and anti-entropy layers produces a *new* `Task`
 * rather than mutating fields in place, so that the value sitting in the
 * persistent store is always a fully-formed snapshot at some `lamport_ts`.
 */

use crate::ids::{AgentId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Lifecycle states from §3/§4.9 of the coordination design. `Completed`,
/// `Failed` and `Cancelled` are absorbing: once reached, no further gossip
/// may move the task to any other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Planning,
    Claimed,
    InProgress,
    WaitingInput,
    PendingReview,
    Merging,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Terminal statuses are absorbing — see the invariant in §3 and the
    /// testable property in §8 ("no subsequent gossip can change its status").
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// A unit of work. Identity is `id`; every other field may be replaced by a
/// later mutation with a strictly greater `lamport_ts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub priority: i32,
    pub required_capabilities: BTreeSet<String>,
    pub creator: String,
    pub assignee: Option<AgentId>,
    pub assigned_node: Option<Uuid>,
    pub status: TaskStatus,
    pub result: Option<String>,
    pub error: Option<String>,
    pub progress: Option<f32>,
    pub parent_id: Option<TaskId>,
    pub dependency_ids: Vec<TaskId>,
    pub git_branch: Option<String>,
    pub merge_attempts: u32,
    pub archived: bool,
    pub lamport_ts: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Construct a brand new task at `lamport_ts`. Callers originate the
    /// timestamp from the local [`crate::clock::LamportClock`] before calling
    /// this — the clock is not threaded through the domain layer itself.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        priority: i32,
        creator: impl Into<String>,
        lamport_ts: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            title: title.into(),
            description: description.into(),
            priority,
            required_capabilities: BTreeSet::new(),
            creator: creator.into(),
            assignee: None,
            assigned_node: None,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            progress: None,
            parent_id: None,
            dependency_ids: Vec::new(),
            git_branch: None,
            merge_attempts: 0,
            archived: false,
            lamport_ts,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn with_parent(mut self, parent_id: TaskId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_capabilities(mut self, caps: impl IntoIterator<Item = String>) -> Self {
        self.required_capabilities = caps.into_iter().collect();
        self
    }

    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = TaskId>) -> Self {
        self.dependency_ids = deps.into_iter().collect();
        self
    }

    /// Returns a new `Task` reflecting a successful claim by `(agent, node)`.
    /// Does not check the current status — callers (the claim resolver)
    /// decide whether a claim is admissible before calling this.
    pub fn claimed(&self, agent: AgentId, node: Uuid, lamport_ts: i64) -> Self {
        let mut next = self.clone();
        next.status = TaskStatus::Claimed;
        next.assignee = Some(agent);
        next.assigned_node = Some(node);
        next.lamport_ts = lamport_ts;
        next.updated_at = Utc::now();
        next
    }

    /// Merge a remote mutation's fields onto this local task, preserving the
    /// branch-name merge rule from §4.7: a non-empty incoming branch replaces
    /// an empty local one, never the reverse.
    pub fn merge_update(&self, incoming: &Task, lamport_ts: i64) -> Self {
        let mut next = incoming.clone();
        next.lamport_ts = lamport_ts;
        if next.git_branch.as_deref().unwrap_or("").is_empty() {
            next.git_branch = self.git_branch.clone();
        }
        next.updated_at = Utc::now();
        next
    }

    pub fn completed(&self, result: impl Into<String>, lamport_ts: i64) -> Self {
        let mut next = self.clone();
        next.status = TaskStatus::Completed;
        next.result = Some(result.into());
        next.lamport_ts = lamport_ts;
        let now = Utc::now();
        next.updated_at = now;
        next.completed_at = Some(now);
        next
    }

    pub fn failed(&self, error: impl Into<String>, lamport_ts: i64) -> Self {
        let mut next = self.clone();
        next.status = TaskStatus::Failed;
        next.error = Some(error.into());
        next.result = None;
        next.lamport_ts = lamport_ts;
        next.updated_at = Utc::now();
        next
    }

    pub fn cancelled(&self, lamport_ts: i64) -> Self {
        let mut next = self.clone();
        next.status = TaskStatus::Cancelled;
        next.lamport_ts = lamport_ts;
        next.updated_at = Utc::now();
        next
    }

    pub fn archived(&self, lamport_ts: i64) -> Self {
        let mut next = self.clone();
        next.archived = true;
        next.lamport_ts = lamport_ts;
        next.updated_at = Utc::now();
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_is_pending_and_unassigned() {
        let t = Task::new("A", "desc", 0, "leader", 1);
        assert_eq!(t.status, TaskStatus::Pending);
        assert!(t.assignee.is_none());
        assert_eq!(t.lamport_ts, 1);
    }

    #[test]
    fn terminal_statuses_are_absorbing_by_definition() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Claimed.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
    }

    #[test]
    fn merge_update_keeps_local_branch_when_incoming_is_empty() {
        let mut local = Task::new("A", "desc", 0, "leader", 1);
        local.git_branch = Some("feature/x".into());
        let mut incoming = local.clone();
        incoming.git_branch = None;
        let merged = local.merge_update(&incoming, 2);
        assert_eq!(merged.git_branch.as_deref(), Some("feature/x"));
    }

    #[test]
    fn merge_update_adopts_incoming_branch_when_local_is_empty() {
        let local = Task::new("A", "desc", 0, "leader", 1);
        let mut incoming = local.clone();
        incoming.git_branch = Some("feature/y".into());
        let merged = local.merge_update(&incoming, 2);
        assert_eq!(merged.git_branch.as_deref(), Some("feature/y"));
    }

    #[test]
    fn completed_sets_result_and_completed_at() {
        let t = Task::new("A", "desc", 0, "leader", 1);
        let done = t.completed("ok", 3);
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.result.as_deref(), Some("ok"));
        assert!(done.completed_at.is_some());
    }
}
