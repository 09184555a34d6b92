// [libs/infra/mesh-store/src/repositories/agent.rs]
use crate::client::MeshStoreClient;
use crate::errors::{Result, StoreError};
use fleetmesh_domain::{Agent, AgentId, AgentStatus, AgentTombstone, TaskId};
use libsql::{params, Row};
use tracing::instrument;
use uuid::Uuid;

pub struct AgentRepository {
    client: MeshStoreClient,
}

impl AgentRepository {
    pub fn new(client: MeshStoreClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self, agent), fields(agent_id = %agent.id, lamport_ts = agent.lamport_ts))]
    pub async fn put(&self, agent: &Agent) -> Result<bool> {
        let conn = self.client.connection()?;
        let caps =
            serde_json::to_string(&agent.capabilities).map_err(|e| StoreError::MappingError(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO agents (
                id, host_node, name, tool_type, model, capabilities,
                session_handle, working_directory, max_concurrent_tasks,
                status, current_task_id, last_heartbeat, lamport_ts, registered_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                tool_type = excluded.tool_type,
                model = excluded.model,
                capabilities = excluded.capabilities,
                session_handle = excluded.session_handle,
                working_directory = excluded.working_directory,
                max_concurrent_tasks = excluded.max_concurrent_tasks,
                status = excluded.status,
                current_task_id = excluded.current_task_id,
                last_heartbeat = excluded.last_heartbeat,
                lamport_ts = excluded.lamport_ts
            WHERE excluded.lamport_ts > agents.lamport_ts
            "#,
            params![
                agent.id.to_string(),
                agent.host_node.to_string(),
                agent.name.clone(),
                agent.tool_type.clone(),
                agent.model.clone(),
                caps,
                agent.session_handle.clone(),
                agent.working_directory.clone(),
                agent.max_concurrent_tasks,
                status_str(agent.status),
                agent.current_task_id.map(|t| t.to_string()),
                agent.last_heartbeat.to_rfc3339(),
                agent.lamport_ts,
                agent.registered_at.to_rfc3339(),
            ],
        )
        .await?;

        Ok(conn.changes() > 0)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: AgentId) -> Result<Option<Agent>> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query("SELECT * FROM agents WHERE id = ?1", params![id.to_string()])
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_agent(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn list_for_node(&self, host_node: Uuid) -> Result<Vec<Agent>> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT * FROM agents WHERE host_node = ?1",
                params![host_node.to_string()],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_agent(&row)?);
        }
        Ok(out)
    }

    #[instrument(skip(self))]
    pub async fn list_since(&self, lamport_ts: i64) -> Result<Vec<Agent>> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT * FROM agents WHERE lamport_ts > ?1 ORDER BY lamport_ts ASC",
                params![lamport_ts],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_agent(&row)?);
        }
        Ok(out)
    }

    #[instrument(skip(self))]
    pub async fn max_lamport_ts(&self) -> Result<i64> {
        let conn = self.client.connection()?;
        let mut rows = conn.query("SELECT COALESCE(MAX(lamport_ts), 0) FROM agents", ()).await?;
        let row = rows.next().await?.ok_or_else(|| StoreError::MappingError("missing aggregate row".into()))?;
        row.get(0).map_err(|e| StoreError::MappingError(e.to_string()))
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: AgentId) -> Result<()> {
        let conn = self.client.connection()?;
        conn.execute("DELETE FROM agents WHERE id = ?1", params![id.to_string()])
            .await?;
        Ok(())
    }

    #[instrument(skip(self, tomb), fields(agent_id = %tomb.agent_id))]
    pub async fn put_tombstone(&self, tomb: &AgentTombstone) -> Result<()> {
        let conn = self.client.connection()?;
        conn.execute(
            r#"
            INSERT INTO agent_tombstones (agent_id, lamport_ts, expires_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(agent_id) DO UPDATE SET
                lamport_ts = excluded.lamport_ts,
                expires_at = excluded.expires_at
            WHERE excluded.lamport_ts > agent_tombstones.lamport_ts
            "#,
            params![tomb.agent_id.to_string(), tomb.lamport_ts, tomb.expires_at.to_rfc3339()],
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn is_tombstoned(&self, id: AgentId) -> Result<bool> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT expires_at FROM agent_tombstones WHERE agent_id = ?1",
                params![id.to_string()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => {
                let expires_at: String = row.get(0).map_err(|e| StoreError::MappingError(e.to_string()))?;
                let expires_at = parse_ts(&expires_at)?;
                Ok(chrono::Utc::now() < expires_at)
            }
            None => Ok(false),
        }
    }

    /// Sweep expired tombstones, returning how many were removed.
    #[instrument(skip(self))]
    pub async fn prune_expired_tombstones(&self) -> Result<usize> {
        let conn = self.client.connection()?;
        conn.execute(
            "DELETE FROM agent_tombstones WHERE expires_at < ?1",
            params![chrono::Utc::now().to_rfc3339()],
        )
        .await?;
        Ok(conn.changes() as usize)
    }
}

fn status_str(status: AgentStatus) -> &'static str {
    match status {
        AgentStatus::Idle => "idle",
        AgentStatus::Busy => "busy",
        AgentStatus::Waiting => "waiting",
        AgentStatus::Offline => "offline",
    }
}

fn status_from_str(s: &str) -> Result<AgentStatus> {
    Ok(match s {
        "idle" => AgentStatus::Idle,
        "busy" => AgentStatus::Busy,
        "waiting" => AgentStatus::Waiting,
        "offline" => AgentStatus::Offline,
        other => return Err(StoreError::MappingError(format!("unknown agent status '{other}'"))),
    })
}

fn row_to_agent(row: &Row) -> Result<Agent> {
    let map_err = |e: libsql::Error| StoreError::MappingError(e.to_string());

    let id: String = row.get(0).map_err(map_err)?;
    let host_node: String = row.get(1).map_err(map_err)?;
    let name: String = row.get(2).map_err(map_err)?;
    let tool_type: String = row.get(3).map_err(map_err)?;
    let model: String = row.get(4).map_err(map_err)?;
    let caps_json: String = row.get(5).map_err(map_err)?;
    let session_handle: Option<String> = row.get(6).map_err(map_err)?;
    let working_directory: String = row.get(7).map_err(map_err)?;
    let max_concurrent_tasks: i64 = row.get(8).map_err(map_err)?;
    let status: String = row.get(9).map_err(map_err)?;
    let current_task_id: Option<String> = row.get(10).map_err(map_err)?;
    let last_heartbeat: String = row.get(11).map_err(map_err)?;
    let lamport_ts: i64 = row.get(12).map_err(map_err)?;
    let registered_at: String = row.get(13).map_err(map_err)?;

    Ok(Agent {
        id: AgentId(Uuid::parse_str(&id).map_err(|e| StoreError::MappingError(e.to_string()))?),
        host_node: Uuid::parse_str(&host_node).map_err(|e| StoreError::MappingError(e.to_string()))?,
        name,
        tool_type,
        model,
        capabilities: serde_json::from_str(&caps_json).map_err(|e| StoreError::MappingError(e.to_string()))?,
        session_handle,
        working_directory,
        max_concurrent_tasks: max_concurrent_tasks as u32,
        status: status_from_str(&status)?,
        current_task_id: current_task_id
            .map(|t| Uuid::parse_str(&t).map(TaskId))
            .transpose()
            .map_err(|e| StoreError::MappingError(e.to_string()))?,
        last_heartbeat: parse_ts(&last_heartbeat)?,
        lamport_ts,
        registered_at: parse_ts(&registered_at)?,
    })
}

fn parse_ts(s: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| StoreError::MappingError(e.to_string()))
}
