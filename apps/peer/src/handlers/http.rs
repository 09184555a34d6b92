// [apps/peer/src/handlers/http.rs]
//! The peer's HTTP surface: health/status for the gateway and operators,
//! plus a small REST API that turns an external request into a gossip
//! origination through `MeshEngines`.

use crate::mesh::dispatch::MeshEngines;
use crate::state::PeerState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use fleetmesh_domain::{Agent, AgentId, AgentStatus, Task, TaskId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct ApiState {
    pub state: PeerState,
    pub engines: Arc<MeshEngines>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/:id", get(get_task))
        .route("/tasks/:id/claim", post(claim_task))
        .route("/tasks/:id/complete", post(complete_task))
        .route("/tasks/:id/fail", post(fail_task))
        .route("/tasks/:id/cancel", post(cancel_task))
        .route("/tasks/:id/archive", post(archive_task))
        .route("/agents", get(list_agents).post(register_agent))
        .route("/agents/:id/heartbeat", post(heartbeat_agent))
        .route("/agents/:id", delete(deregister_agent))
        .route("/dht/:key", get(dht_get).put(dht_put).delete(dht_delete))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

#[derive(Serialize)]
struct StatusResponse {
    node_id: String,
    is_leader: bool,
    leader_node_id: Option<String>,
    peer_count: usize,
    lamport_ts: i64,
}

async fn status(State(api): State<ApiState>) -> impl IntoResponse {
    let leader = api.state.leader.read().unwrap().clone();
    Json(StatusResponse {
        node_id: api.state.node_id.to_string(),
        is_leader: api.state.is_leader(),
        leader_node_id: leader.node_id.map(|n| n.to_string()),
        peer_count: api.state.registry.read().unwrap().len(),
        lamport_ts: api.state.clock.current(),
    })
}

#[derive(Deserialize)]
struct CreateTaskRequest {
    title: String,
    description: String,
    #[serde(default)]
    priority: i32,
    creator: String,
    #[serde(default)]
    required_capabilities: BTreeSet<String>,
    #[serde(default)]
    parent_id: Option<TaskId>,
    #[serde(default)]
    dependency_ids: Vec<TaskId>,
}

async fn create_task(State(api): State<ApiState>, Json(req): Json<CreateTaskRequest>) -> impl IntoResponse {
    let mut task = Task::new(req.title, req.description, req.priority, req.creator, 0)
        .with_capabilities(req.required_capabilities)
        .with_dependencies(req.dependency_ids);
    if let Some(parent_id) = req.parent_id {
        task = task.with_parent(parent_id);
    }
    match api.engines.gossip.originate_task_create(task).await {
        Ok(task) => Json(task).into_response(),
        Err(err) => {
            warn!(%err, "failed to originate task create");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn list_tasks(State(api): State<ApiState>) -> impl IntoResponse {
    match api.state.tasks.list_active().await {
        Ok(tasks) => Json(tasks).into_response(),
        Err(err) => {
            warn!(%err, "failed to list tasks");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn get_task(State(api): State<ApiState>, Path(id): Path<TaskId>) -> impl IntoResponse {
    match api.state.tasks.get(id).await {
        Ok(Some(task)) => Json(task).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            warn!(%err, "failed to fetch task");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Deserialize)]
struct ClaimTaskRequest {
    agent_id: AgentId,
}

async fn claim_task(
    State(api): State<ApiState>,
    Path(id): Path<TaskId>,
    Json(req): Json<ClaimTaskRequest>,
) -> impl IntoResponse {
    match api.engines.gossip.originate_task_claim(id, req.agent_id).await {
        Ok(Some(task)) => Json(task).into_response(),
        Ok(None) => StatusCode::CONFLICT.into_response(),
        Err(err) => {
            warn!(%err, "failed to originate task claim");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Deserialize)]
struct CompleteTaskRequest {
    result: String,
}

async fn complete_task(
    State(api): State<ApiState>,
    Path(id): Path<TaskId>,
    Json(req): Json<CompleteTaskRequest>,
) -> impl IntoResponse {
    match api.engines.gossip.originate_task_complete(id, req.result).await {
        Ok(Some(task)) => Json(task).into_response(),
        Ok(None) => StatusCode::CONFLICT.into_response(),
        Err(err) => {
            warn!(%err, "failed to originate task complete");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Deserialize)]
struct FailTaskRequest {
    error: String,
}

async fn fail_task(
    State(api): State<ApiState>,
    Path(id): Path<TaskId>,
    Json(req): Json<FailTaskRequest>,
) -> impl IntoResponse {
    match api.engines.gossip.originate_task_fail(id, req.error).await {
        Ok(Some(task)) => Json(task).into_response(),
        Ok(None) => StatusCode::CONFLICT.into_response(),
        Err(err) => {
            warn!(%err, "failed to originate task fail");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn cancel_task(State(api): State<ApiState>, Path(id): Path<TaskId>) -> impl IntoResponse {
    match api.engines.gossip.originate_task_cancel(id).await {
        Ok(Some(task)) => Json(task).into_response(),
        Ok(None) => StatusCode::CONFLICT.into_response(),
        Err(err) => {
            warn!(%err, "failed to originate task cancel");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn archive_task(State(api): State<ApiState>, Path(id): Path<TaskId>) -> impl IntoResponse {
    match api.engines.gossip.originate_task_archive(id).await {
        Ok(Some(task)) => Json(task).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            warn!(%err, "failed to originate task archive");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Deserialize)]
struct RegisterAgentRequest {
    name: String,
    tool_type: String,
    model: String,
    working_directory: String,
    max_concurrent_tasks: u32,
    #[serde(default)]
    capabilities: Vec<String>,
}

async fn register_agent(State(api): State<ApiState>, Json(req): Json<RegisterAgentRequest>) -> impl IntoResponse {
    let mut agent = Agent::new(
        api.state.node_id.0,
        req.name,
        req.tool_type,
        req.model,
        req.working_directory,
        req.max_concurrent_tasks,
        0,
    );
    agent.capabilities = req.capabilities;
    match api.engines.gossip.originate_agent_register(agent).await {
        Ok(agent) => Json(agent).into_response(),
        Err(err) => {
            warn!(%err, "failed to originate agent register");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn list_agents(State(api): State<ApiState>) -> impl IntoResponse {
    match api.state.agents.list_for_node(api.state.node_id.0).await {
        Ok(agents) => Json(agents).into_response(),
        Err(err) => {
            warn!(%err, "failed to list agents");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Deserialize)]
struct HeartbeatRequest {
    status: AgentStatus,
    #[serde(default)]
    current_task_id: Option<TaskId>,
}

async fn heartbeat_agent(
    State(api): State<ApiState>,
    Path(id): Path<AgentId>,
    Json(req): Json<HeartbeatRequest>,
) -> impl IntoResponse {
    match api.engines.gossip.originate_agent_heartbeat(id, req.status, req.current_task_id).await {
        Ok(Some(agent)) => Json(agent).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            warn!(%err, "failed to originate agent heartbeat");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn deregister_agent(State(api): State<ApiState>, Path(id): Path<AgentId>) -> impl IntoResponse {
    match api.engines.gossip.originate_agent_deregister(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            warn!(%err, "failed to originate agent deregister");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Deserialize)]
struct DhtPutRequest {
    value: String,
    #[serde(default = "default_replica_count")]
    replica_count: u32,
    #[serde(default = "default_ttl_secs")]
    ttl_secs: u64,
}

fn default_replica_count() -> u32 {
    3
}

fn default_ttl_secs() -> u64 {
    3600
}

async fn dht_put(
    State(api): State<ApiState>,
    Path(key): Path<String>,
    Json(req): Json<DhtPutRequest>,
) -> impl IntoResponse {
    match api.engines.dht.put_named(key, req.value.into_bytes(), req.replica_count, req.ttl_secs).await {
        Ok(entry) => Json(entry).into_response(),
        Err(err) => {
            warn!(%err, "failed to put dht entry");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn dht_get(State(api): State<ApiState>, Path(key): Path<String>) -> impl IntoResponse {
    match api.engines.dht.get(&key).await {
        Ok(Some(entry)) => Json(entry).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            warn!(%err, "failed to get dht entry");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn dht_delete(State(api): State<ApiState>, Path(key): Path<String>) -> impl IntoResponse {
    match api.engines.dht.delete(&key).await {
        Ok(Some(_)) => StatusCode::NO_CONTENT.into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            warn!(%err, "failed to delete dht entry");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
