// [libs/infra/mesh-store/src/schema.rs]
/*!
 * Table definitions for the three gossiped entity kinds plus the local
 * key/value state table (Lamport clock, node identity). Statements run
 * with `IF NOT EXISTS` so connecting to an already-bootstrapped database
 * is a no-op.
 */

use crate::errors::Result;
use libsql::Connection;
use tracing::{debug, instrument};

const TABLES: &[(&str, &str)] = &[
    (
        "tasks",
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            priority INTEGER NOT NULL DEFAULT 0,
            required_capabilities TEXT NOT NULL DEFAULT '[]',
            creator TEXT NOT NULL,
            assignee TEXT,
            assigned_node TEXT,
            status TEXT NOT NULL,
            result TEXT,
            error TEXT,
            progress REAL,
            parent_id TEXT,
            dependency_ids TEXT NOT NULL DEFAULT '[]',
            git_branch TEXT,
            merge_attempts INTEGER NOT NULL DEFAULT 0,
            archived INTEGER NOT NULL DEFAULT 0,
            lamport_ts INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            completed_at TEXT
        );
    "#,
    ),
    (
        "tasks_status_idx",
        "CREATE INDEX IF NOT EXISTS tasks_status_idx ON tasks(status);",
    ),
    (
        "tasks_lamport_idx",
        "CREATE INDEX IF NOT EXISTS tasks_lamport_idx ON tasks(lamport_ts);",
    ),
    (
        "tasks_parent_idx",
        "CREATE INDEX IF NOT EXISTS tasks_parent_idx ON tasks(parent_id);",
    ),
    (
        "tasks_archived_idx",
        "CREATE INDEX IF NOT EXISTS tasks_archived_idx ON tasks(archived);",
    ),
    (
        "agents",
        r#"
        CREATE TABLE IF NOT EXISTS agents (
            id TEXT PRIMARY KEY,
            host_node TEXT NOT NULL,
            name TEXT NOT NULL,
            tool_type TEXT NOT NULL,
            model TEXT NOT NULL,
            capabilities TEXT NOT NULL DEFAULT '[]',
            session_handle TEXT,
            working_directory TEXT NOT NULL,
            max_concurrent_tasks INTEGER NOT NULL DEFAULT 1,
            status TEXT NOT NULL,
            current_task_id TEXT,
            last_heartbeat TEXT NOT NULL,
            lamport_ts INTEGER NOT NULL,
            registered_at TEXT NOT NULL
        );
    "#,
    ),
    (
        "agents_node_idx",
        "CREATE INDEX IF NOT EXISTS agents_node_idx ON agents(host_node);",
    ),
    (
        "agent_tombstones",
        r#"
        CREATE TABLE IF NOT EXISTS agent_tombstones (
            agent_id TEXT PRIMARY KEY,
            lamport_ts INTEGER NOT NULL,
            expires_at TEXT NOT NULL
        );
    "#,
    ),
    (
        "dht_entries",
        r#"
        CREATE TABLE IF NOT EXISTS dht_entries (
            key TEXT PRIMARY KEY,
            value BLOB NOT NULL,
            content_hash TEXT NOT NULL,
            origin_node TEXT NOT NULL,
            lamport_ts INTEGER NOT NULL,
            replica_count INTEGER NOT NULL DEFAULT 1,
            ttl_secs INTEGER NOT NULL DEFAULT 0,
            tombstone INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
    "#,
    ),
    (
        "dht_content_hash_idx",
        "CREATE INDEX IF NOT EXISTS dht_content_hash_idx ON dht_entries(content_hash);",
    ),
    (
        "state",
        r#"
        CREATE TABLE IF NOT EXISTS state (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
    "#,
    ),
];

#[instrument(skip(conn))]
pub async fn apply_schema(conn: &Connection) -> Result<()> {
    for (name, statement) in TABLES {
        conn.execute(statement, ()).await?;
        debug!(table = *name, "schema statement applied");
    }
    Ok(())
}
