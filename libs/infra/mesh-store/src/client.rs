// [libs/infra/mesh-store/src/client.rs]
/*!
 * Owns the libSQL database handle and applies the schema on connect. Every
 * repository takes a clone of [`MeshStoreClient`] rather than a raw
 * `libsql::Connection` — `Database::connect()` is cheap and each call gets
 * its own connection, so there's no pool to manage here.
 */

use crate::errors::{Result, StoreError};
use crate::schema::apply_schema;
use libsql::{Builder, Connection, Database};
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct MeshStoreClient {
    database: Arc<Database>,
    /// Holds one connection open for the lifetime of the process when
    /// running against `:memory:` — SQLite drops an in-memory database the
    /// moment its last connection closes, and without this anchor the
    /// schema created at startup would vanish before the first request.
    _memory_anchor: Option<Arc<Connection>>,
}

impl MeshStoreClient {
    #[instrument]
    pub async fn connect(url: &str) -> Result<Self> {
        if url.is_empty() {
            return Err(StoreError::ConnectionError("store url is empty".into()));
        }
        info!(%url, "opening mesh store");

        let is_memory = url.contains(":memory:") || url.contains("mode=memory");
        let database = Builder::new_local(url)
            .build()
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;
        let database = Arc::new(database);

        let anchor = if is_memory {
            let conn = database
                .connect()
                .map_err(|e| StoreError::ConnectionError(e.to_string()))?;
            apply_schema(&conn).await?;
            Some(Arc::new(conn))
        } else {
            let conn = database
                .connect()
                .map_err(|e| StoreError::ConnectionError(e.to_string()))?;
            apply_schema(&conn).await?;
            None
        };

        Ok(Self {
            database,
            _memory_anchor: anchor,
        })
    }

    pub fn connection(&self) -> Result<Connection> {
        self.database
            .connect()
            .map_err(|e| StoreError::ConnectionError(e.to_string()))
    }
}
