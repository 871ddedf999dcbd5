//! PostgreSQL driver.
//!
//! - [`PostgresDialect`]: DDL generation for PostgreSQL
//! - [`PostgresReader`]: catalog introspection and row streaming
//! - [`PostgresWriter`]: restore session (enums, tables, COPY load)

mod dialect;
mod reader;
mod writer;

pub use dialect::PostgresDialect;
pub use reader::PostgresReader;
pub use writer::PostgresWriter;

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::Config as PgConfig;
use tracing::{info, warn};

use crate::drivers::common::{redact_url, tls, ConnectionUrl};
use crate::error::{Result, SnapshotError};

/// Namespace introspected and restored into.
pub(crate) const WORKING_SCHEMA: &str = "public";

/// Build a pool for `conn` and check it with a round trip.
pub(crate) async fn connect_pool(conn: &ConnectionUrl, max_size: usize) -> Result<Pool> {
    let pg_config: PgConfig = conn.url.parse().map_err(|e| {
        SnapshotError::connection(e, format!("parsing {}", redact_url(&conn.url)))
    })?;
    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };

    let mgr = match tls::pg_connector(conn.ssl_mode)? {
        Some(connector) => Manager::from_config(pg_config, connector, mgr_config),
        None => {
            warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
            Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config)
        }
    };
    let pool = Pool::builder(mgr)
        .max_size(max_size)
        .build()
        .map_err(|e| SnapshotError::connection(e, "creating PostgreSQL pool"))?;

    let client = pool
        .get()
        .await
        .map_err(|e| SnapshotError::connection(e, format!("connecting to {}", conn.host)))?;
    client.simple_query("SELECT 1").await?;

    info!("Connected to PostgreSQL: {}/{}", conn.host, conn.database);
    Ok(pool)
}
