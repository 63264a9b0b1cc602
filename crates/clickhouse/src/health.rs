//! ClickHouse health checks and schema setup.

use crate::client::{map_error, ClickHouseClient};
use crate::schema::all_statements;
use pipeline_core::Result;
use tracing::{debug, error};

/// Checks that the server answers a trivial query.
pub async fn check_connection(client: &ClickHouseClient) -> Result<()> {
    match client.admin().query("SELECT 1").fetch_one::<u8>().await {
        Ok(_) => {
            debug!("ClickHouse connection healthy");
            Ok(())
        }
        Err(e) => {
            error!("ClickHouse health check failed: {}", e);
            Err(map_error("Health check failed", e))
        }
    }
}

/// Creates the database and tables when absent. Safe to run repeatedly.
pub async fn init_schema(client: &ClickHouseClient) -> Result<()> {
    for ddl in all_statements(&client.config().database) {
        client
            .admin()
            .query(&ddl)
            .execute()
            .await
            .map_err(|e| map_error("Failed to execute DDL", e))?;
    }

    debug!(database = %client.config().database, "ClickHouse schema initialized");
    Ok(())
}
