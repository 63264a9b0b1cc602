//! ClickHouse client wrapper.

use crate::config::ClickHouseConfig;
use clickhouse::Client;
use pipeline_core::{Backend, Error};
use tracing::info;

/// ClickHouse client wrapper.
#[derive(Clone)]
pub struct ClickHouseClient {
    inner: Client,
    config: ClickHouseConfig,
}

impl ClickHouseClient {
    /// Creates a new ClickHouse client.
    ///
    /// No request is made; use [`crate::health::check_connection`] to verify
    /// the server is reachable.
    pub fn new(config: ClickHouseConfig) -> Self {
        let mut client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database);

        if let Some(ref user) = config.username {
            client = client.with_user(user);
        }

        if let Some(ref pass) = config.password {
            client = client.with_password(pass);
        }

        info!(
            url = %config.url,
            database = %config.database,
            "Created ClickHouse client"
        );

        Self {
            inner: client,
            config,
        }
    }

    /// Returns the inner clickhouse client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// A handle bound to the `default` database, for DDL that must run
    /// before the configured database exists.
    pub(crate) fn admin(&self) -> Client {
        self.inner.clone().with_database("default")
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClickHouseConfig {
        &self.config
    }

    /// Fully qualified name of a table in the configured database.
    pub fn table(&self, name: &str) -> String {
        format!("{}.{}", self.config.database, name)
    }
}

/// Maps a driver error onto the pipeline error taxonomy.
///
/// Transport failures become connection errors so the driver can tell a
/// dead server apart from a rejected row.
pub(crate) fn map_error(context: &str, e: clickhouse::error::Error) -> Error {
    use clickhouse::error::Error as ChError;

    match e {
        ChError::Network(_) | ChError::TimedOut => {
            Error::connection(Backend::StructuredStore, format!("{}: {}", context, e))
        }
        other => Error::store(Backend::StructuredStore, format!("{}: {}", context, other)),
    }
}
