//! ClickHouse client wrapper.

use crate::config::ClickHouseConfig;
use analytics_core::{Error, Result};
use clickhouse::Client;
use tracing::info;

/// Name of the database every server has.
const SYSTEM_DEFAULT_DATABASE: &str = "default";

/// ClickHouse client bound to the analytics database.
#[derive(Clone)]
pub struct ClickHouseClient {
    inner: Client,
    server: Client,
    config: ClickHouseConfig,
}

impl ClickHouseClient {
    /// Creates a new ClickHouse client. No connection is made until the
    /// first query.
    pub fn new(config: ClickHouseConfig) -> Result<Self> {
        if config.database.is_empty()
            || !config
                .database
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(Error::config(format!(
                "invalid ClickHouse database name {:?}",
                config.database
            )));
        }

        let mut server = Client::default()
            .with_url(&config.url)
            .with_option("max_execution_time", config.timeout_secs.to_string());

        if let Some(ref user) = config.username {
            server = server.with_user(user);
        }

        if let Some(ref pass) = config.password {
            server = server.with_password(pass);
        }

        let inner = server.clone().with_database(&config.database);
        let server = server.with_database(SYSTEM_DEFAULT_DATABASE);

        info!(
            url = %config.url,
            database = %config.database,
            "Created ClickHouse client"
        );

        Ok(Self {
            inner,
            server,
            config,
        })
    }

    /// Client whose default database is the analytics database.
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// Client on the server's `default` database, for DDL that must run
    /// before the analytics database exists.
    pub fn server(&self) -> &Client {
        &self.server
    }

    pub fn database(&self) -> &str {
        &self.config.database
    }

    pub fn config(&self) -> &ClickHouseConfig {
        &self.config
    }
}
