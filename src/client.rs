use std::sync::Arc;

use tracing::{debug, warn};

use crate::completion::completion;
use crate::config::ConnectionConfig;
use crate::drivers::TokioPostgresDriver;
use crate::error::{Result, SnowRsError};
use crate::traits::DatabaseDriver;
use crate::types::{ConnectionHandle, ExecuteRequest, QueryRequest, QueryResult};

/// Main entry point for snowrs.
/// Owns one driver connection and exposes its callbacks as `async` methods.
///
/// Calls are not serialized: concurrent `execute` calls reach the driver
/// as they are made, and completion order is whatever the driver provides.
pub struct SnowRsClient {
    config: ConnectionConfig,
    driver: Arc<dyn DatabaseDriver>,
}

impl SnowRsClient {
    /// Create a client backed by the bundled tokio-postgres driver.
    /// No network connection is opened until [`SnowRsClient::connect`].
    ///
    /// The driver runs its work on a Tokio runtime: the one current when a
    /// call is made, or else the one current here. Without either, `connect`
    /// and `execute` fail with a driver error instead of panicking.
    ///
    /// # Example
    /// ```ignore
    /// let client = SnowRsClient::new(ConnectionConfig::new("db.internal", "app", "secret"));
    /// client.connect().await?;
    /// ```
    pub fn new(config: ConnectionConfig) -> Self {
        let driver = TokioPostgresDriver::new(&config);
        Self {
            config,
            driver: Arc::new(driver),
        }
    }

    /// Create a new client with a custom driver.
    /// Useful for testing or using alternative database drivers.
    pub fn with_driver(config: ConnectionConfig, driver: Arc<dyn DatabaseDriver>) -> Self {
        Self { config, driver }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Open the driver's connection.
    pub async fn connect(&self) -> Result<ConnectionHandle> {
        debug!(
            account = %self.config.account,
            username = %self.config.username,
            "opening connection"
        );

        let (complete, pending) = completion();
        self.driver.connect(complete);

        match pending.wait().await? {
            Ok(handle) => {
                debug!(connection = %handle.id(), "connection open");
                Ok(handle)
            }
            Err(e) => {
                warn!(account = %self.config.account, error = %e, "connection failed");
                Err(SnowRsError::ConnectionFailed(e.message))
            }
        }
    }

    /// Execute a parameterized query over the connection.
    ///
    /// # Example
    /// ```ignore
    /// let result = client
    ///     .execute(QueryRequest::new("SELECT * FROM t WHERE id = ?").bind("42"))
    ///     .await?;
    /// ```
    pub async fn execute(&self, request: QueryRequest) -> Result<QueryResult> {
        debug!(
            sql = %request.sql_text,
            binds = request.bindings.len(),
            "executing statement"
        );

        let (complete, pending) = completion();
        self.driver.execute(ExecuteRequest::from(request), complete);

        match pending.wait().await? {
            Ok(done) => {
                let result = QueryResult::new(done.statement, done.rows);
                debug!(rows = result.len(), "statement complete");
                Ok(result)
            }
            Err(e) => {
                warn!(error = %e, "statement failed");
                Err(SnowRsError::QueryFailed(e.message))
            }
        }
    }
}

impl std::fmt::Debug for SnowRsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnowRsClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
