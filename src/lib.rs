//! snowrs - An async client over callback-based database drivers
//!
//! # Example
//! ```ignore
//! use snowrs::{ConnectionConfig, QueryRequest, SnowRsClient};
//!
//! // Create the client; nothing is opened yet
//! let client = SnowRsClient::new(ConnectionConfig::new("db.internal", "app", "secret"));
//! client.connect().await?;
//!
//! // Execute a parameterized query
//! let result = client
//!     .execute(QueryRequest::new("SELECT id, name FROM users WHERE name = ?").bind("John"))
//!     .await?;
//!
//! for row in result.rows_ref() {
//!     let id = row.get("id")?;
//!     let name = row.get("name")?;
//! }
//! ```

pub mod config;
pub mod drivers;
pub mod error;
pub mod traits;
pub mod types;

mod client;
mod completion;

// Re-export main types for convenient access
pub use client::SnowRsClient;
pub use config::ConnectionConfig;
pub use error::{DriverError, Result, SnowRsError};
pub use traits::{ConnectCallback, DatabaseDriver, ExecuteCallback};
pub use types::{
    ConnectionHandle, ExecuteCompletion, ExecuteRequest, QueryRequest, QueryResult, Row, SqlValue,
    Statement,
};
