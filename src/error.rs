use thiserror::Error;

/// Error type for snowrs operations
#[derive(Debug, Error)]
pub enum SnowRsError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Driver dropped the completion callback without invoking it")]
    CallbackDropped,

    #[error("Expected {expected} row(s), got {actual}")]
    UnexpectedRowCount { expected: usize, actual: usize },

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SnowRsError {
    /// The message text reported by the driver, for connect and query failures.
    pub fn driver_message(&self) -> Option<&str> {
        match self {
            SnowRsError::ConnectionFailed(message) | SnowRsError::QueryFailed(message) => {
                Some(message)
            }
            _ => None,
        }
    }
}

/// Result type alias for snowrs operations
pub type Result<T> = std::result::Result<T, SnowRsError>;

/// A failure reported by a driver through a completion callback.
///
/// Drivers may attach a vendor error code and SQL state; the client only
/// forwards `message` to its callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}{}", code_suffix(.code))]
pub struct DriverError {
    pub message: String,
    pub code: Option<String>,
    pub sql_state: Option<String>,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            sql_state: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_sql_state(mut self, sql_state: impl Into<String>) -> Self {
        self.sql_state = Some(sql_state.into());
        self
    }
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_ref()
        .map(|code| format!(" ({})", code))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_message_is_verbatim() {
        let err = SnowRsError::QueryFailed("syntax error".to_string());
        assert_eq!(err.driver_message(), Some("syntax error"));
        assert_eq!(err.to_string(), "Query failed: syntax error");

        let err = SnowRsError::ConnectionFailed("bad password".to_string());
        assert_eq!(err.driver_message(), Some("bad password"));
    }

    #[test]
    fn test_driver_message_absent_for_local_errors() {
        assert_eq!(SnowRsError::CallbackDropped.driver_message(), None);
        assert_eq!(
            SnowRsError::ColumnNotFound("id".to_string()).driver_message(),
            None
        );
    }

    #[test]
    fn test_driver_error_display() {
        assert_eq!(DriverError::new("boom").to_string(), "boom");
        let err = DriverError::new("boom").with_code("002003").with_sql_state("42S02");
        assert_eq!(err.to_string(), "boom (002003)");
        assert_eq!(err.sql_state.as_deref(), Some("42S02"));
    }

    #[test]
    fn test_driver_error_is_std_error() {
        let err: Box<dyn std::error::Error> = Box::new(DriverError::new("boom").with_code("7"));
        assert_eq!(err.to_string(), "boom (7)");
        assert!(err.source().is_none());
    }
}
