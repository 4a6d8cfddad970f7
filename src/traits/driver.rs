use crate::error::DriverError;
use crate::types::{ConnectionHandle, ExecuteCompletion, ExecuteRequest};

/// Completion callback for opening a connection.
pub type ConnectCallback =
    Box<dyn FnOnce(std::result::Result<ConnectionHandle, DriverError>) + Send + 'static>;

/// Completion callback for executing a statement.
pub type ExecuteCallback =
    Box<dyn FnOnce(std::result::Result<ExecuteCompletion, DriverError>) + Send + 'static>;

/// Trait for callback-based database drivers.
///
/// A value implementing this trait is one connection object. Both operations
/// return immediately and report their outcome later by invoking `complete`
/// once, from any thread. Drivers own all I/O, ordering and connection state;
/// callers may invoke these methods concurrently.
pub trait DatabaseDriver: Send + Sync {
    /// Open the network connection.
    fn connect(&self, complete: ConnectCallback);

    /// Execute a statement, substituting `request.binds` into its `?` placeholders.
    fn execute(&self, request: ExecuteRequest, complete: ExecuteCallback);
}
