mod driver;

pub use driver::{ConnectCallback, DatabaseDriver, ExecuteCallback};
