mod tokio_postgres;

pub use self::in_memory_test::{CompletionMode, InMemoryTestDriver, InMemoryTestResponseBuilder};
pub use self::tokio_postgres::TokioPostgresDriver;
