mod row;
mod sql_value;
mod statement;

pub use row::{QueryResult, Row};
pub use sql_value::SqlValue;
pub use statement::{ConnectionHandle, ExecuteCompletion, ExecuteRequest, QueryRequest, Statement};
