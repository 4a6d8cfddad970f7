use crate::types::Row;

/// Value handed back by a driver once its connection is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHandle {
    id: String,
}

impl ConnectionHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Driver-chosen identifier for the open connection.
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// A parameterized query as supplied by the caller.
/// Each binding fills one `?` placeholder in `sql_text`, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub bindings: Vec<String>,
    pub sql_text: String,
}

impl QueryRequest {
    pub fn new(sql_text: impl Into<String>) -> Self {
        Self {
            bindings: Vec::new(),
            sql_text: sql_text.into(),
        }
    }

    /// Append a binding for the next placeholder.
    pub fn bind(mut self, value: impl Into<String>) -> Self {
        self.bindings.push(value.into());
        self
    }

    /// Append several bindings in order.
    pub fn bind_all<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bindings.extend(values.into_iter().map(Into::into));
        self
    }
}

/// The request a driver receives for one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteRequest {
    pub binds: Vec<String>,
    pub sql_text: String,
}

impl From<QueryRequest> for ExecuteRequest {
    fn from(request: QueryRequest) -> Self {
        Self {
            binds: request.bindings,
            sql_text: request.sql_text,
        }
    }
}

/// Driver-provided descriptor of an executed statement.
/// Carries metadata only; the data rows travel separately.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Statement {
    pub sql_text: String,
    pub statement_id: Option<String>,
    pub columns: Vec<String>,
    pub num_updated_rows: Option<u64>,
}

impl Statement {
    pub fn new(sql_text: impl Into<String>) -> Self {
        Self {
            sql_text: sql_text.into(),
            ..Self::default()
        }
    }

    pub fn with_statement_id(mut self, id: impl Into<String>) -> Self {
        self.statement_id = Some(id.into());
        self
    }

    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_num_updated_rows(mut self, n: u64) -> Self {
        self.num_updated_rows = Some(n);
        self
    }
}

/// Successful outcome of a driver execution.
/// `rows` is `None` when the driver produced no row collection at all.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteCompletion {
    pub statement: Statement,
    pub rows: Option<Vec<Row>>,
}

impl ExecuteCompletion {
    pub fn new(statement: Statement, rows: Option<Vec<Row>>) -> Self {
        Self { statement, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_request_binds_in_order() {
        let request = QueryRequest::new("SELECT * FROM t WHERE a = ? AND b = ? AND c = ?")
            .bind("v1")
            .bind_all(["v2", "v3"]);
        assert_eq!(request.bindings, vec!["v1", "v2", "v3"]);
    }

    #[test]
    fn test_execute_request_from_query_request() {
        let request = QueryRequest::new("SELECT ?").bind("x");
        let execute = ExecuteRequest::from(request);
        assert_eq!(execute.binds, vec!["x".to_string()]);
        assert_eq!(execute.sql_text, "SELECT ?");
    }
}
