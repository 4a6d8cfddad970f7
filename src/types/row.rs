use crate::error::{Result, SnowRsError};
use crate::types::{SqlValue, Statement};

/// A single untyped result record.
/// Values keep the column order the driver reported.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<(String, SqlValue)>,
}

impl Row {
    /// Creates a new Row from column names and values.
    /// Extra names or values beyond the shorter of the two are ignored.
    pub fn new(columns: &[String], values: Vec<SqlValue>) -> Self {
        let values = columns
            .iter()
            .zip(values)
            .map(|(col, val)| (col.clone(), val))
            .collect();
        Self { values }
    }

    /// Gets a value by column name.
    pub fn get(&self, column: &str) -> Result<&SqlValue> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
            .ok_or_else(|| SnowRsError::ColumnNotFound(column.to_string()))
    }

    /// Returns all column names in this row, in order.
    pub fn columns(&self) -> Vec<&str> {
        self.values.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Returns all values in this row, in column order.
    pub fn values(&self) -> impl Iterator<Item = &SqlValue> {
        self.values.iter().map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Result of one `execute` call: the statement descriptor and its rows.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    stmt: Statement,
    results: Vec<Row>,
}

impl QueryResult {
    /// Builds a result, treating an absent row collection as empty.
    pub fn new(stmt: Statement, rows: Option<Vec<Row>>) -> Self {
        Self {
            stmt,
            results: rows.unwrap_or_default(),
        }
    }

    /// The statement descriptor reported by the driver.
    pub fn stmt(&self) -> &Statement {
        &self.stmt
    }

    /// Extracts a single row from the result.
    /// Returns an error if the result contains zero or more than one row.
    pub fn single_row(self) -> Result<Row> {
        let actual = self.results.len();
        match <[Row; 1]>::try_from(self.results) {
            Ok([row]) => Ok(row),
            Err(_) => Err(SnowRsError::UnexpectedRowCount {
                expected: 1,
                actual,
            }),
        }
    }

    /// Returns all rows from the result.
    pub fn rows(self) -> Vec<Row> {
        self.results
    }

    /// Returns a reference to the rows without consuming the result.
    pub fn rows_ref(&self) -> &[Row] {
        &self.results
    }

    /// Splits the result into its statement descriptor and rows.
    pub fn into_parts(self) -> (Statement, Vec<Row>) {
        (self.stmt, self.results)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
