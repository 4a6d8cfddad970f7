use std::fmt::Display;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tokio::runtime::Handle;
use tokio::sync::RwLock;
use tokio_postgres::types::{FromSql, ToSql, Type};
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error};
use uuid::Uuid;

use crate::config::ConnectionConfig;
use crate::error::DriverError;
use crate::traits::{ConnectCallback, DatabaseDriver, ExecuteCallback};
use crate::types::{ConnectionHandle, ExecuteCompletion, ExecuteRequest, Row, SqlValue, Statement};

/// Callback-style PostgreSQL driver backed by tokio-postgres.
///
/// `account` is used as the server host. Work runs on the Tokio runtime that
/// is current when a call is made, or else on the one that was current at
/// construction. With neither, the call fails through its callback.
pub struct TokioPostgresDriver {
    config: tokio_postgres::Config,
    client: Arc<RwLock<Option<Arc<Client>>>>,
    runtime: Option<Handle>,
}

impl TokioPostgresDriver {
    /// Prepare a connection object. Nothing is opened until `connect`.
    pub fn new(config: &ConnectionConfig) -> Self {
        let mut pg_config = tokio_postgres::Config::new();
        pg_config
            .host(&config.account)
            .user(&config.username)
            .password(config.password.as_str());

        Self {
            config: pg_config,
            client: Arc::new(RwLock::new(None)),
            runtime: Handle::try_current().ok(),
        }
    }

    fn runtime(&self) -> Option<Handle> {
        Handle::try_current().ok().or_else(|| self.runtime.clone())
    }
}

impl DatabaseDriver for TokioPostgresDriver {
    fn connect(&self, complete: ConnectCallback) {
        let Some(runtime) = self.runtime() else {
            return complete(Err(no_runtime()));
        };
        let config = self.config.clone();
        let slot = Arc::clone(&self.client);

        runtime.spawn(async move {
            let (client, connection) = match config.connect(NoTls).await {
                Ok(pair) => pair,
                Err(e) => return complete(Err(driver_error(&e))),
            };

            // Spawn the connection handler
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    error!(error = %e, "PostgreSQL connection error");
                }
            });

            *slot.write().await = Some(Arc::new(client));
            let handle = ConnectionHandle::new(Uuid::new_v4().to_string());
            debug!(connection = %handle.id(), "PostgreSQL connection established");
            complete(Ok(handle));
        });
    }

    fn execute(&self, request: ExecuteRequest, complete: ExecuteCallback) {
        let Some(runtime) = self.runtime() else {
            return complete(Err(no_runtime()));
        };
        let slot = Arc::clone(&self.client);

        runtime.spawn(async move {
            let client = slot.read().await.clone();
            let outcome = match client {
                Some(client) => run_statement(&client, request).await,
                None => Err(DriverError::new("Connection is not open")),
            };
            complete(outcome);
        });
    }
}

async fn run_statement(
    client: &Client,
    request: ExecuteRequest,
) -> std::result::Result<ExecuteCompletion, DriverError> {
    let sql = rewrite_placeholders(&request.sql_text);

    // Parameter types are left to the server; binds are converted to match.
    let prepared = client.prepare(&sql).await.map_err(|e| driver_error(&e))?;

    let param_types = prepared.params();
    if param_types.len() != request.binds.len() {
        return Err(DriverError::new(format!(
            "Statement expects {} bind(s), got {}",
            param_types.len(),
            request.binds.len()
        )));
    }

    let converted_params = request
        .binds
        .iter()
        .zip(param_types)
        .enumerate()
        .map(|(i, (text, ty))| bind_value(text, ty, i + 1))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let param_refs: Vec<&(dyn ToSql + Sync)> = converted_params
        .iter()
        .map(|b| b.as_ref() as &(dyn ToSql + Sync))
        .collect();

    let columns: Vec<String> = prepared
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    // Refuse before running anything whose results could not be read back.
    let decoders = prepared
        .columns()
        .iter()
        .map(|c| {
            decoder_for(c.type_()).ok_or_else(|| {
                DriverError::new(format!(
                    "Unsupported type {} for column \"{}\"",
                    c.type_(),
                    c.name()
                ))
            })
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let statement = Statement::new(request.sql_text)
        .with_statement_id(Uuid::new_v4().to_string())
        .with_columns(columns.clone());

    if columns.is_empty() {
        let updated = client
            .execute(&prepared, &param_refs)
            .await
            .map_err(|e| driver_error(&e))?;
        return Ok(ExecuteCompletion::new(
            statement.with_num_updated_rows(updated),
            None,
        ));
    }

    let rows = client
        .query(&prepared, &param_refs)
        .await
        .map_err(|e| driver_error(&e))?;

    let rows = rows
        .iter()
        .map(|row| -> std::result::Result<Row, DriverError> {
            let values = decoders
                .iter()
                .enumerate()
                .map(|(i, decoder)| {
                    row_value(row, i, *decoder).map_err(|e| {
                        DriverError::new(format!(
                            "Cannot decode column \"{}\": {}",
                            columns[i], e
                        ))
                    })
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(Row::new(&columns, values))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(ExecuteCompletion::new(statement, Some(rows)))
}

/// Lexical context while scanning SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code,
    Literal { backslash_escapes: bool },
    Identifier,
    LineComment,
    BlockComment(usize),
}

/// Rewrite `?` placeholders to PostgreSQL's `$1`, `$2`, ...
/// Question marks inside literals, quoted identifiers and comments are left alone.
fn rewrite_placeholders(sql: &str) -> String {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len() + 8);
    let mut scan = Scan::Code;
    let mut n = 0;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        // Characters consumed as a pair, such as `''`, `\'`, `/*` and `*/`.
        let mut pair = false;

        match scan {
            Scan::Code => match c {
                '\'' => {
                    scan = Scan::Literal {
                        backslash_escapes: has_escape_prefix(&chars[..i]),
                    }
                }
                '"' => scan = Scan::Identifier,
                '-' if next == Some('-') => scan = Scan::LineComment,
                '/' if next == Some('*') => {
                    scan = Scan::BlockComment(1);
                    pair = true;
                }
                '?' => {
                    n += 1;
                    out.push('$');
                    out.push_str(&n.to_string());
                    i += 1;
                    continue;
                }
                _ => {}
            },
            Scan::Literal { backslash_escapes } => match c {
                '\\' if backslash_escapes && next.is_some() => pair = true,
                '\'' if next == Some('\'') => pair = true,
                '\'' => scan = Scan::Code,
                _ => {}
            },
            Scan::Identifier => {
                if c == '"' {
                    scan = Scan::Code;
                }
            }
            Scan::LineComment => {
                if c == '\n' {
                    scan = Scan::Code;
                }
            }
            Scan::BlockComment(depth) => {
                if c == '*' && next == Some('/') {
                    scan = if depth == 1 {
                        Scan::Code
                    } else {
                        Scan::BlockComment(depth - 1)
                    };
                    pair = true;
                } else if c == '/' && next == Some('*') {
                    scan = Scan::BlockComment(depth + 1);
                    pair = true;
                }
            }
        }

        out.push(c);
        i += 1;
        if pair {
            if let Some(next) = next {
                out.push(next);
                i += 1;
            }
        }
    }

    out
}

/// True when the text before a `'` ends in a standalone `E` or `e`.
fn has_escape_prefix(before: &[char]) -> bool {
    match before {
        [.., prev, e] => {
            matches!(e, 'E' | 'e') && !(prev.is_alphanumeric() || *prev == '_')
        }
        [e] => matches!(e, 'E' | 'e'),
        [] => false,
    }
}

/// Convert a text bind into the type the server inferred for its parameter.
fn bind_value(
    text: &str,
    ty: &Type,
    position: usize,
) -> std::result::Result<Box<dyn ToSql + Sync + Send>, DriverError> {
    let invalid = |e: &dyn Display| {
        DriverError::new(format!(
            "Invalid value for parameter ${} of type {}: {}",
            position, ty, e
        ))
    };

    let value: Box<dyn ToSql + Sync + Send> = if <String as ToSql>::accepts(ty) {
        Box::new(text.to_string())
    } else if *ty == Type::BOOL {
        Box::new(parse_bool(text).ok_or_else(|| invalid(&"expected a boolean"))?)
    } else if *ty == Type::INT2 {
        Box::new(text.trim().parse::<i16>().map_err(|e| invalid(&e))?)
    } else if *ty == Type::INT4 {
        Box::new(text.trim().parse::<i32>().map_err(|e| invalid(&e))?)
    } else if *ty == Type::INT8 {
        Box::new(text.trim().parse::<i64>().map_err(|e| invalid(&e))?)
    } else if *ty == Type::FLOAT4 {
        Box::new(text.trim().parse::<f32>().map_err(|e| invalid(&e))?)
    } else if *ty == Type::FLOAT8 {
        Box::new(text.trim().parse::<f64>().map_err(|e| invalid(&e))?)
    } else if *ty == Type::DATE {
        Box::new(text.trim().parse::<NaiveDate>().map_err(|e| invalid(&e))?)
    } else if *ty == Type::TIME {
        Box::new(text.trim().parse::<NaiveTime>().map_err(|e| invalid(&e))?)
    } else if *ty == Type::TIMESTAMP {
        let text = text.trim();
        let value = text
            .parse::<NaiveDateTime>()
            .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
            .map_err(|e| invalid(&e))?;
        Box::new(value)
    } else if *ty == Type::TIMESTAMPTZ {
        let value = DateTime::parse_from_rfc3339(text.trim()).map_err(|e| invalid(&e))?;
        Box::new(value.with_timezone(&Utc))
    } else if *ty == Type::UUID {
        Box::new(Uuid::parse_str(text.trim()).map_err(|e| invalid(&e))?)
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        Box::new(serde_json::from_str::<serde_json::Value>(text).map_err(|e| invalid(&e))?)
    } else {
        return Err(DriverError::new(format!(
            "Cannot bind text to parameter ${} of type {}",
            position, ty
        )));
    };

    Ok(value)
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "on" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// How a result column is read into a SqlValue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decoder {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Text,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Uuid,
    Json,
}

fn decoder_for(ty: &Type) -> Option<Decoder> {
    let decoder = if *ty == Type::BOOL {
        Decoder::Bool
    } else if *ty == Type::INT2 {
        Decoder::Int2
    } else if *ty == Type::INT4 {
        Decoder::Int4
    } else if *ty == Type::INT8 {
        Decoder::Int8
    } else if *ty == Type::FLOAT4 {
        Decoder::Float4
    } else if *ty == Type::FLOAT8 {
        Decoder::Float8
    } else if <String as FromSql>::accepts(ty) {
        Decoder::Text
    } else if *ty == Type::DATE {
        Decoder::Date
    } else if *ty == Type::TIME {
        Decoder::Time
    } else if *ty == Type::TIMESTAMP {
        Decoder::Timestamp
    } else if *ty == Type::TIMESTAMPTZ {
        Decoder::TimestampTz
    } else if *ty == Type::UUID {
        Decoder::Uuid
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        Decoder::Json
    } else {
        return None;
    };
    Some(decoder)
}

/// Read one cell. Only a real SQL NULL becomes `SqlValue::Null`.
/// Temporal, UUID and JSON values are rendered as text.
fn row_value(
    row: &tokio_postgres::Row,
    index: usize,
    decoder: Decoder,
) -> std::result::Result<SqlValue, tokio_postgres::Error> {
    let value = match decoder {
        Decoder::Bool => SqlValue::from(row.try_get::<_, Option<bool>>(index)?),
        Decoder::Int2 => SqlValue::from(row.try_get::<_, Option<i16>>(index)?.map(i64::from)),
        Decoder::Int4 => SqlValue::from(row.try_get::<_, Option<i32>>(index)?),
        Decoder::Int8 => SqlValue::from(row.try_get::<_, Option<i64>>(index)?),
        Decoder::Float4 => SqlValue::from(row.try_get::<_, Option<f32>>(index)?.map(f64::from)),
        Decoder::Float8 => SqlValue::from(row.try_get::<_, Option<f64>>(index)?),
        Decoder::Text => SqlValue::from(row.try_get::<_, Option<String>>(index)?),
        Decoder::Date => SqlValue::from(
            row.try_get::<_, Option<NaiveDate>>(index)?
                .map(|v| v.to_string()),
        ),
        Decoder::Time => SqlValue::from(
            row.try_get::<_, Option<NaiveTime>>(index)?
                .map(|v| v.to_string()),
        ),
        Decoder::Timestamp => SqlValue::from(
            row.try_get::<_, Option<NaiveDateTime>>(index)?
                .map(|v| v.to_string()),
        ),
        Decoder::TimestampTz => SqlValue::from(
            row.try_get::<_, Option<DateTime<Utc>>>(index)?
                .map(|v| v.to_rfc3339()),
        ),
        Decoder::Uuid => SqlValue::from(
            row.try_get::<_, Option<Uuid>>(index)?
                .map(|v| v.to_string()),
        ),
        Decoder::Json => SqlValue::from(
            row.try_get::<_, Option<serde_json::Value>>(index)?
                .map(|v| v.to_string()),
        ),
    };
    Ok(value)
}

fn no_runtime() -> DriverError {
    DriverError::new("No Tokio runtime available")
}

fn driver_error(e: &tokio_postgres::Error) -> DriverError {
    match e.as_db_error() {
        Some(db) => DriverError::new(db.message()).with_sql_state(db.code().code()),
        None => DriverError::new(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;
    use crate::completion::completion;

    type Outcome = std::result::Result<ExecuteCompletion, DriverError>;

    fn select_one() -> ExecuteRequest {
        ExecuteRequest {
            binds: vec![],
            sql_text: "SELECT 1".to_string(),
        }
    }

    #[test]
    fn test_rewrite_placeholders() {
        assert_eq!(
            rewrite_placeholders("SELECT * FROM t WHERE a=? AND b=?"),
            "SELECT * FROM t WHERE a=$1 AND b=$2"
        );
    }

    #[test]
    fn test_rewrite_placeholders_skips_literals() {
        assert_eq!(
            rewrite_placeholders("SELECT '?', \"a?\" FROM t WHERE c = ? AND d = 'it''s?'"),
            "SELECT '?', \"a?\" FROM t WHERE c = $1 AND d = 'it''s?'"
        );
    }

    #[test]
    fn test_rewrite_placeholders_escape_string() {
        assert_eq!(
            rewrite_placeholders("SELECT E'it\\'s ?' , ? "),
            "SELECT E'it\\'s ?' , $1 "
        );
        assert_eq!(
            rewrite_placeholders("SELECT e'a\\\\' , ?"),
            "SELECT e'a\\\\' , $1"
        );
    }

    #[test]
    fn test_rewrite_placeholders_backslash_in_plain_literal() {
        // Without the E prefix a backslash is an ordinary character.
        assert_eq!(
            rewrite_placeholders("SELECT 'C:\\' , ?, type'x?'"),
            "SELECT 'C:\\' , $1, type'x?'"
        );
    }

    #[test]
    fn test_rewrite_placeholders_skips_line_comment() {
        assert_eq!(
            rewrite_placeholders("SELECT a -- what's this?\nFROM t WHERE b = ?"),
            "SELECT a -- what's this?\nFROM t WHERE b = $1"
        );
    }

    #[test]
    fn test_rewrite_placeholders_skips_block_comment() {
        assert_eq!(
            rewrite_placeholders("SELECT /* don't /* nested? */ ask? */ a FROM t WHERE b = ? AND c = 3/?"),
            "SELECT /* don't /* nested? */ ask? */ a FROM t WHERE b = $1 AND c = 3/$2"
        );
    }

    #[test]
    fn test_rewrite_without_placeholders() {
        assert_eq!(rewrite_placeholders("SELECT 1"), "SELECT 1");
    }

    #[test]
    fn test_bind_value_follows_parameter_type() {
        assert!(bind_value("42", &Type::INT4, 1).is_ok());
        assert!(bind_value(" 7 ", &Type::INT8, 1).is_ok());
        assert!(bind_value("t", &Type::BOOL, 1).is_ok());
        assert!(bind_value("2024-01-02", &Type::DATE, 1).is_ok());
        assert!(bind_value("2024-01-02 03:04:05", &Type::TIMESTAMP, 1).is_ok());
        assert!(bind_value("2024-01-02T03:04:05+02:00", &Type::TIMESTAMPTZ, 1).is_ok());
        assert!(bind_value("{\"a\": 1}", &Type::JSONB, 1).is_ok());
        assert!(bind_value("anything", &Type::VARCHAR, 1).is_ok());
    }

    #[test]
    fn test_bind_value_rejects_bad_text() {
        let err = bind_value("abc", &Type::INT4, 2).err().unwrap();
        assert!(err.message.starts_with("Invalid value for parameter $2 of type int4"));

        let err = bind_value("maybe", &Type::BOOL, 1).err().unwrap();
        assert!(err.message.contains("expected a boolean"));
    }

    #[test]
    fn test_bind_value_unsupported_type() {
        let err = bind_value("1.5", &Type::NUMERIC, 3).err().unwrap();
        assert_eq!(err.message, "Cannot bind text to parameter $3 of type numeric");
    }

    #[test]
    fn test_decoder_for_known_types() {
        assert_eq!(decoder_for(&Type::INT4), Some(Decoder::Int4));
        assert_eq!(decoder_for(&Type::VARCHAR), Some(Decoder::Text));
        assert_eq!(decoder_for(&Type::TIMESTAMPTZ), Some(Decoder::TimestampTz));
        assert_eq!(decoder_for(&Type::UUID), Some(Decoder::Uuid));
        assert_eq!(decoder_for(&Type::JSONB), Some(Decoder::Json));
    }

    #[test]
    fn test_decoder_for_unsupported_types() {
        assert_eq!(decoder_for(&Type::NUMERIC), None);
        assert_eq!(decoder_for(&Type::BYTEA), None);
    }

    #[test]
    fn test_new_does_not_connect() {
        let driver = TokioPostgresDriver::new(&ConnectionConfig::new("db.invalid", "u", "p"));
        assert_eq!(driver.config.get_user(), Some("u"));
        assert!(driver.client.try_read().unwrap().is_none());
        assert!(driver.runtime.is_none());
    }

    #[tokio::test]
    async fn test_execute_before_connect_reports_error() {
        let driver = TokioPostgresDriver::new(&ConnectionConfig::new("db.invalid", "u", "p"));
        let (complete, pending) = completion();
        driver.execute(select_one(), complete);
        let err = pending.wait().await.unwrap().unwrap_err();
        assert_eq!(err.message, "Connection is not open");
    }

    #[test]
    fn test_execute_without_runtime_reports_error() {
        let driver = TokioPostgresDriver::new(&ConnectionConfig::new("db.invalid", "u", "p"));
        let (tx, rx) = mpsc::channel();
        driver.execute(select_one(), Box::new(move |outcome: Outcome| tx.send(outcome).unwrap()));
        let err = rx.recv().unwrap().unwrap_err();
        assert_eq!(err.message, "No Tokio runtime available");
    }

    #[test]
    fn test_execute_uses_runtime_captured_at_construction() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let driver = {
            let _guard = runtime.enter();
            TokioPostgresDriver::new(&ConnectionConfig::new("db.invalid", "u", "p"))
        };

        let (tx, rx) = mpsc::channel();
        driver.execute(select_one(), Box::new(move |outcome: Outcome| tx.send(outcome).unwrap()));
        let err = rx
            .recv_timeout(Duration::from_secs(5))
            .unwrap()
            .unwrap_err();
        assert_eq!(err.message, "Connection is not open");
    }
}
