//! Schema inspection operations. These run pre-vetted statements through
//! the executor's scoped connection, never through the validator: their
//! text is static except for bound parameters and backtick-quoted
//! identifiers.

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use sqlx::mysql::MySqlConnection;

use crate::error::GateError;
use crate::executor::{Executor, ExecutorError};
use crate::shape::{JsonRow, row_to_json};

#[derive(Debug, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub nullable: bool,
    pub key: String,
    pub default: JsonValue,
    pub extra: String,
}

#[derive(Debug, Serialize)]
pub struct DatabaseInfo {
    pub database_name: Option<String>,
    pub engine_version: Option<String>,
    pub current_user: Option<String>,
    pub table_count: usize,
}

/// MySQL identifiers cannot be bound as parameters, so caller-supplied
/// table names are backtick-quoted with embedded backticks doubled.
fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Existence check with a bound parameter, run before any schema query
/// that has to splice the table name in as an identifier.
async fn ensure_table_exists(executor: &Executor, table_name: &str) -> Result<(), GateError> {
    let result = executor
        .fetch_shaped(
            "SELECT TABLE_NAME FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?"
                .to_string(),
            vec![json!(table_name)],
        )
        .await?;

    if result.row_count == 0 {
        return Err(GateError::TableNotFound(table_name.to_string()));
    }
    Ok(())
}

pub async fn list_tables(executor: &Executor) -> Result<Vec<String>, GateError> {
    let result = executor
        .fetch_shaped("SHOW TABLES".to_string(), Vec::new())
        .await?;

    let mut names: Vec<String> = result
        .rows
        .iter()
        .filter_map(|row| row.values().next())
        .filter_map(|value| value.as_str().map(str::to_string))
        .collect();
    names.sort();

    Ok(names)
}

pub async fn describe_table(
    executor: &Executor,
    table_name: &str,
) -> Result<Vec<ColumnDescriptor>, GateError> {
    ensure_table_exists(executor, table_name).await?;

    let result = executor
        .fetch_shaped(format!("DESCRIBE {}", quote_ident(table_name)), Vec::new())
        .await?;

    Ok(result.rows.into_iter().map(column_descriptor).collect())
}

fn column_descriptor(row: JsonRow) -> ColumnDescriptor {
    let text = |key: &str| {
        row.get(key)
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_string()
    };

    ColumnDescriptor {
        name: text("Field"),
        column_type: text("Type"),
        nullable: row.get("Null").and_then(JsonValue::as_str) == Some("YES"),
        key: text("Key"),
        default: row.get("Default").cloned().unwrap_or(JsonValue::Null),
        extra: text("Extra"),
    }
}

pub async fn show_table_indexes(
    executor: &Executor,
    table_name: &str,
) -> Result<Vec<JsonRow>, GateError> {
    ensure_table_exists(executor, table_name).await?;

    let result = executor
        .fetch_shaped(
            format!("SHOW INDEX FROM {}", quote_ident(table_name)),
            Vec::new(),
        )
        .await?;

    Ok(result.rows)
}

pub async fn show_create_table(
    executor: &Executor,
    table_name: &str,
) -> Result<String, GateError> {
    ensure_table_exists(executor, table_name).await?;

    let result = executor
        .fetch_shaped(
            format!("SHOW CREATE TABLE {}", quote_ident(table_name)),
            Vec::new(),
        )
        .await?;

    // Row shape: (Table, Create Table)
    result
        .rows
        .first()
        .and_then(|row| row.values().nth(1))
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            GateError::Internal(format!(
                "Could not retrieve CREATE TABLE statement for '{table_name}'"
            ))
        })
}

/// Collects general server information over a single scoped connection.
pub async fn get_database_info(executor: &Executor) -> Result<DatabaseInfo, GateError> {
    let info = executor
        .with_connection(|conn: &mut MySqlConnection| {
            Box::pin(async move {
                let database_name = fetch_scalar(conn, "SELECT DATABASE()").await?;
                let engine_version = fetch_scalar(conn, "SELECT VERSION()").await?;
                let current_user = fetch_scalar(conn, "SELECT USER()").await?;

                let tables = sqlx::query("SHOW TABLES").fetch_all(&mut *conn).await?;

                Ok(DatabaseInfo {
                    database_name,
                    engine_version,
                    current_user,
                    table_count: tables.len(),
                })
            })
        })
        .await?;

    Ok(info)
}

fn fetch_scalar<'c>(
    conn: &'c mut MySqlConnection,
    statement: &'static str,
) -> BoxFuture<'c, Result<Option<String>, ExecutorError>> {
    Box::pin(async move {
        let row = sqlx::query(statement).fetch_optional(&mut *conn).await?;
        Ok(row
            .map(row_to_json)
            .and_then(|shaped| shaped.values().next().cloned())
            .and_then(|value| value.as_str().map(str::to_string)))
    })
}

/// Finds tables whose comment matches a caller-supplied keyword. The
/// keyword goes in as a bound LIKE pattern, never spliced into the text.
pub async fn search_tables(
    executor: &Executor,
    database: &str,
    keyword: &str,
) -> Result<Vec<JsonRow>, GateError> {
    let pattern = format!("%{keyword}%");
    let result = executor
        .fetch_shaped(
            "SELECT TABLE_SCHEMA, TABLE_NAME, TABLE_COMMENT \
             FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = ? AND TABLE_COMMENT LIKE ?"
                .to_string(),
            vec![json!(database), json!(pattern)],
        )
        .await?;

    Ok(result.rows)
}

/// Column name/comment listing for a set of tables, one bound placeholder
/// per table name.
pub async fn describe_columns(
    executor: &Executor,
    database: &str,
    tables: &[String],
) -> Result<Vec<JsonRow>, GateError> {
    let names: Vec<&str> = tables
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();

    if names.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; names.len()].join(", ");
    let statement = format!(
        "SELECT TABLE_NAME, COLUMN_NAME, COLUMN_COMMENT \
         FROM information_schema.COLUMNS \
         WHERE TABLE_SCHEMA = ? AND TABLE_NAME IN ({placeholders}) \
         ORDER BY TABLE_NAME, ORDINAL_POSITION"
    );

    let mut params = vec![json!(database)];
    params.extend(names.iter().map(|name| json!(name)));

    let result = executor.fetch_shaped(statement, params).await?;
    Ok(result.rows)
}

/// InnoDB lock-wait inspection. Static text, isolated from the validator
/// path by construction.
const LOCK_WAITS_SQL: &str = "SELECT \
    p2.`HOST` AS waiting_host, \
    p2.`USER` AS waiting_user, \
    r.trx_id AS waiting_trx_id, \
    r.trx_mysql_thread_id AS waiting_thread, \
    TIMESTAMPDIFF(SECOND, r.trx_wait_started, CURRENT_TIMESTAMP) AS wait_seconds, \
    r.trx_query AS waiting_query, \
    m.LOCK_MODE AS waiting_lock_mode, \
    m.LOCK_TYPE AS waiting_lock_type, \
    m.INDEX_NAME AS waiting_lock_index, \
    m.OBJECT_SCHEMA AS waiting_lock_schema, \
    m.OBJECT_NAME AS waiting_lock_table, \
    m.LOCK_DATA AS waiting_lock_data, \
    p.`HOST` AS blocking_host, \
    p.`USER` AS blocking_user, \
    b.trx_id AS blocking_trx_id, \
    b.trx_mysql_thread_id AS blocking_thread, \
    b.trx_query AS blocking_query, \
    l.LOCK_MODE AS blocking_lock_mode, \
    l.LOCK_TYPE AS blocking_lock_type, \
    l.INDEX_NAME AS blocking_lock_index, \
    l.OBJECT_SCHEMA AS blocking_lock_schema, \
    l.OBJECT_NAME AS blocking_lock_table, \
    l.LOCK_DATA AS blocking_lock_data, \
    IF(p.COMMAND = 'Sleep', p.TIME, 0) AS blocking_idle_seconds \
    FROM performance_schema.data_lock_waits w \
    INNER JOIN performance_schema.data_locks l ON w.BLOCKING_ENGINE_LOCK_ID = l.ENGINE_LOCK_ID \
    INNER JOIN performance_schema.data_locks m ON w.REQUESTING_ENGINE_LOCK_ID = m.ENGINE_LOCK_ID \
    INNER JOIN information_schema.INNODB_TRX b ON b.trx_id = w.BLOCKING_ENGINE_TRANSACTION_ID \
    INNER JOIN information_schema.INNODB_TRX r ON r.trx_id = w.REQUESTING_ENGINE_TRANSACTION_ID \
    INNER JOIN information_schema.PROCESSLIST p ON p.ID = b.trx_mysql_thread_id \
    INNER JOIN information_schema.PROCESSLIST p2 ON p2.ID = r.trx_mysql_thread_id \
    ORDER BY wait_seconds DESC";

pub async fn lock_waits(executor: &Executor) -> Result<Vec<JsonRow>, GateError> {
    let result = executor
        .fetch_shaped(LOCK_WAITS_SQL.to_string(), Vec::new())
        .await?;
    Ok(result.rows)
}
