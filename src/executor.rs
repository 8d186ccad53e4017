use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlConnection};
use sqlx::{ConnectOptions, Connection};
use thiserror::Error;

use crate::config::DatabaseConfig;
use crate::shape::{ResultSet, shape};
use crate::validator::ValidatedQuery;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("MySQL error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub params: Vec<JsonValue>,
    #[serde(default = "default_fetch_all")]
    pub fetch_all: bool,
    #[serde(default = "default_row_limit")]
    pub row_limit: u32,
}

fn default_fetch_all() -> bool {
    true
}

fn default_row_limit() -> u32 {
    1000
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub data: Vec<crate::shape::JsonRow>,
    pub metadata: QueryMetadata,
}

#[derive(Debug, Serialize)]
pub struct QueryMetadata {
    pub query: String,
    pub params: Vec<JsonValue>,
    pub row_count: usize,
    pub fetch_all: bool,
    pub row_limit: u32,
    pub timestamp: String,
}

/// The statement actually sent to the database: the accepted text, with a
/// row cap appended iff it is a top-level select without a limit clause.
/// Pure; does not re-validate.
pub fn plan_statement(query: &ValidatedQuery, row_limit: u32) -> String {
    let normalized = query.normalized();

    let is_select = normalized.starts_with("select");
    let has_limit = normalized
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .any(|word| word == "limit");

    if is_select && !has_limit {
        format!("{} LIMIT {}", query.text(), row_limit)
    } else {
        query.text().to_string()
    }
}

/// Executes pre-vetted statements against MySQL. Holds connection options
/// only: a fresh connection is opened per call and released on every exit
/// path, never shared or pooled across calls.
pub struct Executor {
    options: MySqlConnectOptions,
}

impl Executor {
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            options: config.connect_options(),
        }
    }

    /// Scoped connection helper: acquire, run the body, release. Release
    /// happens whether the body succeeded or failed, so every call site
    /// gets identical guarantees.
    pub async fn with_connection<T, F>(&self, body: F) -> Result<T, ExecutorError>
    where
        F: for<'c> FnOnce(&'c mut MySqlConnection) -> BoxFuture<'c, Result<T, ExecutorError>>,
    {
        let mut conn = self.options.connect().await?;
        let result = body(&mut conn).await;
        let _ = conn.close().await;
        result
    }

    /// Executes a validated read query. Requires a prior accept verdict;
    /// rejected input never reaches this point.
    pub async fn read_query(
        &self,
        validated: &ValidatedQuery,
        params: Vec<JsonValue>,
        fetch_all: bool,
        row_limit: u32,
    ) -> Result<QueryResponse, ExecutorError> {
        let statement = plan_statement(validated, row_limit);

        let exec_statement = statement.clone();
        let exec_params = params.clone();
        let result = self
            .with_connection(move |conn: &mut MySqlConnection| {
                Box::pin(async move {
                    let mut query = sqlx::query(&exec_statement);
                    for param in &exec_params {
                        query = bind_json_value(query, param);
                    }

                    let raw_rows = if fetch_all {
                        query.fetch_all(&mut *conn).await?
                    } else {
                        // Fetch-one: an empty result yields no placeholder row.
                        query.fetch_optional(&mut *conn).await?.into_iter().collect()
                    };

                    Ok(shape(raw_rows))
                })
            })
            .await?;

        Ok(QueryResponse {
            metadata: QueryMetadata {
                query: statement,
                params,
                row_count: result.row_count,
                fetch_all,
                row_limit,
                timestamp: chrono::Local::now().to_rfc3339(),
            },
            data: result.rows,
        })
    }

    /// Runs a pre-vetted administrative statement (schema inspection and
    /// the like). These bypass the validator by design: their text is
    /// either static or built from bound parameters and quoted
    /// identifiers, never raw caller SQL.
    pub async fn fetch_shaped(
        &self,
        statement: String,
        params: Vec<JsonValue>,
    ) -> Result<ResultSet, ExecutorError> {
        self.with_connection(move |conn: &mut MySqlConnection| {
            Box::pin(async move {
                let mut query = sqlx::query(&statement);
                for param in &params {
                    query = bind_json_value(query, param);
                }
                let raw_rows = query.fetch_all(&mut *conn).await?;
                Ok(shape(raw_rows))
            })
        })
        .await
    }
}

pub fn bind_json_value<'q>(
    query: sqlx::query::Query<'q, sqlx::MySql, MySqlArguments>,
    value: &'q JsonValue,
) -> sqlx::query::Query<'q, sqlx::MySql, MySqlArguments> {
    match value {
        JsonValue::Null => query.bind(None::<String>),
        JsonValue::Bool(b) => query.bind(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(f) = n.as_f64() {
                query.bind(f)
            } else {
                query.bind(n.to_string())
            }
        }
        JsonValue::String(s) => query.bind(s.as_str()),
        JsonValue::Array(_) | JsonValue::Object(_) => query.bind(value),
    }
}
