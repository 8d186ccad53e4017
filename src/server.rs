use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::config::Config;
use crate::error::GateError;
use crate::executor::{Executor, QueryRequest};
use crate::export::{ExportFormat, save_query_results};
use crate::inspect;
use crate::shape::JsonRow;
use crate::validator::validate;

pub struct AppState {
    pub config: Config,
    pub executor: Executor,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let executor = Executor::new(&config.database);
        Self { config, executor }
    }
}

/// The primary gated operation: validate, plan, execute, shape.
/// Rejection paths never open a database connection.
pub async fn query_handler(
    state: web::Data<AppState>,
    body: web::Json<QueryRequest>,
) -> Result<HttpResponse, GateError> {
    let validated = validate(&body.query)?;

    let response = state
        .executor
        .read_query(&validated, body.params.clone(), body.fetch_all, body.row_limit)
        .await?;

    Ok(HttpResponse::Ok().json(response))
}

pub async fn list_tables_handler(
    state: web::Data<AppState>,
) -> Result<HttpResponse, GateError> {
    let tables = inspect::list_tables(&state.executor).await?;
    Ok(HttpResponse::Ok().json(tables))
}

#[derive(Deserialize)]
pub struct SearchTablesParams {
    pub comment: String,
}

pub async fn search_tables_handler(
    state: web::Data<AppState>,
    params: web::Query<SearchTablesParams>,
) -> Result<HttpResponse, GateError> {
    let matches = inspect::search_tables(
        &state.executor,
        &state.config.database.database,
        &params.comment,
    )
    .await?;
    Ok(HttpResponse::Ok().json(matches))
}

pub async fn table_columns_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, GateError> {
    let columns = inspect::describe_table(&state.executor, &path).await?;
    Ok(HttpResponse::Ok().json(columns))
}

pub async fn table_indexes_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, GateError> {
    let indexes = inspect::show_table_indexes(&state.executor, &path).await?;
    Ok(HttpResponse::Ok().json(indexes))
}

pub async fn table_create_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, GateError> {
    let statement = inspect::show_create_table(&state.executor, &path).await?;
    Ok(HttpResponse::Ok().json(statement))
}

#[derive(Deserialize)]
pub struct DescribeColumnsRequest {
    pub tables: Vec<String>,
}

pub async fn describe_columns_handler(
    state: web::Data<AppState>,
    body: web::Json<DescribeColumnsRequest>,
) -> Result<HttpResponse, GateError> {
    let columns = inspect::describe_columns(
        &state.executor,
        &state.config.database.database,
        &body.tables,
    )
    .await?;
    Ok(HttpResponse::Ok().json(columns))
}

pub async fn info_handler(state: web::Data<AppState>) -> Result<HttpResponse, GateError> {
    let info = inspect::get_database_info(&state.executor).await?;
    Ok(HttpResponse::Ok().json(info))
}

pub async fn locks_handler(state: web::Data<AppState>) -> Result<HttpResponse, GateError> {
    let locks = inspect::lock_waits(&state.executor).await?;
    Ok(HttpResponse::Ok().json(locks))
}

#[derive(Deserialize)]
pub struct ExportRequest {
    pub query: String,
    pub data: Vec<JsonRow>,
    pub format: ExportFormat,
    #[serde(default)]
    pub params: Vec<JsonValue>,
    #[serde(default)]
    pub filename: Option<String>,
}

/// Export failures are reported in-band, never as an HTTP error: the
/// query result the caller already holds stays valid either way.
pub async fn export_handler(
    state: web::Data<AppState>,
    body: web::Json<ExportRequest>,
) -> Result<HttpResponse, GateError> {
    let outcome = save_query_results(
        &state.config.export_dir,
        &body.query,
        &body.data,
        body.format,
        &body.params,
        body.filename.as_deref(),
    );

    Ok(HttpResponse::Ok().json(outcome))
}

pub async fn health_handler() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok"
    }))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_handler))
        .route("/query", web::post().to(query_handler))
        .route("/tables", web::get().to(list_tables_handler))
        .route("/tables/search", web::get().to(search_tables_handler))
        .route("/tables/columns", web::post().to(describe_columns_handler))
        .route("/tables/{table}/columns", web::get().to(table_columns_handler))
        .route("/tables/{table}/indexes", web::get().to(table_indexes_handler))
        .route("/tables/{table}/create", web::get().to(table_create_handler))
        .route("/info", web::get().to(info_handler))
        .route("/locks", web::get().to(locks_handler))
        .route("/export", web::post().to(export_handler));
}
