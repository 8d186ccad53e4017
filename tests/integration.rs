use actix_web::test;
use mysqlgate::config::{Config, DatabaseConfig, ServerConfig};
use mysqlgate::server::{AppState, configure_routes};
use serde_json::json;
use std::path::PathBuf;

/// Points at a port nothing listens on: accepted queries fail at connect
/// time, which lets the tests distinguish "rejected by the gate" (400,
/// no connection attempted) from "passed the gate" (500 from the driver).
fn test_config(export_dir: PathBuf) -> Config {
    Config {
        server: ServerConfig::default(),
        database: DatabaseConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            user: "gate".to_string(),
            password: "gate".to_string(),
            database: "gate_test".to_string(),
        },
        export_dir,
    }
}

async fn setup_app(
    config: Config,
) -> impl actix_web::dev::Service<
    actix_http::Request,
    Response = actix_web::dev::ServiceResponse,
    Error = actix_web::Error,
> {
    let state = actix_web::web::Data::new(AppState::new(config));

    test::init_service(
        actix_web::App::new()
            .app_data(state)
            .configure(configure_routes),
    )
    .await
}

#[actix_web::test]
async fn test_health_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let app = setup_app(test_config(dir.path().to_path_buf())).await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;

    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
}

#[actix_web::test]
async fn test_multiple_statements_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = setup_app(test_config(dir.path().to_path_buf())).await;

    let req = test::TestRequest::post()
        .uri("/query")
        .set_json(json!({"query": "SELECT 1; SELECT 2"}))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[actix_web::test]
async fn test_non_read_statement_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = setup_app(test_config(dir.path().to_path_buf())).await;

    let req = test::TestRequest::post()
        .uri("/query")
        .set_json(json!({"query": "INSERT INTO users (name) VALUES ('x')"}))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[actix_web::test]
async fn test_smuggled_keyword_rejected_with_keyword_named() {
    let dir = tempfile::tempdir().unwrap();
    let app = setup_app(test_config(dir.path().to_path_buf())).await;

    let req = test::TestRequest::post()
        .uri("/query")
        .set_json(json!({"query": "WITH d AS (DELETE FROM t) SELECT * FROM d"}))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["error"].as_str().unwrap().contains("delete"));
}

#[actix_web::test]
async fn test_keyword_in_literal_passes_gate() {
    let dir = tempfile::tempdir().unwrap();
    let app = setup_app(test_config(dir.path().to_path_buf())).await;

    // Accepted by the validator, so it reaches the (unreachable) database
    // and fails there instead of being rejected up front.
    let req = test::TestRequest::post()
        .uri("/query")
        .set_json(json!({"query": "SELECT * FROM logs WHERE msg = 'please do not DROP this'"}))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 500);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "DATABASE_ERROR");
}

#[actix_web::test]
async fn test_export_json_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let app = setup_app(test_config(dir.path().to_path_buf())).await;

    let req = test::TestRequest::post()
        .uri("/export")
        .set_json(json!({
            "query": "SELECT id, name FROM users",
            "format": "json",
            "filename": "roundtrip",
            "data": [
                {"id": 1, "name": "Alice"},
                {"id": 2, "name": "Bob"}
            ]
        }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["filename"], "roundtrip.json");
    assert_eq!(body["format"], "json");
    assert_eq!(body["row_count"], 2);

    let written = std::fs::read_to_string(dir.path().join("roundtrip.json")).unwrap();
    let document: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(document["metadata"]["row_count"], json!(2));
    assert_eq!(document["data"].as_array().unwrap().len(), 2);
}

#[actix_web::test]
async fn test_export_zero_rows_csv_reports_nothing_to_write() {
    let dir = tempfile::tempdir().unwrap();
    let app = setup_app(test_config(dir.path().to_path_buf())).await;

    let req = test::TestRequest::post()
        .uri("/export")
        .set_json(json!({
            "query": "SELECT * FROM empty",
            "format": "csv",
            "data": []
        }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["row_count"], 0);
    assert_eq!(body["status"], "no rows to write");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
