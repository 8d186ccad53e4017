use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::executor::ExecutorError;
use crate::validator::ValidationError;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Executor(#[from] ExecutorError),

    #[error("Table '{0}' does not exist")]
    TableNotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl ResponseError for GateError {
    fn error_response(&self) -> HttpResponse {
        let (status, code) = match self {
            GateError::Validation(_) => {
                (actix_web::http::StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            }
            GateError::Executor(_) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
            ),
            GateError::TableNotFound(_) => {
                (actix_web::http::StatusCode::NOT_FOUND, "TABLE_NOT_FOUND")
            }
            GateError::Internal(_) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        };

        HttpResponse::build(status).json(ErrorResponse {
            error: self.to_string(),
            code,
        })
    }
}
