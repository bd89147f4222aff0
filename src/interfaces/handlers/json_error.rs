use actix_web::{http::StatusCode, HttpResponse, ResponseError};

use crate::errors::AppError;

pub fn json_error(status: StatusCode, error: &str) -> HttpResponse {
    HttpResponse::build(status).json(serde_json::json!({
        "error": error,
        "status": status.as_u16(),
    }))
}

pub async fn method_not_allowed() -> HttpResponse {
    AppError::MethodNotAllowed.error_response()
}

pub async fn not_found() -> HttpResponse {
    json_error(StatusCode::NOT_FOUND, "Not found")
}
