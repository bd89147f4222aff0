use actix_web::{
    error::{JsonPayloadError, UrlencodedError},
    web,
};

use crate::errors::AppError;

/// Body size limits and JSON-shaped errors for every body extractor.
pub fn config_routes(cfg: &mut web::ServiceConfig, max_body_bytes: usize) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(max_body_bytes)
            .error_handler(|err, _req| json_payload_error(err).into()),
    )
    .app_data(
        web::FormConfig::default()
            .limit(max_body_bytes)
            .error_handler(|err, _req| form_payload_error(err).into()),
    )
    .app_data(web::PayloadConfig::new(max_body_bytes));
}

fn json_payload_error(err: JsonPayloadError) -> AppError {
    let message = match err {
        JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
            "Request body too large".to_string()
        }
        JsonPayloadError::ContentType => "Unsupported content type".to_string(),
        other => format!("JSON payload error: {}", other),
    };
    AppError::BadRequest(message)
}

fn form_payload_error(err: UrlencodedError) -> AppError {
    let message = match err {
        UrlencodedError::Overflow { .. } => "Request body too large".to_string(),
        UrlencodedError::ContentType => "Unsupported content type".to_string(),
        other => format!("Form payload error: {}", other),
    };
    AppError::BadRequest(message)
}
