use actix_web::{http::header, web, HttpResponse, Responder};
use chrono::Utc;
use humantime::format_duration;
use serde::Serialize;
use std::time::Duration;

use crate::{constants::START_TIME, AppState};

#[derive(Serialize)]
struct HealthCheckResponse {
    status: &'static str,
    timestamp: String,
    version: &'static str,
    service: String,
    uptime: String,
}

pub async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let now_utc = Utc::now();
    let uptime = now_utc.signed_duration_since(*START_TIME);
    let uptime = format_duration(Duration::from_secs(uptime.num_seconds().max(0) as u64));

    HttpResponse::Ok()
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .json(HealthCheckResponse {
            status: "healthy",
            timestamp: now_utc.to_rfc3339(),
            version: env!("CARGO_PKG_VERSION"),
            service: state.config.name.clone(),
            uptime: uptime.to_string(),
        })
}
