use actix_web::{web, HttpResponse, Responder};

use crate::{use_cases::extractors::AdminKey, AppState};

/// Counters since process start. `AdminKey` runs first, so a bad key is
/// rejected with 401 before the method is even considered.
pub async fn get_analytics(_admin: AdminKey, state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.analytics.snapshot())
}

pub async fn analytics_method_not_allowed(_admin: AdminKey) -> HttpResponse {
    crate::handlers::json_error::method_not_allowed().await
}
