use actix_web::web;

use crate::handlers::json_error::not_found;

mod api;
mod json_error;

pub fn configure_routes(cfg: &mut web::ServiceConfig, max_body_bytes: usize) {
    cfg.service(
        web::scope("/api")
            .configure(api::config_routes)
    );

    json_error::config_routes(cfg, max_body_bytes);
    cfg.default_service(web::to(not_found));
}
