use actix_web::web;

use crate::handlers::{analytics, contact, json_error::method_not_allowed, system};

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/contact")
            .route(web::route().to(contact::contact))
    )
    .service(
        web::resource("/health")
            .route(web::get().to(system::health_check))
            .default_service(web::to(method_not_allowed))
    )
    .service(
        web::resource("/analytics")
            .route(web::get().to(analytics::get_analytics))
            .default_service(web::to(analytics::analytics_method_not_allowed))
    );
}
