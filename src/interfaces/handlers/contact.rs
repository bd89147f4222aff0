use actix_web::{
    http::{header::{self, HeaderValue}, Method},
    web::{self, Either},
    HttpRequest, HttpResponse, ResponseError,
};
use chrono::Utc;

use crate::{
    entities::contact::{ContactResponse, ContactSubmission},
    errors::AppError,
    utils::get_client_ip::get_client_ip,
    AppState,
};

pub type ContactPayload =
    Result<Either<web::Json<ContactSubmission>, web::Form<ContactSubmission>>, actix_web::Error>;

const ALLOWED_METHODS: &str = "POST, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type";
const PREFLIGHT_MAX_AGE: &str = "86400";

/// Single allowed origin, or `*` for any.
struct CorsPolicy<'a> {
    allowed_origin: &'a str,
}

impl<'a> CorsPolicy<'a> {
    fn new(allowed_origin: &'a str) -> Self {
        Self { allowed_origin }
    }

    /// Requests without an `Origin` header are not cross-origin and always pass.
    fn permits(&self, origin: Option<&str>) -> bool {
        match origin {
            None => true,
            Some(_) if self.allowed_origin == "*" => true,
            Some(origin) => origin == self.allowed_origin,
        }
    }

    fn apply(&self, mut response: HttpResponse) -> HttpResponse {
        let headers = response.headers_mut();
        if let Ok(origin) = HeaderValue::from_str(self.allowed_origin) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        }
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOWED_METHODS));
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOWED_HEADERS));
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(PREFLIGHT_MAX_AGE));
        response
    }
}

/// Contact form endpoint. Registered for every method so preflight, origin
/// and rate checks run before the method check.
pub async fn contact(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: ContactPayload,
) -> HttpResponse {
    let cors = CorsPolicy::new(&state.config.allowed_origin);

    if req.method() == Method::OPTIONS {
        return cors.apply(HttpResponse::Ok().finish());
    }

    let client_ip = get_client_ip(&req, state.config.trust_proxy_headers);

    let response = match process(&req, &state, &cors, &client_ip, payload).await {
        Ok(body) => HttpResponse::Ok().json(body),
        Err(e) => e.error_response(),
    };

    state.analytics.record(response.status().as_u16(), &client_ip, Utc::now());
    cors.apply(response)
}

async fn process(
    req: &HttpRequest,
    state: &AppState,
    cors: &CorsPolicy<'_>,
    client_ip: &str,
    payload: ContactPayload,
) -> Result<ContactResponse, AppError> {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok());
    if !cors.permits(origin) {
        let origin = origin.unwrap_or_default();
        tracing::warn!(client_ip, origin, "Blocked request from disallowed origin");
        return Err(AppError::ForbiddenOrigin(origin.to_string()));
    }

    if let Err(exceeded) = state.rate_limiter.allow(client_ip) {
        tracing::warn!(
            client_ip,
            blocked = exceeded.blocked,
            retry_after_secs = exceeded.retry_after_secs(),
            "Rate limit exceeded"
        );
        return Err(AppError::RateLimited {
            retry_after_secs: exceeded.retry_after_secs(),
        });
    }

    if req.method() != Method::POST {
        return Err(AppError::MethodNotAllowed);
    }

    let submission = match payload {
        Ok(Either::Left(json)) => json.into_inner(),
        Ok(Either::Right(form)) => form.into_inner(),
        Err(e) => {
            tracing::debug!(client_ip, "Undecodable contact body: {}", e);
            return Err(AppError::BadRequest("Invalid request body".to_string()));
        }
    };

    state.contact_handler.relay(submission, client_ip).await
}
