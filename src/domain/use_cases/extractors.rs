use actix_web::{web, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use subtle::ConstantTimeEq;

use crate::{errors::AppError, AppState};

pub const ADMIN_KEY_HEADER: &str = "X-Admin-Key";

/// Guards admin-only endpoints with the static `ADMIN_KEY`.
/// Returns 401 when no key is configured or the header does not match.
/// Usage: Add `_admin: AdminKey` as a parameter to your handler function.
#[derive(Debug)]
pub struct AdminKey;

impl FromRequest for AdminKey {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        let expected = req
            .app_data::<web::Data<AppState>>()
            .and_then(|state| state.config.admin_key.clone())
            .filter(|key| !key.is_empty());

        let provided = req
            .headers()
            .get(ADMIN_KEY_HEADER)
            .and_then(|v| v.to_str().ok());

        match (expected, provided) {
            (Some(expected), Some(provided)) if keys_match(&expected, provided) => ready(Ok(AdminKey)),
            _ => ready(Err(AppError::UnauthorizedAccess.into())),
        }
    }
}

/// Compares in time independent of where the keys first differ.
fn keys_match(expected: &str, provided: &str) -> bool {
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}
