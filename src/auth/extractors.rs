use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};

use crate::error::AppError;

/// The subject id bound into the request by `AuthMiddleware`.
///
/// Only meaningful on routes behind the session gate. If the gate did not run, extraction
/// fails with `AppError::Unauthorized` rather than guessing an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUserId(pub i64);

impl FromRequest for AuthenticatedUserId {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let bound = req.extensions().get::<AuthenticatedUserId>().copied();
        ready(bound.ok_or_else(|| AppError::Unauthorized("missing_authorization".into())))
    }
}
