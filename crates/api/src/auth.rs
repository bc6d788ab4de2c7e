//! Principal extraction.
//!
//! Authentication happens upstream; it forwards the caller's identity in
//! `x-principal-id` and `x-principal-role` headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::PrincipalId;
use domain::{Principal, Role};

use crate::error::ApiError;

pub const PRINCIPAL_ID_HEADER: &str = "x-principal-id";
pub const PRINCIPAL_ROLE_HEADER: &str = "x-principal-role";

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Principal);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(PRINCIPAL_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {PRINCIPAL_ID_HEADER} header")))?;
        let id: PrincipalId = id
            .trim()
            .parse()
            .map_err(|_| ApiError::Unauthorized(format!("malformed {PRINCIPAL_ID_HEADER} header")))?;

        let role = match parts
            .headers
            .get(PRINCIPAL_ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            Some(raw) => raw
                .parse::<Role>()
                .map_err(|_| ApiError::Unauthorized(format!("unknown role: {raw}")))?,
            None => Role::User,
        };

        Ok(Caller(Principal { id, role }))
    }
}
