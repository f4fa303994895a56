//! Caller identity as forwarded by the upstream gateway.
//!
//! The gateway has already authenticated the request; this layer only reads
//! `X-User-Id` and `X-User-Role` and never validates tokens itself.

use {
    super::errors::ApiError,
    crate::domain::error::PipelineError,
    axum::{extract::FromRequestParts, http::request::Parts},
    uuid::Uuid,
};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Customer,
    Admin,
}

#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

/// An [`AuthUser`] whose role is `admin`.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub AuthUser);

fn identify(parts: &Parts) -> Result<AuthUser, PipelineError> {
    let raw = parts
        .headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| PipelineError::Unauthenticated("missing X-User-Id header".into()))?;

    let id = Uuid::parse_str(raw.trim())
        .map_err(|_| PipelineError::Unauthenticated("malformed X-User-Id header".into()))?;

    let role = match parts
        .headers
        .get(USER_ROLE_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        Some(r) if r.trim().eq_ignore_ascii_case("admin") => Role::Admin,
        _ => Role::Customer,
    };

    Ok(AuthUser { id, role })
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(identify(parts)?)
    }
}

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = identify(parts)?;
        if user.role != Role::Admin {
            return Err(PipelineError::Forbidden("admin role required".into()).into());
        }
        Ok(AdminUser(user))
    }
}
