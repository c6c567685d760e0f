//! Bearer session authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, resolves it against the
//! sessions table and injects `AuthenticatedUser` into request extensions
//! for downstream handlers.

use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use crate::api::error::ApiError;
use crate::api::types::{bearer_token, ApiContext};
use crate::auth::{resolve_session, AuthenticatedUser};

/// Require a valid session token.
///
/// Accesses `ApiContext` from request extensions (injected by Extension layer).
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let token = bearer_token(req.headers())
        .ok_or(ApiError::Unauthorized)?
        .to_string();

    let user = {
        let conn = ctx.core.open_db()?;
        resolve_session(&conn, &token, Utc::now())?
    }; // Connection dropped here, before any .await

    req.extensions_mut().insert(user);

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert("Cache-Control", HeaderValue::from_static("no-store"));
    Ok(response)
}

/// Reject non-admin users. Must run inside `require_auth`.
pub async fn require_admin(req: Request<axum::body::Body>, next: Next) -> Response {
    match req.extensions().get::<AuthenticatedUser>() {
        Some(user) if user.is_admin() => next.run(req).await,
        Some(user) => {
            tracing::warn!(user_id = %user.id, path = %req.uri().path(), "Admin route refused");
            ApiError::Forbidden.into_response()
        }
        None => ApiError::Unauthorized.into_response(),
    }
}
