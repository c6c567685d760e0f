//! Audit logging middleware.
//!
//! Logs every API request with user id, method, path and response
//! status. Runs innermost (after auth has injected AuthenticatedUser).

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::auth::AuthenticatedUser;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let user_id = req
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|u| u.id.to_string())
        .unwrap_or_else(|| "anonymous".into());

    let response = next.run(req).await;

    let status = response.status().as_u16();
    if response.status().is_server_error() {
        tracing::warn!(%method, %path, status, %user_id, "API request failed");
    } else {
        tracing::info!(%method, %path, status, %user_id, "API request");
    }
    response
}
