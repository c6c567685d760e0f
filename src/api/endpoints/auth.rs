//! Account and session endpoints.
//!
//! - `POST /api/auth/sign-up` — create an account (first one is admin)
//! - `POST /api/auth/sign-in` — exchange credentials for a bearer token
//! - `POST /api/auth/sign-out` — drop the current session
//! - `GET /api/auth/session` — who the token belongs to

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Extension;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{bearer_token, ApiContext};
use crate::auth::{self, AuthenticatedUser, SessionToken, SignUp};
use crate::models::UserProfile;

#[derive(Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct SignOutResponse {
    pub signed_out: bool,
}

/// `POST /api/auth/sign-up`
pub async fn sign_up(
    State(ctx): State<ApiContext>,
    Json(input): Json<SignUp>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    let conn = ctx.core.open_db()?;
    let user = auth::sign_up(&conn, &input)?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// `POST /api/auth/sign-in`
pub async fn sign_in(
    State(ctx): State<ApiContext>,
    Json(input): Json<SignInRequest>,
) -> Result<Json<SessionToken>, ApiError> {
    let conn = ctx.core.open_db()?;
    let session = auth::sign_in(&conn, &input.email, &input.password, ctx.core.session_ttl)?;
    tracing::info!(user_id = %session.user.id, "Signed in");
    Ok(Json(session))
}

/// `POST /api/auth/sign-out` — unknown tokens are not an error.
pub async fn sign_out(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
) -> Result<Json<SignOutResponse>, ApiError> {
    let token = bearer_token(&headers).ok_or(ApiError::Unauthorized)?;
    let conn = ctx.core.open_db()?;
    let signed_out = auth::sign_out(&conn, token)?;
    Ok(Json(SignOutResponse { signed_out }))
}

/// `GET /api/auth/session`
pub async fn session(Extension(user): Extension<AuthenticatedUser>) -> Json<AuthenticatedUser> {
    Json(user)
}
