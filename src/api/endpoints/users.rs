//! User management (admin) and avatars.

use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::auth::{self, AuthenticatedUser, SignUp};
use crate::db::{self, DatabaseError};
use crate::models::enums::UserRole;
use crate::models::UserProfile;
use crate::storage;
use crate::validation::{FieldErrors, REQUIRED};

#[derive(Deserialize)]
pub struct CreateUserRequest {
    #[serde(flatten)]
    pub account: SignUp,
    pub role: UserRole,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub full_name: String,
    pub role: UserRole,
    pub active: bool,
}

/// `GET /api/users`
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<UserProfile>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_users(&conn)?))
}

/// `POST /api/users`
pub async fn create(
    State(ctx): State<ApiContext>,
    Json(input): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    let conn = ctx.core.open_db()?;
    let user = auth::create_user(&conn, &input.account, input.role)?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// `PUT /api/users/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(admin): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateUserRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    let full_name = input.full_name.trim().to_string();
    let mut errors = FieldErrors::new();
    if full_name.is_empty() {
        errors.add("full_name", REQUIRED);
    }
    // An admin locking themselves out leaves nobody to undo it.
    if id == admin.id && (!input.active || input.role != UserRole::Admin) {
        errors.add("role", "you cannot demote or deactivate yourself");
    }
    errors.into_result()?;

    let conn = ctx.core.open_db()?;
    let mut user = db::get_user(&conn, &id)?.ok_or_else(|| DatabaseError::not_found("user", id))?;
    user.full_name = full_name;
    user.role = input.role;
    user.active = input.active;
    db::update_user(&conn, &user)?;

    tracing::info!(user_id = %id, role = %user.role, active = user.active, "User updated");
    Ok(Json(user))
}

/// `POST /api/users/:id/avatar` — multipart, first file part is the image.
/// Users may replace their own avatar; admins anyone's.
pub async fn upload_avatar(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<UserProfile>, ApiError> {
    if caller.id != id && !caller.is_admin() {
        return Err(ApiError::Forbidden);
    }

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        if field.file_name().is_none() {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Upload failed: {e}")))?;
        upload = Some((content_type, bytes));
        break;
    }
    let (content_type, bytes) = upload.ok_or_else(|| ApiError::field("avatar", REQUIRED))?;

    let conn = ctx.core.open_db()?;
    if db::get_user(&conn, &id)?.is_none() {
        return Err(DatabaseError::not_found("user", id).into());
    }
    let relative = storage::save_avatar(&ctx.core.avatars_dir, &id, &bytes, &content_type)?;
    db::set_avatar_path(&conn, &id, &relative)?;

    let user = db::get_user(&conn, &id)?.ok_or_else(|| DatabaseError::not_found("user", id))?;
    Ok(Json(user))
}

/// `GET /api/users/:id/avatar`
pub async fn avatar(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let conn = ctx.core.open_db()?;
    let user = db::get_user(&conn, &id)?.ok_or_else(|| DatabaseError::not_found("user", id))?;
    let relative = user
        .avatar_path
        .ok_or_else(|| ApiError::NotFound(format!("user {id} has no avatar")))?;

    let (bytes, mime) = storage::load_avatar(&ctx.core.avatars_dir, &relative)?;
    Ok(([(header::CONTENT_TYPE, mime)], bytes))
}
