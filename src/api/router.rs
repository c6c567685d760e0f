//! HTTP API router.
//!
//! Returns a composable `Router` with every route under `/api/`.
//!
//! Middleware stack on protected routes (outermost → innermost):
//! Extension(ApiContext) → Auth → [Admin gate] → Audit → Handler

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn;
use axum::routing::{get, patch, post, put};
use axum::{Extension, Router};
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::config::MAX_UPLOAD_BYTES;
use crate::core_state::CoreState;

/// Multipart framing on top of the largest accepted file.
const BODY_LIMIT_SLACK: usize = 64 * 1024;

/// Build the API router over shared core state.
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
///
/// NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
pub fn build_router(ctx: ApiContext) -> Router {
    // Routes anyone can reach
    let public = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/auth/sign-up", post(endpoints::auth::sign_up))
        .route("/auth/sign-in", post(endpoints::auth::sign_in))
        .route("/auth/sign-out", post(endpoints::auth::sign_out))
        .with_state(ctx.clone())
        .layer(from_fn(middleware::audit::log_access));

    // User management, admins only. The admin gate sits inside auth once
    // merged below.
    let admin = Router::new()
        .route(
            "/users",
            get(endpoints::users::list).post(endpoints::users::create),
        )
        .route("/users/:id", put(endpoints::users::update))
        .with_state(ctx.clone())
        .layer(from_fn(middleware::auth::require_admin));

    let protected = Router::new()
        .route("/auth/session", get(endpoints::auth::session))
        .route("/workspace", get(endpoints::workspace::load))
        // Hospitals and doctors
        .route(
            "/hospitals",
            get(endpoints::hospitals::list).post(endpoints::hospitals::create),
        )
        .route(
            "/hospitals/:id",
            get(endpoints::hospitals::detail)
                .put(endpoints::hospitals::update)
                .delete(endpoints::hospitals::delete),
        )
        .route("/hospitals/:id/doctors", get(endpoints::hospitals::doctors_of))
        .route(
            "/doctors",
            get(endpoints::hospitals::list_doctors).post(endpoints::hospitals::create_doctor),
        )
        .route(
            "/doctors/:id",
            put(endpoints::hospitals::update_doctor).delete(endpoints::hospitals::delete_doctor),
        )
        // Flat reference lists
        .route(
            "/insurance-plans",
            get(endpoints::reference::list_insurance_plans)
                .post(endpoints::reference::create_insurance_plan),
        )
        .route(
            "/insurance-plans/:id",
            put(endpoints::reference::update_insurance_plan)
                .delete(endpoints::reference::delete_insurance_plan),
        )
        .route(
            "/procedure-catalog",
            get(endpoints::reference::list_procedures).post(endpoints::reference::create_procedure),
        )
        .route(
            "/procedure-catalog/:id",
            put(endpoints::reference::update_procedure)
                .delete(endpoints::reference::delete_procedure),
        )
        .route(
            "/marketing-sources",
            get(endpoints::reference::list_marketing_sources)
                .post(endpoints::reference::create_marketing_source),
        )
        .route(
            "/marketing-sources/:id",
            put(endpoints::reference::update_marketing_source)
                .delete(endpoints::reference::delete_marketing_source),
        )
        // Funnels and the board
        .route(
            "/funnels",
            get(endpoints::funnels::list).post(endpoints::funnels::create),
        )
        .route(
            "/funnels/:id",
            put(endpoints::funnels::update).delete(endpoints::funnels::delete),
        )
        .route("/funnels/:id/board", get(endpoints::funnels::board))
        // Avatars
        .route(
            "/users/:id/avatar",
            get(endpoints::users::avatar).post(endpoints::users::upload_avatar),
        )
        // Patients
        .route(
            "/patients",
            get(endpoints::patients::list).post(endpoints::patients::create),
        )
        .route(
            "/patients/:id",
            get(endpoints::patients::detail)
                .put(endpoints::patients::save)
                .delete(endpoints::patients::delete),
        )
        .route("/patients/:id/status", patch(endpoints::patients::move_stage))
        // WhatsApp
        .route(
            "/whatsapp/settings",
            get(endpoints::whatsapp::settings).put(endpoints::whatsapp::update_settings),
        )
        .route("/whatsapp/status", get(endpoints::whatsapp::status))
        .route("/whatsapp/connect", post(endpoints::whatsapp::connect))
        .route("/whatsapp/logout", post(endpoints::whatsapp::logout))
        .route("/whatsapp/chats/:patient_id", get(endpoints::whatsapp::chat))
        .route(
            "/whatsapp/chats/:patient_id/text",
            post(endpoints::whatsapp::send_text),
        )
        .route(
            "/whatsapp/chats/:patient_id/media",
            post(endpoints::whatsapp::send_media),
        )
        .with_state(ctx.clone())
        .merge(admin)
        // Middleware stack (innermost first, outermost last):
        .layer(from_fn(middleware::audit::log_access))
        .layer(from_fn(middleware::auth::require_auth))
        // Extension must be outermost so middleware can extract ApiContext
        .layer(Extension(ctx));

    Router::new()
        .nest("/api", public.merge(protected))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + BODY_LIMIT_SLACK))
        .layer(CorsLayer::permissive())
}
