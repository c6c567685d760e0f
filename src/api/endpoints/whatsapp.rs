//! WhatsApp endpoints: gateway settings, instance connection and the
//! per-patient chat panel.
//!
//! Gateway calls are awaited with no database connection held; each
//! handler reads what it needs from SQLite first.

use axum::extract::{Multipart, Path, State};
use axum::Extension;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::auth::AuthenticatedUser;
use crate::db::{self, DatabaseError};
use crate::models::enums::ConnectionStatus;
use crate::validation::{FieldErrors, REQUIRED};
use crate::whatsapp::{
    check_connection, is_sendable, ChatMessage, ChatSession, ConnectPrompt, EvolutionClient,
    GatewayError, GatewaySettings, MediaPayload, MessagingGateway, SettingsView,
};

#[derive(Deserialize)]
pub struct SettingsRequest {
    #[serde(default)]
    pub base_url: String,
    /// Left empty to keep the stored key.
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub instance: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: ConnectionStatus,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub patient_id: Uuid,
    pub jid: Option<String>,
    pub can_send: bool,
    pub messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
pub struct TextRequest {
    #[serde(default)]
    pub text: String,
}

// ── Settings and connection ────────────────────────────────

/// `GET /api/whatsapp/settings` — `null` until configured.
pub async fn settings(State(ctx): State<ApiContext>) -> Result<Json<Option<SettingsView>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(GatewaySettings::load(&conn)?.map(|s| s.view())))
}

/// `PUT /api/whatsapp/settings` — admins only.
pub async fn update_settings(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(input): Json<SettingsRequest>,
) -> Result<Json<SettingsView>, ApiError> {
    if !user.is_admin() {
        return Err(ApiError::Forbidden);
    }
    let conn = ctx.core.open_db()?;
    let stored = GatewaySettings::load(&conn)?;

    let api_key = match input.api_key.trim() {
        "" => stored.as_ref().map(|s| s.api_key.clone()).unwrap_or_default(),
        key => key.to_string(),
    };
    let settings = GatewaySettings::new(&input.base_url, &api_key, &input.instance);

    let mut errors = FieldErrors::new();
    if settings.base_url.is_empty() {
        errors.add("base_url", REQUIRED);
    } else if !settings.base_url.starts_with("http://") && !settings.base_url.starts_with("https://") {
        errors.add("base_url", "must start with http:// or https://");
    }
    if settings.api_key.is_empty() {
        errors.add("api_key", REQUIRED);
    }
    if settings.instance.is_empty() {
        errors.add("instance", REQUIRED);
    }
    errors.into_result()?;

    settings.save(&conn)?;
    tracing::info!(instance = %settings.instance, "Gateway settings saved");
    Ok(Json(settings.view()))
}

/// `GET /api/whatsapp/status` — asks the gateway and remembers the answer.
pub async fn status(State(ctx): State<ApiContext>) -> Result<Json<StatusResponse>, ApiError> {
    let gateway = open_gateway(&ctx)?;
    let status = check_connection(&gateway).await;

    let conn = ctx.core.open_db()?;
    GatewaySettings::record_status(&conn, status)?;
    Ok(Json(StatusResponse { status }))
}

/// `POST /api/whatsapp/connect` — QR code / pairing code for linking a phone.
pub async fn connect(State(ctx): State<ApiContext>) -> Result<Json<ConnectPrompt>, ApiError> {
    let gateway = open_gateway(&ctx)?;
    let prompt = gateway.connect().await?;
    Ok(Json(prompt))
}

/// `POST /api/whatsapp/logout`
pub async fn logout(State(ctx): State<ApiContext>) -> Result<Json<StatusResponse>, ApiError> {
    let gateway = open_gateway(&ctx)?;
    gateway.logout().await?;

    let conn = ctx.core.open_db()?;
    GatewaySettings::record_status(&conn, ConnectionStatus::Close)?;
    tracing::info!("WhatsApp instance logged out");
    Ok(Json(StatusResponse {
        status: ConnectionStatus::Close,
    }))
}

// ── Chat panel ─────────────────────────────────────────────

/// `GET /api/whatsapp/chats/:patient_id`
pub async fn chat(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<ChatResponse>, ApiError> {
    let phone = patient_phone(&ctx, &patient_id)?;
    if !is_sendable(phone.as_deref()) {
        // Nothing to fetch; the panel shows the number as unusable.
        return Ok(Json(ChatResponse {
            patient_id,
            jid: None,
            can_send: false,
            messages: Vec::new(),
        }));
    }
    let gateway = open_gateway(&ctx)?;

    let mut session = ChatSession::new(&gateway, phone.as_deref(), ctx.core.chat_refresh);
    session.refresh().await?;
    Ok(Json(chat_response(patient_id, session)))
}

/// `POST /api/whatsapp/chats/:patient_id/text`
pub async fn send_text(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<Uuid>,
    Json(input): Json<TextRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let phone = sendable_phone(&ctx, &patient_id)?;
    if input.text.trim().is_empty() {
        return Err(GatewayError::EmptyMessage.into());
    }
    let gateway = open_gateway(&ctx)?;

    let mut session = ChatSession::new(&gateway, Some(&phone), ctx.core.chat_refresh);
    session.send_text(&input.text).await?;
    tracing::info!(patient_id = %patient_id, "WhatsApp text sent");
    Ok(Json(chat_response(patient_id, session)))
}

/// `POST /api/whatsapp/chats/:patient_id/media` — multipart with either a
/// `file` part (plus optional `caption`) or a `recording` part.
pub async fn send_media(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<ChatResponse>, ApiError> {
    let phone = sendable_phone(&ctx, &patient_id)?;

    let mut file: Option<(String, Option<String>, Vec<u8>)> = None;
    let mut recording: Option<(String, Vec<u8>)> = None;
    let mut caption = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Upload failed: {e}")))?;

        match name.as_str() {
            "file" => file = Some((file_name.unwrap_or_default(), content_type, bytes.to_vec())),
            "recording" => {
                let mimetype = content_type.unwrap_or_else(|| "audio/ogg".into());
                recording = Some((mimetype, bytes.to_vec()));
            }
            "caption" => caption = Some(String::from_utf8_lossy(&bytes).into_owned()),
            _ => {}
        }
    }

    let gateway = open_gateway(&ctx)?;
    let mut session = ChatSession::new(&gateway, Some(&phone), ctx.core.chat_refresh);
    match (file, recording) {
        (Some((file_name, content_type, bytes)), _) => {
            let media = MediaPayload::from_upload(&file_name, content_type.as_deref(), &bytes, caption)?;
            session.send_attachment(&media).await?;
            tracing::info!(patient_id = %patient_id, kind = media.kind.as_str(), "WhatsApp media sent");
        }
        (None, Some((mimetype, bytes))) => {
            session.send_recording(&bytes, &mimetype).await?;
            tracing::info!(patient_id = %patient_id, "WhatsApp recording sent");
        }
        (None, None) => return Err(ApiError::field("file", REQUIRED)),
    }
    Ok(Json(chat_response(patient_id, session)))
}

// ── Helpers ────────────────────────────────────────────────

fn open_gateway(ctx: &ApiContext) -> Result<EvolutionClient, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(ctx.core.gateway(&conn)?)
}

fn patient_phone(ctx: &ApiContext, patient_id: &Uuid) -> Result<Option<String>, ApiError> {
    let conn = ctx.core.open_db()?;
    let patient = db::get_patient(&conn, patient_id)?
        .ok_or_else(|| DatabaseError::not_found("patient", patient_id))?;
    Ok(patient.phone)
}

/// The patient's phone, or a validation error before any gateway work.
fn sendable_phone(ctx: &ApiContext, patient_id: &Uuid) -> Result<String, ApiError> {
    let phone = patient_phone(ctx, patient_id)?;
    match phone {
        Some(phone) if is_sendable(Some(&phone)) => Ok(phone),
        other => Err(GatewayError::InvalidPhone(other.unwrap_or_default()).into()),
    }
}

fn chat_response<G: MessagingGateway>(patient_id: Uuid, session: ChatSession<'_, G>) -> ChatResponse {
    ChatResponse {
        patient_id,
        jid: session.jid(),
        can_send: session.can_send(),
        messages: session.into_history(),
    }
}
