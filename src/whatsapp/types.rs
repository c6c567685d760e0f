use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Sticker,
    Other,
}

/// One message of a chat as shown in the chat panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub from_me: bool,
    pub kind: MessageKind,
    /// Body text, or the caption of a media message.
    pub text: Option<String>,
    pub file_name: Option<String>,
    pub mimetype: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Read one gateway message record. Records without a key id are skipped.
    pub fn from_record(record: &Value) -> Option<Self> {
        let key = record.get("key")?;
        let id = key.get("id")?.as_str()?.to_string();
        let from_me = key.get("fromMe").and_then(Value::as_bool).unwrap_or(false);
        let timestamp = parse_timestamp(record.get("messageTimestamp"))?;
        let message = record.get("message").unwrap_or(&Value::Null);

        let text_at = |v: &Value, field: &str| v.get(field).and_then(Value::as_str).map(str::to_string);

        let (kind, text, file_name, mimetype) = if let Some(t) = text_at(message, "conversation") {
            (MessageKind::Text, Some(t), None, None)
        } else if let Some(ext) = message.get("extendedTextMessage") {
            (MessageKind::Text, text_at(ext, "text"), None, None)
        } else if let Some(m) = message.get("imageMessage") {
            (MessageKind::Image, text_at(m, "caption"), None, text_at(m, "mimetype"))
        } else if let Some(m) = message.get("videoMessage") {
            (MessageKind::Video, text_at(m, "caption"), None, text_at(m, "mimetype"))
        } else if let Some(m) = message.get("audioMessage") {
            (MessageKind::Audio, None, None, text_at(m, "mimetype"))
        } else if let Some(m) = message
            .get("documentMessage")
            .or_else(|| message.get("documentWithCaptionMessage")?.get("message")?.get("documentMessage"))
        {
            (
                MessageKind::Document,
                text_at(m, "caption"),
                text_at(m, "fileName").or_else(|| text_at(m, "title")),
                text_at(m, "mimetype"),
            )
        } else if message.get("stickerMessage").is_some() {
            (MessageKind::Sticker, None, None, None)
        } else {
            (MessageKind::Other, None, None, None)
        };

        Some(Self {
            id,
            from_me,
            kind,
            text,
            file_name,
            mimetype,
            timestamp,
        })
    }
}

/// `messageTimestamp` arrives as seconds, either a number or a numeric string.
fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let secs = match value? {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    DateTime::from_timestamp(secs, 0)
}

/// Parse a `findMessages` body, oldest message first.
///
/// Gateways answer either with a bare array of records or with a paginated
/// `{"messages": {"records": [...]}}` object.
pub fn parse_find_messages(body: &Value) -> Result<Vec<ChatMessage>, GatewayError> {
    let records = match body {
        Value::Array(items) => items,
        Value::Object(_) => body
            .get("messages")
            .and_then(|m| m.get("records"))
            .and_then(Value::as_array)
            .ok_or_else(|| GatewayError::ResponseParsing("missing messages.records".into()))?,
        other => {
            return Err(GatewayError::ResponseParsing(format!(
                "unexpected findMessages body: {other}"
            )))
        }
    };

    let mut messages: Vec<ChatMessage> = records.iter().filter_map(ChatMessage::from_record).collect();
    messages.sort_by_key(|m| m.timestamp);
    Ok(messages)
}

/// What `connect` hands back for linking a phone to the instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectPrompt {
    /// QR code image as a data URL.
    #[serde(default, rename = "base64")]
    pub qr_code: Option<String>,
    #[serde(default, rename = "pairingCode")]
    pub pairing_code: Option<String>,
    /// Raw QR payload.
    #[serde(default)]
    pub code: Option<String>,
}

// ── Outgoing media ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
}

impl MediaKind {
    pub fn from_mimetype(mimetype: &str) -> Self {
        match mimetype.split('/').next().unwrap_or_default() {
            "image" => Self::Image,
            "video" => Self::Video,
            "audio" => Self::Audio,
            _ => Self::Document,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
        }
    }
}

/// A file ready to post to the gateway, body base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub kind: MediaKind,
    pub mimetype: String,
    pub file_name: String,
    pub caption: Option<String>,
    pub data_base64: String,
}

impl MediaPayload {
    /// Wrap an uploaded file. The declared content type wins; otherwise it is
    /// guessed from the file name.
    pub fn from_upload(
        file_name: &str,
        content_type: Option<&str>,
        bytes: &[u8],
        caption: Option<String>,
    ) -> Result<Self, GatewayError> {
        if bytes.is_empty() {
            return Err(GatewayError::Media("file is empty".into()));
        }
        let file_name = file_name.trim();
        if file_name.is_empty() {
            return Err(GatewayError::Media("file name is missing".into()));
        }
        let mimetype = content_type
            .filter(|c| !c.is_empty() && *c != "application/octet-stream")
            .map(str::to_string)
            .unwrap_or_else(|| mime_guess::from_path(file_name).first_or_octet_stream().to_string());

        Ok(Self {
            kind: MediaKind::from_mimetype(&mimetype),
            file_name: file_name.to_string(),
            mimetype,
            caption: caption.filter(|c| !c.trim().is_empty()),
            data_base64: base64::engine::general_purpose::STANDARD.encode(bytes),
        })
    }

    /// Wrap a voice recording as an `audio-<unix seconds>` file.
    pub fn recording(bytes: &[u8], mimetype: &str, recorded_at: DateTime<Utc>) -> Result<Self, GatewayError> {
        let extension = if mimetype.contains("webm") { "webm" } else { "ogg" };
        let file_name = format!("audio-{}.{extension}", recorded_at.timestamp());
        let mut payload = Self::from_upload(&file_name, Some(mimetype), bytes, None)?;
        payload.kind = MediaKind::Audio;
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, ts: Value, message: Value) -> Value {
        json!({
            "key": {"id": id, "fromMe": false, "remoteJid": "5511987654321@s.whatsapp.net"},
            "messageTimestamp": ts,
            "message": message,
        })
    }

    #[test]
    fn parses_bare_array_sorted_by_time() {
        let body = json!([
            record("b", json!(1718000100), json!({"conversation": "segunda"})),
            record("a", json!("1718000000"), json!({"extendedTextMessage": {"text": "primeira"}})),
        ]);
        let messages = parse_find_messages(&body).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "a");
        assert_eq!(messages[0].text.as_deref(), Some("primeira"));
        assert_eq!(messages[1].kind, MessageKind::Text);
    }

    #[test]
    fn parses_paginated_shape() {
        let body = json!({"messages": {"total": 1, "pages": 1, "currentPage": 1, "records": [
            record("x", json!(1718000000), json!({"imageMessage": {"caption": "exame", "mimetype": "image/jpeg"}})),
        ]}});
        let messages = parse_find_messages(&body).unwrap();
        assert_eq!(messages[0].kind, MessageKind::Image);
        assert_eq!(messages[0].text.as_deref(), Some("exame"));
        assert_eq!(messages[0].mimetype.as_deref(), Some("image/jpeg"));
    }

    #[test]
    fn document_keeps_file_name() {
        let body = json!([record(
            "d",
            json!(1718000000),
            json!({"documentMessage": {"fileName": "laudo.pdf", "mimetype": "application/pdf"}})
        )]);
        let m = &parse_find_messages(&body).unwrap()[0];
        assert_eq!(m.kind, MessageKind::Document);
        assert_eq!(m.file_name.as_deref(), Some("laudo.pdf"));
    }

    #[test]
    fn records_without_key_are_skipped() {
        let body = json!([{"message": {"conversation": "oi"}, "messageTimestamp": 1}]);
        assert!(parse_find_messages(&body).unwrap().is_empty());
    }

    #[test]
    fn unexpected_shape_is_an_error() {
        assert!(parse_find_messages(&json!({"status": 500})).is_err());
        assert!(parse_find_messages(&json!("nope")).is_err());
    }

    #[test]
    fn upload_mime_guessed_from_name() {
        let p = MediaPayload::from_upload("retina.png", None, b"\x89PNG", None).unwrap();
        assert_eq!(p.mimetype, "image/png");
        assert_eq!(p.kind, MediaKind::Image);

        let p = MediaPayload::from_upload("laudo.pdf", Some("application/octet-stream"), b"%PDF", None).unwrap();
        assert_eq!(p.kind, MediaKind::Document);
    }

    #[test]
    fn empty_upload_is_rejected() {
        assert!(matches!(
            MediaPayload::from_upload("a.png", None, b"", None),
            Err(GatewayError::Media(_))
        ));
    }

    #[test]
    fn recording_named_after_timestamp() {
        let at = DateTime::from_timestamp(1_718_000_000, 0).unwrap();
        let p = MediaPayload::recording(b"OggS", "audio/ogg; codecs=opus", at).unwrap();
        assert_eq!(p.file_name, "audio-1718000000.ogg");
        assert_eq!(p.kind, MediaKind::Audio);

        let p = MediaPayload::recording(b"webm", "audio/webm", at).unwrap();
        assert_eq!(p.file_name, "audio-1718000000.webm");
    }
}
