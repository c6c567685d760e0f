//! Chat panel state for one patient.
//!
//! Every send is a single gateway call followed by a fixed wait and a
//! history re-fetch; the message shows up once the gateway has stored it.
//! A patient without a sendable phone number never reaches the gateway.

use std::time::Duration;

use chrono::Utc;

use super::client::MessagingGateway;
use super::jid::{jid_for_number, normalize_phone};
use super::types::{ChatMessage, MediaKind, MediaPayload};
use super::GatewayError;
use crate::models::enums::ConnectionStatus;

pub struct ChatSession<'g, G: MessagingGateway> {
    gateway: &'g G,
    phone: Option<String>,
    /// Normalized digits; `None` when the phone is missing or too short.
    number: Option<String>,
    history: Vec<ChatMessage>,
    refresh_delay: Duration,
}

impl<'g, G: MessagingGateway> ChatSession<'g, G> {
    pub fn new(gateway: &'g G, phone: Option<&str>, refresh_delay: Duration) -> Self {
        let number = phone.and_then(|p| normalize_phone(p).ok());
        Self {
            gateway,
            phone: phone.map(str::to_string),
            number,
            history: Vec::new(),
            refresh_delay,
        }
    }

    pub fn can_send(&self) -> bool {
        self.number.is_some()
    }

    pub fn jid(&self) -> Option<String> {
        self.number.as_deref().map(jid_for_number)
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn into_history(self) -> Vec<ChatMessage> {
        self.history
    }

    fn number(&self) -> Result<&str, GatewayError> {
        self.number
            .as_deref()
            .ok_or_else(|| GatewayError::InvalidPhone(self.phone.clone().unwrap_or_default()))
    }

    /// Re-fetch the full history for this patient.
    pub async fn refresh(&mut self) -> Result<&[ChatMessage], GatewayError> {
        let jid = self
            .jid()
            .ok_or_else(|| GatewayError::InvalidPhone(self.phone.clone().unwrap_or_default()))?;
        self.history = self.gateway.find_messages(&jid).await?;
        Ok(&self.history)
    }

    pub async fn send_text(&mut self, text: &str) -> Result<(), GatewayError> {
        let number = self.number()?.to_string();
        let text = text.trim();
        if text.is_empty() {
            return Err(GatewayError::EmptyMessage);
        }
        self.gateway.send_text(&number, text).await?;
        self.refresh_after_send().await;
        Ok(())
    }

    /// Send a file; audio goes out as a voice note, everything else as media.
    pub async fn send_attachment(&mut self, media: &MediaPayload) -> Result<(), GatewayError> {
        let number = self.number()?.to_string();
        match media.kind {
            MediaKind::Audio => self.gateway.send_audio(&number, &media.data_base64).await?,
            _ => self.gateway.send_media(&number, media).await?,
        }
        self.refresh_after_send().await;
        Ok(())
    }

    /// Send a voice recording captured in the browser.
    pub async fn send_recording(&mut self, bytes: &[u8], mimetype: &str) -> Result<(), GatewayError> {
        self.number()?;
        let media = MediaPayload::recording(bytes, mimetype, Utc::now())?;
        self.send_attachment(&media).await
    }

    async fn refresh_after_send(&mut self) {
        tokio::time::sleep(self.refresh_delay).await;
        if let Err(e) = self.refresh().await {
            // The send itself went through; keep the previous history.
            tracing::warn!(error = %e, "Chat refresh after send failed");
        }
    }
}

/// Ask the gateway for the instance state. Failures read as `Unknown`.
pub async fn check_connection<G: MessagingGateway>(gateway: &G) -> ConnectionStatus {
    match gateway.connection_state().await {
        Ok(status) => status,
        Err(e) => {
            tracing::warn!(error = %e, "Connection state check failed");
            ConnectionStatus::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::whatsapp::client::mock::{GatewayCall, MockGateway};
    use crate::whatsapp::types::MessageKind;

    const NO_DELAY: Duration = Duration::ZERO;

    fn message(id: &str, text: &str) -> ChatMessage {
        ChatMessage {
            id: id.into(),
            from_me: true,
            kind: MessageKind::Text,
            text: Some(text.into()),
            file_name: None,
            mimetype: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn session_jid_matches_phone_jid() {
        let gateway = MockGateway::default();
        let chat = ChatSession::new(&gateway, Some("(11) 98765-4321"), NO_DELAY);
        assert_eq!(chat.jid(), Some(crate::whatsapp::to_jid("(11) 98765-4321").unwrap()));
        assert_eq!(chat.jid().as_deref(), Some("5511987654321@s.whatsapp.net"));
    }

    #[tokio::test]
    async fn short_phone_never_calls_gateway() {
        let gateway = MockGateway::default();
        let mut chat = ChatSession::new(&gateway, Some("98765-432"), NO_DELAY);

        assert!(!chat.can_send());
        assert!(matches!(chat.send_text("Olá").await, Err(GatewayError::InvalidPhone(_))));
        assert!(matches!(
            chat.send_recording(b"OggS", "audio/ogg").await,
            Err(GatewayError::InvalidPhone(_))
        ));
        assert!(matches!(chat.refresh().await, Err(GatewayError::InvalidPhone(_))));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_phone_is_not_sendable() {
        let gateway = MockGateway::default();
        let chat = ChatSession::new(&gateway, None, NO_DELAY);
        assert!(!chat.can_send());
        assert!(chat.jid().is_none());
    }

    #[tokio::test]
    async fn send_text_posts_once_then_refetches() {
        let gateway = MockGateway::default();
        gateway.history.lock().unwrap().push(message("m1", "Olá, Ana"));
        let mut chat = ChatSession::new(&gateway, Some("(11) 98765-4321"), NO_DELAY);

        chat.send_text("  Olá, Ana ").await.unwrap();

        assert_eq!(
            gateway.calls(),
            vec![
                GatewayCall::SendText { number: "5511987654321".into(), text: "Olá, Ana".into() },
                GatewayCall::FindMessages { jid: "5511987654321@s.whatsapp.net".into() },
            ]
        );
        assert_eq!(chat.history().len(), 1);
    }

    #[tokio::test]
    async fn failed_send_skips_refresh() {
        let gateway = MockGateway { fail_sends: true, ..Default::default() };
        let mut chat = ChatSession::new(&gateway, Some("11987654321"), NO_DELAY);

        let err = chat.send_text("Olá").await.unwrap_err();
        assert!(matches!(err, GatewayError::Http { status: 500, .. }));
        assert_eq!(gateway.calls().len(), 1);
    }

    #[tokio::test]
    async fn empty_text_is_rejected_locally() {
        let gateway = MockGateway::default();
        let mut chat = ChatSession::new(&gateway, Some("11987654321"), NO_DELAY);
        assert!(matches!(chat.send_text("   ").await, Err(GatewayError::EmptyMessage)));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn recording_goes_out_as_audio() {
        let gateway = MockGateway::default();
        let mut chat = ChatSession::new(&gateway, Some("11987654321"), NO_DELAY);

        chat.send_recording(b"OggS", "audio/ogg").await.unwrap();

        let calls = gateway.calls();
        assert_eq!(calls[0], GatewayCall::SendAudio { number: "5511987654321".into() });
        assert!(matches!(calls[1], GatewayCall::FindMessages { .. }));
    }

    #[tokio::test]
    async fn document_goes_out_as_media() {
        let gateway = MockGateway::default();
        let mut chat = ChatSession::new(&gateway, Some("11987654321"), NO_DELAY);
        let media = MediaPayload::from_upload("laudo.pdf", None, b"%PDF-1.4", None).unwrap();

        chat.send_attachment(&media).await.unwrap();

        assert_eq!(
            gateway.calls()[0],
            GatewayCall::SendMedia { number: "5511987654321".into(), file_name: "laudo.pdf".into() }
        );
    }

    #[tokio::test]
    async fn refresh_waits_for_the_configured_delay() {
        let gateway = MockGateway::default();
        let mut chat = ChatSession::new(&gateway, Some("11987654321"), Duration::from_millis(60));

        let started = std::time::Instant::now();
        chat.send_text("Olá").await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn connection_check_falls_back_to_unknown() {
        let offline = MockGateway::default();
        assert_eq!(check_connection(&offline).await, ConnectionStatus::Unknown);

        let online = MockGateway { state: Some(ConnectionStatus::Open), ..Default::default() };
        assert_eq!(check_connection(&online).await, ConnectionStatus::Open);
    }
}
