use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{parse_find_messages, ChatMessage, ConnectPrompt, MediaPayload};
use super::{GatewayError, GatewaySettings};
use crate::models::enums::ConnectionStatus;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Messaging gateway abstraction (allows mocking).
///
/// `number` arguments are normalized digits (see [`super::normalize_phone`]);
/// `jid` arguments are full WhatsApp JIDs.
pub trait MessagingGateway: Send + Sync {
    fn connection_state(&self) -> impl Future<Output = Result<ConnectionStatus, GatewayError>> + Send;

    fn connect(&self) -> impl Future<Output = Result<ConnectPrompt, GatewayError>> + Send;

    fn logout(&self) -> impl Future<Output = Result<(), GatewayError>> + Send;

    fn send_text(
        &self,
        number: &str,
        text: &str,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Image, video or document.
    fn send_media(
        &self,
        number: &str,
        media: &MediaPayload,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Voice note, delivered as a WhatsApp audio message.
    fn send_audio(
        &self,
        number: &str,
        audio_base64: &str,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    fn find_messages(
        &self,
        jid: &str,
    ) -> impl Future<Output = Result<Vec<ChatMessage>, GatewayError>> + Send;
}

/// Evolution API HTTP client.
pub struct EvolutionClient {
    base_url: String,
    api_key: String,
    instance: String,
    client: reqwest::Client,
}

impl EvolutionClient {
    /// The `reqwest::Client` is shared so connections are pooled across requests.
    pub fn new(settings: &GatewaySettings, client: reqwest::Client) -> Self {
        Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            instance: settings.instance.clone(),
            client,
        }
    }

    pub fn http_client() -> Result<reqwest::Client, GatewayError> {
        reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::HttpClient(e.to_string()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}/{}", self.base_url, self.instance)
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, GatewayError> {
        let response = request
            .header("apikey", &self.api_key)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    GatewayError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "Gateway request failed");
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
        response
            .json()
            .await
            .map_err(|e| GatewayError::ResponseParsing(e.to_string()))
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<reqwest::Response, GatewayError> {
        self.execute(self.client.post(self.url(path)).json(body)).await
    }
}

/// Request body for /message/sendText
#[derive(Serialize)]
struct SendTextRequest<'a> {
    number: &'a str,
    text: &'a str,
}

/// Request body for /message/sendMedia
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMediaRequest<'a> {
    number: &'a str,
    mediatype: &'a str,
    mimetype: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<&'a str>,
    media: &'a str,
    file_name: &'a str,
}

/// Request body for /message/sendWhatsAppAudio
#[derive(Serialize)]
struct SendAudioRequest<'a> {
    number: &'a str,
    audio: &'a str,
}

/// Request body for /chat/findMessages
#[derive(Serialize)]
struct FindMessagesRequest<'a> {
    #[serde(rename = "where")]
    filter: FindMessagesWhere<'a>,
}

#[derive(Serialize)]
struct FindMessagesWhere<'a> {
    key: FindMessagesKey<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FindMessagesKey<'a> {
    remote_jid: &'a str,
}

/// Response body from /instance/connectionState
#[derive(Deserialize)]
struct ConnectionStateResponse {
    instance: ConnectionStateInstance,
}

#[derive(Deserialize)]
struct ConnectionStateInstance {
    state: String,
}

impl MessagingGateway for EvolutionClient {
    async fn connection_state(&self) -> Result<ConnectionStatus, GatewayError> {
        let response = self
            .execute(self.client.get(self.url("instance/connectionState")))
            .await?;
        let parsed: ConnectionStateResponse = Self::json(response).await?;
        Ok(ConnectionStatus::from_gateway_state(&parsed.instance.state))
    }

    async fn connect(&self) -> Result<ConnectPrompt, GatewayError> {
        let response = self.execute(self.client.get(self.url("instance/connect"))).await?;
        Self::json(response).await
    }

    async fn logout(&self) -> Result<(), GatewayError> {
        self.execute(self.client.delete(self.url("instance/logout"))).await?;
        Ok(())
    }

    async fn send_text(&self, number: &str, text: &str) -> Result<(), GatewayError> {
        self.post("message/sendText", &SendTextRequest { number, text }).await?;
        Ok(())
    }

    async fn send_media(&self, number: &str, media: &MediaPayload) -> Result<(), GatewayError> {
        let body = SendMediaRequest {
            number,
            mediatype: media.kind.as_str(),
            mimetype: &media.mimetype,
            caption: media.caption.as_deref(),
            media: &media.data_base64,
            file_name: &media.file_name,
        };
        self.post("message/sendMedia", &body).await?;
        Ok(())
    }

    async fn send_audio(&self, number: &str, audio_base64: &str) -> Result<(), GatewayError> {
        self.post("message/sendWhatsAppAudio", &SendAudioRequest { number, audio: audio_base64 })
            .await?;
        Ok(())
    }

    async fn find_messages(&self, jid: &str) -> Result<Vec<ChatMessage>, GatewayError> {
        let body = FindMessagesRequest {
            filter: FindMessagesWhere {
                key: FindMessagesKey { remote_jid: jid },
            },
        };
        let response = self.post("chat/findMessages", &body).await?;
        let value: Value = Self::json(response).await?;
        parse_find_messages(&value)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> GatewaySettings {
        GatewaySettings::new("https://evo.example.com/", "key", "clinica")
    }

    #[test]
    fn urls_end_with_instance_name() {
        let client = EvolutionClient::new(&settings(), reqwest::Client::new());
        assert_eq!(
            client.url("message/sendText"),
            "https://evo.example.com/message/sendText/clinica"
        );
    }

    #[test]
    fn media_body_uses_gateway_field_names() {
        let body = SendMediaRequest {
            number: "5511987654321",
            mediatype: "document",
            mimetype: "application/pdf",
            caption: None,
            media: "JVBERg==",
            file_name: "laudo.pdf",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["fileName"], "laudo.pdf");
        assert_eq!(json["mediatype"], "document");
        assert!(json.get("caption").is_none());
    }

    #[test]
    fn find_messages_body_filters_by_remote_jid() {
        let body = FindMessagesRequest {
            filter: FindMessagesWhere {
                key: FindMessagesKey { remote_jid: "5511987654321@s.whatsapp.net" },
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["where"]["key"]["remoteJid"], "5511987654321@s.whatsapp.net");
    }

    #[test]
    fn connect_prompt_reads_gateway_fields() {
        let raw = r#"{"pairingCode":"WZYEH1YY","code":"2@abc","base64":"data:image/png;base64,AAA","count":1}"#;
        let prompt: ConnectPrompt = serde_json::from_str(raw).unwrap();
        assert_eq!(prompt.pairing_code.as_deref(), Some("WZYEH1YY"));
        assert_eq!(prompt.qr_code.as_deref(), Some("data:image/png;base64,AAA"));
    }

    #[tokio::test]
    async fn unreachable_gateway_is_a_connection_error() {
        let client = EvolutionClient::new(
            &GatewaySettings::new("http://127.0.0.1:9", "key", "clinica"),
            reqwest::Client::new(),
        );
        let err = client.connection_state().await.unwrap_err();
        assert!(matches!(err, GatewayError::Connection(_) | GatewayError::HttpClient(_)));
    }
}
