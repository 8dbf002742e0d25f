//! WhatsApp Business Cloud API channel.
//!
//! Uses the official WhatsApp Business Platform (Cloud API) for messaging.
//! Requires: Access Token + Phone Number ID from Meta Business Suite.
//! Incoming messages arrive on the gateway webhook and are parsed by
//! [`parse_webhook`].

use async_trait::async_trait;
use castline_core::config::WhatsAppConfig;
use castline_core::error::{CastlineError, Result};
use castline_core::traits::MessagingGateway;
use castline_core::types::{InboundMessage, Payload};
use std::path::Path;

/// WhatsApp Business gateway implementation.
pub struct WhatsAppGateway {
    config: WhatsAppConfig,
    client: reqwest::Client,
    connected: bool,
}

impl WhatsAppGateway {
    pub fn new(config: WhatsAppConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            connected: false,
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.config.api_base, self.config.phone_number_id)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.config.access_token)
    }

    /// POST a message body and check the response.
    async fn post_message(&self, to: &str, body: serde_json::Value) -> Result<String> {
        let response = self
            .client
            .post(self.messages_url())
            .header("Authorization", self.bearer())
            .json(&body)
            .send()
            .await
            .map_err(|e| CastlineError::Delivery(format!("WhatsApp API request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CastlineError::Session(format!(
                "WhatsApp rejected credentials ({status}): {error_text}"
            )));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CastlineError::Delivery(format!(
                "WhatsApp API error {status}: {error_text}"
            )));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CastlineError::Delivery(format!("Invalid WhatsApp response: {e}")))?;

        let msg_id = result["messages"][0]["id"]
            .as_str()
            .unwrap_or("unknown")
            .to_string();

        tracing::debug!("WhatsApp message sent: {} → {}", msg_id, to);
        Ok(msg_id)
    }

    /// Send a text message via WhatsApp Cloud API.
    async fn send_text_message(&self, to: &str, text: &str) -> Result<String> {
        let body = serde_json::json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": "text",
            "text": {
                "preview_url": false,
                "body": text
            }
        });
        self.post_message(to, body).await
    }

    /// Upload a local file and send it as a document with a caption.
    async fn send_document(&self, to: &str, path: &Path, caption: &str) -> Result<String> {
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("attachment")
            .to_string();
        let media_id = self.upload_media(path, &file_name).await?;
        let body = serde_json::json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": "document",
            "document": {
                "id": media_id,
                "caption": caption,
                "filename": file_name
            }
        });
        self.post_message(to, body).await
    }

    async fn upload_media(&self, path: &Path, file_name: &str) -> Result<String> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            CastlineError::Delivery(format!("Media asset {} unavailable: {e}", path.display()))
        })?;
        let mime = mime_for(path);
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)
            .map_err(|e| CastlineError::Delivery(format!("Invalid media type: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .text("messaging_product", "whatsapp")
            .text("type", mime)
            .part("file", part);

        let url = format!("{}/{}/media", self.config.api_base, self.config.phone_number_id);
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.bearer())
            .multipart(form)
            .send()
            .await
            .map_err(|e| CastlineError::Delivery(format!("WhatsApp media upload failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(CastlineError::Delivery(format!(
                "WhatsApp media upload error {status}: {error_text}"
            )));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CastlineError::Delivery(format!("Invalid media upload response: {e}")))?;
        result["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CastlineError::Delivery("Media upload returned no id".into()))
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl MessagingGateway for WhatsAppGateway {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn connect(&mut self) -> Result<()> {
        if self.config.access_token.is_empty() {
            return Err(CastlineError::Config(
                "WhatsApp access_token not configured".into(),
            ));
        }
        if self.config.phone_number_id.is_empty() {
            return Err(CastlineError::Config(
                "WhatsApp phone_number_id not configured".into(),
            ));
        }

        // Verify token by checking phone number
        let url = format!("{}/{}", self.config.api_base, self.config.phone_number_id);
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.bearer())
            .send()
            .await
            .map_err(|e| CastlineError::Session(format!("WhatsApp verification failed: {e}")))?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CastlineError::Session(format!(
                "WhatsApp token verification failed: {text}"
            )));
        }

        self.connected = true;
        tracing::info!(
            "WhatsApp Business: connected (phone_id={})",
            self.config.phone_number_id
        );
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        tracing::info!("WhatsApp Business: disconnected");
        Ok(())
    }

    async fn send(&self, recipient: &str, payload: &Payload) -> Result<()> {
        if !self.connected {
            return Err(CastlineError::Session("WhatsApp channel not connected".into()));
        }
        match payload {
            Payload::Text { text } => self.send_text_message(recipient, text).await?,
            Payload::Media { media_ref, caption } => {
                self.send_document(recipient, media_ref, caption).await?
            }
        };
        Ok(())
    }
}

/// Extract text messages from a Cloud API webhook notification.
pub fn parse_webhook(body: &serde_json::Value) -> Vec<InboundMessage> {
    let mut inbound = Vec::new();
    let Some(entries) = body["entry"].as_array() else {
        return inbound;
    };
    for entry in entries {
        let Some(changes) = entry["changes"].as_array() else {
            continue;
        };
        for change in changes {
            let Some(messages) = change["value"]["messages"].as_array() else {
                continue;
            };
            for msg in messages {
                if msg["type"].as_str() != Some("text") {
                    continue;
                }
                let from = msg["from"].as_str().unwrap_or("");
                let text = msg["text"]["body"].as_str().unwrap_or("");
                if from.is_empty() || text.is_empty() {
                    continue;
                }
                inbound.push(InboundMessage {
                    sender_raw_id: from.to_string(),
                    text: text.to_string(),
                    message_id: msg["id"].as_str().map(str::to_string),
                });
            }
        }
    }
    inbound
}
