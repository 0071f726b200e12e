//! [`Transport`] implementation for WhatsApp.

use super::WhatsAppTransport;
use async_trait::async_trait;
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;
use tracing::info;
use wabot_core::{
    error::WabotError,
    message::{GroupInfo, InboundMessage},
    target::Target,
    traits::Transport,
};
use wacore_binary::jid::Jid;

fn parse_jid(target: &Target) -> Result<Jid, WabotError> {
    let address = target.address();
    address
        .parse()
        .map_err(|e| WabotError::Transport(format!("invalid whatsapp JID '{address}': {e}")))
}

#[async_trait]
impl Transport for WhatsAppTransport {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn connect(&self) -> Result<mpsc::Receiver<InboundMessage>, WabotError> {
        let (tx, rx) = mpsc::channel(64);
        self.build_and_run(tx).await?;
        Ok(rx)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// One attempt; the text goes out verbatim as a single message.
    async fn send_text(&self, target: &Target, text: &str) -> Result<String, WabotError> {
        let client = self.live_client().await?;
        let jid = parse_jid(target)?;

        let msg = waproto::whatsapp::Message {
            conversation: Some(text.to_string()),
            ..Default::default()
        };
        client
            .send_message(jid, msg)
            .await
            .map_err(|e| WabotError::Transport(format!("whatsapp send failed: {e}")))
    }

    async fn send_image(
        &self,
        target: &Target,
        image: &[u8],
        mimetype: &str,
        caption: &str,
    ) -> Result<String, WabotError> {
        let client = self.live_client().await?;
        let jid = parse_jid(target)?;

        let upload = client
            .upload(image.to_vec(), whatsapp_rust::download::MediaType::Image)
            .await
            .map_err(|e| WabotError::Transport(format!("whatsapp image upload failed: {e}")))?;

        let msg = waproto::whatsapp::Message {
            image_message: Some(Box::new(waproto::whatsapp::message::ImageMessage {
                mimetype: Some(mimetype.to_string()),
                caption: Some(caption.to_string()),
                url: Some(upload.url),
                direct_path: Some(upload.direct_path),
                media_key: Some(upload.media_key),
                file_enc_sha256: Some(upload.file_enc_sha256),
                file_sha256: Some(upload.file_sha256),
                file_length: Some(upload.file_length),
                ..Default::default()
            })),
            ..Default::default()
        };

        client
            .send_message(jid, msg)
            .await
            .map_err(|e| WabotError::Transport(format!("whatsapp image send failed: {e}")))
    }

    async fn joined_groups(&self) -> Result<Vec<GroupInfo>, WabotError> {
        let client = self.live_client().await?;
        let groups = client
            .groups()
            .get_participating()
            .await
            .map_err(|e| WabotError::Transport(format!("failed to list groups: {e}")))?;

        let mut out: Vec<GroupInfo> = groups
            .into_values()
            .map(|meta| GroupInfo {
                id: meta.id.to_string(),
                name: meta.subject,
                owner: None,
                created_at: None,
            })
            .collect();
        out.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(out)
    }

    async fn disconnect(&self) -> Result<(), WabotError> {
        self.connected.store(false, Ordering::SeqCst);
        *self.client.lock().await = None;
        info!("WhatsApp transport stopped");
        Ok(())
    }
}
