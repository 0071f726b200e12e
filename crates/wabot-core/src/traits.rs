use crate::{
    context::Context,
    error::{GenerationError, WabotError},
    market::MarketSnapshot,
    message::{GroupInfo, InboundMessage},
    target::Target,
};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Messaging transport: one connected session to the messaging network.
///
/// Implementations serialize their own access; callers share one handle
/// across every flow.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Human-readable transport name.
    fn name(&self) -> &str;

    /// Connect and start receiving. Returns the inbound message stream.
    async fn connect(&self) -> Result<mpsc::Receiver<InboundMessage>, WabotError>;

    /// Whether the session is currently usable for sending.
    fn is_connected(&self) -> bool;

    /// Send one text message. Returns the transport message id.
    async fn send_text(&self, target: &Target, text: &str) -> Result<String, WabotError>;

    /// Upload and send an image with a caption. Returns the transport message id.
    async fn send_image(
        &self,
        target: &Target,
        image: &[u8],
        mimetype: &str,
        caption: &str,
    ) -> Result<String, WabotError>;

    /// Groups the connected account participates in.
    async fn joined_groups(&self) -> Result<Vec<GroupInfo>, WabotError>;

    /// Graceful shutdown.
    async fn disconnect(&self) -> Result<(), WabotError>;
}

/// An image produced by a [`Generator`].
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mimetype: String,
}

/// Text and image generation backend.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Human-readable backend name.
    fn name(&self) -> &str;

    /// Answer the context's current message.
    async fn generate(&self, context: &Context) -> Result<String, GenerationError>;

    /// Produce an image from a description.
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, GenerationError>;
}

/// Source of the daily market bulletin.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Today's snapshot. Individual source failures leave their section empty.
    async fn snapshot(&self) -> Result<MarketSnapshot, WabotError>;
}
