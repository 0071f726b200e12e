//! Reliable delivery on top of a [`Transport`]: bounded retry with linear
//! backoff, paced fan-out, and a degrade-gracefully ladder for media.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use wabot_core::{
    config::DeliveryConfig,
    error::{DeliveryError, ResolutionError, WabotError},
    target::Target,
    traits::Transport,
};

use crate::media;

/// A successful delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub target: Target,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    pub message_id: String,
}

/// One entry of a fan-out: the raw identifier as supplied, its resolution,
/// and the text to send.
#[derive(Debug, Clone)]
pub struct FanOutItem {
    pub raw: String,
    pub target: Result<Target, ResolutionError>,
    pub text: String,
}

/// Per-target result of a fan-out.
#[derive(Debug)]
pub struct FanOutOutcome {
    pub raw: String,
    /// `None` when the identifier did not resolve.
    pub target: Option<Target>,
    pub result: Result<DeliveryReport, WabotError>,
}

impl FanOutOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error_text(&self) -> Option<String> {
        self.result.as_ref().err().map(ToString::to_string)
    }
}

/// Which rung of the media ladder got through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaOutcome {
    Uploaded,
    DataUrl,
    Thumbnail,
    TextFallback,
}

/// Sends through a shared transport. Holds no state between calls.
#[derive(Clone)]
pub struct DeliveryEngine {
    transport: Arc<dyn Transport>,
    backoff: Duration,
    max_media_bytes: usize,
    max_inline_chars: usize,
    thumbnail_px: u32,
}

impl DeliveryEngine {
    pub fn new(transport: Arc<dyn Transport>, config: &DeliveryConfig) -> Self {
        Self {
            transport,
            backoff: Duration::from_millis(config.backoff_ms),
            max_media_bytes: config.max_media_bytes,
            max_inline_chars: config.max_inline_chars,
            thumbnail_px: config.thumbnail_px,
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Send `text` to `target`, up to `max_attempts` times. Attempt `k`
    /// (0-based) waits `k` backoff units first.
    pub async fn deliver_with_retry(
        &self,
        target: &Target,
        text: &str,
        max_attempts: u32,
    ) -> Result<DeliveryReport, DeliveryError> {
        let max_attempts = max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 0..max_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.backoff * attempt).await;
            }
            match self.transport.send_text(target, text).await {
                Ok(message_id) => {
                    if attempt > 0 {
                        info!(recipient = %target, attempt = attempt + 1, "delivered after retry");
                    }
                    return Ok(DeliveryReport {
                        target: target.clone(),
                        attempts: attempt + 1,
                        message_id,
                    });
                }
                Err(e) => {
                    warn!(
                        recipient = %target,
                        attempt = attempt + 1,
                        max_attempts,
                        "send failed: {e}"
                    );
                    last_error = e.to_string();
                }
            }
        }

        error!(recipient = %target, attempts = max_attempts, "giving up: {last_error}");
        Err(DeliveryError {
            target: target.to_string(),
            attempts: max_attempts,
            last_error,
        })
    }

    /// Deliver each item independently, pausing `pacing` between sends.
    /// Unresolved items are reported without a send and without a pause.
    pub async fn fan_out(
        &self,
        items: Vec<FanOutItem>,
        max_attempts: u32,
        pacing: Duration,
    ) -> Vec<FanOutOutcome> {
        let mut outcomes = Vec::with_capacity(items.len());
        let mut sent_before = false;

        for item in items {
            let target = match item.target {
                Ok(target) => target,
                Err(e) => {
                    warn!(raw = %item.raw, "skipping unresolvable target: {e}");
                    outcomes.push(FanOutOutcome {
                        raw: item.raw,
                        target: None,
                        result: Err(e.into()),
                    });
                    continue;
                }
            };

            if sent_before && !pacing.is_zero() {
                tokio::time::sleep(pacing).await;
            }
            sent_before = true;

            let result = self
                .deliver_with_retry(&target, &item.text, max_attempts)
                .await
                .map_err(WabotError::from);
            outcomes.push(FanOutOutcome {
                raw: item.raw,
                target: Some(target),
                result,
            });
        }

        outcomes
    }

    /// Send an image, stepping down until something gets through: direct
    /// upload, compressed inline data URL, thumbnail data URL, plain text.
    /// Each rung is tried once.
    pub async fn send_media(
        &self,
        target: &Target,
        image: &[u8],
        mimetype: &str,
        caption: &str,
    ) -> Result<MediaOutcome, WabotError> {
        if image.len() > self.max_media_bytes {
            let err = WabotError::PayloadTooLarge {
                size: image.len(),
                max: self.max_media_bytes,
            };
            warn!(recipient = %target, "{err}, skipping upload");
        } else {
            match self
                .transport
                .send_image(target, image, mimetype, caption)
                .await
            {
                Ok(_) => return Ok(MediaOutcome::Uploaded),
                Err(e) => warn!(recipient = %target, "image upload failed: {e}"),
            }
        }

        // Bytes that come back unchanged keep their own mimetype.
        let (compressed, inline_mime) = match media::compress(image) {
            Ok(bytes) if bytes.as_slice() != image => (bytes, "image/jpeg"),
            Ok(bytes) => (bytes, mimetype),
            Err(e) => {
                warn!("cannot re-encode image: {e}");
                (image.to_vec(), mimetype)
            }
        };
        let inline = media::data_url(inline_mime, &compressed);

        if inline.len() <= self.max_inline_chars {
            let text = format!("🎨 *AI Generated Image*\n\n{caption}\n\n📎 *Data URL:*\n{inline}");
            match self.transport.send_text(target, &text).await {
                Ok(_) => return Ok(MediaOutcome::DataUrl),
                Err(e) => warn!(recipient = %target, "data URL send failed: {e}"),
            }
        } else {
            info!(
                "data URL too long ({} chars), trying thumbnail",
                inline.len()
            );
        }

        match media::thumbnail(&compressed, self.thumbnail_px) {
            Ok(thumb) => {
                let thumb_url = media::data_url("image/jpeg", &thumb);
                if thumb_url.len() <= self.max_inline_chars {
                    let text = format!(
                        "🎨 *AI Generated Image*\n\n{caption}\n\n📎 *Thumbnail:*\n{thumb_url}\n\n\
                         _The full image was too large, this is a small preview._"
                    );
                    match self.transport.send_text(target, &text).await {
                        Ok(_) => return Ok(MediaOutcome::Thumbnail),
                        Err(e) => warn!(recipient = %target, "thumbnail send failed: {e}"),
                    }
                }
            }
            Err(e) => warn!("thumbnail failed: {e}"),
        }

        let text = format!(
            "🎨 *AI Generated Image*\n\n{caption}\n\n❌ *Could not send the image*\n\n\
             The image was generated but is too large to send over WhatsApp.\n\n\
             *Details:*\n• File size: {} bytes\n• Data URL: {} characters\n• Limit: ~{} characters",
            compressed.len(),
            inline.len(),
            self.max_inline_chars
        );
        self.transport
            .send_text(target, &text)
            .await
            .map(|_| MediaOutcome::TextFallback)
            .map_err(|e| {
                WabotError::from(DeliveryError {
                    target: target.to_string(),
                    attempts: 1,
                    last_error: e.to_string(),
                })
            })
    }
}
