//! Google Gemini backend.
//!
//! Calls the `generateContent` endpoint for both text answers and image
//! generation. Auth via URL query param.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use wabot_core::{
    config::GeminiConfig,
    context::{Context, Role},
    error::GenerationError,
    traits::{GeneratedImage, Generator},
};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Longest slice of an error body carried into the error text.
const ERROR_BODY_PREVIEW: usize = 300;

/// Google Gemini text and image generator.
pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    image_model: String,
    timeout: Duration,
}

impl GeminiGenerator {
    /// Create from config values.
    pub fn from_config(config: &GeminiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.api_key.trim().to_string(),
            model: config.model.clone(),
            image_model: config.image_model.clone(),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// The key travels in a header so it never shows up in URLs or in
    /// errors that echo them.
    fn request(&self, model: &str, body: &GeminiRequest) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{GEMINI_BASE_URL}/models/{model}:generateContent"))
            .header("x-goog-api-key", &self.api_key)
            .timeout(self.timeout)
            .json(body)
    }

    async fn post(
        &self,
        model: &str,
        body: &GeminiRequest,
    ) -> Result<GeminiResponse, GenerationError> {
        if !self.is_configured() {
            return Err(GenerationError::NotConfigured);
        }

        debug!("gemini: POST models/{model}:generateContent");

        let resp = self
            .request(model, body)
            .send()
            .await
            .map_err(|e| {
                GenerationError::Failed(format!("gemini request failed: {}", e.without_url()))
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_failure(status.as_u16(), &text));
        }

        resp.json()
            .await
            .map_err(|e| GenerationError::Failed(format!("gemini: failed to parse response: {e}")))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    total_token_count: u64,
}

impl GeminiResponse {
    fn parts(&self) -> &[GeminiPart] {
        self.candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or_default()
    }

    /// All text parts of the first candidate, joined and trimmed.
    fn text(&self) -> String {
        self.parts()
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<String>()
            .trim()
            .to_string()
    }

    fn inline_image(&self) -> Option<&InlineData> {
        self.parts().iter().find_map(|p| p.inline_data.as_ref())
    }
}

fn text_part(text: &str) -> GeminiPart {
    GeminiPart {
        text: Some(text.to_string()),
        inline_data: None,
    }
}

fn build_text_request(context: &Context) -> GeminiRequest {
    let system_instruction = (!context.system_prompt.is_empty()).then(|| GeminiContent {
        role: None,
        parts: vec![text_part(&context.system_prompt)],
    });

    let contents = context
        .turns()
        .iter()
        .map(|turn| {
            let role = match turn.role {
                Role::Assistant => "model",
                Role::User => "user",
            };
            GeminiContent {
                role: Some(role.to_string()),
                parts: vec![text_part(&turn.content)],
            }
        })
        .collect();

    GeminiRequest {
        contents,
        system_instruction,
        generation_config: None,
    }
}

fn build_image_request(prompt: &str) -> GeminiRequest {
    GeminiRequest {
        contents: vec![GeminiContent {
            role: Some("user".to_string()),
            parts: vec![text_part(prompt)],
        }],
        system_instruction: None,
        generation_config: Some(GenerationConfig {
            response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
        }),
    }
}

/// Map a non-success HTTP response to a [`GenerationError`].
fn classify_failure(status: u16, body: &str) -> GenerationError {
    let lower = body.to_lowercase();
    if status == 429
        || body.contains("RESOURCE_EXHAUSTED")
        || lower.contains("quota")
        || lower.contains("rate limit")
    {
        return GenerationError::RateLimited;
    }
    let preview: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
    GenerationError::Failed(format!("gemini returned {status}: {preview}"))
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, context: &Context) -> Result<String, GenerationError> {
        let start = Instant::now();
        let parsed = self.post(&self.model, &build_text_request(context)).await?;

        let text = parsed.text();
        if text.is_empty() {
            return Err(GenerationError::Failed(
                "gemini returned no candidates".to_string(),
            ));
        }

        info!(
            "gemini: answered in {}ms ({} tokens)",
            start.elapsed().as_millis(),
            parsed
                .usage_metadata
                .as_ref()
                .map_or(0, |u| u.total_token_count)
        );
        Ok(text)
    }

    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, GenerationError> {
        let start = Instant::now();
        let parsed = self
            .post(&self.image_model, &build_image_request(prompt))
            .await?;

        let inline = parsed
            .inline_image()
            .ok_or_else(|| GenerationError::Failed("gemini returned no image".to_string()))?;
        let bytes = STANDARD
            .decode(inline.data.as_bytes())
            .map_err(|e| GenerationError::Failed(format!("gemini image is not base64: {e}")))?;

        info!(
            "gemini: image of {} bytes in {}ms",
            bytes.len(),
            start.elapsed().as_millis()
        );
        Ok(GeneratedImage {
            bytes,
            mimetype: inline.mime_type.clone(),
        })
    }
}
