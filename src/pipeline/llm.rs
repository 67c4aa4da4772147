//! Model client: send instruction + image + query, get the narrative back.
//!
//! Two backends sit behind the [`VisionModel`] trait:
//!
//! * [`GeminiClient`] — a direct call to the Google Generative Language
//!   `generateContent` endpoint. This is the default and the only backend
//!   that needs nothing beyond `GOOGLE_API_KEY`.
//! * [`ModelClient::Provider`] — any `edgequake-llm` provider (OpenAI,
//!   Anthropic, Ollama, …) chosen by name, for users who do not have a
//!   Gemini key.
//!
//! Exactly one request is made per submission. There is no retry: a
//! transport failure, a non-2xx status or an empty answer ends the request
//! with an error. A timeout applies only when `api_timeout_secs` is set.

use crate::config::{AnalysisConfig, API_KEY_ENV_VARS, DEFAULT_GEMINI_MODEL};
use crate::error::HealthReportError;
use crate::pipeline::encode::{ImagePart, ImagePayload};
use crate::prompts::ANALYSIS_PROMPT;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Everything the model sees for one submission.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    /// Fixed instruction (system prompt).
    pub instruction: &'a str,
    /// The uploaded image.
    pub image: &'a ImagePart,
    /// The user's free-text query; may be empty.
    pub user_query: &'a str,
}

/// The model's answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelResponse {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A hosted multimodal model that turns an image and text into text.
pub trait VisionModel: Send + Sync {
    /// Identifier shown in logs and progress events.
    fn model_name(&self) -> &str;

    /// Issue one generation call.
    fn generate(
        &self,
        request: &ModelRequest<'_>,
    ) -> impl Future<Output = Result<ModelResponse, HealthReportError>> + Send;
}

/// Run the analysis call for `payload` and `user_query`.
///
/// Uses `config.system_prompt` when set, otherwise [`ANALYSIS_PROMPT`].
pub async fn generate_analysis<M: VisionModel>(
    model: &M,
    payload: &ImagePayload,
    user_query: &str,
    config: &AnalysisConfig,
) -> Result<ModelResponse, HealthReportError> {
    let instruction = config.system_prompt.as_deref().unwrap_or(ANALYSIS_PROMPT);
    let request = ModelRequest {
        instruction,
        image: payload.primary(),
        user_query,
    };

    info!(
        "Calling {} ({} image bytes, {} query chars)",
        model.model_name(),
        request.image.data.len(),
        user_query.chars().count()
    );
    let start = Instant::now();
    let response = model.generate(&request).await?;
    debug!(
        "{}: {} input tokens, {} output tokens, {:?}",
        model.model_name(),
        response.input_tokens,
        response.output_tokens,
        start.elapsed()
    );
    Ok(response)
}

// ── Backend selection ────────────────────────────────────────────────────

/// The concrete model behind a request, resolved from [`AnalysisConfig`].
#[derive(Clone)]
pub enum ModelClient {
    Gemini(GeminiClient),
    Provider {
        provider: Arc<dyn LLMProvider>,
        label: String,
        temperature: Option<f32>,
        max_tokens: Option<usize>,
        timeout: Option<Duration>,
    },
}

impl std::fmt::Debug for ModelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini(client) => f.debug_tuple("Gemini").field(client).finish(),
            Self::Provider { label, timeout, .. } => f
                .debug_struct("Provider")
                .field("label", label)
                .field("timeout", timeout)
                .finish(),
        }
    }
}

impl ModelClient {
    /// Resolve the backend, from most-specific to least-specific:
    ///
    /// 1. **Pre-built provider** (`config.provider`) — used as-is.
    /// 2. **Gemini** (`provider_name` unset or `"gemini"`) — needs an API key
    ///    from config or `GOOGLE_API_KEY` / `GEMINI_API_KEY`.
    /// 3. **Named provider** — created by `ProviderFactory`, which reads that
    ///    provider's own API key variable. A model name is required.
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, HealthReportError> {
        let timeout = config.api_timeout_secs.map(Duration::from_secs);
        let temperature = config.temperature;
        let max_tokens = config.max_output_tokens.map(|n| n as usize);

        if let Some(ref provider) = config.provider {
            return Ok(Self::Provider {
                provider: Arc::clone(provider),
                label: config.model.clone().unwrap_or_else(|| "custom".to_string()),
                temperature,
                max_tokens,
                timeout,
            });
        }

        if config.uses_gemini() {
            let api_key = config.resolve_api_key().ok_or_else(|| {
                HealthReportError::ProviderNotConfigured {
                    provider: "gemini".to_string(),
                    hint: format!(
                        "Set {} (or pass --api-key) to call the Gemini API.",
                        API_KEY_ENV_VARS.join(" or ")
                    ),
                }
            })?;
            return GeminiClient::from_config(config, api_key).map(Self::Gemini);
        }

        let name = config.provider_name.as_deref().unwrap_or_default();
        let model = config.model.as_deref().ok_or_else(|| {
            HealthReportError::ProviderNotConfigured {
                provider: name.to_string(),
                hint: "Pass --model with a vision-capable model for this provider.".to_string(),
            }
        })?;
        let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
            HealthReportError::ProviderNotConfigured {
                provider: name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::Provider {
            provider,
            label: format!("{name}/{model}"),
            temperature,
            max_tokens,
            timeout,
        })
    }
}

impl VisionModel for ModelClient {
    fn model_name(&self) -> &str {
        match self {
            Self::Gemini(client) => client.model_name(),
            Self::Provider { label, .. } => label,
        }
    }

    async fn generate(&self, request: &ModelRequest<'_>) -> Result<ModelResponse, HealthReportError> {
        match self {
            Self::Gemini(client) => client.generate(request).await,
            Self::Provider {
                provider,
                temperature,
                max_tokens,
                timeout,
                ..
            } => {
                let options = CompletionOptions {
                    temperature: *temperature,
                    max_tokens: *max_tokens,
                    ..Default::default()
                };
                generate_with_provider(provider, &options, *timeout, request).await
            }
        }
    }
}

/// Chat-style call: instruction as the system turn, query + image as the user turn.
async fn generate_with_provider(
    provider: &Arc<dyn LLMProvider>,
    options: &CompletionOptions,
    timeout: Option<Duration>,
    request: &ModelRequest<'_>,
) -> Result<ModelResponse, HealthReportError> {
    let image = ImageData::new(request.image.to_base64(), request.image.mime_type.as_str());
    let messages = vec![
        ChatMessage::system(request.instruction),
        ChatMessage::user_with_images(request.user_query, vec![image]),
    ];

    let start = Instant::now();
    let call = provider.chat(&messages, Some(options));
    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
            HealthReportError::ApiTimeout {
                elapsed_ms: start.elapsed().as_millis() as u64,
            }
        })?,
        None => call.await,
    };

    let response = result.map_err(|e| HealthReportError::LlmApiError {
        message: format!("{e}"),
    })?;

    Ok(ModelResponse {
        text: response.content,
        input_tokens: response.prompt_tokens as u64,
        output_tokens: response.completion_tokens as u64,
    })
}

// ── Gemini REST client ───────────────────────────────────────────────────

/// Direct client for `models/{model}:generateContent`.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: Option<f32>,
    max_output_tokens: Option<u32>,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GeminiClient {
    pub fn from_config(config: &AnalysisConfig, api_key: String) -> Result<Self, HealthReportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.api_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| HealthReportError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// Parts go in the order instruction, image, query. An empty query is
    /// left out; the API rejects empty text parts.
    fn request_body(&self, request: &ModelRequest<'_>) -> GenerateContentRequest {
        let mut parts = vec![
            Part::text(request.instruction),
            Part {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: request.image.mime_type.clone(),
                    data: request.image.to_base64(),
                }),
            },
        ];
        if !request.user_query.trim().is_empty() {
            parts.push(Part::text(request.user_query));
        }

        let generation_config = if self.temperature.is_some() || self.max_output_tokens.is_some() {
            Some(GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            })
        } else {
            None
        };

        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config,
        }
    }
}

impl VisionModel for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &ModelRequest<'_>) -> Result<ModelResponse, HealthReportError> {
        let body = self.request_body(request);
        let start = Instant::now();

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    HealthReportError::ApiTimeout {
                        elapsed_ms: start.elapsed().as_millis() as u64,
                    }
                } else {
                    HealthReportError::LlmApiError {
                        message: format!("request to {} failed: {e}", self.model),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            warn!("Gemini returned HTTP {}", status.as_u16());
            return Err(classify_status(status.as_u16(), retry_after_secs, &body));
        }

        let parsed: GenerateContentResponse =
            response
                .json()
                .await
                .map_err(|e| HealthReportError::LlmApiError {
                    message: format!("malformed generateContent response: {e}"),
                })?;

        extract_response(parsed)
    }
}

/// Map a non-2xx status onto the error taxonomy.
fn classify_status(status: u16, retry_after_secs: Option<u64>, body: &str) -> HealthReportError {
    let detail = api_error_message(body);
    match status {
        401 | 403 => HealthReportError::AuthError {
            provider: "gemini".to_string(),
            detail,
        },
        429 => HealthReportError::RateLimitExceeded {
            provider: "gemini".to_string(),
            retry_after_secs,
        },
        _ => HealthReportError::LlmApiError {
            message: format!("HTTP {status}: {detail}"),
        },
    }
}

/// Pull `error.message` out of a Google API error body, else the raw body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().chars().take(500).collect())
}

/// Concatenate the text parts of the first candidate.
///
/// Fails only when the prompt was blocked or the first candidate carries no
/// text part at all. Text that is present is returned as-is, even when it is
/// empty or whitespace.
fn extract_response(parsed: GenerateContentResponse) -> Result<ModelResponse, HealthReportError> {
    let (input_tokens, output_tokens) = parsed
        .usage_metadata
        .as_ref()
        .map(|u| {
            (
                u.prompt_token_count.unwrap_or(0),
                u.candidates_token_count.unwrap_or(0),
            )
        })
        .unwrap_or((0, 0));

    if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(no_text(format!("prompt blocked: {reason}")));
    }

    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| no_text("no candidates".to_string()))?;

    let parts: Vec<&str> = candidate
        .content
        .iter()
        .flat_map(|content| content.parts.iter())
        .filter_map(|p| p.text.as_deref())
        .collect();

    if parts.is_empty() {
        let reason = candidate.finish_reason.as_deref().unwrap_or("unknown");
        return Err(no_text(format!("finish reason: {reason}")));
    }

    let text = parts.concat();
    Ok(ModelResponse {
        text,
        input_tokens,
        output_tokens,
    })
}

fn no_text(reason: String) -> HealthReportError {
    HealthReportError::LlmApiError {
        message: format!("model returned no text ({reason})"),
    }
}

// ── Wire format ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            inline_data: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
}
