//! Configuration for image analysis and report rendering.
//!
//! All behaviour is controlled through [`AnalysisConfig`], built via its
//! [`AnalysisConfigBuilder`]. One struct carries the model choice, the
//! credential, the prompt override and the report geometry, so a request can
//! be reproduced from its config alone.

use crate::error::HealthReportError;
use crate::pipeline::layout::LayoutMetrics;
use crate::progress::ProgressCallback;
use crate::prompts::DEFAULT_REPORT_FILE_NAME;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Model used by the built-in Gemini client when none is configured.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Base URL of the Google Generative Language REST API.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variables searched, in order, for the Gemini API key.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GOOGLE_API_KEY", "GEMINI_API_KEY"];

/// Configuration for one analysis request.
///
/// Built via [`AnalysisConfig::builder()`] or using
/// [`AnalysisConfig::default()`].
///
/// # Example
/// ```rust
/// use visual_health_report::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .model("gemini-1.5-flash")
///     .api_timeout_secs(90)
///     .build()
///     .unwrap();
/// assert_eq!(config.report_file_name, "health_report.pdf");
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Model identifier, e.g. "gemini-1.5-flash", "gpt-4.1-mini".
    /// If None, the Gemini client uses [`DEFAULT_GEMINI_MODEL`].
    pub model: Option<String>,

    /// Provider name. `None` or `"gemini"` selects the built-in Gemini REST
    /// client; any other name (e.g. "openai", "anthropic", "ollama") is
    /// created through `edgequake_llm::ProviderFactory`.
    pub provider_name: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Gemini API key. If None, read from `GOOGLE_API_KEY` then
    /// `GEMINI_API_KEY`.
    pub api_key: Option<String>,

    /// Base URL for the Gemini REST API. Default: [`DEFAULT_GEMINI_BASE_URL`].
    pub api_base_url: String,

    /// Sampling temperature. Default: None (model default).
    pub temperature: Option<f32>,

    /// Cap on generated tokens. Default: None (model default).
    pub max_output_tokens: Option<u32>,

    /// Timeout for the model call in seconds. Default: None.
    ///
    /// The call blocks until the service answers unless this is set.
    pub api_timeout_secs: Option<u64>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Custom instruction. If None, uses [`crate::prompts::ANALYSIS_PROMPT`].
    pub system_prompt: Option<String>,

    /// File name offered for the rendered report. Default: `health_report.pdf`.
    pub report_file_name: String,

    /// Report geometry. Default: US letter.
    pub layout: LayoutMetrics,

    /// Optional observer for pipeline stages.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            api_key: None,
            api_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            temperature: None,
            max_output_tokens: None,
            api_timeout_secs: None,
            download_timeout_secs: 120,
            system_prompt: None,
            report_file_name: DEFAULT_REPORT_FILE_NAME.to_string(),
            layout: LayoutMetrics::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base_url", &self.api_base_url)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .field("report_file_name", &self.report_file_name)
            .field("layout", &self.layout)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn AnalysisProgressCallback>"),
            )
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }

    /// The Gemini API key: explicit config first, then the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
            return Some(key.clone());
        }
        API_KEY_ENV_VARS
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|value| !value.trim().is_empty())
    }

    /// `true` when the built-in Gemini client should be used.
    pub fn uses_gemini(&self) -> bool {
        self.provider.is_none()
            && self
                .provider_name
                .as_deref()
                .map_or(true, |name| name.eq_ignore_ascii_case("gemini"))
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn max_output_tokens(mut self, n: u32) -> Self {
        self.config.max_output_tokens = Some(n);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn report_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.report_file_name = name.into();
        self
    }

    pub fn layout(mut self, metrics: LayoutMetrics) -> Self {
        self.config.layout = metrics;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, HealthReportError> {
        let c = &self.config;
        if c.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
            return Err(HealthReportError::InvalidConfig(
                "Model name must not be empty".into(),
            ));
        }
        if c.api_timeout_secs == Some(0) {
            return Err(HealthReportError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.download_timeout_secs == 0 {
            return Err(HealthReportError::InvalidConfig(
                "Download timeout must be ≥ 1 second".into(),
            ));
        }
        if c.report_file_name.trim().is_empty() {
            return Err(HealthReportError::InvalidConfig(
                "Report file name must not be empty".into(),
            ));
        }
        if c.max_output_tokens == Some(0) {
            return Err(HealthReportError::InvalidConfig(
                "Max output tokens must be ≥ 1".into(),
            ));
        }
        c.layout
            .validate()
            .map_err(|e| HealthReportError::InvalidConfig(format!("layout: {e}")))?;
        Ok(self.config)
    }
}
