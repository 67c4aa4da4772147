//! Error types for the visual-health-report library.
//!
//! Every failure in this crate is fatal for the current request: one image,
//! one model call, one report. There is no per-page partial success to
//! report, so a single enum covers all of it. The variants are grouped by
//! the stage that raises them:
//!
//! * **Input** — nothing to analyse (no file, unreadable file, wrong type).
//! * **Model** — the hosted model could not be reached or refused the call.
//! * **Render** — pdfium could not be loaded or could not finalise the PDF.
//!
//! Nothing here is retried. Callers decide whether to surface the message
//! or try again with different input.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the visual-health-report library.
#[derive(Debug, Error)]
pub enum HealthReportError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Submission had no image attached.
    #[error("No file uploaded\nProvide a .jpg, .jpeg or .png image to analyse.")]
    MissingFile,

    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file is not one of the accepted image types.
    #[error("Unsupported file type '{name}': expected one of jpg, jpeg, png")]
    UnsupportedFileType { name: String },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The model API returned an error or an unusable response.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    /// Model API returned HTTP 429.
    #[error("Rate limit exceeded for provider '{provider}'")]
    RateLimitExceeded {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    /// Model API call exceeded `api_timeout_secs`.
    #[error("API call timed out after {elapsed_ms}ms")]
    ApiTimeout { elapsed_ms: u64 },

    /// Model API returned an authentication error (401/403).
    #[error("Authentication error from provider '{provider}': {detail}")]
    AuthError { provider: String, detail: String },

    // ── Render errors ─────────────────────────────────────────────────────
    /// pdfium failed while building or saving the report.
    #[error("Failed to render PDF report: {detail}")]
    RenderFailed { detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
The PDF report is drawn with PDFium, downloaded on first use. You can:\n\
  • Check network access to github.com for the first download.\n\
  • Set PDFIUM_AUTO_CACHE_DIR to a writable cache directory.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n"
    )]
    PdfiumBindingFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output PDF file.
    #[error("Failed to write report file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HealthReportError {
    /// `true` for errors raised before the model was contacted because the
    /// submission itself was unusable.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::MissingFile
                | Self::FileNotFound { .. }
                | Self::PermissionDenied { .. }
                | Self::UnsupportedFileType { .. }
                | Self::InvalidInput { .. }
                | Self::DownloadFailed { .. }
                | Self::DownloadTimeout { .. }
        )
    }
}
