//! Analysis entry points: one submission in, one narrative and report out.
//!
//! Every entry point runs the same linear pipeline exactly once:
//!
//! ```text
//! AnalysisRequest ──▶ encode ──▶ model ──▶ layout + render ──▶ AnalysisOutput
//! ```
//!
//! A request without an image fails with
//! [`HealthReportError::MissingFile`] before the model is resolved or
//! called, and before anything is drawn.

use crate::config::AnalysisConfig;
use crate::error::HealthReportError;
use crate::output::{AnalysisOutput, AnalysisStats};
use crate::pipeline::input::AnalysisRequest;
use crate::pipeline::llm::{self, ModelClient, VisionModel};
use crate::pipeline::{encode, render};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};

/// Analyse the uploaded image with the model configured in `config`.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// * [`HealthReportError::MissingFile`] when `request.image` is `None`
/// * [`HealthReportError::ProviderNotConfigured`] when no API key or
///   provider is available
/// * any model or render failure; nothing is retried
///
/// # Example
/// ```rust,no_run
/// use visual_health_report::{analyze, AnalysisConfig, AnalysisRequest, UploadedImage};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("rash.jpg")?;
/// let request = AnalysisRequest::new("Is this eczema?")
///     .with_image(UploadedImage::from_bytes("rash.jpg", bytes)?);
/// let output = analyze(&request, &AnalysisConfig::default()).await?;
/// println!("{}", output.narrative);
/// output.report.write_to("health_report.pdf")?;
/// # Ok(())
/// # }
/// ```
pub async fn analyze(
    request: &AnalysisRequest,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, HealthReportError> {
    if request.image.is_none() {
        return Err(report_error(config, HealthReportError::MissingFile));
    }
    let client = ModelClient::from_config(config).map_err(|e| report_error(config, e))?;
    analyze_with_model(request, &client, config).await
}

/// Analyse with an explicit model instead of resolving one from `config`.
///
/// Tests and embedders use this to plug in their own [`VisionModel`].
pub async fn analyze_with_model<M: VisionModel>(
    request: &AnalysisRequest,
    model: &M,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, HealthReportError> {
    run_pipeline(request, model, config)
        .await
        .map_err(|e| report_error(config, e))
}

/// Analyse and write the report to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn analyze_to_file(
    request: &AnalysisRequest,
    output_path: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, HealthReportError> {
    let output = analyze(request, config).await?;
    let path = output_path.as_ref().to_path_buf();

    let output = tokio::task::spawn_blocking(move || output.report.write_to(&path).map(|()| output))
        .await
        .map_err(|e| HealthReportError::Internal(format!("Write task panicked: {}", e)))??;

    Ok(output)
}

/// Synchronous wrapper around [`analyze`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(
    request: &AnalysisRequest,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, HealthReportError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| HealthReportError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(analyze(request, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run_pipeline<M: VisionModel>(
    request: &AnalysisRequest,
    model: &M,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, HealthReportError> {
    let total_start = Instant::now();
    let cb = config.progress_callback.as_ref();

    // ── Step 1: Adapt the upload ─────────────────────────────────────────
    let payload = encode::prepare_image_payload(request.image.as_ref())?;
    let primary = payload.primary();
    info!(
        "Starting analysis: {} ({} bytes)",
        primary.mime_type,
        primary.data.len()
    );
    if let Some(cb) = cb {
        cb.on_analysis_start(&primary.mime_type, primary.data.len());
    }

    // ── Step 2: Model call ───────────────────────────────────────────────
    if let Some(cb) = cb {
        cb.on_model_request(model.model_name());
    }
    let model_start = Instant::now();
    let response = llm::generate_analysis(model, &payload, &request.prompt, config).await?;
    let model_duration_ms = model_start.elapsed().as_millis() as u64;
    if let Some(cb) = cb {
        cb.on_model_response(response.text.len(), model_duration_ms);
    }

    // ── Step 3: Render the report ────────────────────────────────────────
    let render_start = Instant::now();
    let image = request.image.as_ref().and_then(|img| img.decode());
    if image.is_none() {
        warn!("Rendering report without the uploaded image");
    }
    let report = render::render_report(&response.text, image, config).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    if let Some(cb) = cb {
        cb.on_render_complete(report.page_count, report.len());
    }

    // ── Step 4: Stats ────────────────────────────────────────────────────
    let stats = AnalysisStats {
        model_duration_ms,
        render_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        report_pages: report.page_count,
        narrative_lines: response.text.lines().count(),
        report_bytes: report.len(),
        input_tokens: response.input_tokens,
        output_tokens: response.output_tokens,
    };

    info!(
        "Analysis complete: {} pages, {}ms total",
        stats.report_pages, stats.total_duration_ms
    );
    if let Some(cb) = cb {
        cb.on_analysis_complete(stats.total_duration_ms);
    }

    Ok(AnalysisOutput {
        narrative: response.text,
        report,
        stats,
    })
}

/// Log a fatal error, forward it to the progress callback and hand it back.
///
/// A bad submission is the user's to fix and is logged as a warning; anything
/// past the input stage is an error.
fn report_error(config: &AnalysisConfig, error: HealthReportError) -> HealthReportError {
    if error.is_input_error() {
        warn!("Submission rejected: {}", error);
    } else {
        error!("Analysis failed: {}", error);
    }
    if let Some(ref cb) = config.progress_callback {
        cb.on_analysis_error(&error.to_string());
    }
    error
}
