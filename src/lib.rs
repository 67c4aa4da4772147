//! # visual-health-report
//!
//! Send a health-related image and a question to a hosted multimodal model,
//! then turn its narrative into a paginated PDF report.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image + prompt
//!  │
//!  ├─ 1. Input   resolve a local file or URL into an UploadedImage
//!  ├─ 2. Encode  raw bytes + media type → ImagePayload (base64 on the wire)
//!  ├─ 3. Model   one generateContent call (Gemini, or any edgequake-llm provider)
//!  ├─ 4. Layout  narrative lines → letter pages, 20 pt per line, break at y ≤ 100
//!  ├─ 5. Render  draw the layout with pdfium (spawn_blocking)
//!  └─ 6. Output  narrative + health_report.pdf + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use visual_health_report::{analyze, resolve_image, AnalysisConfig, AnalysisRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key read from GOOGLE_API_KEY / GEMINI_API_KEY
//!     let config = AnalysisConfig::default();
//!     let image = resolve_image("mole.png", config.download_timeout_secs).await?;
//!     let request = AnalysisRequest::new("Should I be worried?").with_image(image);
//!
//!     let output = analyze(&request, &config).await?;
//!     println!("{}", output.narrative);
//!     output.report.write_to(&output.report.file_name)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `health-report` binary (clap + anyhow + tracing-subscriber + indicatif + dotenvy) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! visual-health-report = { version = "0.1", default-features = false }
//! ```
//!
//! The report is drawn with pdfium, loaded at runtime through `pdfium-auto`:
//! the library is downloaded once into the user cache directory
//! (`PDFIUM_AUTO_CACHE_DIR` overrides it) unless `PDFIUM_LIB_PATH` names an
//! existing copy.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze, analyze_sync, analyze_to_file, analyze_with_model};
pub use config::{AnalysisConfig, AnalysisConfigBuilder};
pub use error::HealthReportError;
pub use output::{AnalysisOutput, AnalysisStats, ReportDocument};
pub use pipeline::input::{resolve_image, AnalysisRequest, UploadedImage};
pub use pipeline::layout::{layout_report, LayoutMetrics, ReportLayout};
pub use pipeline::llm::{GeminiClient, ModelClient, ModelRequest, ModelResponse, VisionModel};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback};
