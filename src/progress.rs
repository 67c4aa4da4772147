//! Progress-callback trait for analysis pipeline events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to observe a
//! request as it moves through adapt → model → render.
//!
//! The model call is the one long wait in the pipeline; a callback is how a
//! front end shows a spinner or status line while it is in flight.
//!
//! # Example
//!
//! ```rust
//! use visual_health_report::{AnalysisConfig, AnalysisProgressCallback};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl AnalysisProgressCallback for Printer {
//!     fn on_model_request(&self, model: &str) {
//!         eprintln!("asking {model}…");
//!     }
//! }
//!
//! let config = AnalysisConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn AnalysisProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the analysis pipeline at each stage boundary.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events for one request arrive in order:
/// `on_analysis_start`, `on_model_request`, `on_model_response`,
/// `on_render_complete`, `on_analysis_complete`, with `on_analysis_error`
/// replacing the remainder if a stage fails.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called once the image payload has been prepared.
    ///
    /// # Arguments
    /// * `media_type` — declared media type of the uploaded image
    /// * `image_bytes` — size of the uploaded image
    fn on_analysis_start(&self, media_type: &str, image_bytes: usize) {
        let _ = (media_type, image_bytes);
    }

    /// Called just before the model request is sent.
    fn on_model_request(&self, model: &str) {
        let _ = model;
    }

    /// Called when the model returned its narrative.
    ///
    /// # Arguments
    /// * `narrative_len` — byte length of the narrative
    /// * `duration_ms`   — wall-clock time of the model call
    fn on_model_response(&self, narrative_len: usize, duration_ms: u64) {
        let _ = (narrative_len, duration_ms);
    }

    /// Called when the PDF buffer has been finalised.
    fn on_render_complete(&self, pages: usize, bytes: usize) {
        let _ = (pages, bytes);
    }

    /// Called once after a successful request.
    fn on_analysis_complete(&self, total_duration_ms: u64) {
        let _ = total_duration_ms;
    }

    /// Called when any stage fails; no further events follow.
    fn on_analysis_error(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;
