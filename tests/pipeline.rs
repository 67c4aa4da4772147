//! Integration tests for the analysis pipeline with a stub model.
//!
//! No model API access is needed. Tests that draw the PDF bind pdfium
//! through `pdfium-auto`, which downloads the library on first use, so they
//! are ignored by default and fail hard when run without it.
//!
//! Run with:
//!   cargo test --test pipeline -- --include-ignored

use pdfium_render::prelude::*;
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use visual_health_report::pipeline::render::bind_pdfium;
use visual_health_report::prompts::{ANALYSIS_PROMPT, DISCLAIMER, FINDINGS_HEADER, REPORT_TITLE};
use visual_health_report::{
    analyze_to_file, analyze_with_model, layout_report, AnalysisConfig, AnalysisProgressCallback,
    AnalysisRequest, HealthReportError, LayoutMetrics, ModelRequest, ModelResponse, UploadedImage,
    VisionModel,
};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// What the stub saw on its last call.
#[derive(Debug, Clone)]
struct Seen {
    instruction: String,
    user_query: String,
    mime_type: String,
    image_len: usize,
}

/// A `VisionModel` that answers with a canned narrative (or error) and
/// records every call.
struct StubModel {
    reply: Result<String, String>,
    calls: AtomicUsize,
    seen: Mutex<Option<Seen>>,
}

impl StubModel {
    fn answering(text: impl Into<String>) -> Self {
        Self {
            reply: Ok(text.into()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(None),
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(None),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn seen(&self) -> Seen {
        self.seen.lock().unwrap().clone().expect("model was called")
    }
}

impl VisionModel for StubModel {
    fn model_name(&self) -> &str {
        "stub-vision"
    }

    async fn generate(&self, request: &ModelRequest<'_>) -> Result<ModelResponse, HealthReportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen.lock().unwrap() = Some(Seen {
            instruction: request.instruction.to_string(),
            user_query: request.user_query.to_string(),
            mime_type: request.image.mime_type.clone(),
            image_len: request.image.data.len(),
        });
        match &self.reply {
            Ok(text) => Ok(ModelResponse {
                text: text.clone(),
                input_tokens: 258,
                output_tokens: 40,
            }),
            Err(message) => Err(HealthReportError::LlmApiError {
                message: message.clone(),
            }),
        }
    }
}

/// Records progress events in arrival order.
#[derive(Default)]
struct EventLog(Mutex<Vec<String>>);

impl EventLog {
    fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.0.lock().unwrap().push(event);
    }
}

impl AnalysisProgressCallback for EventLog {
    fn on_analysis_start(&self, media_type: &str, _image_bytes: usize) {
        self.push(format!("start:{media_type}"));
    }
    fn on_model_request(&self, model: &str) {
        self.push(format!("request:{model}"));
    }
    fn on_model_response(&self, narrative_len: usize, _duration_ms: u64) {
        self.push(format!("response:{narrative_len}"));
    }
    fn on_render_complete(&self, pages: usize, _bytes: usize) {
        self.push(format!("render:{pages}"));
    }
    fn on_analysis_complete(&self, _total_duration_ms: u64) {
        self.push("complete".into());
    }
    fn on_analysis_error(&self, _error: &str) {
        self.push("error".into());
    }
}

/// A small real PNG so the report embeds an actual image.
fn sample_png() -> UploadedImage {
    let img = image::RgbImage::from_fn(32, 32, |x, y| image::Rgb([(x * 8) as u8, (y * 8) as u8, 128]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("encode png");
    UploadedImage::from_bytes("skin.png", bytes).expect("png is accepted")
}

fn numbered_lines(n: usize) -> String {
    (1..=n).map(|i| format!("Finding {i}")).collect::<Vec<_>>().join("\n")
}

// ── Missing input ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_file_makes_no_model_call() {
    let model = StubModel::answering("should never be used");
    let log = Arc::new(EventLog::default());
    let config = AnalysisConfig::builder()
        .progress_callback(log.clone())
        .build()
        .unwrap();

    let err = analyze_with_model(&AnalysisRequest::new("rash on arm"), &model, &config)
        .await
        .unwrap_err();

    assert!(matches!(err, HealthReportError::MissingFile));
    assert!(err.to_string().starts_with("No file uploaded"));
    assert_eq!(model.calls(), 0);
    assert_eq!(log.events(), vec!["error"]);
}

// ── Model request ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_model_receives_instruction_image_and_query() {
    let model = StubModel::answering("Mild irritation.");
    let request = AnalysisRequest::new("Itchy since Monday").with_image(sample_png());
    let image_len = request.image.as_ref().unwrap().len();

    // Rendering may fail without pdfium; the model call has happened by then.
    let _ = analyze_with_model(&request, &model, &AnalysisConfig::default()).await;

    assert_eq!(model.calls(), 1);
    let seen = model.seen();
    assert_eq!(seen.instruction, ANALYSIS_PROMPT);
    assert_eq!(seen.user_query, "Itchy since Monday");
    assert_eq!(seen.mime_type, "image/png");
    assert_eq!(seen.image_len, image_len);
}

#[tokio::test]
async fn test_system_prompt_override_reaches_model() {
    let model = StubModel::answering("ok");
    let config = AnalysisConfig::builder()
        .system_prompt("Describe the image in one sentence.")
        .build()
        .unwrap();
    let request = AnalysisRequest::new("").with_image(sample_png());

    let _ = analyze_with_model(&request, &model, &config).await;

    let seen = model.seen();
    assert_eq!(seen.instruction, "Describe the image in one sentence.");
    assert_eq!(seen.user_query, "");
}

#[tokio::test]
async fn test_model_failure_stops_before_rendering() {
    let model = StubModel::failing("HTTP 500: backend unavailable");
    let log = Arc::new(EventLog::default());
    let config = AnalysisConfig::builder()
        .progress_callback(log.clone())
        .build()
        .unwrap();
    let request = AnalysisRequest::new("?").with_image(sample_png());

    let err = analyze_with_model(&request, &model, &config).await.unwrap_err();

    assert!(matches!(err, HealthReportError::LlmApiError { .. }));
    assert_eq!(model.calls(), 1);
    assert_eq!(
        log.events(),
        vec!["start:image/png", "request:stub-vision", "error"]
    );
}

#[tokio::test]
async fn test_undecodable_image_still_goes_to_model() {
    let model = StubModel::answering("Cannot tell.");
    let request = AnalysisRequest::new("")
        .with_image(UploadedImage::new("photo.jpg", "image/jpeg", b"not really a jpeg".to_vec()));

    let result = analyze_with_model(&request, &model, &AnalysisConfig::default()).await;

    let seen = model.seen();
    assert_eq!(seen.mime_type, "image/jpeg");
    assert_eq!(seen.image_len, 17);
    if let Err(e) = result {
        // Only a missing pdfium may stop this request.
        assert!(matches!(e, HealthReportError::PdfiumBindingFailed(_)), "got: {e}");
    }
}

// ── Layout (no pdfium needed) ────────────────────────────────────────────────

#[test]
fn test_disclaimer_only_on_final_page() {
    let metrics = LayoutMetrics::default();
    for n in [0, 1, 22, 23, 55, 56, 120] {
        let layout = layout_report(&numbered_lines(n), true, &metrics);
        let last = layout.page_count() - 1;
        for (i, page) in layout.pages.iter().enumerate() {
            assert_eq!(page.contains_text(DISCLAIMER), i == last, "lines={n} page={i}");
        }
        assert_eq!(layout.page_count(), metrics.page_count_for(n), "lines={n}");
    }
}

#[test]
fn test_page_count_boundaries() {
    let metrics = LayoutMetrics::default();
    let pages = |n| layout_report(&numbered_lines(n), false, &metrics).page_count();
    assert_eq!(pages(0), 1);
    assert_eq!(pages(22), 1);
    assert_eq!(pages(23), 2);
    assert_eq!(pages(55), 2);
    assert_eq!(pages(56), 3);
}

#[test]
fn test_empty_narrative_has_frame_only() {
    let layout = layout_report("", true, &LayoutMetrics::default());
    assert_eq!(layout.page_count(), 1);
    assert_eq!(layout.findings_lines, 0);

    let page = &layout.pages[0];
    assert!(page.contains_text(REPORT_TITLE));
    assert!(page.contains_text(FINDINGS_HEADER));
    assert!(page.contains_text(DISCLAIMER));
    assert!(page.image_slot().is_some());
    assert_eq!(page.text_runs().count(), 3);
}

#[test]
fn test_identical_submissions_lay_out_identically() {
    let narrative = numbered_lines(40);
    let a = layout_report(&narrative, true, &LayoutMetrics::default());
    let b = layout_report(&narrative, true, &LayoutMetrics::default());
    assert_eq!(a, b);
    assert_eq!(a.page_count(), 2);
}

// ── Full pipeline (pdfium required) ──────────────────────────────────────────

#[tokio::test]
#[ignore = "needs pdfium (downloaded on first use)"]
async fn test_full_pipeline_produces_paginated_pdf() {
    let model = StubModel::answering(numbered_lines(30));
    let log = Arc::new(EventLog::default());
    let config = AnalysisConfig::builder()
        .progress_callback(log.clone())
        .build()
        .unwrap();
    let request = AnalysisRequest::new("two weeks old").with_image(sample_png());

    let output = analyze_with_model(&request, &model, &config).await.expect("analysis");

    assert_eq!(output.narrative, numbered_lines(30));
    assert_eq!(output.report.file_name, "health_report.pdf");
    assert_eq!(output.report.mime_type, "application/pdf");
    assert_eq!(output.report.page_count, 2);
    assert_eq!(output.stats.report_pages, 2);
    assert_eq!(output.stats.narrative_lines, 30);
    assert_eq!(output.stats.report_bytes, output.report.len());
    assert_eq!(output.stats.input_tokens, 258);

    let mut reader = output.report.reader();
    assert_eq!(reader.position(), 0);
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
    assert_eq!(bytes.len(), output.report.len());

    assert_eq!(
        log.events(),
        vec![
            "start:image/png".to_string(),
            "request:stub-vision".to_string(),
            format!("response:{}", numbered_lines(30).len()),
            "render:2".to_string(),
            "complete".to_string(),
        ]
    );
}

#[tokio::test]
#[ignore = "needs pdfium (downloaded on first use)"]
async fn test_pdf_text_places_disclaimer_on_last_page() {
    let model = StubModel::answering(numbered_lines(60));
    let request = AnalysisRequest::new("").with_image(sample_png());
    let output = analyze_with_model(&request, &model, &AnalysisConfig::default())
        .await
        .expect("analysis");
    assert_eq!(output.report.page_count, 3);

    let pdfium = bind_pdfium().expect("bind pdfium");
    let doc = pdfium
        .load_pdf_from_byte_slice(output.report.bytes(), None)
        .expect("report reloads");
    assert_eq!(doc.pages().len(), 3);

    let texts: Vec<String> = doc
        .pages()
        .iter()
        .map(|page| page.text().map(|t| t.all()).unwrap_or_default())
        .collect();
    assert!(texts[0].contains(REPORT_TITLE));
    assert!(texts[0].contains(FINDINGS_HEADER));
    assert!(texts[0].contains("Finding 1"));
    assert!(texts[2].contains("Finding 60"));
    assert!(!texts[0].contains(DISCLAIMER));
    assert!(!texts[1].contains(DISCLAIMER));
    assert!(texts[2].contains(DISCLAIMER));

    let last = doc.pages().last().expect("last page");
    let disclaimer = last
        .objects()
        .iter()
        .find(|object| {
            object
                .as_text_object()
                .is_some_and(|text| text.text().trim() == DISCLAIMER)
        })
        .expect("disclaimer text object");
    let fill = disclaimer.fill_color().expect("fill colour");
    assert_eq!((fill.red(), fill.green(), fill.blue()), (255, 0, 0));
}

#[tokio::test]
#[ignore = "needs pdfium (downloaded on first use)"]
async fn test_empty_narrative_renders_single_page() {
    let model = StubModel::answering("");
    let request = AnalysisRequest::new("").with_image(sample_png());
    let output = analyze_with_model(&request, &model, &AnalysisConfig::default())
        .await
        .expect("analysis");

    assert_eq!(output.narrative, "");
    assert_eq!(output.report.page_count, 1);
    assert_eq!(output.stats.narrative_lines, 0);
    assert!(output.report.bytes().starts_with(b"%PDF"));
}

#[tokio::test]
#[ignore = "needs pdfium (downloaded on first use)"]
async fn test_two_identical_submissions_both_succeed() {
    let model = StubModel::answering(numbered_lines(5));
    let request = AnalysisRequest::new("same question").with_image(sample_png());
    let config = AnalysisConfig::default();

    let first = analyze_with_model(&request, &model, &config).await.expect("first");
    let second = analyze_with_model(&request, &model, &config).await.expect("second");

    assert_eq!(model.calls(), 2);
    assert_eq!(first.report.page_count, second.report.page_count);
    assert!(first.report.bytes().starts_with(b"%PDF"));
    assert!(second.report.bytes().starts_with(b"%PDF"));
}

#[test]
#[ignore = "needs pdfium (downloaded on first use)"]
fn test_report_written_to_file() {
    tokio_test::block_on(async {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out/health_report.pdf");
        let model = StubModel::answering("Looks like a mosquito bite.");
        let request = AnalysisRequest::new("").with_image(sample_png());
        let config = AnalysisConfig::default();

        let output = analyze_with_model(&request, &model, &config).await.expect("analysis");
        output.report.write_to(&target).expect("write");

        let written = std::fs::read(&target).unwrap();
        assert_eq!(written, output.report.bytes());
    });
}

#[tokio::test]
async fn test_analyze_to_file_without_image_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("health_report.pdf");
    let config = AnalysisConfig::builder().api_key("unused").build().unwrap();

    let err = analyze_to_file(&AnalysisRequest::new("hello"), &target, &config)
        .await
        .unwrap_err();

    assert!(matches!(err, HealthReportError::MissingFile));
    assert!(!target.exists());
}
