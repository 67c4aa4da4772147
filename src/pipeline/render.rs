//! PDF drawing: replay a [`ReportLayout`] onto a pdfium document.
//!
//! pdfium is a blocking C library, so [`render_report`] hands the drawing to
//! `tokio::task::spawn_blocking`. Only one `Pdfium` instance may be alive per
//! thread: `render_layout` binds its own and drops it before returning.
//!
//! ## Images
//!
//! The uploaded image is embedded straight from memory
//! (`create_image_object` takes a `DynamicImage`), so no temporary file is
//! ever written for it.

use crate::config::AnalysisConfig;
use crate::error::HealthReportError;
use crate::output::ReportDocument;
use crate::pipeline::layout::{layout_report, DrawOp, FontFace, ReportColor, ReportLayout};
use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// Lay out and render the report for `narrative`.
///
/// `image` is the decoded upload; when `None` the image slot is left out.
pub async fn render_report(
    narrative: &str,
    image: Option<DynamicImage>,
    config: &AnalysisConfig,
) -> Result<ReportDocument, HealthReportError> {
    let layout = layout_report(narrative, image.is_some(), &config.layout);
    let pages = layout.page_count();
    let file_name = config.report_file_name.clone();

    let bytes = tokio::task::spawn_blocking(move || render_layout(&layout, image.as_ref()))
        .await
        .map_err(|e| HealthReportError::Internal(format!("Render task panicked: {}", e)))??;

    info!("Rendered report: {} pages, {} bytes", pages, bytes.len());
    Ok(ReportDocument::new(file_name, bytes, pages))
}

/// Draw `layout` into a new PDF and return the saved bytes. Blocking.
pub fn render_layout(
    layout: &ReportLayout,
    image: Option<&DynamicImage>,
) -> Result<Vec<u8>, HealthReportError> {
    let pdfium = bind_pdfium()?;
    let mut document = pdfium.create_new_pdf().map_err(render_failed)?;

    let regular = document.fonts_mut().helvetica();
    let bold = document.fonts_mut().helvetica_bold();
    let paper = PdfPagePaperSize::new_custom(
        PdfPoints::new(layout.page_width),
        PdfPoints::new(layout.page_height),
    );

    for (index, layout_page) in layout.pages.iter().enumerate() {
        let mut page = document
            .pages_mut()
            .create_page_at_end(paper)
            .map_err(render_failed)?;

        for op in &layout_page.ops {
            match op {
                DrawOp::Text(run) => {
                    let font = match run.font {
                        FontFace::Regular => regular,
                        FontFace::Bold => bold,
                    };
                    // Colour is set while the object is detached; adding it
                    // to the page is what writes the content stream.
                    let mut object = PdfPageTextObject::new(
                        &document,
                        &run.text,
                        font,
                        PdfPoints::new(run.size),
                    )
                    .map_err(render_failed)?;
                    object
                        .set_fill_color(pdf_color(run.color))
                        .map_err(render_failed)?;
                    object
                        .translate(PdfPoints::new(run.x), PdfPoints::new(run.y))
                        .map_err(render_failed)?;
                    page.objects_mut()
                        .add_text_object(object)
                        .map_err(render_failed)?;
                }
                DrawOp::Image(slot) => {
                    if let Some(img) = image {
                        page.objects_mut()
                            .create_image_object(
                                PdfPoints::new(slot.x),
                                PdfPoints::new(slot.y),
                                img,
                                Some(PdfPoints::new(slot.width)),
                                Some(PdfPoints::new(slot.height)),
                            )
                            .map_err(render_failed)?;
                    }
                }
            }
        }
        debug!("Drew page {} ({} ops)", index + 1, layout_page.ops.len());
    }

    document.save_to_bytes().map_err(render_failed)
}

/// Bind to the pdfium library, downloading it into the user cache on first
/// use.
///
/// `PDFIUM_LIB_PATH` names an existing copy instead; `PDFIUM_AUTO_CACHE_DIR`
/// moves the cache. Blocking.
pub fn bind_pdfium() -> Result<Pdfium, HealthReportError> {
    pdfium_auto::bind_pdfium_silent()
        .map_err(|e| HealthReportError::PdfiumBindingFailed(e.to_string()))
}

fn pdf_color(color: ReportColor) -> PdfColor {
    PdfColor::new(color.r, color.g, color.b, 255)
}

fn render_failed(e: PdfiumError) -> HealthReportError {
    HealthReportError::RenderFailed {
        detail: e.to_string(),
    }
}
