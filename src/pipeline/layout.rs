//! Report layout: narrative text → pages of absolute draw operations.
//!
//! Layout is kept separate from drawing so that pagination can be reasoned
//! about (and tested) without a pdfium library on the machine. The output of
//! [`layout_report`] is a plain value; [`crate::pipeline::render`] replays it
//! onto a pdfium document.
//!
//! ## Page geometry
//!
//! Coordinates are PDF points with the origin at the bottom-left corner of a
//! US-letter page (612 × 792 pt):
//!
//! ```text
//!  770 ─ title (Helvetica-Bold 16, dark blue)
//!  600 ─ image, 144 × 144 pt (only when an image was uploaded)
//!  550 ─ "Analysis Findings:" (Helvetica-Bold 12, green)
//!  530 ─ first findings line, then -20 pt per line
//!  100 ─ page-break threshold (a line at or below it moves to a new page)
//!   50 ─ disclaimer (Helvetica-Bold 10, red), final page only
//! ```
//!
//! Continuation pages start their findings lines at 750. Lines are never
//! wrapped: each narrative line maps to exactly one drawn line, whatever its
//! rendered width.

use crate::prompts::{DISCLAIMER, FINDINGS_HEADER, REPORT_TITLE};
use serde::{Deserialize, Serialize};

/// An opaque RGB fill colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl ReportColor {
    pub const DARK_BLUE: ReportColor = ReportColor::rgb(0, 0, 139);
    pub const GREEN: ReportColor = ReportColor::rgb(0, 128, 0);
    pub const BLACK: ReportColor = ReportColor::rgb(0, 0, 0);
    pub const RED: ReportColor = ReportColor::rgb(255, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// One of the two built-in PDF fonts the report uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FontFace {
    /// Helvetica.
    Regular,
    /// Helvetica-Bold.
    Bold,
}

/// A single line of text at an absolute position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub font: FontFace,
    pub size: f32,
    pub color: ReportColor,
}

/// Where the uploaded image goes on the first page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageSlot {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DrawOp {
    Text(TextRun),
    Image(ImageSlot),
}

/// Draw operations for one page, in paint order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutPage {
    pub ops: Vec<DrawOp>,
}

impl LayoutPage {
    pub fn text_runs(&self) -> impl Iterator<Item = &TextRun> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text(run) => Some(run),
            DrawOp::Image(_) => None,
        })
    }

    pub fn image_slot(&self) -> Option<&ImageSlot> {
        self.ops.iter().find_map(|op| match op {
            DrawOp::Image(slot) => Some(slot),
            DrawOp::Text(_) => None,
        })
    }

    /// `true` if any text run on this page is exactly `text`.
    pub fn contains_text(&self, text: &str) -> bool {
        self.text_runs().any(|run| run.text == text)
    }
}

/// The complete, backend-independent description of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportLayout {
    pub page_width: f32,
    pub page_height: f32,
    pub pages: Vec<LayoutPage>,
    /// Number of narrative lines placed on the pages.
    pub findings_lines: usize,
}

impl ReportLayout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Fixed positions and sizes used by [`layout_report`].
///
/// The defaults reproduce the letter-size report described in the module
/// docs. They are configurable so that callers can adapt the report to other
/// paper sizes, but [`LayoutMetrics::validate`] must hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutMetrics {
    pub page_width: f32,
    pub page_height: f32,

    pub title_x: f32,
    pub title_y: f32,
    pub title_size: f32,

    pub image_x: f32,
    pub image_y: f32,
    pub image_size: f32,

    pub header_x: f32,
    pub header_y: f32,
    pub header_size: f32,

    pub body_x: f32,
    /// Baseline of the first findings line on page 1.
    pub body_start_y: f32,
    /// Baseline of the first findings line on continuation pages.
    pub continuation_y: f32,
    pub body_size: f32,
    pub line_height: f32,
    /// A line whose cursor is at or below this value starts a new page.
    pub page_break_y: f32,

    pub disclaimer_x: f32,
    pub disclaimer_y: f32,
    pub disclaimer_size: f32,
}

impl Default for LayoutMetrics {
    fn default() -> Self {
        Self::letter()
    }
}

impl LayoutMetrics {
    /// US letter, 612 × 792 pt.
    pub fn letter() -> Self {
        Self {
            page_width: 612.0,
            page_height: 792.0,
            title_x: 200.0,
            title_y: 770.0,
            title_size: 16.0,
            image_x: 50.0,
            image_y: 600.0,
            image_size: 144.0,
            header_x: 40.0,
            header_y: 550.0,
            header_size: 12.0,
            body_x: 40.0,
            body_start_y: 530.0,
            continuation_y: 750.0,
            body_size: 12.0,
            line_height: 20.0,
            page_break_y: 100.0,
            disclaimer_x: 40.0,
            disclaimer_y: 50.0,
            disclaimer_size: 10.0,
        }
    }

    /// Findings lines that fit on page 1 before a break.
    pub fn first_page_capacity(&self) -> usize {
        self.capacity_from(self.body_start_y)
    }

    /// Findings lines that fit on every page after the first.
    pub fn continuation_capacity(&self) -> usize {
        self.capacity_from(self.continuation_y)
    }

    fn capacity_from(&self, start_y: f32) -> usize {
        if start_y <= self.page_break_y || self.line_height <= 0.0 {
            return 0;
        }
        ((start_y - self.page_break_y) / self.line_height).ceil() as usize
    }

    /// Number of pages [`layout_report`] produces for `lines` findings lines.
    pub fn page_count_for(&self, lines: usize) -> usize {
        let first = self.first_page_capacity();
        if lines <= first {
            return 1;
        }
        let per_page = self.continuation_capacity().max(1);
        1 + (lines - first).div_ceil(per_page)
    }

    /// Reject geometry the layout cannot honour.
    ///
    /// The disclaimer sits at a fixed height on the final page regardless of
    /// how many findings lines precede it, so its top edge must stay below
    /// the page-break threshold; findings lines never go lower than that.
    pub fn validate(&self) -> Result<(), String> {
        if self.page_width <= 0.0 || self.page_height <= 0.0 {
            return Err(format!(
                "page size must be positive, got {}x{}",
                self.page_width, self.page_height
            ));
        }
        if self.line_height <= 0.0 {
            return Err(format!("line_height must be positive, got {}", self.line_height));
        }
        if self.continuation_y <= self.page_break_y {
            return Err(format!(
                "continuation_y ({}) must be above page_break_y ({})",
                self.continuation_y, self.page_break_y
            ));
        }
        if self.disclaimer_y + self.disclaimer_size >= self.page_break_y {
            return Err(format!(
                "disclaimer at y={} (size {}) would overlap findings text above y={}",
                self.disclaimer_y, self.disclaimer_size, self.page_break_y
            ));
        }
        Ok(())
    }
}

/// Lay out a report for `narrative`.
///
/// The narrative is split with [`str::lines`], so `\n` and `\r\n` both
/// separate lines and an empty narrative produces no findings lines. The
/// title, header and disclaimer are always present.
pub fn layout_report(narrative: &str, has_image: bool, metrics: &LayoutMetrics) -> ReportLayout {
    let mut first = LayoutPage::default();

    first.ops.push(DrawOp::Text(TextRun {
        x: metrics.title_x,
        y: metrics.title_y,
        text: REPORT_TITLE.to_string(),
        font: FontFace::Bold,
        size: metrics.title_size,
        color: ReportColor::DARK_BLUE,
    }));

    if has_image {
        first.ops.push(DrawOp::Image(ImageSlot {
            x: metrics.image_x,
            y: metrics.image_y,
            width: metrics.image_size,
            height: metrics.image_size,
        }));
    }

    first.ops.push(DrawOp::Text(TextRun {
        x: metrics.header_x,
        y: metrics.header_y,
        text: FINDINGS_HEADER.to_string(),
        font: FontFace::Bold,
        size: metrics.header_size,
        color: ReportColor::GREEN,
    }));

    let mut pages = vec![first];
    let mut cursor = metrics.body_start_y;
    let mut findings_lines = 0;

    for line in narrative.lines() {
        if cursor <= metrics.page_break_y {
            pages.push(LayoutPage::default());
            cursor = metrics.continuation_y;
        }
        if let Some(page) = pages.last_mut() {
            page.ops.push(DrawOp::Text(TextRun {
                x: metrics.body_x,
                y: cursor,
                text: line.to_string(),
                font: FontFace::Regular,
                size: metrics.body_size,
                color: ReportColor::BLACK,
            }));
        }
        cursor -= metrics.line_height;
        findings_lines += 1;
    }

    if let Some(page) = pages.last_mut() {
        page.ops.push(DrawOp::Text(TextRun {
            x: metrics.disclaimer_x,
            y: metrics.disclaimer_y,
            text: DISCLAIMER.to_string(),
            font: FontFace::Bold,
            size: metrics.disclaimer_size,
            color: ReportColor::RED,
        }));
    }

    ReportLayout {
        page_width: metrics.page_width,
        page_height: metrics.page_height,
        pages,
        findings_lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn narrative_of(lines: usize) -> String {
        (1..=lines)
            .map(|i| format!("finding {i}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn body_runs(page: &LayoutPage) -> Vec<&TextRun> {
        page.text_runs()
            .filter(|r| r.font == FontFace::Regular)
            .collect()
    }

    #[test]
    fn letter_capacities() {
        let m = LayoutMetrics::letter();
        // 530, 510, …, 110 on page 1; 750, 730, …, 110 afterwards.
        assert_eq!(m.first_page_capacity(), 22);
        assert_eq!(m.continuation_capacity(), 33);
    }

    #[test]
    fn empty_narrative_keeps_fixed_elements() {
        let layout = layout_report("", false, &LayoutMetrics::default());
        assert_eq!(layout.page_count(), 1);
        assert_eq!(layout.findings_lines, 0);

        let page = &layout.pages[0];
        assert!(page.contains_text(REPORT_TITLE));
        assert!(page.contains_text(FINDINGS_HEADER));
        assert!(page.contains_text(DISCLAIMER));
        assert!(body_runs(page).is_empty());
        assert!(page.image_slot().is_none());
    }

    #[test]
    fn image_slot_only_when_image_supplied() {
        let m = LayoutMetrics::default();
        let with = layout_report("x", true, &m);
        let slot = with.pages[0].image_slot().expect("image slot");
        assert_eq!((slot.x, slot.y, slot.width, slot.height), (50.0, 600.0, 144.0, 144.0));

        let without = layout_report("x", false, &m);
        assert!(without.pages[0].image_slot().is_none());
    }

    #[test]
    fn lines_descend_by_line_height() {
        let layout = layout_report("a\nb\nc", false, &LayoutMetrics::default());
        let ys: Vec<f32> = body_runs(&layout.pages[0]).iter().map(|r| r.y).collect();
        assert_eq!(ys, vec![530.0, 510.0, 490.0]);
        assert!(body_runs(&layout.pages[0]).iter().all(|r| r.x == 40.0));
    }

    #[test]
    fn crlf_and_blank_lines_are_kept_as_lines() {
        let layout = layout_report("one\r\n\r\nthree", false, &LayoutMetrics::default());
        let texts: Vec<&str> = body_runs(&layout.pages[0])
            .iter()
            .map(|r| r.text.as_str())
            .collect();
        assert_eq!(texts, vec!["one", "", "three"]);
    }

    #[test]
    fn trailing_newline_adds_no_line() {
        let metrics = LayoutMetrics::default();
        let full_page = format!("{}\n", narrative_of(metrics.first_page_capacity()));
        let layout = layout_report(&full_page, false, &metrics);
        assert_eq!(layout.findings_lines, metrics.first_page_capacity());
        assert_eq!(layout.page_count(), 1);
    }

    #[test]
    fn line_at_threshold_starts_new_page() {
        let m = LayoutMetrics::default();

        let full = layout_report(&narrative_of(22), false, &m);
        assert_eq!(full.page_count(), 1);
        assert_eq!(body_runs(&full.pages[0]).last().map(|r| r.y), Some(110.0));

        // The 23rd line would land on y=90, below the threshold; the check
        // fires when the cursor is at 90 ≤ 100.
        let spill = layout_report(&narrative_of(23), false, &m);
        assert_eq!(spill.page_count(), 2);
        let second = body_runs(&spill.pages[1]);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].y, 750.0);
        assert_eq!(second[0].text, "finding 23");
    }

    #[test]
    fn exact_threshold_hit_breaks() {
        // Start at 120 with step 20: 120 is drawn, the cursor then sits on
        // exactly 100 and the next line must move to a new page.
        let m = LayoutMetrics {
            body_start_y: 120.0,
            ..LayoutMetrics::default()
        };
        assert_eq!(m.first_page_capacity(), 1);
        let layout = layout_report("a\nb", false, &m);
        assert_eq!(layout.page_count(), 2);
    }

    #[test]
    fn page_count_matches_formula() {
        let m = LayoutMetrics::default();
        for n in 0..150 {
            let layout = layout_report(&narrative_of(n), false, &m);
            assert_eq!(layout.page_count(), m.page_count_for(n), "lines={n}");
            assert_eq!(layout.findings_lines, n);
        }
        assert_eq!(m.page_count_for(0), 1);
        assert_eq!(m.page_count_for(22), 1);
        assert_eq!(m.page_count_for(23), 2);
        assert_eq!(m.page_count_for(55), 2);
        assert_eq!(m.page_count_for(56), 3);
    }

    #[test]
    fn disclaimer_only_on_final_page() {
        let layout = layout_report(&narrative_of(80), true, &LayoutMetrics::default());
        assert_eq!(layout.page_count(), 3);
        let (last, rest) = layout.pages.split_last().expect("pages");
        assert!(last.contains_text(DISCLAIMER));
        assert!(rest.iter().all(|p| !p.contains_text(DISCLAIMER)));

        let disclaimer = last
            .text_runs()
            .find(|r| r.text == DISCLAIMER)
            .expect("disclaimer run");
        assert_eq!(disclaimer.color, ReportColor::RED);
        assert_eq!(disclaimer.font, FontFace::Bold);
        assert_eq!((disclaimer.x, disclaimer.y), (40.0, 50.0));
    }

    #[test]
    fn findings_never_reach_disclaimer() {
        let m = LayoutMetrics::default();
        let layout = layout_report(&narrative_of(60), false, &m);
        let lowest = layout
            .pages
            .iter()
            .flat_map(body_runs)
            .map(|r| r.y)
            .fold(f32::MAX, f32::min);
        assert!(lowest > m.disclaimer_y + m.disclaimer_size);
    }

    #[test]
    fn long_lines_are_not_wrapped() {
        let long = "x".repeat(500);
        let layout = layout_report(&long, false, &LayoutMetrics::default());
        assert_eq!(layout.findings_lines, 1);
        assert!(layout.pages[0].contains_text(&long));
    }

    #[test]
    fn identical_inputs_give_identical_layouts() {
        let m = LayoutMetrics::default();
        assert_eq!(
            layout_report("same\ntext", true, &m),
            layout_report("same\ntext", true, &m)
        );
    }

    #[test]
    fn validate_rejects_overlapping_disclaimer() {
        assert!(LayoutMetrics::default().validate().is_ok());

        let overlapping = LayoutMetrics {
            disclaimer_y: 95.0,
            ..LayoutMetrics::default()
        };
        let err = overlapping.validate().unwrap_err();
        assert!(err.contains("overlap"), "got: {err}");

        let stuck = LayoutMetrics {
            continuation_y: 90.0,
            ..LayoutMetrics::default()
        };
        assert!(stuck.validate().is_err());
    }
}
