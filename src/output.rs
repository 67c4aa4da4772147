//! Result types returned by the analysis entry points.

use crate::error::HealthReportError;
use crate::prompts::{DEFAULT_REPORT_FILE_NAME, REPORT_MIME_TYPE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Cursor, Write};
use std::path::Path;
use tracing::debug;

/// The rendered PDF, held in memory.
///
/// The library never writes it anywhere on its own; the caller either
/// streams it from [`ReportDocument::reader`] or asks for
/// [`ReportDocument::write_to`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDocument {
    /// Suggested download name, `health_report.pdf` unless configured.
    pub file_name: String,
    /// Always `application/pdf`.
    pub mime_type: String,
    /// Number of pages in the document.
    pub page_count: usize,
    #[serde(skip)]
    bytes: Vec<u8>,
}

impl fmt::Debug for ReportDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportDocument")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("page_count", &self.page_count)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl Default for ReportDocument {
    fn default() -> Self {
        Self::new(DEFAULT_REPORT_FILE_NAME, Vec::new(), 0)
    }
}

impl ReportDocument {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>, page_count: usize) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: REPORT_MIME_TYPE.to_string(),
            page_count,
            bytes,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// A fresh reader over the PDF, positioned at offset 0.
    pub fn reader(&self) -> Cursor<&[u8]> {
        Cursor::new(&self.bytes)
    }

    /// Write the PDF to `path` atomically.
    ///
    /// The bytes go to a temp file in the target directory which is then
    /// renamed over `path`, so a reader never observes a partial report.
    /// Missing parent directories are created. Blocking.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), HealthReportError> {
        let path = path.as_ref();
        let write_failed = |source: std::io::Error| HealthReportError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(write_failed)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_failed)?;
        tmp.write_all(&self.bytes).map_err(write_failed)?;
        tmp.flush().map_err(write_failed)?;
        tmp.persist(path).map_err(|e| write_failed(e.error))?;

        debug!("Wrote {} bytes to {}", self.bytes.len(), path.display());
        Ok(())
    }
}

/// Timing and size statistics for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisStats {
    /// Wall-clock time of the model call.
    pub model_duration_ms: u64,
    /// Wall-clock time of layout + PDF drawing.
    pub render_duration_ms: u64,
    /// End-to-end wall-clock time.
    pub total_duration_ms: u64,
    pub report_pages: usize,
    pub narrative_lines: usize,
    pub report_bytes: usize,
    /// Prompt tokens as reported by the model, 0 when unknown.
    pub input_tokens: u64,
    /// Completion tokens as reported by the model, 0 when unknown.
    pub output_tokens: u64,
}

/// Everything one analysis produces.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisOutput {
    /// The model's narrative, exactly as returned.
    pub narrative: String,
    /// The rendered report.
    pub report: ReportDocument,
    pub stats: AnalysisStats,
}
