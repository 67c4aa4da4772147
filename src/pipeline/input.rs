//! Input collection: the request-scoped context for one submission.
//!
//! A submission is an [`AnalysisRequest`]: the user's free-text prompt plus
//! an optional [`UploadedImage`]. Nothing here is global; the request is
//! passed by value through the pipeline and dropped when the report is done.
//!
//! Images can come from a local path, an HTTP/HTTPS URL, or bytes the caller
//! already holds. Only the file-picker types are accepted (jpg, jpeg, png);
//! the bytes themselves are not inspected.

use crate::error::HealthReportError;
use image::DynamicImage;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File extensions the input collector accepts.
pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// An uploaded image: raw bytes plus the declared media type.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for UploadedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedImage")
            .field("file_name", &self.file_name)
            .field("media_type", &self.media_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl UploadedImage {
    /// Wrap bytes with an explicit media type. No validation is performed.
    pub fn new(
        file_name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Wrap bytes, deriving the media type from the file name's extension.
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, HealthReportError> {
        let file_name = file_name.into();
        let media_type = media_type_for(&file_name)
            .ok_or_else(|| HealthReportError::UnsupportedFileType {
                name: file_name.clone(),
            })?;
        Ok(Self::new(file_name, media_type, bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decode the bytes into a bitmap for preview and report embedding.
    ///
    /// Returns `None` when the bytes are not a decodable image; the model
    /// still receives them unchanged.
    pub fn decode(&self) -> Option<DynamicImage> {
        match image::load_from_memory(&self.bytes) {
            Ok(img) => {
                debug!(
                    "Decoded {} → {}x{} px",
                    self.file_name,
                    img.width(),
                    img.height()
                );
                Some(img)
            }
            Err(e) => {
                warn!("Could not decode {} for preview: {}", self.file_name, e);
                None
            }
        }
    }
}

/// One submission: the user's prompt and the image to analyse.
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    /// Free-text query typed by the user. May be empty.
    pub prompt: String,
    /// The uploaded image, if any. Required for analysis.
    pub image: Option<UploadedImage>,
}

impl AnalysisRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: UploadedImage) -> Self {
        self.image = Some(image);
        self
    }
}

/// Media type for an accepted file name, by extension (case-insensitive).
pub fn media_type_for(name: &str) -> Option<&'static str> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    if !ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    Some(if ext == "png" { "image/png" } else { "image/jpeg" })
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a local path or URL into an [`UploadedImage`].
pub async fn resolve_image(input: &str, timeout_secs: u64) -> Result<UploadedImage, HealthReportError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(HealthReportError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(Path::new(input)).await
    }
}

/// Read a local image, validating its extension before touching the disk.
async fn read_local(path: &Path) -> Result<UploadedImage, HealthReportError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let media_type = media_type_for(&file_name).ok_or_else(|| {
        HealthReportError::UnsupportedFileType {
            name: file_name.clone(),
        }
    })?;

    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => HealthReportError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => HealthReportError::FileNotFound {
            path: PathBuf::from(path),
        },
    })?;

    debug!("Read local image: {} ({} bytes)", path.display(), bytes.len());
    Ok(UploadedImage::new(file_name, media_type, bytes))
}

/// Download an image into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<UploadedImage, HealthReportError> {
    info!("Downloading image from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| HealthReportError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            HealthReportError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            HealthReportError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(HealthReportError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let file_name = extract_filename(url);
    let header_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(accepted_content_type);

    let media_type = header_type
        .or_else(|| media_type_for(&file_name))
        .ok_or_else(|| HealthReportError::UnsupportedFileType {
            name: file_name.clone(),
        })?;

    let bytes = response
        .bytes()
        .await
        .map_err(|e| HealthReportError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} ({} bytes, {})", file_name, bytes.len(), media_type);
    Ok(UploadedImage::new(file_name, media_type, bytes.to_vec()))
}

/// Map a `Content-Type` header onto an accepted media type.
fn accepted_content_type(header: &str) -> Option<&'static str> {
    let essence = header.split(';').next()?.trim().to_ascii_lowercase();
    match essence.as_str() {
        "image/jpeg" | "image/jpg" => Some("image/jpeg"),
        "image/png" => Some("image/png"),
        _ => None,
    }
}

/// Extract a reasonable filename from the URL path.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded-image".to_string()
}
