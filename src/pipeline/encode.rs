//! Image adapter: `UploadedImage` → the payload the model client sends.
//!
//! Hosted vision APIs take images as base64 text embedded in the JSON
//! request body, tagged with their media type. The adapter keeps the raw
//! bytes and media type together and defers the base64 step to the wire
//! format. The bytes are passed through exactly as uploaded: no re-encoding,
//! no size or integrity checks. A malformed image is the model's to reject.

use crate::error::HealthReportError;
use crate::pipeline::input::UploadedImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// One image attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePart {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ImagePart {
    /// Base64 text of the raw bytes, as sent on the wire.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }
}

/// Ordered image attachments for one model call. Always exactly one today.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    parts: Vec<ImagePart>,
}

impl ImagePayload {
    pub fn parts(&self) -> &[ImagePart] {
        &self.parts
    }

    /// The image sent with the request.
    pub fn primary(&self) -> &ImagePart {
        // `prepare_image_payload` is the only constructor and always pushes one part.
        &self.parts[0]
    }
}

/// Build the payload for the uploaded image.
///
/// # Errors
/// [`HealthReportError::MissingFile`] when no image was uploaded.
pub fn prepare_image_payload(image: Option<&UploadedImage>) -> Result<ImagePayload, HealthReportError> {
    let image = image.ok_or(HealthReportError::MissingFile)?;
    debug!(
        "Prepared payload: {} ({}, {} bytes)",
        image.file_name,
        image.media_type,
        image.bytes.len()
    );
    Ok(ImagePayload {
        parts: vec![ImagePart {
            mime_type: image.media_type.clone(),
            data: image.bytes.clone(),
        }],
    })
}
