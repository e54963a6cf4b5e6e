use std::path::{Path, PathBuf};

use base64::{engine::general_purpose, Engine as _};
use tracing::{debug, warn};

pub const ACCEPTED_IMAGE_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/webp"];

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Failed to read image {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("The selected image is empty.")]
    Empty,
    #[error("Unsupported image type '{0}'. Please upload a PNG, JPEG or WebP image.")]
    UnsupportedType(String),
    #[error("Invalid image data URL: {0}")]
    InvalidDataUrl(String),
}

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    infer::get(data).map(|kind| kind.mime_type().to_string())
}

pub fn normalize_image_mime_type(mime_type: &str) -> String {
    let lowered = mime_type.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        "image/x-png" => "image/png".to_string(),
        _ => lowered,
    }
}

pub fn is_accepted_image_type(mime_type: &str) -> bool {
    ACCEPTED_IMAGE_TYPES.contains(&mime_type)
}

fn mime_for_extension(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match normalize_image_mime_type(mime_type).as_str() {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "bin",
    }
}

/// Splits `data:<mime>;base64,<payload>` into its MIME type and payload.
/// Input without a `data:` envelope is returned unchanged as the payload.
pub fn strip_data_url_envelope(value: &str) -> Result<(Option<&str>, &str), UploadError> {
    let trimmed = value.trim();
    let Some(rest) = trimmed.strip_prefix("data:") else {
        return Ok((None, trimmed));
    };

    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| UploadError::InvalidDataUrl("missing ',' separator".to_string()))?;
    let Some(mime_type) = header.strip_suffix(";base64") else {
        return Err(UploadError::InvalidDataUrl(
            "only base64 data URLs are supported".to_string(),
        ));
    };

    let mime_type = mime_type.trim();
    Ok(((!mime_type.is_empty()).then_some(mime_type), payload))
}

pub fn to_data_url(mime_type: &str, base64_payload: &str) -> String {
    format!("data:{mime_type};base64,{base64_payload}")
}

/// The headshot a generation cycle runs against. Replaced wholesale on each
/// upload and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    bytes: Vec<u8>,
    mime_type: String,
    display_name: Option<String>,
}

impl SourceImage {
    /// Validates an in-memory upload. Sniffed content wins over the declared
    /// type so a mislabelled file is still sent with the right MIME type.
    pub fn from_bytes(
        bytes: Vec<u8>,
        declared_mime_type: Option<&str>,
        display_name: Option<String>,
    ) -> Result<Self, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::Empty);
        }

        let detected = detect_mime_type(&bytes).map(|mime| normalize_image_mime_type(&mime));
        let declared = declared_mime_type.map(normalize_image_mime_type);
        if let (Some(detected), Some(declared)) = (&detected, &declared) {
            if detected != declared {
                debug!(
                    "Declared image type {} differs from detected {}; using detected type",
                    declared, detected
                );
            }
        }

        let mime_type = detected
            .or(declared)
            .ok_or_else(|| UploadError::UnsupportedType("unknown".to_string()))?;
        if !is_accepted_image_type(&mime_type) {
            return Err(UploadError::UnsupportedType(mime_type));
        }

        Ok(SourceImage {
            bytes,
            mime_type,
            display_name,
        })
    }

    pub async fn load(path: &Path) -> Result<Self, UploadError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| UploadError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let display_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());

        SourceImage::from_bytes(bytes, mime_for_extension(path), display_name).inspect_err(
            |err| warn!("Rejected image upload {}: {}", path.display(), err),
        )
    }

    pub fn from_data_url(value: &str) -> Result<Self, UploadError> {
        let (mime_type, payload) = strip_data_url_envelope(value)?;
        let bytes = general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|err| UploadError::InvalidDataUrl(err.to_string()))?;
        SourceImage::from_bytes(bytes, mime_type, None)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn base64_payload(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }
}
