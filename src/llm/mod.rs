pub mod gemini;
pub mod media;

use std::sync::Arc;

use async_trait::async_trait;

pub use gemini::GeminiImageClient;

/// One image-edit call: the shared source image plus a view-specific
/// instruction.
#[derive(Debug, Clone)]
pub struct EditRequest {
    pub image_base64: Arc<str>,
    pub mime_type: Arc<str>,
    pub instruction: String,
}

/// An image returned inline by the generation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

/// What a successful call produced. `image` is `None` when the service
/// answered but returned no image part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditOutcome {
    pub image: Option<InlineImage>,
    pub block_reason: Option<String>,
}

impl EditOutcome {
    pub fn image(image: InlineImage) -> Self {
        EditOutcome {
            image: Some(image),
            block_reason: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImageServiceError {
    #[error("GEMINI_API_KEY is not configured")]
    MissingCredential,
    #[error("Gemini request failed: {0}")]
    Transport(String),
    #[error("Gemini request failed with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Gemini response could not be decoded: {0}")]
    Decode(String),
}

/// The external generative-image service. Each call is a single attempt.
#[async_trait]
pub trait ImageEditService: Send + Sync {
    fn provider(&self) -> &str;

    fn model(&self) -> &str;

    async fn edit_image(&self, request: &EditRequest) -> Result<EditOutcome, ImageServiceError>;
}
