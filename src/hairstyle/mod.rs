pub mod orchestrator;
pub mod views;

use base64::{engine::general_purpose, Engine as _};

use crate::llm::media::{extension_for_mime, strip_data_url_envelope, to_data_url};
use crate::llm::InlineImage;

pub use orchestrator::generate_hairstyles;
use views::ViewDescriptor;

pub const MISSING_INPUT_MESSAGE: &str = "Please upload an image and describe a hairstyle.";
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred during hairstyle generation.";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("{}", MISSING_INPUT_MESSAGE)]
    MissingInput,
    #[error("A hairstyle is already being generated. Please wait for it to finish.")]
    InProgress,
    #[error("Failed to generate the hairstyle for the {label}. Details: {detail}")]
    View { label: &'static str, detail: String },
    #[error("Failed to generate the hairstyle for the {label}. The request might have been blocked due to safety policies.")]
    ViewAborted { label: &'static str },
    #[error("{}", UNKNOWN_ERROR_MESSAGE)]
    Unknown,
}

impl GenerationError {
    pub fn view_label(&self) -> Option<&'static str> {
        match self {
            GenerationError::View { label, .. } | GenerationError::ViewAborted { label } => {
                Some(label)
            }
            _ => None,
        }
    }
}

/// One successful view: its label and a `data:` URL a gallery can render
/// directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub label: &'static str,
    pub url: String,
}

impl GeneratedImage {
    pub fn new(view: &ViewDescriptor, image: &InlineImage) -> Self {
        GeneratedImage {
            label: view.label,
            url: to_data_url(&image.mime_type, &image.data),
        }
    }

    pub fn mime_type(&self) -> Option<&str> {
        strip_data_url_envelope(&self.url)
            .ok()
            .and_then(|(mime_type, _)| mime_type)
    }

    pub fn decode_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let (_, payload) = strip_data_url_envelope(&self.url)?;
        Ok(general_purpose::STANDARD.decode(payload)?)
    }

    /// `Right Side View` with a PNG payload becomes `right-side-view.png`.
    pub fn file_name(&self) -> String {
        let slug = self
            .label
            .split_whitespace()
            .map(|word| word.to_ascii_lowercase())
            .collect::<Vec<_>>()
            .join("-");
        let extension = self.mime_type().map(extension_for_mime).unwrap_or("bin");
        format!("{slug}.{extension}")
    }
}
