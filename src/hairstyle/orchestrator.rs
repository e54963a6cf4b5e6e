use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::json;
use tracing::{info, warn};

use crate::hairstyle::views::{ViewDescriptor, VIEWS, VIEW_COUNT};
use crate::hairstyle::{GeneratedImage, GenerationError};
use crate::llm::{EditRequest, ImageEditService};
use crate::utils::timing::log_llm_timing;

fn no_image_detail(label: &str, block_reason: Option<&str>) -> String {
    match block_reason {
        Some(reason) => format!(
            "No image data received for the {label}. The response was blocked by safety policies (reason: {reason})."
        ),
        None => format!(
            "No image data received for the {label}. The response may have been blocked by safety policies."
        ),
    }
}

async fn generate_view(
    service: &dyn ImageEditService,
    view: &'static ViewDescriptor,
    request: EditRequest,
) -> Result<GeneratedImage, GenerationError> {
    let metadata = json!({ "view": view.label });
    let outcome = log_llm_timing(
        service.provider(),
        service.model(),
        "edit_hairstyle",
        Some(metadata),
        || service.edit_image(&request),
    )
    .await;

    let detail = match outcome {
        Ok(outcome) => match outcome.image {
            Some(image) => return Ok(GeneratedImage::new(view, &image)),
            None => no_image_detail(view.label, outcome.block_reason.as_deref()),
        },
        Err(err) => err.to_string(),
    };

    warn!("Error generating style for {}: {}", view.label, detail);
    if detail.trim().is_empty() {
        return Err(GenerationError::ViewAborted { label: view.label });
    }
    Err(GenerationError::View {
        label: view.label,
        detail,
    })
}

/// Fans one style request out to every view and waits for all of them.
///
/// Results come back in [`VIEWS`] order. The first view to fail decides the
/// error and no partial set is returned. Calls still in flight at that point
/// are left to finish on their own; their results are dropped.
pub async fn generate_hairstyles(
    service: Arc<dyn ImageEditService>,
    image_base64: &str,
    mime_type: &str,
    style_description: &str,
) -> Result<Vec<GeneratedImage>, GenerationError> {
    let image_base64: Arc<str> = Arc::from(image_base64);
    let mime_type: Arc<str> = Arc::from(mime_type);

    let mut pending = FuturesUnordered::new();
    for (index, view) in VIEWS.iter().enumerate() {
        let request = EditRequest {
            image_base64: Arc::clone(&image_base64),
            mime_type: Arc::clone(&mime_type),
            instruction: view.build_prompt(style_description),
        };
        let service = Arc::clone(&service);
        let handle =
            tokio::spawn(async move { generate_view(service.as_ref(), view, request).await });
        pending.push(async move { (index, view, handle.await) });
    }

    let mut results: [Option<GeneratedImage>; VIEW_COUNT] = Default::default();
    while let Some((index, view, joined)) = pending.next().await {
        let outcome = joined.unwrap_or_else(|err| {
            warn!("Generation task for {} did not complete: {}", view.label, err);
            Err(GenerationError::ViewAborted { label: view.label })
        });
        results[index] = Some(outcome?);
    }

    let images = results
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or(GenerationError::Unknown)?;
    info!(
        "Generated {} hairstyle views with {} ({})",
        images.len(),
        service.provider(),
        service.model()
    );
    Ok(images)
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::llm::{EditOutcome, EditRequest, ImageEditService, ImageServiceError, InlineImage};

    #[derive(Debug, Clone)]
    pub enum FakeReply {
        Image,
        NoImage,
        Blocked(&'static str),
        Fail(&'static str),
        Panic,
    }

    #[derive(Default)]
    pub struct FakeImageService {
        replies: HashMap<&'static str, FakeReply>,
        delays: HashMap<&'static str, Duration>,
        pub calls: AtomicUsize,
        pub completed: AtomicUsize,
        pub requests: Mutex<Vec<EditRequest>>,
    }

    impl FakeImageService {
        pub fn succeeding() -> Self {
            FakeImageService::default()
        }

        pub fn with_reply(mut self, prompt_suffix: &'static str, reply: FakeReply) -> Self {
            self.replies.insert(prompt_suffix, reply);
            self
        }

        pub fn with_delay(mut self, prompt_suffix: &'static str, delay: Duration) -> Self {
            self.delays.insert(prompt_suffix, delay);
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn lookup<'a, T>(map: &'a HashMap<&'static str, T>, instruction: &str) -> Option<&'a T> {
            map.iter()
                .find(|(suffix, _)| instruction.contains(*suffix))
                .map(|(_, value)| value)
        }
    }

    #[async_trait]
    impl ImageEditService for FakeImageService {
        fn provider(&self) -> &str {
            "fake"
        }

        fn model(&self) -> &str {
            "fake-image-model"
        }

        async fn edit_image(
            &self,
            request: &EditRequest,
        ) -> Result<EditOutcome, ImageServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().push(request.clone());

            if let Some(delay) = Self::lookup(&self.delays, &request.instruction) {
                tokio::time::sleep(*delay).await;
            }

            let reply = Self::lookup(&self.replies, &request.instruction)
                .cloned()
                .unwrap_or(FakeReply::Image);
            self.completed.fetch_add(1, Ordering::SeqCst);
            match reply {
                FakeReply::Image => Ok(EditOutcome::image(InlineImage {
                    mime_type: "image/png".to_string(),
                    data: "aW1hZ2U=".to_string(),
                })),
                FakeReply::NoImage => Ok(EditOutcome::default()),
                FakeReply::Blocked(reason) => Ok(EditOutcome {
                    image: None,
                    block_reason: Some(reason.to_string()),
                }),
                FakeReply::Fail(message) => Err(ImageServiceError::Status {
                    status: 429,
                    message: message.to_string(),
                }),
                FakeReply::Panic => panic!("fake service crashed"),
            }
        }
    }
}
