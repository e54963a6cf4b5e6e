use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::hairstyle::{generate_hairstyles, GeneratedImage, GenerationError};
use crate::llm::media::{SourceImage, UploadError};
use crate::llm::ImageEditService;
use crate::utils::timing::{complete_generation_timer, start_generation_timer};

#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub image: Option<Arc<SourceImage>>,
    pub prompt: String,
    pub is_loading: bool,
    pub generated_images: Vec<GeneratedImage>,
    pub error: Option<String>,
}

impl SessionSnapshot {
    fn has_valid_input(&self) -> bool {
        self.image.is_some() && !self.prompt.trim().is_empty()
    }
}

struct LoadingGuard<'a> {
    session: &'a Mutex<SessionSnapshot>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.session.lock().is_loading = false;
    }
}

#[derive(Clone)]
pub struct AppState {
    service: Arc<dyn ImageEditService>,
    session: Arc<Mutex<SessionSnapshot>>,
    cycles: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(service: Arc<dyn ImageEditService>) -> Self {
        AppState {
            service,
            session: Arc::new(Mutex::new(SessionSnapshot::default())),
            cycles: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.lock().clone()
    }

    pub fn set_image(&self, image: SourceImage) {
        let mut session = self.session.lock();
        info!(
            "Selected image {} ({}, {} bytes)",
            image.display_name().unwrap_or("<unnamed>"),
            image.mime_type(),
            image.byte_len()
        );
        session.image = Some(Arc::new(image));
        session.generated_images.clear();
        session.error = None;
    }

    pub async fn load_image_file(&self, path: &Path) -> Result<(), UploadError> {
        match SourceImage::load(path).await {
            Ok(image) => {
                self.set_image(image);
                Ok(())
            }
            Err(err) => {
                self.session.lock().error = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub fn set_prompt(&self, prompt: impl Into<String>) {
        self.session.lock().prompt = prompt.into();
    }

    pub fn can_generate(&self) -> bool {
        let session = self.session.lock();
        session.has_valid_input() && !session.is_loading
    }

    pub async fn generate(&self) -> Result<Vec<GeneratedImage>, GenerationError> {
        let (image, prompt) = {
            let mut session = self.session.lock();
            if session.is_loading {
                return Err(GenerationError::InProgress);
            }
            let image = match session.image.clone() {
                Some(image) if session.has_valid_input() => image,
                _ => {
                    let err = GenerationError::MissingInput;
                    session.error = Some(err.to_string());
                    return Err(err);
                }
            };
            session.is_loading = true;
            session.error = None;
            session.generated_images.clear();
            (image, session.prompt.clone())
        };
        let _loading = LoadingGuard {
            session: &self.session,
        };

        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        let mut timer =
            start_generation_timer(cycle, image.mime_type(), image.byte_len(), &prompt);

        let encoded = image.base64_payload();
        let result = generate_hairstyles(
            Arc::clone(&self.service),
            &encoded,
            image.mime_type(),
            &prompt,
        )
        .await;

        let mut session = self.session.lock();
        match &result {
            Ok(images) => {
                session.generated_images = images.clone();
                complete_generation_timer(&mut timer, "success", None);
            }
            Err(err) => {
                warn!(
                    view = err.view_label().unwrap_or("-"),
                    "Hairstyle generation cycle {} failed: {}",
                    cycle,
                    err
                );
                session.error = Some(err.to_string());
                complete_generation_timer(&mut timer, "error", Some(err.to_string()));
            }
        }
        drop(session);

        result
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::hairstyle::orchestrator::fakes::{FakeImageService, FakeReply};
    use crate::llm::media::fixtures::{JPEG_BYTES, PNG_BYTES};

    fn state_with(service: &Arc<FakeImageService>) -> AppState {
        let service: Arc<dyn ImageEditService> = service.clone();
        AppState::new(service)
    }

    fn jpeg() -> SourceImage {
        SourceImage::from_bytes(JPEG_BYTES.to_vec(), Some("image/jpeg"), None).unwrap()
    }

    fn png() -> SourceImage {
        SourceImage::from_bytes(PNG_BYTES.to_vec(), Some("image/png"), None).unwrap()
    }

    #[tokio::test]
    async fn missing_image_is_rejected_without_calling_the_service() {
        let service = Arc::new(FakeImageService::succeeding());
        let state = state_with(&service);
        state.set_prompt("bald");

        let err = state.generate().await.unwrap_err();
        assert_eq!(err, GenerationError::MissingInput);

        let snapshot = state.snapshot();
        assert_eq!(
            snapshot.error.as_deref(),
            Some("Please upload an image and describe a hairstyle.")
        );
        assert!(!snapshot.is_loading);
        assert_eq!(service.call_count(), 0);
    }

    #[test]
    fn input_is_valid_only_with_image_and_non_blank_prompt() {
        let mut session = SessionSnapshot {
            prompt: "bald".to_string(),
            ..SessionSnapshot::default()
        };
        assert!(!session.has_valid_input());

        session.image = Some(Arc::new(jpeg()));
        assert!(session.has_valid_input());

        session.prompt = "   ".to_string();
        assert!(!session.has_valid_input());
    }

    #[tokio::test]
    async fn blank_prompt_is_rejected() {
        let service = Arc::new(FakeImageService::succeeding());
        let state = state_with(&service);
        state.set_image(jpeg());
        state.set_prompt(" \n\t ");

        assert!(!state.can_generate());
        assert_eq!(
            state.generate().await.unwrap_err(),
            GenerationError::MissingInput
        );
        assert_eq!(service.call_count(), 0);
    }

    #[tokio::test]
    async fn successful_cycle_stores_four_labeled_images() {
        let service = Arc::new(FakeImageService::succeeding());
        let state = state_with(&service);
        state.set_image(jpeg());
        state.set_prompt("a vibrant pink mohawk with shaved sides");
        assert!(state.can_generate());

        state.generate().await.unwrap();

        let snapshot = state.snapshot();
        let labels: Vec<&str> = snapshot
            .generated_images
            .iter()
            .map(|image| image.label)
            .collect();
        assert_eq!(
            labels,
            ["Front View", "Left Side View", "Right Side View", "Back View"]
        );
        assert_eq!(snapshot.error, None);
        assert!(!snapshot.is_loading);

        let requests = service.requests.lock();
        assert!(requests
            .iter()
            .all(|request| &*request.image_base64 == jpeg().base64_payload()));
    }

    #[tokio::test]
    async fn failed_view_leaves_no_gallery() {
        let service = Arc::new(
            FakeImageService::succeeding()
                .with_reply("view from the back of the head", FakeReply::NoImage),
        );
        let state = state_with(&service);
        state.set_image(png());
        state.set_prompt("long curly blonde hair");

        let err = state.generate().await.unwrap_err();
        assert_eq!(err.view_label(), Some("Back View"));

        let snapshot = state.snapshot();
        assert!(snapshot.generated_images.is_empty());
        let message = snapshot.error.unwrap();
        assert!(message.contains("Back View"));
        assert!(message.contains("safety"));
        assert!(!snapshot.is_loading);
    }

    #[tokio::test]
    async fn retry_after_failure_clears_the_error() {
        let failing = Arc::new(
            FakeImageService::succeeding()
                .with_reply("front view", FakeReply::Fail("temporarily unavailable")),
        );
        let state = state_with(&failing);
        state.set_image(png());
        state.set_prompt("buzz cut");
        assert!(state.generate().await.is_err());
        assert!(state.snapshot().error.is_some());

        let working = Arc::new(FakeImageService::succeeding());
        let retry = AppState {
            service: working.clone(),
            ..state.clone()
        };
        retry.generate().await.unwrap();
        let snapshot = state.snapshot();
        assert_eq!(snapshot.error, None);
        assert_eq!(snapshot.generated_images.len(), 4);
    }

    #[tokio::test]
    async fn loading_is_visible_while_a_cycle_runs() {
        let service = Arc::new(
            FakeImageService::succeeding()
                .with_delay("front view", Duration::from_millis(150)),
        );
        let state = state_with(&service);
        state.set_image(jpeg());
        state.set_prompt("silver pixie cut");

        let running = {
            let state = state.clone();
            tokio::spawn(async move { state.generate().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let snapshot = state.snapshot();
        assert!(snapshot.is_loading);
        assert!(snapshot.generated_images.is_empty());
        assert!(!state.can_generate());
        assert_eq!(state.generate().await.unwrap_err(), GenerationError::InProgress);

        running.await.unwrap().unwrap();
        assert!(!state.snapshot().is_loading);
        assert_eq!(service.call_count(), 4);
    }

    #[tokio::test]
    async fn dropped_cycle_still_clears_loading() {
        let service = Arc::new(
            FakeImageService::succeeding().with_delay("front view", Duration::from_secs(5)),
        );
        let state = state_with(&service);
        state.set_image(jpeg());
        state.set_prompt("mullet");

        let outcome = tokio::time::timeout(Duration::from_millis(50), state.generate()).await;
        assert!(outcome.is_err());
        assert!(!state.snapshot().is_loading);
    }

    #[tokio::test]
    async fn new_upload_clears_results_and_error() {
        let service = Arc::new(FakeImageService::succeeding());
        let state = state_with(&service);
        state.set_image(jpeg());
        state.set_prompt("afro");
        state.generate().await.unwrap();
        state.session.lock().error = Some("stale".to_string());

        state.set_image(png());
        let snapshot = state.snapshot();
        assert!(snapshot.generated_images.is_empty());
        assert_eq!(snapshot.error, None);
        assert_eq!(snapshot.image.unwrap().mime_type(), "image/png");
        assert_eq!(snapshot.prompt, "afro");
    }

    #[tokio::test]
    async fn failed_upload_keeps_the_previous_image() {
        let service = Arc::new(FakeImageService::succeeding());
        let state = state_with(&service);
        state.set_image(jpeg());

        let missing = std::env::temp_dir().join("hairstyle_try_on_no_such_upload.webp");
        assert!(state.load_image_file(&missing).await.is_err());

        let snapshot = state.snapshot();
        assert_eq!(snapshot.image.unwrap().mime_type(), "image/jpeg");
        assert!(snapshot.error.unwrap().starts_with("Failed to read image"));
    }
}
