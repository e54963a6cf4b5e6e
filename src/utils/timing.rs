use std::fmt::Display;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::info;

pub const TIMING_TARGET: &str = "try_on.timing";

const PROMPT_LOG_LIMIT: usize = 300;

#[derive(Debug)]
pub struct GenerationTimer {
    cycle_id: u64,
    mime_type: String,
    image_bytes: usize,
    prompt: String,
    started_at: DateTime<Utc>,
    started_perf: Instant,
    status: String,
    detail: Option<String>,
    completed: bool,
}

impl GenerationTimer {
    pub fn new(cycle_id: u64, mime_type: &str, image_bytes: usize, prompt: &str) -> Self {
        let prompt = prompt.replace('\n', " ");
        let prompt = if prompt.chars().count() > PROMPT_LOG_LIMIT {
            prompt.chars().take(PROMPT_LOG_LIMIT).collect()
        } else {
            prompt
        };

        GenerationTimer {
            cycle_id,
            mime_type: mime_type.to_string(),
            image_bytes,
            prompt,
            started_at: Utc::now(),
            started_perf: Instant::now(),
            status: "success".to_string(),
            detail: None,
            completed: false,
        }
    }

    pub fn log_started(&self) {
        info!(
            target: TIMING_TARGET,
            "event=generation_started cycle={} mime_type={} image_bytes={} started_at={} prompt={:?}",
            self.cycle_id,
            self.mime_type,
            self.image_bytes,
            self.started_at.to_rfc3339(),
            self.prompt
        );
    }

    pub fn mark_status(&mut self, status: &str, detail: Option<String>) {
        self.status = status.to_string();
        self.detail = detail;
    }

    pub fn log_completed(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        let completed_at = Utc::now();
        let duration = self.started_perf.elapsed().as_secs_f64();
        info!(
            target: TIMING_TARGET,
            "event=generation_completed cycle={} started_at={} completed_at={} duration_s={:.3} status={} detail={}",
            self.cycle_id,
            self.started_at.to_rfc3339(),
            completed_at.to_rfc3339(),
            duration,
            self.status,
            self.detail.clone().unwrap_or_default()
        );
    }
}

pub fn start_generation_timer(
    cycle_id: u64,
    mime_type: &str,
    image_bytes: usize,
    prompt: &str,
) -> GenerationTimer {
    let timer = GenerationTimer::new(cycle_id, mime_type, image_bytes, prompt);
    timer.log_started();
    timer
}

pub fn complete_generation_timer(timer: &mut GenerationTimer, status: &str, detail: Option<String>) {
    timer.mark_status(status, detail);
    timer.log_completed();
}

pub async fn log_llm_timing<T, E, F, Fut>(
    provider: &str,
    model: &str,
    operation: &str,
    metadata: Option<JsonValue>,
    call: F,
) -> Result<T, E>
where
    E: Display,
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let started_at = Utc::now();
    let started_perf = Instant::now();
    let metadata_text = metadata
        .as_ref()
        .map(|value| value.to_string())
        .unwrap_or_else(|| "{}".to_string());
    info!(
        target: TIMING_TARGET,
        "event=llm_request provider={} model={} operation={} started_at={} metadata={}",
        provider,
        model,
        operation,
        started_at.to_rfc3339(),
        metadata_text
    );

    let result = call().await;
    let status = if result.is_ok() { "success" } else { "error" };

    let completed_at = Utc::now();
    let duration = started_perf.elapsed().as_secs_f64();
    info!(
        target: TIMING_TARGET,
        "event=llm_response provider={} model={} operation={} completed_at={} duration_s={:.3} status={} metadata={}",
        provider,
        model,
        operation,
        completed_at.to_rfc3339(),
        duration,
        status,
        metadata_text
    );

    result
}
