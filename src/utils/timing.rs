use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::info;

pub const TIMING_TARGET: &str = "studio.timing";

#[derive(Debug)]
pub struct StepTimer {
    step: &'static str,
    session_id: String,
    started_at: DateTime<Utc>,
    started_perf: Instant,
}

impl StepTimer {
    pub fn start(step: &'static str, session_id: &str) -> Self {
        let timer = StepTimer {
            step,
            session_id: session_id.to_string(),
            started_at: Utc::now(),
            started_perf: Instant::now(),
        };
        info!(
            target: "studio.timing",
            "event=step_started step={} session_id={} started_at={}",
            timer.step,
            timer.session_id,
            timer.started_at.to_rfc3339()
        );
        timer
    }

    pub fn finish<T, E: Display>(self, result: &Result<T, E>) {
        let (status, detail) = match result {
            Ok(_) => ("success", String::new()),
            Err(err) => ("error", err.to_string()),
        };
        info!(
            target: "studio.timing",
            "event=step_completed step={} session_id={} started_at={} completed_at={} duration_s={:.3} status={} detail={}",
            self.step,
            self.session_id,
            self.started_at.to_rfc3339(),
            Utc::now().to_rfc3339(),
            self.started_perf.elapsed().as_secs_f64(),
            status,
            detail
        );
    }
}

pub async fn log_llm_timing<T, E, F, Fut>(
    provider: &str,
    model: &str,
    operation: &str,
    metadata: Option<JsonValue>,
    call: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let started_at = Utc::now();
    let started_perf = Instant::now();
    let metadata_text = metadata
        .as_ref()
        .map(|value| value.to_string())
        .unwrap_or_else(|| "{}".to_string());
    info!(
        target: "studio.timing",
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
        target: "studio.timing",
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
