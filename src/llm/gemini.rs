use std::fmt;
use std::future::Future;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::{Config, SafetyProfile};
use crate::error::{BackendError, ConfigurationError};
use crate::llm::retry::RetryPolicy;
use crate::llm::schema::Schema;
use crate::llm::types::{GenerateContentResponse, MultiModalRequest, Part, ResponseFormat};
use crate::utils::http::build_http_client;
use crate::utils::timing::log_llm_timing;

pub trait GenerativeBackend {
    fn generate(
        &self,
        model: &str,
        request: &MultiModalRequest,
    ) -> impl Future<Output = Result<GenerateContentResponse, BackendError>> + Send;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequestBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent<'a>>,
    contents: Vec<GeminiContent<'a>>,
    generation_config: GenerationConfig<'a>,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<&'a Schema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<[&'static str; 2]>,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug)]
struct AttemptError {
    status: Option<StatusCode>,
    body: String,
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "status {}: {}", status, truncate_for_log(&self.body, 500)),
            None => f.write_str(&self.body),
        }
    }
}

const HARM_CATEGORIES: [&str; 5] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_CIVIC_INTEGRITY",
];

fn build_safety_settings(profile: SafetyProfile) -> Vec<SafetySetting> {
    HARM_CATEGORIES
        .into_iter()
        .map(|category| SafetySetting {
            category,
            threshold: profile.threshold(),
        })
        .collect()
}

pub fn normalize_gemini_mime_type(mime_type: &str) -> String {
    let lowered = mime_type.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "image/jpg" => "image/jpeg".to_string(),
        "video/quicktime" => "video/mov".to_string(),
        "video/x-msvideo" => "video/avi".to_string(),
        "video/x-ms-wmv" => "video/wmv".to_string(),
        _ => lowered,
    }
}

fn build_request_body<'a>(
    request: &'a MultiModalRequest,
    temperature: f32,
    safety: SafetyProfile,
) -> GeminiRequestBody<'a> {
    let parts = request
        .parts
        .iter()
        .map(|part| match part {
            Part::Text(text) => GeminiPart::Text { text },
            Part::Binary(attachment) => GeminiPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type: normalize_gemini_mime_type(&attachment.mime_type),
                    data: general_purpose::STANDARD.encode(&attachment.data),
                },
            },
        })
        .collect();

    let generation_config = match &request.response_format {
        ResponseFormat::Text => GenerationConfig {
            temperature: Some(temperature),
            response_mime_type: None,
            response_schema: None,
            response_modalities: None,
        },
        ResponseFormat::Json(schema) => GenerationConfig {
            temperature: Some(temperature),
            response_mime_type: Some("application/json"),
            response_schema: Some(schema),
            response_modalities: None,
        },
        ResponseFormat::Image => GenerationConfig {
            temperature: None,
            response_mime_type: None,
            response_schema: None,
            response_modalities: Some(["TEXT", "IMAGE"]),
        },
    };

    GeminiRequestBody {
        system_instruction: request.system_instruction.as_deref().map(|text| GeminiContent {
            role: None,
            parts: vec![GeminiPart::Text { text }],
        }),
        contents: vec![GeminiContent {
            role: Some("user"),
            parts,
        }],
        generation_config,
        safety_settings: build_safety_settings(safety),
    }
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_gemini_parts(parts: &[Value]) -> Vec<Value> {
    parts
        .iter()
        .map(|part| {
            if let Some(text) = part.get("text").and_then(|value| value.as_str()) {
                json!({ "text": truncate_for_log(text, 200) })
            } else if let Some(inline_data) = part.get("inlineData") {
                let mime_type = inline_data
                    .get("mimeType")
                    .and_then(|value| value.as_str())
                    .unwrap_or("unknown");
                let data_len = inline_data
                    .get("data")
                    .and_then(|value| value.as_str())
                    .map(|value| value.len())
                    .unwrap_or(0);
                json!({ "inlineData": { "mimeType": mime_type, "dataLen": data_len } })
            } else {
                json!({ "unknownPart": true })
            }
        })
        .collect()
}

pub(crate) fn summarize_gemini_payload(payload: &Value) -> Value {
    let mut summary = Map::new();

    if let Some(system) = payload.pointer("/systemInstruction/parts/0/text") {
        let length = system.as_str().map(|text| text.len()).unwrap_or(0);
        summary.insert("systemInstructionLen".to_string(), json!(length));
    }

    if let Some(contents) = payload.get("contents").and_then(|value| value.as_array()) {
        let mut summarized_contents = Vec::new();
        for content in contents {
            let role = content
                .get("role")
                .and_then(|value| value.as_str())
                .unwrap_or("user");
            let parts = content
                .get("parts")
                .and_then(|value| value.as_array())
                .map(|parts| summarize_gemini_parts(parts))
                .unwrap_or_default();
            summarized_contents.push(json!({ "role": role, "parts": parts }));
        }
        summary.insert("contents".to_string(), Value::Array(summarized_contents));
    }

    if let Some(config) = payload.get("generationConfig") {
        let mut config = config.clone();
        if let Some(object) = config.as_object_mut() {
            if object.remove("responseSchema").is_some() {
                object.insert("responseSchema".to_string(), json!("[contract]"));
            }
        }
        summary.insert("generationConfig".to_string(), config);
    }

    if let Some(safety) = payload
        .get("safetySettings")
        .and_then(|value| value.as_array())
    {
        summary.insert("safetySettingsCount".to_string(), json!(safety.len()));
    }

    Value::Object(summary)
}

fn summarize_gemini_response(response: &GenerateContentResponse) -> Value {
    let mut text_parts = 0usize;
    let mut image_parts = 0usize;
    let mut text_preview = None;

    for part in response.parts() {
        if let Some(text) = &part.text {
            text_parts += 1;
            if text_preview.is_none() && !text.trim().is_empty() {
                text_preview = Some(truncate_for_log(text, 200));
            }
        }
        if part.inline_data.is_some() {
            image_parts += 1;
        }
    }

    json!({
        "candidates": response.candidates.as_ref().map(|candidates| candidates.len()).unwrap_or(0),
        "finishReason": response.finish_reason(),
        "textParts": text_parts,
        "inlineParts": image_parts,
        "textPreview": text_preview
    })
}

fn api_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body.trim()).ok()?;
    value
        .pointer("/error/message")
        .or_else(|| value.get("message"))
        .and_then(|message| message.as_str())
        .map(str::to_string)
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
    temperature: f32,
    safety: SafetyProfile,
    timeout: Duration,
    retry: RetryPolicy,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self, ConfigurationError> {
        if config.gemini_api_key.trim().is_empty() {
            return Err(ConfigurationError::Missing("GEMINI_API_KEY"));
        }
        let http = build_http_client(config.request_timeout())?;
        Ok(Self {
            http,
            api_key: config.gemini_api_key.clone(),
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            temperature: config.gemini_temperature,
            safety: config.gemini_safety_settings,
            timeout: config.request_timeout(),
            retry: config.retry_policy(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model.trim())
    }

    async fn send_once(
        &self,
        url: &str,
        body: &GeminiRequestBody<'_>,
    ) -> Result<GenerateContentResponse, AttemptError> {
        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|err| {
                let (timeout, connect, status) = (err.is_timeout(), err.is_connect(), err.status());
                AttemptError {
                    status,
                    body: format!(
                        "request failed to send: {} (timeout={}, connect={})",
                        err.without_url(),
                        timeout,
                        connect
                    ),
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|err| AttemptError {
            status: Some(status),
            body: format!("failed to read response body: {}", err.without_url()),
        })?;

        if !status.is_success() {
            let api_message = api_error_message(&text);
            debug!(
                target: "llm.gemini",
                status = %status,
                api_message = api_message.as_deref().unwrap_or("-"),
                body = %truncate_for_log(&text, 4000)
            );
            return Err(AttemptError {
                status: Some(status),
                body: text,
            });
        }

        serde_json::from_str::<GenerateContentResponse>(&text).map_err(|err| AttemptError {
            status: Some(status),
            body: format!(
                "malformed response body: {err}; body={}",
                truncate_for_log(&text, 500)
            ),
        })
    }
}

impl GenerativeBackend for GeminiClient {
    async fn generate(
        &self,
        model: &str,
        request: &MultiModalRequest,
    ) -> Result<GenerateContentResponse, BackendError> {
        let url = self.endpoint(model);
        let body = build_request_body(request, self.temperature, self.safety);

        if tracing::enabled!(tracing::Level::DEBUG) {
            if let Ok(payload) = serde_json::to_value(&body) {
                let payload_summary = summarize_gemini_payload(&payload);
                debug!(target: "llm.gemini", model = model, payload = %payload_summary);
            }
        }

        let operation = match request.response_format {
            ResponseFormat::Json(_) => "generate_json",
            ResponseFormat::Image => "generate_image",
            ResponseFormat::Text => "generate_text",
        };
        let metadata = json!({
            "parts": request.parts.len(),
            "attachments": request.attachments().count(),
        });

        let response = log_llm_timing("gemini", model, operation, Some(metadata), || async {
            self.retry
                .run(
                    "Gemini request",
                    |_| self.send_once(&url, &body),
                    |_| true,
                )
                .await
                .map_err(|exhausted| BackendError {
                    attempts: exhausted.attempts,
                    status: exhausted.last_error.status.map(|status| status.as_u16()),
                    body: exhausted.last_error.body,
                })
        })
        .await?;

        if tracing::enabled!(tracing::Level::DEBUG) {
            let response_summary = summarize_gemini_response(&response);
            debug!(target: "llm.gemini", model = model, response = %response_summary);
        }
        Ok(response)
    }
}
