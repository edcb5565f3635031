use base64::{engine::general_purpose, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{CoreError, ExtractionError, MalformedPayloadError, ValidationError};
use crate::llm::schema::Schema;
use crate::llm::types::{GenerateContentResponse, GeneratedImage};
use crate::utils::sanitize::sanitize_value;

pub const DEFAULT_GENERATED_MIME: &str = "image/png";

static CODE_FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z]*\s*\n?(.*?)\n?\s*```\s*$").expect("valid code fence regex")
});

fn describe_empty_response(response: &GenerateContentResponse) -> String {
    match response.finish_reason() {
        Some(reason) => format!("no text part in response (finishReason={reason})"),
        None => "no text part in response".to_string(),
    }
}

pub fn extract_text(response: &GenerateContentResponse) -> Result<String, ExtractionError> {
    response
        .parts()
        .filter(|part| !part.thought.unwrap_or(false))
        .filter_map(|part| part.text.as_deref())
        .find(|text| !text.trim().is_empty())
        .map(|text| text.to_string())
        .ok_or_else(|| ExtractionError(describe_empty_response(response)))
}

pub fn strip_code_fence(text: &str) -> &str {
    match CODE_FENCE_RE.captures(text).and_then(|captures| captures.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => text.trim(),
    }
}

pub fn parse_json_payload(text: &str) -> Result<Value, MalformedPayloadError> {
    serde_json::from_str(strip_code_fence(text))
        .map_err(|err| MalformedPayloadError(format!("invalid JSON: {err}")))
}

pub fn validate_against(schema: &Schema, value: &Value) -> Result<(), ValidationError> {
    let missing = schema.missing_paths(value);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { missing })
    }
}

pub fn extract_structured<T: DeserializeOwned>(
    response: &GenerateContentResponse,
    contract: &Schema,
) -> Result<T, CoreError> {
    let text = extract_text(response)?;
    let value = parse_json_payload(&text)?;
    validate_against(contract, &value)?;
    let sanitized = sanitize_value(value);
    serde_json::from_value(sanitized)
        .map_err(|err| MalformedPayloadError(format!("unexpected payload shape: {err}")).into())
}

pub fn extract_image(response: &GenerateContentResponse) -> Result<GeneratedImage, CoreError> {
    let inline = response
        .parts()
        .filter_map(|part| part.inline_data.as_ref())
        .find(|inline| !inline.data.trim().is_empty())
        .ok_or_else(|| {
            let reason = response
                .finish_reason()
                .map(|reason| format!(" (finishReason={reason})"))
                .unwrap_or_default();
            ExtractionError(format!("no inline image data in response{reason}"))
        })?;

    let data = general_purpose::STANDARD
        .decode(inline.data.trim())
        .map_err(|err| MalformedPayloadError(format!("inline image is not valid base64: {err}")))?;
    let mime_type = inline
        .mime_type
        .as_deref()
        .map(str::trim)
        .filter(|mime| !mime.is_empty())
        .unwrap_or(DEFAULT_GENERATED_MIME)
        .to_string();

    Ok(GeneratedImage { data, mime_type })
}
