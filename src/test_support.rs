use std::collections::{BTreeMap, VecDeque};

use base64::{engine::general_purpose, Engine as _};
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::diagnosis::{AttachmentSlot, DiagnosisRequest, Gender, SubjectProfile};
use crate::error::BackendError;
use crate::llm::gemini::GenerativeBackend;
use crate::llm::media::MediaKind;
use crate::llm::types::{GenerateContentResponse, MultiModalRequest};

pub(crate) fn response(value: Value) -> GenerateContentResponse {
    serde_json::from_value(value).unwrap()
}

pub(crate) fn text_response(text: &str) -> GenerateContentResponse {
    response(json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] }))
}

pub(crate) fn image_response(bytes: &[u8]) -> GenerateContentResponse {
    response(json!({ "candidates": [{ "content": { "parts": [
        { "text": "Here is the result." },
        { "inlineData": { "mimeType": "image/png", "data": general_purpose::STANDARD.encode(bytes) } }
    ] }, "finishReason": "STOP" }] }))
}

pub(crate) fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", general_purpose::STANDARD.encode(bytes))
}

pub(crate) fn sample_request() -> DiagnosisRequest {
    let mut attachment_refs = BTreeMap::new();
    for slot in AttachmentSlot::REQUIRED {
        let (mime, bytes) = match slot.kind() {
            MediaKind::Image => ("image/jpeg", slot.key().as_bytes()),
            MediaKind::Video => ("video/mp4", slot.key().as_bytes()),
        };
        attachment_refs.insert(slot, data_uri(mime, bytes));
    }
    DiagnosisRequest {
        attachment_refs,
        subject_profile: SubjectProfile {
            gender: Gender::Female,
            free_text_request: Some("Something easy to maintain".to_string()),
        },
    }
}

pub(crate) fn complete_diagnosis() -> Value {
    let palette = |name: &str, hex: &str| json!({ "name": name, "hex": hex });
    json!({
        "analysis": {
            "face": { "shape": "Oval", "features": "Soft jawline", "impression": "Gentle" },
            "skeleton": { "type": "Wave", "features": "Slim frame", "bodyLine": "Curvy" },
            "personalColor": {
                "season": "Summer", "undertone": "Blue-based", "characteristics": "Cool &amp; clear"
            },
            "hairCondition": {
                "texture": "Fine", "volume": "Medium", "damage": "Light",
                "currentLevel": "Level 3 (Dark brown)"
            }
        },
        "proposal": {
            "hairstyles": {
                "style1": { "name": "Layered bob", "description": "Soft layers" },
                "style2": { "name": "Long waves", "description": "Loose waves" }
            },
            "haircolors": {
                "color1": { "name": "Ash beige", "description": "Cool beige", "recommendedLevel": "Level 6 (Dark blonde)" },
                "color2": { "name": "Lavender brown", "description": "Muted purple", "recommendedLevel": "Level 5 (Light brown)" }
            },
            "palette": {
                "color1": palette("Rose", "#E8A0B4"),
                "color2": palette("Lavender", "#B8A9D9"),
                "color3": palette("Navy", "#1F2A44"),
                "color4": palette("Soft white", "#F5F5F0")
            },
            "makeup": { "base": "Pink base", "eye": "Greige", "lip": "Rose", "cheek": "Mauve" },
            "fashion": {
                "recommendedStyles": ["Feminine"],
                "recommendedItems": ["Chiffon blouse", "Pearl earrings"],
                "advice": "Choose soft fabrics"
            },
            "comment": "You look great in cool tones&#x2F;soft textures."
        }
    })
}

#[derive(Default)]
pub(crate) struct StubBackend {
    outcomes: Mutex<VecDeque<Result<GenerateContentResponse, BackendError>>>,
    calls: Mutex<Vec<(String, MultiModalRequest)>>,
}

impl StubBackend {
    pub(crate) fn with_outcomes(
        outcomes: impl IntoIterator<Item = Result<GenerateContentResponse, BackendError>>,
    ) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn push(&self, outcome: Result<GenerateContentResponse, BackendError>) {
        self.outcomes.lock().push_back(outcome);
    }

    pub(crate) fn calls(&self) -> Vec<(String, MultiModalRequest)> {
        self.calls.lock().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

pub(crate) fn backend_failure(status: u16) -> BackendError {
    BackendError {
        attempts: 3,
        status: Some(status),
        body: "The model is overloaded.".to_string(),
    }
}

impl GenerativeBackend for StubBackend {
    async fn generate(
        &self,
        model: &str,
        request: &MultiModalRequest,
    ) -> Result<GenerateContentResponse, BackendError> {
        self.calls.lock().push((model.to_string(), request.clone()));
        let next = self.outcomes.lock().pop_front();
        next.unwrap_or_else(|| Err(backend_failure(500)))
    }
}
