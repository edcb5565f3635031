use serde::{Deserialize, Serialize};

use crate::llm::schema::Schema;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    Binary(Attachment),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }

    pub fn as_binary(&self) -> Option<&Attachment> {
        match self {
            Part::Binary(attachment) => Some(attachment),
            Part::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseFormat {
    Text,
    Json(Schema),
    Image,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiModalRequest {
    pub system_instruction: Option<String>,
    pub parts: Vec<Part>,
    pub response_format: ResponseFormat,
}

impl MultiModalRequest {
    pub fn new(response_format: ResponseFormat) -> Self {
        Self {
            system_instruction: None,
            parts: Vec::new(),
            response_format,
        }
    }

    pub fn with_system_instruction(mut self, instruction: Option<String>) -> Self {
        self.system_instruction = instruction.filter(|text| !text.trim().is_empty());
        self
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        self.parts.push(Part::text(text));
    }

    pub fn push_attachment(&mut self, attachment: Attachment) {
        self.parts.push(Part::Binary(attachment));
    }

    pub fn output_contract(&self) -> Option<&Schema> {
        match &self.response_format {
            ResponseFormat::Json(schema) => Some(schema),
            _ => None,
        }
    }

    pub fn attachments(&self) -> impl Iterator<Item = &Attachment> {
        self.parts.iter().filter_map(Part::as_binary)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Option<Vec<ResponsePart>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub inline_data: Option<InlineData>,
    #[serde(default)]
    pub thought: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub data: String,
}

impl GenerateContentResponse {
    pub fn parts(&self) -> impl Iterator<Item = &ResponsePart> {
        self.candidates
            .iter()
            .flatten()
            .filter_map(|candidate| candidate.content.as_ref())
            .filter_map(|content| content.parts.as_ref())
            .flatten()
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.candidates
            .as_deref()
            .and_then(|candidates| candidates.first())
            .and_then(|candidate| candidate.finish_reason.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl GeneratedImage {
    pub fn as_attachment(&self) -> Attachment {
        Attachment::new(self.mime_type.clone(), self.data.clone())
    }
}
