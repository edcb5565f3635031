use std::collections::BTreeMap;
use std::fmt;

use crate::diagnosis::{
    AttachmentSlot, ColorKey, DiagnosisRequest, DiagnosisResult, StyleKey, SubjectProfile,
};
use crate::llm::types::{Attachment, GeneratedImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    AttachmentsReady,
    Diagnosed,
    StyleSelected,
    ImageGenerated,
}

impl WorkflowState {
    pub const fn as_str(self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::AttachmentsReady => "attachments_ready",
            WorkflowState::Diagnosed => "diagnosed",
            WorkflowState::StyleSelected => "style_selected",
            WorkflowState::ImageGenerated => "image_generated",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    pub style: Option<StyleKey>,
    pub color: Option<ColorKey>,
}

impl Selection {
    pub fn complete(&self) -> Option<(StyleKey, ColorKey)> {
        Some((self.style?, self.color?))
    }
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub session_id: String,
    pub profile: SubjectProfile,
    pub attachment_refs: BTreeMap<AttachmentSlot, String>,
    pub attachments: Option<BTreeMap<AttachmentSlot, Attachment>>,
    pub diagnosis: Option<DiagnosisResult>,
    pub selection: Selection,
    pub generated_image: Option<GeneratedImage>,
    pub generated_color: Option<ColorKey>,
    pub refinements: usize,
    pub state: WorkflowState,
}

impl SessionState {
    pub fn new(session_id: impl Into<String>, request: &DiagnosisRequest) -> Self {
        Self {
            session_id: session_id.into(),
            profile: request.subject_profile.clone(),
            attachment_refs: request.submitted_refs(),
            attachments: None,
            diagnosis: None,
            selection: Selection::default(),
            generated_image: None,
            generated_color: None,
            refinements: 0,
            state: WorkflowState::Idle,
        }
    }

    pub fn attachment(&self, slot: AttachmentSlot) -> Option<&Attachment> {
        self.attachments.as_ref().and_then(|resolved| resolved.get(&slot))
    }

    pub(crate) fn clear_generated(&mut self) {
        self.generated_image = None;
        self.generated_color = None;
        self.refinements = 0;
    }
}
