use chrono::Utc;
use tracing::{info, warn};

use crate::config::Config;
use crate::diagnosis::{AttachmentSlot, ColorKey, DiagnosisRequest, DiagnosisResult, StyleKey};
use crate::error::{WorkflowError, WorkflowStep};
use crate::llm::extract::{extract_image, extract_structured};
use crate::llm::gemini::{GeminiClient, GenerativeBackend};
use crate::llm::media::AttachmentFetcher;
use crate::llm::types::{GeneratedImage, MultiModalRequest, ResponseFormat};
use crate::prompts::{
    build_diagnosis_prompt, build_image_generation_prompt, build_refinement_prompt,
    diagnosis_schema, variant_switch_instruction, ImagePromptInput, PromptSpec,
};
use crate::utils::timing::StepTimer;
use crate::workflow::session::{SessionState, WorkflowState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowModels {
    pub diagnosis_model: String,
    pub image_model: String,
}

impl WorkflowModels {
    pub fn from_config(config: &Config) -> Self {
        Self {
            diagnosis_model: config.gemini_diagnosis_model.clone(),
            image_model: config.gemini_image_model.clone(),
        }
    }
}

fn new_session_id() -> String {
    format!("session-{}", Utc::now().format("%Y%m%dT%H%M%S%.3f"))
}

fn request_from_prompt(prompt: PromptSpec, format: ResponseFormat) -> MultiModalRequest {
    let mut request = MultiModalRequest::new(format).with_system_instruction(prompt.system_instruction);
    request.push_text(prompt.instruction_text);
    request
}

/// Drives one user session from uploaded media to a refined style image.
pub struct StyleWorkflow<B> {
    backend: B,
    fetcher: AttachmentFetcher,
    models: WorkflowModels,
    session: SessionState,
}

impl StyleWorkflow<GeminiClient> {
    pub fn from_config(request: DiagnosisRequest, config: &Config) -> Result<Self, WorkflowError> {
        let backend = GeminiClient::new(config)
            .map_err(|err| WorkflowError::new(WorkflowStep::PrepareAttachments, err))?;
        let fetcher = AttachmentFetcher::new(config.fetch_timeout())
            .map_err(|err| WorkflowError::new(WorkflowStep::PrepareAttachments, err))?;
        Self::new(request, backend, fetcher, WorkflowModels::from_config(config))
    }
}

impl<B: GenerativeBackend> StyleWorkflow<B> {
    pub fn new(
        request: DiagnosisRequest,
        backend: B,
        fetcher: AttachmentFetcher,
        models: WorkflowModels,
    ) -> Result<Self, WorkflowError> {
        let missing = request.missing_slots();
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|slot| slot.key()).collect();
            return Err(WorkflowError::precondition(
                WorkflowStep::PrepareAttachments,
                format!("missing required attachments: {}", names.join(", ")),
            ));
        }

        Ok(Self {
            backend,
            fetcher,
            models,
            session: SessionState::new(new_session_id(), &request),
        })
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session.session_id = session_id.into();
        self
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn state(&self) -> WorkflowState {
        self.session.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_session(self) -> SessionState {
        self.session
    }

    pub fn diagnosis(&self) -> Option<&DiagnosisResult> {
        self.session.diagnosis.as_ref()
    }

    pub fn current_image(&self) -> Option<&GeneratedImage> {
        self.session.generated_image.as_ref()
    }

    fn require_state(&self, step: WorkflowStep, allowed: &[WorkflowState]) -> Result<(), WorkflowError> {
        if allowed.contains(&self.session.state) {
            Ok(())
        } else {
            Err(WorkflowError::precondition(
                step,
                format!("{} is not available in state {}", step, self.session.state),
            ))
        }
    }

    fn require_diagnosis(&self, step: WorkflowStep) -> Result<&DiagnosisResult, WorkflowError> {
        self.session
            .diagnosis
            .as_ref()
            .ok_or_else(|| WorkflowError::precondition(step, "no diagnosis result yet"))
    }

    pub async fn prepare_attachments(&mut self) -> Result<(), WorkflowError> {
        let step = WorkflowStep::PrepareAttachments;
        self.require_state(step, &[WorkflowState::Idle, WorkflowState::AttachmentsReady])?;

        let timer = StepTimer::start(step.as_str(), &self.session.session_id);
        let result = self
            .fetcher
            .fetch_all(&self.session.attachment_refs)
            .await
            .map_err(|err| WorkflowError::new(step, err));
        timer.finish(&result);

        let attachments = result?;
        info!(
            "Session {} resolved {} attachment(s)",
            self.session.session_id,
            attachments.len()
        );
        self.session.attachments = Some(attachments);
        self.session.state = WorkflowState::AttachmentsReady;
        Ok(())
    }

    async fn run_diagnosis(&self) -> Result<DiagnosisResult, WorkflowError> {
        let step = WorkflowStep::Diagnose;
        let attachments = self
            .session
            .attachments
            .as_ref()
            .ok_or_else(|| WorkflowError::precondition(step, "attachments are not prepared"))?;

        let prompt = build_diagnosis_prompt(self.session.profile.gender, self.session.profile.request_text());
        let contract = prompt.output_contract.clone().unwrap_or_else(diagnosis_schema);
        let mut request = request_from_prompt(prompt, ResponseFormat::Json(contract.clone()));
        // BTreeMap order is slot order, which puts the optional inspiration photo last.
        for (slot, attachment) in attachments {
            request.push_text(slot.caption());
            request.push_attachment(attachment.clone());
        }

        let response = self
            .backend
            .generate(&self.models.diagnosis_model, &request)
            .await
            .map_err(|err| WorkflowError::new(step, err))?;
        extract_structured::<DiagnosisResult>(&response, &contract)
            .map_err(|err| WorkflowError::new(step, err))
    }

    pub async fn diagnose(&mut self) -> Result<&DiagnosisResult, WorkflowError> {
        let step = WorkflowStep::Diagnose;
        self.require_state(
            step,
            &[
                WorkflowState::AttachmentsReady,
                WorkflowState::Diagnosed,
                WorkflowState::StyleSelected,
            ],
        )?;

        let timer = StepTimer::start(step.as_str(), &self.session.session_id);
        let result = self.run_diagnosis().await;
        timer.finish(&result);

        let diagnosis = match result {
            Ok(diagnosis) => diagnosis,
            Err(err) => {
                warn!("Diagnosis failed for session {}: {}", self.session.session_id, err);
                return Err(err);
            }
        };

        self.session.selection = Default::default();
        self.session.clear_generated();
        self.session.state = WorkflowState::Diagnosed;
        Ok(self.session.diagnosis.insert(diagnosis))
    }

    fn selection_states() -> [WorkflowState; 3] {
        [
            WorkflowState::Diagnosed,
            WorkflowState::StyleSelected,
            WorkflowState::ImageGenerated,
        ]
    }

    fn after_selection_change(&mut self, changed: bool) {
        if changed && self.session.state == WorkflowState::ImageGenerated {
            self.session.clear_generated();
        }
        if self.session.generated_image.is_none() {
            self.session.state = if self.session.selection.complete().is_some() {
                WorkflowState::StyleSelected
            } else {
                WorkflowState::Diagnosed
            };
        }
    }

    pub fn select_hairstyle(&mut self, key: &str) -> Result<(), WorkflowError> {
        let step = WorkflowStep::SelectStyle;
        self.require_state(step, &Self::selection_states())?;
        let style = StyleKey::parse(key).ok_or_else(|| {
            WorkflowError::precondition(step, format!("unknown hairstyle option '{}'", key.trim()))
        })?;

        let changed = self.session.selection.style != Some(style);
        self.session.selection.style = Some(style);
        self.after_selection_change(changed);
        Ok(())
    }

    pub fn select_haircolor(&mut self, key: &str) -> Result<(), WorkflowError> {
        let step = WorkflowStep::SelectStyle;
        self.require_state(step, &Self::selection_states())?;
        let color = ColorKey::parse(key).ok_or_else(|| {
            WorkflowError::precondition(step, format!("unknown haircolor option '{}'", key.trim()))
        })?;

        let changed = self.session.selection.color != Some(color);
        self.session.selection.color = Some(color);
        self.after_selection_change(changed);
        Ok(())
    }

    async fn run_generation(
        &self,
        customization: Option<&str>,
    ) -> Result<(GeneratedImage, ColorKey), WorkflowError> {
        let step = WorkflowStep::GenerateImage;
        let (style, color) = self.session.selection.complete().ok_or_else(|| {
            WorkflowError::precondition(
                step,
                "select both a hairstyle and a haircolor before generating an image",
            )
        })?;
        let diagnosis = self.require_diagnosis(step)?;
        let front = self
            .session
            .attachment(AttachmentSlot::FrontPhoto)
            .ok_or_else(|| WorkflowError::precondition(step, "front photo is not available"))?;
        let inspiration = self.session.attachment(AttachmentSlot::InspirationPhoto);

        let prompt = build_image_generation_prompt(ImagePromptInput {
            hairstyle: diagnosis.proposal.hairstyle(style),
            haircolor: diagnosis.proposal.haircolor(color),
            current_level: &diagnosis.analysis.hair_condition.current_level,
            customization,
            has_inspiration: inspiration.is_some(),
        });
        let mut request = request_from_prompt(prompt, ResponseFormat::Image);
        request.push_attachment(front.clone());
        if let Some(inspiration) = inspiration {
            request.push_attachment(inspiration.clone());
        }

        let response = self
            .backend
            .generate(&self.models.image_model, &request)
            .await
            .map_err(|err| WorkflowError::new(step, err))?;
        let image = extract_image(&response).map_err(|err| WorkflowError::new(step, err))?;
        Ok((image, color))
    }

    pub async fn generate_image(
        &mut self,
        customization: Option<&str>,
    ) -> Result<&GeneratedImage, WorkflowError> {
        let step = WorkflowStep::GenerateImage;
        if self.session.state == WorkflowState::Diagnosed {
            return Err(WorkflowError::precondition(
                step,
                "select both a hairstyle and a haircolor before generating an image",
            ));
        }
        self.require_state(step, &[WorkflowState::StyleSelected, WorkflowState::ImageGenerated])?;

        let timer = StepTimer::start(step.as_str(), &self.session.session_id);
        let result = self.run_generation(customization).await;
        timer.finish(&result);

        let (image, color) = result?;
        self.session.generated_color = Some(color);
        self.session.refinements = 0;
        self.session.state = WorkflowState::ImageGenerated;
        Ok(self.session.generated_image.insert(image))
    }

    async fn run_refinement(
        &self,
        step: WorkflowStep,
        instruction: &str,
    ) -> Result<GeneratedImage, WorkflowError> {
        let base = self
            .session
            .generated_image
            .as_ref()
            .ok_or_else(|| WorkflowError::precondition(step, "no generated image to refine"))?;

        let prompt = build_refinement_prompt(instruction);
        let mut request = request_from_prompt(prompt, ResponseFormat::Image);
        request.push_attachment(base.as_attachment());

        let response = self
            .backend
            .generate(&self.models.image_model, &request)
            .await
            .map_err(|err| WorkflowError::new(step, err))?;
        extract_image(&response).map_err(|err| WorkflowError::new(step, err))
    }

    pub async fn refine_image(&mut self, instruction: &str) -> Result<&GeneratedImage, WorkflowError> {
        let step = WorkflowStep::RefineImage;
        self.require_state(step, &[WorkflowState::ImageGenerated])?;
        if instruction.trim().is_empty() {
            return Err(WorkflowError::precondition(step, "refinement instruction is empty"));
        }

        let timer = StepTimer::start(step.as_str(), &self.session.session_id);
        let result = self.run_refinement(step, instruction).await;
        timer.finish(&result);

        let image = result?;
        self.session.refinements += 1;
        Ok(self.session.generated_image.insert(image))
    }

    pub async fn switch_variant(&mut self) -> Result<&GeneratedImage, WorkflowError> {
        let step = WorkflowStep::SwitchVariant;
        self.require_state(step, &[WorkflowState::ImageGenerated])?;
        let current = self
            .session
            .generated_color
            .ok_or_else(|| WorkflowError::precondition(step, "current hair color is unknown"))?;
        let target = current.other();
        let instruction = variant_switch_instruction(self.require_diagnosis(step)?.proposal.haircolor(target));

        let timer = StepTimer::start(step.as_str(), &self.session.session_id);
        let result = self.run_refinement(step, &instruction).await;
        timer.finish(&result);

        let image = result?;
        info!(
            "Session {} switched hair color {} -> {}",
            self.session.session_id,
            current.as_str(),
            target.as_str()
        );
        self.session.generated_color = Some(target);
        self.session.selection.color = Some(target);
        self.session.refinements += 1;
        Ok(self.session.generated_image.insert(image))
    }
}
