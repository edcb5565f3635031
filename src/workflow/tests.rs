use std::time::Duration;

use crate::diagnosis::{AttachmentSlot, ColorKey, StyleKey};
use crate::error::{CoreError, ErrorCategory, WorkflowStep};
use crate::llm::media::AttachmentFetcher;
use crate::llm::types::{Part, ResponseFormat};
use crate::test_support::{
    backend_failure, complete_diagnosis, data_uri, image_response, sample_request, text_response,
    StubBackend,
};
use crate::workflow::{StyleWorkflow, WorkflowModels, WorkflowState};

fn models() -> WorkflowModels {
    WorkflowModels {
        diagnosis_model: "diagnosis-model".to_string(),
        image_model: "image-model".to_string(),
    }
}

fn fetcher() -> AttachmentFetcher {
    AttachmentFetcher::new(Duration::from_secs(5)).unwrap()
}

fn workflow_with(
    request: crate::diagnosis::DiagnosisRequest,
    backend: StubBackend,
) -> StyleWorkflow<StubBackend> {
    StyleWorkflow::new(request, backend, fetcher(), models())
        .unwrap()
        .with_session_id("test-session")
}

fn diagnosis_ok() -> StubBackend {
    StubBackend::with_outcomes([Ok(text_response(&complete_diagnosis().to_string()))])
}

async fn diagnosed_workflow() -> StyleWorkflow<StubBackend> {
    let mut workflow = workflow_with(sample_request(), diagnosis_ok());
    workflow.prepare_attachments().await.unwrap();
    workflow.diagnose().await.unwrap();
    workflow
}

async fn generated_workflow() -> StyleWorkflow<StubBackend> {
    let mut workflow = diagnosed_workflow().await;
    workflow.select_hairstyle("style1").unwrap();
    workflow.select_haircolor("color1").unwrap();
    workflow.backend().push(Ok(image_response(b"generated")));
    workflow.generate_image(None).await.unwrap();
    workflow
}

#[test]
fn rejects_requests_with_missing_required_slots() {
    let mut request = sample_request();
    request.attachment_refs.remove(&AttachmentSlot::BackVideo);
    request
        .attachment_refs
        .insert(AttachmentSlot::SidePhoto, "   ".to_string());

    let err = StyleWorkflow::new(request, StubBackend::default(), fetcher(), models())
        .err()
        .unwrap();
    assert_eq!(err.step, WorkflowStep::PrepareAttachments);
    assert_eq!(err.category(), ErrorCategory::OutOfOrder);
    let message = err.to_string();
    assert!(message.contains("sidePhoto"));
    assert!(message.contains("backVideo"));
}

#[tokio::test]
async fn diagnose_requires_prepared_attachments() {
    let mut workflow = workflow_with(sample_request(), diagnosis_ok());
    let err = workflow.diagnose().await.unwrap_err();
    assert!(matches!(err.cause, CoreError::Precondition(_)));
    assert_eq!(workflow.backend().call_count(), 0);
    assert_eq!(workflow.state(), WorkflowState::Idle);
}

#[tokio::test]
async fn diagnosis_returns_sanitized_result_and_sends_every_attachment() {
    let workflow = diagnosed_workflow().await;
    assert_eq!(workflow.state(), WorkflowState::Diagnosed);

    let diagnosis = workflow.diagnosis().unwrap();
    assert_eq!(diagnosis.analysis.personal_color.characteristics, "Cool & clear");
    assert_eq!(diagnosis.proposal.palette.color3.hex, "#1F2A44");

    let calls = workflow.backend().calls();
    assert_eq!(calls.len(), 1);
    let (model, request) = &calls[0];
    assert_eq!(model, "diagnosis-model");
    assert!(matches!(request.response_format, ResponseFormat::Json(_)));
    assert!(request.system_instruction.is_some());
    assert!(matches!(&request.parts[0], Part::Text(text) if text.contains("Something easy to maintain")));

    let attachments: Vec<_> = request.attachments().collect();
    assert_eq!(attachments.len(), 5);
    assert_eq!(attachments[0].data, b"frontPhoto");
    assert_eq!(attachments[4].mime_type, "video/mp4");
}

#[tokio::test]
async fn incomplete_diagnosis_is_a_validation_error_and_keeps_state() {
    let mut value = complete_diagnosis();
    value["proposal"]["haircolors"]["color2"]
        .as_object_mut()
        .unwrap()
        .remove("recommendedLevel");
    let backend = StubBackend::with_outcomes([Ok(text_response(&value.to_string()))]);
    let mut workflow = workflow_with(sample_request(), backend);
    workflow.prepare_attachments().await.unwrap();

    let err = workflow.diagnose().await.unwrap_err();
    match &err.cause {
        CoreError::Validation(validation) => assert_eq!(
            validation.missing,
            vec!["proposal.haircolors.color2.recommendedLevel"]
        ),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(err.category(), ErrorCategory::InvalidResult);
    assert_eq!(workflow.state(), WorkflowState::AttachmentsReady);
    assert!(workflow.diagnosis().is_none());

    workflow
        .backend()
        .push(Ok(text_response(&complete_diagnosis().to_string())));
    workflow.diagnose().await.unwrap();
    assert_eq!(workflow.state(), WorkflowState::Diagnosed);
}

#[tokio::test]
async fn backend_failure_during_diagnosis_is_reported_as_unavailable() {
    let backend = StubBackend::with_outcomes([Err(backend_failure(503))]);
    let mut workflow = workflow_with(sample_request(), backend);
    workflow.prepare_attachments().await.unwrap();

    let err = workflow.diagnose().await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::BackendUnavailable);
    assert!(!err.is_fatal());
    assert!(workflow.diagnosis().is_none());
}

#[tokio::test]
async fn image_generation_needs_both_selections() {
    let mut workflow = diagnosed_workflow().await;
    workflow.select_hairstyle("style2").unwrap();
    assert_eq!(workflow.state(), WorkflowState::Diagnosed);

    let err = workflow.generate_image(None).await.unwrap_err();
    assert_eq!(err.step, WorkflowStep::GenerateImage);
    assert!(matches!(err.cause, CoreError::Precondition(_)));
    assert_eq!(workflow.backend().call_count(), 1);

    workflow.select_haircolor("color2").unwrap();
    assert_eq!(workflow.state(), WorkflowState::StyleSelected);
    assert_eq!(workflow.session().selection.style, Some(StyleKey::Style2));
}

#[tokio::test]
async fn unknown_option_keys_are_rejected() {
    let mut workflow = diagnosed_workflow().await;
    assert!(workflow.select_hairstyle("style3").is_err());
    assert!(workflow.select_haircolor("blue").is_err());
    assert_eq!(workflow.session().selection.complete(), None);
}

#[tokio::test]
async fn generation_sends_front_photo_and_selected_options() {
    let workflow = generated_workflow().await;
    assert_eq!(workflow.state(), WorkflowState::ImageGenerated);
    assert_eq!(workflow.current_image().unwrap().data, b"generated");
    assert_eq!(workflow.session().generated_color, Some(ColorKey::Color1));

    let calls = workflow.backend().calls();
    let (model, request) = &calls[1];
    assert_eq!(model, "image-model");
    assert_eq!(request.response_format, ResponseFormat::Image);
    let prompt = request.parts[0].clone();
    match prompt {
        Part::Text(text) => {
            assert!(text.contains("Layered bob"));
            assert!(text.contains("Ash beige"));
            assert!(text.contains("Level 6 (Dark blonde)"));
            assert!(text.contains("Level 3 (Dark brown)"));
        }
        other => panic!("expected prompt text first, got {other:?}"),
    }
    let attachments: Vec<_> = request.attachments().collect();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].data, b"frontPhoto");
}

#[tokio::test]
async fn inspiration_photo_is_attached_after_the_front_photo() {
    let mut request = sample_request();
    request.attachment_refs.insert(
        AttachmentSlot::InspirationPhoto,
        data_uri("image/png", b"inspiration"),
    );
    let mut workflow = workflow_with(request, diagnosis_ok());
    workflow.prepare_attachments().await.unwrap();
    workflow.diagnose().await.unwrap();
    workflow.select_hairstyle("style1").unwrap();
    workflow.select_haircolor("color2").unwrap();
    workflow.backend().push(Ok(image_response(b"generated")));
    workflow.generate_image(Some("a little shorter")).await.unwrap();

    let calls = workflow.backend().calls();
    assert_eq!(calls[0].1.attachments().count(), 6);
    let generation = &calls[1].1;
    let attachments: Vec<_> = generation.attachments().collect();
    assert_eq!(attachments.len(), 2);
    assert_eq!(attachments[0].data, b"frontPhoto");
    assert_eq!(attachments[1].data, b"inspiration");
    assert!(matches!(&generation.parts[0], Part::Text(text) if text.contains("a little shorter")));
}

#[tokio::test]
async fn broken_inspiration_photo_is_dropped() {
    let mut request = sample_request();
    request.attachment_refs.insert(
        AttachmentSlot::InspirationPhoto,
        "data:image/png;base64,***".to_string(),
    );
    let mut workflow = workflow_with(request, diagnosis_ok());
    workflow.prepare_attachments().await.unwrap();
    assert!(workflow
        .session()
        .attachment(AttachmentSlot::InspirationPhoto)
        .is_none());

    workflow.diagnose().await.unwrap();
    assert_eq!(workflow.backend().calls()[0].1.attachments().count(), 5);
}

#[tokio::test]
async fn broken_required_attachment_fails_preparation() {
    let mut request = sample_request();
    request
        .attachment_refs
        .insert(AttachmentSlot::FrontVideo, "ftp://example.com/clip.mov".to_string());
    let mut workflow = workflow_with(request, diagnosis_ok());

    let err = workflow.prepare_attachments().await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::AttachmentUnavailable);
    assert_eq!(workflow.state(), WorkflowState::Idle);
    assert!(workflow.session().attachments.is_none());
}

#[tokio::test]
async fn refinements_build_on_the_latest_image() {
    let mut workflow = generated_workflow().await;
    workflow.backend().push(Ok(image_response(b"refined-1")));
    workflow.backend().push(Ok(image_response(b"refined-2")));

    workflow.refine_image("make the bangs shorter").await.unwrap();
    workflow.refine_image("add more volume").await.unwrap();

    assert_eq!(workflow.current_image().unwrap().data, b"refined-2");
    assert_eq!(workflow.session().refinements, 2);
    assert_eq!(workflow.state(), WorkflowState::ImageGenerated);

    let calls = workflow.backend().calls();
    let first: Vec<_> = calls[2].1.attachments().collect();
    let second: Vec<_> = calls[3].1.attachments().collect();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].data, b"generated");
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].data, b"refined-1");
    assert!(matches!(&calls[3].1.parts[0], Part::Text(text) if text.contains("add more volume")));
}

#[tokio::test]
async fn blank_refinement_is_rejected_without_backend_call() {
    let mut workflow = generated_workflow().await;
    let calls_before = workflow.backend().call_count();
    let err = workflow.refine_image("   ").await.unwrap_err();
    assert!(matches!(err.cause, CoreError::Precondition(_)));
    assert_eq!(workflow.backend().call_count(), calls_before);
    assert_eq!(workflow.current_image().unwrap().data, b"generated");
}

#[tokio::test]
async fn failed_refinement_keeps_the_previous_image() {
    let mut workflow = generated_workflow().await;
    workflow.backend().push(Ok(text_response("I cannot edit this photo.")));

    let err = workflow.refine_image("dye it green").await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::UnexpectedResponse);
    assert_eq!(workflow.current_image().unwrap().data, b"generated");
    assert_eq!(workflow.session().refinements, 0);
}

#[tokio::test]
async fn switch_variant_toggles_between_colors() {
    let mut workflow = generated_workflow().await;
    workflow.backend().push(Ok(image_response(b"color2")));

    workflow.switch_variant().await.unwrap();
    assert_eq!(workflow.session().generated_color, Some(ColorKey::Color2));
    assert_eq!(workflow.session().selection.color, Some(ColorKey::Color2));
    assert_eq!(workflow.current_image().unwrap().data, b"color2");

    let calls = workflow.backend().calls();
    let switch = &calls[2].1;
    assert_eq!(switch.attachments().next().unwrap().data, b"generated");
    assert!(matches!(
        &switch.parts[0],
        Part::Text(text) if text.contains("Lavender brown") && text.contains("Level 5 (Light brown)")
    ));

    workflow.backend().push(Ok(image_response(b"color1")));
    workflow.switch_variant().await.unwrap();
    assert_eq!(workflow.session().generated_color, Some(ColorKey::Color1));
}

#[tokio::test]
async fn failed_switch_leaves_color_unchanged() {
    let mut workflow = generated_workflow().await;
    workflow.backend().push(Err(backend_failure(500)));

    let err = workflow.switch_variant().await.unwrap_err();
    assert_eq!(err.step, WorkflowStep::SwitchVariant);
    assert_eq!(err.category(), ErrorCategory::BackendUnavailable);
    assert_eq!(workflow.session().generated_color, Some(ColorKey::Color1));
    assert_eq!(workflow.session().selection.color, Some(ColorKey::Color1));
    assert_eq!(workflow.current_image().unwrap().data, b"generated");
}

#[tokio::test]
async fn changing_the_selection_discards_the_generated_image() {
    let mut workflow = generated_workflow().await;

    workflow.select_haircolor("color1").unwrap();
    assert_eq!(workflow.state(), WorkflowState::ImageGenerated);

    workflow.select_hairstyle("style2").unwrap();
    assert_eq!(workflow.state(), WorkflowState::StyleSelected);
    assert!(workflow.current_image().is_none());

    let err = workflow.refine_image("shorter").await.unwrap_err();
    assert!(matches!(err.cause, CoreError::Precondition(_)));
}

#[tokio::test]
async fn rerunning_diagnosis_clears_the_selection() {
    let mut workflow = diagnosed_workflow().await;
    workflow.select_hairstyle("style1").unwrap();
    workflow.select_haircolor("color1").unwrap();
    workflow
        .backend()
        .push(Ok(text_response(&complete_diagnosis().to_string())));

    workflow.diagnose().await.unwrap();
    assert_eq!(workflow.state(), WorkflowState::Diagnosed);
    assert_eq!(workflow.session().selection.complete(), None);
}
