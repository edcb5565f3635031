use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid attachment reference '{0}'")]
    InvalidReference(String),
    #[error("attachment request for {url} failed with status {status}")]
    Status { url: String, status: u16 },
    #[error("attachment request for {url} timed out")]
    Timeout { url: String },
    #[error("attachment request for {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("embedded attachment could not be decoded: {0}")]
    Decode(String),
    #[error("attachment {0} is empty")]
    Empty(String),
    #[error("required attachment {0} was not provided")]
    MissingSlot(&'static str),
    #[error("attachment {slot}: {source}")]
    InSlot {
        slot: &'static str,
        #[source]
        source: Box<FetchError>,
    },
}

#[derive(Debug, Clone, Error)]
#[error("backend call failed after {attempts} attempt(s){}: {body}", status_suffix(.status))]
pub struct BackendError {
    pub attempts: usize,
    pub status: Option<u16>,
    pub body: String,
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|code| format!(" with status {code}"))
        .unwrap_or_default()
}

#[derive(Debug, Clone, Error)]
#[error("response did not contain the expected payload: {0}")]
pub struct ExtractionError(pub String);

#[derive(Debug, Clone, Error)]
#[error("payload could not be parsed: {0}")]
pub struct MalformedPayloadError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("payload is missing required field(s): {}", .missing.join(", "))]
pub struct ValidationError {
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Error)]
pub enum ConfigurationError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
    #[error("HTTP client could not be built: {0}")]
    HttpClient(String),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    MalformedPayload(#[from] MalformedPayloadError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("precondition failed: {0}")]
    Precondition(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    AttachmentUnavailable,
    BackendUnavailable,
    UnexpectedResponse,
    InvalidResult,
    Configuration,
    OutOfOrder,
}

impl ErrorCategory {
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorCategory::AttachmentUnavailable => {
                "One of the photos or videos could not be loaded. Please check the uploads and try again."
            }
            ErrorCategory::BackendUnavailable => {
                "The AI service is not responding right now. Please try again in a moment."
            }
            ErrorCategory::UnexpectedResponse => {
                "The AI service returned an unexpected response. Please try again."
            }
            ErrorCategory::InvalidResult => {
                "The diagnosis came back incomplete. Please run this step again."
            }
            ErrorCategory::Configuration => {
                "The service is not configured correctly. Please contact the administrator."
            }
            ErrorCategory::OutOfOrder => "Please complete the previous step first.",
        }
    }
}

impl CoreError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CoreError::Fetch(_) => ErrorCategory::AttachmentUnavailable,
            CoreError::Backend(_) => ErrorCategory::BackendUnavailable,
            CoreError::Extraction(_) | CoreError::MalformedPayload(_) => {
                ErrorCategory::UnexpectedResponse
            }
            CoreError::Validation(_) => ErrorCategory::InvalidResult,
            CoreError::Configuration(_) => ErrorCategory::Configuration,
            CoreError::Precondition(_) => ErrorCategory::OutOfOrder,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStep {
    PrepareAttachments,
    Diagnose,
    SelectStyle,
    GenerateImage,
    RefineImage,
    SwitchVariant,
}

impl WorkflowStep {
    pub const fn as_str(self) -> &'static str {
        match self {
            WorkflowStep::PrepareAttachments => "prepare_attachments",
            WorkflowStep::Diagnose => "diagnose",
            WorkflowStep::SelectStyle => "select_style",
            WorkflowStep::GenerateImage => "generate_image",
            WorkflowStep::RefineImage => "refine_image",
            WorkflowStep::SwitchVariant => "switch_variant",
        }
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("step {step} failed: {cause}")]
pub struct WorkflowError {
    pub step: WorkflowStep,
    #[source]
    pub cause: CoreError,
}

impl WorkflowError {
    pub fn new(step: WorkflowStep, cause: impl Into<CoreError>) -> Self {
        Self {
            step,
            cause: cause.into(),
        }
    }

    pub fn precondition(step: WorkflowStep, message: impl Into<String>) -> Self {
        Self {
            step,
            cause: CoreError::Precondition(message.into()),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.cause.category()
    }

    pub fn user_message(&self) -> &'static str {
        self.category().user_message()
    }

    /// Only configuration problems should end the whole session.
    pub fn is_fatal(&self) -> bool {
        matches!(self.cause, CoreError::Configuration(_))
    }
}
