pub mod extract;
pub mod gemini;
pub mod media;
pub mod retry;
pub mod schema;
pub mod types;

pub use extract::{extract_image, extract_structured};
pub use gemini::{GeminiClient, GenerativeBackend};
pub use media::AttachmentFetcher;
pub use retry::{Backoff, RetryPolicy};
pub use types::{Attachment, GeneratedImage, MultiModalRequest, Part, ResponseFormat};
