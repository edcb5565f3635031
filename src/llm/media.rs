use std::collections::BTreeMap;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use futures::future::join_all;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::diagnosis::AttachmentSlot;
use crate::error::{ConfigurationError, FetchError};
use crate::llm::types::Attachment;
use crate::utils::http::build_http_client;

pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";
pub const DEFAULT_VIDEO_MIME: &str = "video/quicktime";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn label(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    pub fn default_mime(self) -> &'static str {
        match self {
            MediaKind::Image => DEFAULT_IMAGE_MIME,
            MediaKind::Video => DEFAULT_VIDEO_MIME,
        }
    }

    fn accepts(self, mime_type: &str) -> bool {
        mime_type.starts_with(&format!("{}/", self.label()))
    }
}

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
            if brand == b"qt  " {
                return Some("video/quicktime".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

pub fn mime_from_extension(path: &str) -> Option<&'static str> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let (_, extension) = file_name.rsplit_once('.')?;
    let mime = match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "gif" => "image/gif",
        "mov" | "qt" => "video/quicktime",
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "3gp" => "video/3gpp",
        "avi" => "video/x-msvideo",
        _ => return None,
    };
    Some(mime)
}

fn reliable_content_type(header: Option<&str>, kind: MediaKind) -> Option<String> {
    let essence = header?
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if essence.is_empty()
        || essence == "application/octet-stream"
        || essence == "binary/octet-stream"
        || !kind.accepts(&essence)
    {
        return None;
    }
    Some(essence)
}

pub fn resolve_remote_mime(
    content_type: Option<&str>,
    bytes: &[u8],
    path: &str,
    kind: MediaKind,
) -> String {
    if let Some(mime) = reliable_content_type(content_type, kind) {
        return mime;
    }
    if let Some(mime) = detect_mime_type(bytes).filter(|mime| kind.accepts(mime)) {
        return mime;
    }
    if let Some(mime) = mime_from_extension(path).filter(|mime| kind.accepts(mime)) {
        return mime.to_string();
    }
    kind.default_mime().to_string()
}

pub fn parse_data_uri(reference: &str, kind: MediaKind) -> Result<Attachment, FetchError> {
    let body = reference
        .strip_prefix("data:")
        .ok_or_else(|| FetchError::InvalidReference(truncate_reference(reference)))?;
    let (header, payload) = body
        .split_once(',')
        .ok_or_else(|| FetchError::Decode("missing ',' separator".to_string()))?;
    let mut segments = header.split(';');
    let mime_type = segments.next().unwrap_or_default().trim().to_ascii_lowercase();
    if !segments.any(|segment| segment.trim().eq_ignore_ascii_case("base64")) {
        return Err(FetchError::Decode(
            "only base64 data URIs are supported".to_string(),
        ));
    }
    let data = general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|err| FetchError::Decode(err.to_string()))?;
    if data.is_empty() {
        return Err(FetchError::Empty("embedded attachment".to_string()));
    }
    let mime_type = if mime_type.is_empty() {
        kind.default_mime().to_string()
    } else {
        mime_type
    };
    Ok(Attachment::new(mime_type, data))
}

fn truncate_reference(reference: &str) -> String {
    if reference.chars().count() <= 80 {
        return reference.to_string();
    }
    let truncated: String = reference.chars().take(80).collect();
    format!("{truncated}...")
}

#[derive(Debug, Clone)]
pub struct AttachmentFetcher {
    client: Client,
    timeout: Duration,
}

impl AttachmentFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ConfigurationError> {
        Ok(Self::with_client(build_http_client(timeout)?, timeout))
    }

    pub fn with_client(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub async fn fetch(&self, reference: &str, kind: MediaKind) -> Result<Attachment, FetchError> {
        let reference = reference.trim();
        if reference.starts_with("data:") {
            return parse_data_uri(reference, kind);
        }

        let url = Url::parse(reference)
            .map_err(|_| FetchError::InvalidReference(truncate_reference(reference)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidReference(truncate_reference(reference)));
        }
        let display_url = format!(
            "{}://{}{}",
            url.scheme(),
            url.host_str().unwrap_or_default(),
            url.path()
        );

        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| transport_error(&display_url, err))?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                "Attachment download failed for {} with status {}",
                display_url, status
            );
            return Err(FetchError::Status {
                url: display_url,
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        let bytes = response
            .bytes()
            .await
            .map_err(|err| transport_error(&display_url, err))?;
        if bytes.is_empty() {
            return Err(FetchError::Empty(display_url));
        }

        let mime_type = resolve_remote_mime(content_type.as_deref(), &bytes, url.path(), kind);
        debug!(
            "Fetched {} attachment {} ({} bytes, mime={})",
            kind.label(),
            display_url,
            bytes.len(),
            mime_type
        );
        Ok(Attachment::new(mime_type, bytes.to_vec()))
    }

    /// Fetches every slot concurrently. Any failing required slot fails the
    /// whole batch; a failing optional slot is dropped.
    pub async fn fetch_all(
        &self,
        refs: &BTreeMap<AttachmentSlot, String>,
    ) -> Result<BTreeMap<AttachmentSlot, Attachment>, FetchError> {
        let pending = refs.iter().map(|(slot, reference)| async move {
            (*slot, self.fetch(reference, slot.kind()).await)
        });
        let results = join_all(pending).await;

        let mut resolved = BTreeMap::new();
        for (slot, result) in results {
            match result {
                Ok(attachment) => {
                    resolved.insert(slot, attachment);
                }
                Err(err) if slot.is_required() => {
                    return Err(FetchError::InSlot {
                        slot: slot.key(),
                        source: Box::new(err),
                    });
                }
                Err(err) => {
                    warn!("Skipping optional attachment {}: {}", slot.key(), err);
                }
            }
        }

        if let Some(slot) = AttachmentSlot::REQUIRED
            .iter()
            .find(|slot| !resolved.contains_key(*slot))
        {
            return Err(FetchError::MissingSlot(slot.key()));
        }

        Ok(resolved)
    }
}

fn transport_error(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}
