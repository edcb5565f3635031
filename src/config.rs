use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::error::ConfigurationError;
use crate::llm::retry::{Backoff, RetryPolicy};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyProfile {
    Standard,
    Permissive,
}

impl SafetyProfile {
    pub fn threshold(self) -> &'static str {
        match self {
            SafetyProfile::Standard => "BLOCK_MEDIUM_AND_ABOVE",
            SafetyProfile::Permissive => "OFF",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub log_dir: PathBuf,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub gemini_diagnosis_model: String,
    pub gemini_image_model: String,
    pub gemini_temperature: f32,
    pub gemini_safety_settings: SafetyProfile,
    pub gemini_max_attempts: usize,
    pub gemini_retry_base_delay_ms: u64,
    pub gemini_request_timeout_seconds: u64,
    pub attachment_fetch_timeout_seconds: u64,
}

fn lookup_string(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn lookup_parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigurationError> {
    match lookup(name).map(|value| value.trim().to_string()) {
        Some(value) if !value.is_empty() => value
            .parse::<T>()
            .map_err(|_| ConfigurationError::Invalid { name, value }),
        _ => Ok(default),
    }
}

fn normalize_gemini_safety_settings(value: &str) -> SafetyProfile {
    let lowered = value.trim().to_lowercase();
    match lowered.as_str() {
        "" | "standard" => SafetyProfile::Standard,
        "permissive" | "off" | "none" => SafetyProfile::Permissive,
        _ => {
            warn!(
                "Unknown GEMINI_SAFETY_SETTINGS value '{}'; defaulting to standard.",
                value
            );
            SafetyProfile::Standard
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigurationError> {
        let gemini_api_key = lookup_string(&lookup, "GEMINI_API_KEY", "");
        if gemini_api_key.is_empty() {
            return Err(ConfigurationError::Missing("GEMINI_API_KEY"));
        }

        let gemini_base_url = lookup_string(&lookup, "GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        if url::Url::parse(&gemini_base_url).is_err() {
            return Err(ConfigurationError::Invalid {
                name: "GEMINI_BASE_URL",
                value: gemini_base_url,
            });
        }

        let gemini_diagnosis_model =
            lookup_string(&lookup, "GEMINI_DIAGNOSIS_MODEL", "gemini-2.5-flash");
        let gemini_image_model = lookup_string(
            &lookup,
            "GEMINI_IMAGE_MODEL",
            "gemini-2.5-flash-image-preview",
        );

        Ok(Config {
            log_level: lookup_string(&lookup, "LOG_LEVEL", "info").to_lowercase(),
            log_dir: PathBuf::from(lookup_string(&lookup, "LOG_DIR", "logs")),
            gemini_api_key,
            gemini_base_url,
            gemini_diagnosis_model,
            gemini_image_model,
            gemini_temperature: lookup_parsed(&lookup, "GEMINI_TEMPERATURE", 0.4_f32)?,
            gemini_safety_settings: normalize_gemini_safety_settings(&lookup_string(
                &lookup,
                "GEMINI_SAFETY_SETTINGS",
                "standard",
            )),
            gemini_max_attempts: lookup_parsed(&lookup, "GEMINI_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?
                .max(1),
            gemini_retry_base_delay_ms: lookup_parsed(&lookup, "GEMINI_RETRY_BASE_DELAY_MS", 900_u64)?,
            gemini_request_timeout_seconds: lookup_parsed(
                &lookup,
                "GEMINI_REQUEST_TIMEOUT_SECONDS",
                120_u64,
            )?,
            attachment_fetch_timeout_seconds: lookup_parsed(
                &lookup,
                "ATTACHMENT_FETCH_TIMEOUT_SECONDS",
                60_u64,
            )?,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.gemini_max_attempts,
            Duration::from_millis(self.gemini_retry_base_delay_ms),
            Backoff::Linear,
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.gemini_request_timeout_seconds.max(1))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.attachment_fetch_timeout_seconds.max(1))
    }
}
