use std::env;
use std::path::PathBuf;

use anyhow::Result;
use once_cell::sync::Lazy;
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyProfile {
    /// Send no safety settings and let the service apply its own defaults.
    Default,
    Standard,
    Permissive,
}

impl SafetyProfile {
    pub fn as_str(self) -> &'static str {
        match self {
            SafetyProfile::Default => "default",
            SafetyProfile::Standard => "standard",
            SafetyProfile::Permissive => "permissive",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub log_dir: PathBuf,
    pub gemini_api_key: String,
    pub gemini_image_model: String,
    pub gemini_base_url: String,
    pub gemini_safety_settings: SafetyProfile,
    pub gemini_safety_settings_warning: Option<String>,
    pub http_timeout_seconds: u64,
    pub output_dir: PathBuf,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_first_non_empty(names: &[&str]) -> String {
    names
        .iter()
        .filter_map(|name| env::var(name).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

fn normalize_base_url(value: String) -> String {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return DEFAULT_GEMINI_BASE_URL.to_string();
    }
    trimmed.to_string()
}

fn normalize_model(value: String) -> String {
    let trimmed = value.trim();
    let trimmed = trimmed.strip_prefix("models/").unwrap_or(trimmed);
    if trimmed.is_empty() {
        return DEFAULT_GEMINI_IMAGE_MODEL.to_string();
    }
    trimmed.to_string()
}

// Config loads before the subscriber exists, so the warning is returned for
// the caller to log once logging is up.
fn parse_safety_profile(value: &str) -> (SafetyProfile, Option<String>) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return (SafetyProfile::Default, None);
    }

    match trimmed.to_lowercase().as_str() {
        "default" | "service" => (SafetyProfile::Default, None),
        "standard" => (SafetyProfile::Standard, None),
        "permissive" | "off" | "none" => (SafetyProfile::Permissive, None),
        _ => (
            SafetyProfile::Default,
            Some(format!(
                "Unknown GEMINI_SAFETY_SETTINGS value '{}'; using service defaults.",
                trimmed
            )),
        ),
    }
}

impl Config {
    /// Reads the environment. A missing API key is not an error here; it is
    /// reported when the first generation call is attempted.
    pub fn load() -> Result<Self> {
        let (gemini_safety_settings, gemini_safety_settings_warning) =
            parse_safety_profile(&env_string("GEMINI_SAFETY_SETTINGS", "default"));
        Ok(Config {
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            log_dir: PathBuf::from(env_string("LOG_DIR", "logs")),
            gemini_api_key: env_first_non_empty(&["GEMINI_API_KEY", "API_KEY"]),
            gemini_image_model: normalize_model(env_string(
                "GEMINI_IMAGE_MODEL",
                DEFAULT_GEMINI_IMAGE_MODEL,
            )),
            gemini_base_url: normalize_base_url(env_string(
                "GEMINI_BASE_URL",
                DEFAULT_GEMINI_BASE_URL,
            )),
            gemini_safety_settings,
            gemini_safety_settings_warning,
            http_timeout_seconds: env_u64("HTTP_TIMEOUT_SECONDS", 120).max(1),
            output_dir: PathBuf::from(env_string("OUTPUT_DIR", "generated")),
        })
    }
}
