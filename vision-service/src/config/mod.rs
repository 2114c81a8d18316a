use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Groq exposes an OpenAI-compatible chat completions API under this prefix.
const DEFAULT_COMPLETION_BASE_URL: &str = "https://api.groq.com/openai/v1";

const DEFAULT_VISION_MODEL: &str = "llama-3.2-11b-vision-preview";

const DEFAULT_COMPLETION_TIMEOUT_SECS: u64 = 60;

const DEFAULT_SCRATCH_DIR: &str = "uploads";

/// Default request body limit for uploads (20MB).
const DEFAULT_UPLOAD_MAX_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub common: core_config::Config,
    pub completion: CompletionConfig,
    pub scratch: ScratchConfig,
}

#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub api_key: Secret<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ScratchConfig {
    /// Directory holding uploads while they are being described.
    pub dir: String,
    pub max_upload_bytes: usize,
}

impl CompletionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl VisionConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        Self::from_lookup(common_config, |key| env::var(key).ok())
    }

    /// Build the service configuration from an arbitrary variable source.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let is_prod = lookup("ENVIRONMENT").unwrap_or_else(|| "dev".to_string()) == "prod";

        let api_key = get_env(&lookup, "GROQ_API_KEY", None, is_prod)?;
        if api_key.trim().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "GROQ_API_KEY is set but empty"
            )));
        }

        Ok(VisionConfig {
            common,
            completion: CompletionConfig {
                api_key: Secret::new(api_key),
                base_url: get_env(
                    &lookup,
                    "COMPLETION_API_BASE_URL",
                    Some(DEFAULT_COMPLETION_BASE_URL),
                    is_prod,
                )?
                .trim_end_matches('/')
                .to_string(),
                model: get_env(&lookup, "VISION_MODEL", Some(DEFAULT_VISION_MODEL), is_prod)?,
                timeout_secs: get_parsed(
                    &lookup,
                    "COMPLETION_TIMEOUT_SECS",
                    DEFAULT_COMPLETION_TIMEOUT_SECS,
                    is_prod,
                )?,
            },
            scratch: ScratchConfig {
                dir: get_env(&lookup, "SCRATCH_DIR", Some(DEFAULT_SCRATCH_DIR), is_prod)?,
                max_upload_bytes: get_parsed(
                    &lookup,
                    "UPLOAD_MAX_BYTES",
                    DEFAULT_UPLOAD_MAX_BYTES,
                    is_prod,
                )?,
            },
        })
    }
}

fn get_env<F>(lookup: &F, key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => Ok(val),
        None => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn get_parsed<F, T>(lookup: &F, key: &str, default: T, is_prod: bool) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + ToString,
    T::Err: std::fmt::Display,
{
    get_env(lookup, key, Some(&default.to_string()), is_prod)?
        .trim()
        .parse()
        .map_err(|e: T::Err| {
            AppError::ConfigError(anyhow::anyhow!("{} has an invalid value: {}", key, e))
        })
}
