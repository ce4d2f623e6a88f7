//! Session settings, read from the process environment and an optional `.env` file.
use eyre::{Result, eyre};
use std::path::PathBuf;

use crate::prompting::{CONTINUE_RESPONSE_SUFFIX, SYSTEM_PROMPT};

/// How many recent messages are compiled into each prompt.
pub const DEFAULT_HISTORY_LIMIT: usize = 5;

pub const LOCAL_VAR: &str = "LLAMA_CHAT_LOCAL";
pub const LOCAL_MODEL_PATH_VAR: &str = "LOCAL_MODEL_PATH";
pub const REPLICATE_MODEL_VAR: &str = "REPLICATE_MODEL";
pub const REPLICATE_TOKEN_VAR: &str = "REPLICATE_API_TOKEN";
pub const REPLICATE_API_BASE_VAR: &str = "REPLICATE_API_BASE";
pub const HISTORY_VAR: &str = "LLAMA_CHAT_HISTORY";
pub const SYSTEM_PROMPT_VAR: &str = "LLAMA_CHAT_SYSTEM_PROMPT";

/// Which model backend the session talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    /// llama.cpp in-process; `None` means "discover weights on disk".
    Local { model_path: Option<PathBuf> },
    /// Replicate predictions API; `api_base` points it at a proxy or a test server.
    Remote {
        model: String,
        api_token: String,
        api_base: Option<String>,
    },
}

/// Everything the session needs, passed around explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub system_prompt: String,
    pub continue_suffix: String,
    pub history_limit: usize,
    pub backend: BackendConfig,
}

impl SessionConfig {
    /// Load `.env` (if any) and read the settings from the environment.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenv::dotenv() {
            tracing::debug!(path = %path.display(), "config: loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the settings through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let wants_local = non_empty(LOCAL_VAR)
            .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(false);

        let backend = if wants_local {
            BackendConfig::Local {
                model_path: non_empty(LOCAL_MODEL_PATH_VAR).map(PathBuf::from),
            }
        } else {
            let model = non_empty(REPLICATE_MODEL_VAR).ok_or_else(|| {
                eyre!("{REPLICATE_MODEL_VAR} must be set when running through replicate")
            })?;
            let api_token = non_empty(REPLICATE_TOKEN_VAR).ok_or_else(|| {
                eyre!("{REPLICATE_TOKEN_VAR} must be set when running through replicate")
            })?;
            BackendConfig::Remote {
                model,
                api_token,
                api_base: non_empty(REPLICATE_API_BASE_VAR),
            }
        };

        let history_limit = match non_empty(HISTORY_VAR) {
            None => DEFAULT_HISTORY_LIMIT,
            Some(v) => match v.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(eyre!("{HISTORY_VAR} must be a positive integer, got {v:?}")),
            },
        };

        // The override keeps its inner whitespace; only blank values fall back.
        let system_prompt = lookup(SYSTEM_PROMPT_VAR)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| SYSTEM_PROMPT.to_string());

        Ok(Self {
            system_prompt,
            continue_suffix: CONTINUE_RESPONSE_SUFFIX.to_string(),
            history_limit,
            backend,
        })
    }
}
