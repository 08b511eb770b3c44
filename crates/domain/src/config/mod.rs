mod chat;
mod identity;
mod llm;
mod observability;
mod search;
mod server;
mod store;
mod transcription;

pub use chat::*;
pub use identity::*;
pub use llm::*;
pub use observability::*;
pub use search::*;
pub use server::*;
pub use store::*;
pub use transcription::*;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::retry::MAX_RETRIES;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Environment overrides
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl Config {
    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup. Empty values are ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let first = |keys: &[&str]| keys.iter().find_map(|k| get(k));

        if let Some(v) = get("VERTEX_PROJECT_ID") {
            self.search.project_id = Some(v);
        }
        if let Some(v) = get("VERTEX_LOCATION") {
            self.search.location = v;
        }
        if let Some(v) = get("VERTEX_COLLECTION") {
            self.search.collection = v;
        }
        if let Some(v) = get("VERTEX_ENGINE_ID") {
            self.search.engine_id = Some(v);
        }
        if let Some(v) = get("VERTEX_SERVING_CONFIG") {
            self.search.serving_config = v;
        }
        if let Some(v) = get("GOOGLE_APPLICATION_CREDENTIALS_JSON") {
            self.search.credentials.json = Some(v);
        }
        if let Some(v) = get("GOOGLE_APPLICATION_CREDENTIALS") {
            self.search.credentials.file = Some(v);
        }

        if let Some(v) = first(&["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"]) {
            self.identity.url = Some(v);
        }
        if let Some(v) = first(&["SUPABASE_ANON_KEY", "NEXT_PUBLIC_SUPABASE_ANON_KEY"]) {
            self.identity.anon_key = Some(v);
        }
    }

    /// Resolve the API key for the language model from its env var.
    pub fn llm_api_key(&self) -> Option<String> {
        std::env::var(&self.llm.api_key_env)
            .ok()
            .filter(|v| !v.trim().is_empty())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError::error("server.port", "port must be greater than 0"));
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError::error("server.host", "host must not be empty"));
        }
        if self.server.max_concurrent_requests == 0 {
            errors.push(ConfigError::error(
                "server.max_concurrent_requests",
                "must be greater than 0",
            ));
        }
        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError::warning(
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)",
            ));
        }

        if !(0.0..=1.0).contains(&self.observability.sample_rate) {
            errors.push(ConfigError::error(
                "observability.sample_rate",
                "sample_rate must be within 0.0..=1.0",
            ));
        }

        if self.llm.base_url.is_empty() {
            errors.push(ConfigError::error("llm.base_url", "base_url must not be empty"));
        }
        if self.llm.model.is_empty() {
            errors.push(ConfigError::error("llm.model", "model must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            errors.push(ConfigError::error(
                "llm.temperature",
                "temperature must be within 0.0..=2.0",
            ));
        }

        if !self.search.enabled() {
            errors.push(ConfigError::warning(
                "search",
                "project_id/engine_id not set; context retrieval disabled",
            ));
        } else {
            if self.search.page_size == 0 {
                errors.push(ConfigError::error("search.page_size", "must be greater than 0"));
            }
            let creds = &self.search.credentials;
            if creds.json.is_none() && creds.file.is_none() && creds.access_token_env.is_none() {
                errors.push(ConfigError::warning(
                    "search.credentials",
                    "no credentials configured; searches will return no context",
                ));
            }
        }

        match (&self.identity.url, &self.identity.dev_principal) {
            (Some(_), _) if self.identity.anon_key.is_none() => {
                errors.push(ConfigError::error(
                    "identity.anon_key",
                    "anon_key is required when identity.url is set",
                ));
            }
            (Some(_), Some(_)) => {
                errors.push(ConfigError::warning(
                    "identity.dev_principal",
                    "ignored because identity.url is set",
                ));
            }
            (None, Some(_)) => {
                errors.push(ConfigError::warning(
                    "identity.dev_principal",
                    "every request is authenticated as the dev principal",
                ));
            }
            (None, None) => {
                errors.push(ConfigError::warning(
                    "identity.url",
                    "no identity provider configured; all requests will be rejected",
                ));
            }
            _ => {}
        }

        if self.store.backend == StoreBackend::Postgrest
            && self.store.postgrest.url.is_none()
            && self.identity.url.is_none()
        {
            errors.push(ConfigError::error(
                "store.postgrest.url",
                "postgrest backend needs store.postgrest.url or identity.url",
            ));
        }

        if self.chat.max_history_messages == 0 {
            errors.push(ConfigError::warning(
                "chat.max_history_messages",
                "0 disables conversation history in prompts",
            ));
        }

        if self.transcription.enabled && self.transcription.max_upload_bytes == 0 {
            errors.push(ConfigError::error(
                "transcription.max_upload_bytes",
                "must be greater than 0",
            ));
        }

        // Retry knobs are bounded; a reply waits on persist retries.
        for (field, retries) in [
            ("llm.max_retries", self.llm.max_retries),
            ("search.max_retries", self.search.max_retries),
            ("store.postgrest.max_retries", self.store.postgrest.max_retries),
            ("chat.persist_retries", self.chat.persist_retries),
        ] {
            if retries > MAX_RETRIES {
                errors.push(ConfigError::error(
                    field,
                    format!("at most {MAX_RETRIES} retries are allowed"),
                ));
            }
        }

        errors
    }
}
