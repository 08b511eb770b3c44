use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Context retrieval (Vertex AI Search)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "d_location")]
    pub location: String,
    #[serde(default = "d_collection")]
    pub collection: String,
    /// Data store id, or engine id when `target = "engines"`.
    #[serde(default)]
    pub engine_id: Option<String>,
    #[serde(default = "d_serving_config")]
    pub serving_config: String,
    #[serde(default)]
    pub target: SearchTarget,
    #[serde(default = "d_api_base")]
    pub api_base: String,
    #[serde(default = "d_page_size")]
    pub page_size: u32,
    #[serde(default = "d_max_passages")]
    pub max_passages: usize,
    #[serde(default = "d_max_context_chars")]
    pub max_context_chars: usize,
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "d_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub credentials: GoogleCredentialsConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            location: d_location(),
            collection: d_collection(),
            engine_id: None,
            serving_config: d_serving_config(),
            target: SearchTarget::default(),
            api_base: d_api_base(),
            page_size: d_page_size(),
            max_passages: d_max_passages(),
            max_context_chars: d_max_context_chars(),
            timeout_ms: d_timeout_ms(),
            max_retries: d_max_retries(),
            credentials: GoogleCredentialsConfig::default(),
        }
    }
}

impl SearchConfig {
    /// Retrieval is active only when the index is fully identified.
    pub fn enabled(&self) -> bool {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        set(&self.project_id) && set(&self.engine_id)
    }
}

/// Which resource path the serving config hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchTarget {
    #[default]
    DataStores,
    Engines,
}

impl SearchTarget {
    pub fn path_segment(self) -> &'static str {
        match self {
            SearchTarget::DataStores => "dataStores",
            SearchTarget::Engines => "engines",
        }
    }
}

/// Where Google credentials come from. The first populated source wins:
/// static token env, inline JSON, then a key file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GoogleCredentialsConfig {
    /// Service-account or authorized-user JSON, inline.
    #[serde(default, skip_serializing)]
    pub json: Option<String>,
    /// Path to a credentials JSON file.
    #[serde(default)]
    pub file: Option<String>,
    /// Env var holding a ready-made OAuth access token.
    #[serde(default)]
    pub access_token_env: Option<String>,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_location() -> String {
    "global".into()
}
fn d_collection() -> String {
    "default_collection".into()
}
fn d_serving_config() -> String {
    "default_search".into()
}
fn d_api_base() -> String {
    "https://discoveryengine.googleapis.com/v1alpha".into()
}
fn d_page_size() -> u32 {
    5
}
fn d_max_passages() -> usize {
    3
}
fn d_max_context_chars() -> usize {
    6_000
}
fn d_timeout_ms() -> u64 {
    8_000
}
fn d_max_retries() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_without_ids() {
        let cfg = SearchConfig::default();
        assert!(!cfg.enabled());
        assert_eq!(cfg.page_size, 5);
        assert_eq!(cfg.max_passages, 3);
    }

    #[test]
    fn enabled_with_project_and_engine() {
        let toml_str = r#"
            project_id = "lex-123"
            engine_id = "manuales"
            target = "engines"
        "#;
        let cfg: SearchConfig = toml::from_str(toml_str).unwrap();
        assert!(cfg.enabled());
        assert_eq!(cfg.target.path_segment(), "engines");
    }

    #[test]
    fn blank_engine_id_is_disabled() {
        let cfg = SearchConfig {
            project_id: Some("p".into()),
            engine_id: Some("  ".into()),
            ..SearchConfig::default()
        };
        assert!(!cfg.enabled());
    }
}
