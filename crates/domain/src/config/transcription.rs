use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Speech-to-text
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    #[serde(default = "d_base_url")]
    pub base_url: String,
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_model")]
    pub model: String,
    #[serde(default = "d_language")]
    pub language: String,
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
    /// Shorter recognitions (in characters) are discarded.
    #[serde(default = "d_min_chars")]
    pub min_chars: usize,
    /// Case-insensitive substrings that mark a hallucinated transcript.
    #[serde(default = "default_denylist")]
    pub denylist: Vec<String>,
    #[serde(default = "d_max_upload")]
    pub max_upload_bytes: usize,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: d_base_url(),
            api_key_env: d_api_key_env(),
            model: d_model(),
            language: d_language(),
            timeout_ms: d_timeout_ms(),
            min_chars: d_min_chars(),
            denylist: default_denylist(),
            max_upload_bytes: d_max_upload(),
        }
    }
}

/// Phrases speech models emit on silence or noise.
pub fn default_denylist() -> Vec<String> {
    [
        "Amara.org",
        "Subtítulos",
        "transcribed by",
        "Copyright",
        "instrucciones",
        "suscríbete",
        "plara",
        "aleja",
        "silencio",
        "¡Gracias por ver el vídeo!",
        "¡Gracias!",
        "¡Adios!",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

// ── serde default helpers ───────────────────────────────────────────

fn d_true() -> bool {
    true
}
fn d_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn d_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn d_model() -> String {
    "gpt-4o-mini-transcribe".into()
}
fn d_language() -> String {
    "es".into()
}
fn d_timeout_ms() -> u64 {
    30_000
}
fn d_min_chars() -> usize {
    2
}
fn d_max_upload() -> usize {
    25 * 1024 * 1024
}
