use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chat turns
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Placeholder replaced by the student's name in `persona_template`.
pub const STUDENT_PLACEHOLDER: &str = "{student}";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Tutor persona. `{student}` is substituted with the student name.
    /// The built-in persona is used when unset.
    #[serde(default)]
    pub persona_template: Option<String>,
    #[serde(default = "d_student")]
    pub default_student_name: String,
    /// Most recent prior messages kept in the prompt.
    #[serde(default = "d_max_history")]
    pub max_history_messages: usize,
    /// Keep what was generated before the client went away.
    #[serde(default = "d_true")]
    pub persist_partial_on_disconnect: bool,
    /// Extra attempts for the assistant-turn append.
    #[serde(default = "d_persist_retries")]
    pub persist_retries: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            persona_template: None,
            default_student_name: d_student(),
            max_history_messages: d_max_history(),
            persist_partial_on_disconnect: true,
            persist_retries: d_persist_retries(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_student() -> String {
    "estudiante".into()
}
fn d_max_history() -> usize {
    20
}
fn d_true() -> bool {
    true
}
fn d_persist_retries() -> u32 {
    2
}
