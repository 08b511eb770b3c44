//! Post-processing for speech-to-text output.
//!
//! Recognisers invent text on silent or noisy input (subtitle credits,
//! sign-offs, "silencio"). A [`TranscriptFilter`] decides whether the
//! recognised text is kept; rejected text becomes `""` so the client
//! sends nothing.

use lt_domain::config::TranscriptionConfig;
use lt_domain::trace::TraceEvent;

pub trait TranscriptFilter: Send + Sync {
    /// The text to hand back to the client, or `""` when rejected.
    fn filter(&self, raw: &str) -> String;
}

/// Rejects short text and anything containing a known artifact phrase,
/// case-insensitively.
#[derive(Debug, Clone)]
pub struct DenylistFilter {
    min_chars: usize,
    /// Lowercased phrases.
    denylist: Vec<String>,
}

impl DenylistFilter {
    pub fn new(min_chars: usize, phrases: &[String]) -> Self {
        Self {
            min_chars,
            denylist: phrases
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn from_config(cfg: &TranscriptionConfig) -> Self {
        Self::new(cfg.min_chars, &cfg.denylist)
    }

    fn rejection(&self, text: &str) -> Option<&'static str> {
        if text.chars().count() < self.min_chars {
            return Some("too_short");
        }
        let lower = text.to_lowercase();
        self.denylist
            .iter()
            .any(|p| lower.contains(p.as_str()))
            .then_some("denylist")
    }
}

impl TranscriptFilter for DenylistFilter {
    fn filter(&self, raw: &str) -> String {
        let text = raw.trim();
        match self.rejection(text) {
            Some(reason) => {
                tracing::info!(text = %text, reason, "transcription discarded");
                TraceEvent::TranscriptionFiltered {
                    raw_chars: text.chars().count(),
                    reason: reason.into(),
                }
                .emit();
                String::new()
            }
            None => text.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lt_domain::config::default_denylist;

    fn filter() -> DenylistFilter {
        DenylistFilter::new(2, &default_denylist())
    }

    #[test]
    fn denylisted_phrases_are_dropped_case_insensitively() {
        let f = filter();
        assert_eq!(f.filter("Subtítulos realizados por la comunidad de Amara.org"), "");
        assert_eq!(f.filter("¡GRACIAS!"), "");
        assert_eq!(f.filter("  silencio  "), "");
        assert_eq!(f.filter("Transcribed by ESO"), "");
    }

    #[test]
    fn short_text_is_dropped_by_chars_not_bytes() {
        let f = filter();
        assert_eq!(f.filter(""), "");
        assert_eq!(f.filter("a"), "");
        // One char, two bytes.
        assert_eq!(f.filter("é"), "");
        assert_eq!(f.filter("sí"), "sí");
    }

    #[test]
    fn ordinary_speech_passes_trimmed() {
        let f = filter();
        assert_eq!(
            f.filter("  ¿Qué diferencia hay entre dolo y culpa?\n"),
            "¿Qué diferencia hay entre dolo y culpa?"
        );
    }

    #[test]
    fn custom_denylist() {
        let f = DenylistFilter::new(2, &["  ".into(), "Música".into()]);
        assert_eq!(f.filter("[MÚSICA DE FONDO]"), "");
        assert_eq!(f.filter("hola"), "hola");
    }
}
