//! Passage extraction and context-block formatting.
//!
//! [`ContextRetriever`] is the only entry point the chat turn uses. It
//! never fails: any backend error degrades to an empty block and is
//! reported through logs and a `ContextRetrieved` trace event.

use std::sync::Arc;

use lt_domain::error::{Error, Result};
use lt_domain::trace::TraceEvent;
use regex::Regex;
use serde_json::Value;

use crate::provider::DocumentSearch;
use crate::types::{Passage, SearchResponse};

pub const UNTITLED: &str = "Sin título";
pub const PASSAGE_SEPARATOR: &str = "\n\n---\n\n";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Extraction
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Reduces a raw search response to at most `max_passages` passages.
#[derive(Debug, Clone)]
pub struct PassageExtractor {
    tags: Regex,
    whitespace: Regex,
    max_passages: usize,
}

impl PassageExtractor {
    pub fn new(max_passages: usize) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| Error::Other(format!("bad pattern {pattern}: {e}")))
        };
        Ok(Self {
            tags: compile(r"<[^>]*>")?,
            whitespace: compile(r"[ \t]+")?,
            max_passages,
        })
    }

    /// Results without any snippet text are skipped.
    pub fn extract(&self, resp: &SearchResponse) -> Vec<Passage> {
        resp.results
            .iter()
            .filter_map(|r| r.document.as_ref())
            .filter_map(|doc| {
                let structured = doc.struct_data.as_ref();
                let derived = doc.derived_struct_data.as_ref();

                let snippet = str_at(structured, &["snippet"])
                    .or_else(|| str_at(derived, &["snippets", "0", "snippet"]))
                    .or_else(|| str_at(derived, &["extractiveSegments", "0", "content"]))
                    .map(|s| self.clean(s))
                    .filter(|s| !s.is_empty())?;

                let title = str_at(structured, &["title"])
                    .or_else(|| str_at(derived, &["title"]))
                    .map(|t| self.clean(t))
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| UNTITLED.to_owned());

                let link = str_at(structured, &["link"])
                    .or_else(|| str_at(derived, &["link"]))
                    .map(str::to_owned);

                Some(Passage {
                    title,
                    snippet,
                    link,
                })
            })
            .take(self.max_passages)
            .collect()
    }

    /// Strip markup and decode the handful of entities snippets carry.
    pub fn clean(&self, raw: &str) -> String {
        let text = self.tags.replace_all(raw, "");
        let text = text
            .replace("&nbsp;", " ")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&amp;", "&");
        self.whitespace.replace_all(text.trim(), " ").into_owned()
    }
}

/// Walk `path` through nested objects/arrays; numeric segments index arrays.
fn str_at<'a>(root: Option<&'a Value>, path: &[&str]) -> Option<&'a str> {
    let mut cur = root?;
    for seg in path {
        cur = match seg.parse::<usize>() {
            Ok(i) => cur.get(i)?,
            Err(_) => cur.get(*seg)?,
        };
    }
    cur.as_str().filter(|s| !s.trim().is_empty())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Formatting
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Numbered, titled passages joined by a horizontal rule, capped at
/// `max_chars` characters.
pub fn format_passages(passages: &[Passage], max_chars: usize) -> String {
    let text = passages
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let mut entry = format!("### Documento {}: {}\n{}", i + 1, p.title, p.snippet);
            if let Some(link) = &p.link {
                entry.push_str("\nFuente: ");
                entry.push_str(link);
            }
            entry
        })
        .collect::<Vec<_>>()
        .join(PASSAGE_SEPARATOR);
    truncate_chars(text, max_chars)
}

fn truncate_chars(mut text: String, max_chars: usize) -> String {
    if let Some((idx, _)) = text.char_indices().nth(max_chars) {
        text.truncate(idx);
    }
    text
}

/// Wrap retrieved passages in the delimited instruction block placed after
/// the persona. Empty input yields an empty block.
pub fn context_block(passages_text: &str) -> String {
    if passages_text.trim().is_empty() {
        return String::new();
    }
    format!(
        "DOCUMENTACIÓN AUTORIZADA (búsqueda en manuales)\n\
         ============================================\n\
         {passages_text}\n\
         ============================================\n\
         Toma esta documentación como fuente principal al responder. \
         Cuando cites artículos o preceptos legales, escríbelos en **negrita**."
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Retriever
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Total wrapper around a [`DocumentSearch`] backend.
#[derive(Clone)]
pub struct ContextRetriever {
    backend: Arc<dyn DocumentSearch>,
    max_chars: usize,
}

impl ContextRetriever {
    pub fn new(backend: Arc<dyn DocumentSearch>, max_chars: usize) -> Self {
        Self { backend, max_chars }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_enabled()
    }

    /// Formatted passages for `query` (without the surrounding block).
    ///
    /// Never fails; returns an empty string on error or no results.
    pub async fn passages_text(&self, query: &str) -> String {
        if !self.backend.is_enabled() || query.trim().is_empty() {
            return String::new();
        }

        let (passages, degraded) = match self.backend.search(query).await {
            Ok(p) => (p, false),
            Err(e) => {
                tracing::warn!(error = %e, "context retrieval failed; continuing without context");
                (Vec::new(), true)
            }
        };

        let text = format_passages(&passages, self.max_chars);

        TraceEvent::ContextRetrieved {
            query_chars: query.chars().count(),
            passages: passages.len(),
            context_chars: text.chars().count(),
            degraded,
        }
        .emit();

        text
    }

    /// The full context block for `query`, or `""`.
    pub async fn retrieve(&self, query: &str) -> String {
        context_block(&self.passages_text(query).await)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
