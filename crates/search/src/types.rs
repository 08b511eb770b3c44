//! Discovery Engine wire DTOs and the extracted [`Passage`].

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    pub page_size: u32,
    pub content_search_spec: ContentSearchSpec,
    pub query_expansion_spec: QueryExpansionSpec,
    pub spell_correction_spec: SpellCorrectionSpec,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, page_size: u32) -> Self {
        Self {
            query: query.into(),
            page_size,
            content_search_spec: ContentSearchSpec {
                snippet_spec: SnippetSpec {
                    max_snippet_count: 3,
                    return_snippet: true,
                },
                extractive_content_spec: ExtractiveContentSpec {
                    max_extractive_segment_count: 3,
                    max_extractive_answer_count: 1,
                },
            },
            query_expansion_spec: QueryExpansionSpec {
                condition: "AUTO".into(),
            },
            spell_correction_spec: SpellCorrectionSpec {
                mode: "AUTO".into(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSearchSpec {
    pub snippet_spec: SnippetSpec,
    pub extractive_content_spec: ExtractiveContentSpec,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetSpec {
    pub max_snippet_count: u32,
    pub return_snippet: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractiveContentSpec {
    pub max_extractive_segment_count: u32,
    pub max_extractive_answer_count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryExpansionSpec {
    pub condition: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpellCorrectionSpec {
    pub mode: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Only the fields passage extraction reads. Everything else is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub document: Option<Document>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub struct_data: Option<serde_json::Value>,
    #[serde(default)]
    pub derived_struct_data: Option<serde_json::Value>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Extracted passage
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A titled snippet ready for the context block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Passage {
    pub title: String,
    pub snippet: String,
    pub link: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_discovery_engine_field_names() {
        let v = serde_json::to_value(SearchRequest::new("dolo", 5)).unwrap();
        assert_eq!(v["query"], "dolo");
        assert_eq!(v["pageSize"], 5);
        assert_eq!(v["contentSearchSpec"]["snippetSpec"]["maxSnippetCount"], 3);
        assert_eq!(v["contentSearchSpec"]["snippetSpec"]["returnSnippet"], true);
        assert_eq!(
            v["contentSearchSpec"]["extractiveContentSpec"]["maxExtractiveAnswerCount"],
            1
        );
        assert_eq!(v["queryExpansionSpec"]["condition"], "AUTO");
        assert_eq!(v["spellCorrectionSpec"]["mode"], "AUTO");
    }

    #[test]
    fn response_tolerates_missing_fields() {
        let resp: SearchResponse = serde_json::from_str(r#"{"results":[{}],"totalSize":1}"#).unwrap();
        assert_eq!(resp.results.len(), 1);
        assert!(resp.results[0].document.is_none());

        let empty: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.results.is_empty());
    }
}
