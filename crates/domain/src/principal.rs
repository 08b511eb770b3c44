use serde::{Deserialize, Serialize};

/// The authenticated user behind a request.
///
/// Resolved once per request by the identity adapter and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Opaque identity-provider user id.
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Human-friendly name used to personalise the tutor persona.
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// The display name, if present and not blank.
    pub fn name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}
