use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Identity provider (Supabase auth)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Project URL, e.g. `https://abcd.supabase.co`.
    #[serde(default)]
    pub url: Option<String>,
    /// Public anon key, sent as the `apikey` header.
    #[serde(default, skip_serializing)]
    pub anon_key: Option<String>,
    /// Session cookie name. Derived from the project ref when unset.
    #[serde(default)]
    pub cookie_name: Option<String>,
    #[serde(default = "d_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
    /// Fixed principal for local development. Only honoured when `url`
    /// is unset.
    #[serde(default)]
    pub dev_principal: Option<DevPrincipal>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            cookie_name: None,
            cache_ttl_secs: d_cache_ttl(),
            timeout_ms: d_timeout_ms(),
            dev_principal: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevPrincipal {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl IdentityConfig {
    /// `sb-<project-ref>-auth-token`, where the ref is the first host label.
    pub fn session_cookie_name(&self) -> Option<String> {
        if let Some(name) = &self.cookie_name {
            return Some(name.clone());
        }
        let url = self.url.as_deref()?;
        let host = url
            .split("://")
            .nth(1)
            .unwrap_or(url)
            .split(['/', ':'])
            .next()?;
        let project_ref = host.split('.').next()?;
        if project_ref.is_empty() {
            return None;
        }
        Some(format!("sb-{project_ref}-auth-token"))
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_cache_ttl() -> u64 {
    60
}
fn d_timeout_ms() -> u64 {
    5_000
}
