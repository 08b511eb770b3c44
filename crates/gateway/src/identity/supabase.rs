//! Supabase Auth adapter.
//!
//! Resolves a session token with `GET {url}/auth/v1/user`. Successful
//! lookups are cached by the SHA-256 of the token so a busy chat session
//! does not hit the auth server on every request.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::HeaderMap;
use lt_domain::config::IdentityConfig;
use lt_domain::error::{Error, Result};
use lt_domain::principal::Principal;
use parking_lot::RwLock;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::cookie;
use super::IdentityProvider;

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Option<serde_json::Value>,
}

impl UserResponse {
    fn into_principal(self) -> Principal {
        let display_name = self.user_metadata.as_ref().and_then(|m| {
            ["full_name", "name"]
                .iter()
                .find_map(|k| m.get(*k).and_then(|v| v.as_str()))
                .map(str::to_owned)
        });
        Principal {
            id: self.id,
            email: self.email,
            display_name,
        }
    }
}

struct CachedPrincipal {
    principal: Principal,
    fetched_at: Instant,
}

pub struct SupabaseIdentity {
    http: reqwest::Client,
    user_url: String,
    anon_key: String,
    cookie_name: Option<String>,
    ttl: Duration,
    cache: RwLock<HashMap<String, CachedPrincipal>>,
}

impl SupabaseIdentity {
    pub fn from_config(url: &str, cfg: &IdentityConfig) -> Result<Self> {
        let anon_key = cfg
            .anon_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("identity.anon_key is required with identity.url".into()))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            http,
            user_url: format!("{}/auth/v1/user", url.trim_end_matches('/')),
            anon_key,
            cookie_name: cfg.session_cookie_name(),
            ttl: Duration::from_secs(cfg.cache_ttl_secs),
            cache: RwLock::new(HashMap::new()),
        })
    }

    pub fn cookie_name(&self) -> Option<&str> {
        self.cookie_name.as_deref()
    }

    fn cache_key(token: &str) -> String {
        hex::encode(Sha256::digest(token.as_bytes()))
    }

    fn cached(&self, key: &str) -> Option<Principal> {
        let cache = self.cache.read();
        let entry = cache.get(key)?;
        (entry.fetched_at.elapsed() < self.ttl).then(|| entry.principal.clone())
    }

    fn remember(&self, key: String, principal: Principal) {
        if self.ttl.is_zero() {
            return;
        }
        let mut cache = self.cache.write();
        cache.retain(|_, e| e.fetched_at.elapsed() < self.ttl);
        cache.insert(
            key,
            CachedPrincipal {
                principal,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Ask the auth server who owns `token`. Any failure resolves to
    /// `None`.
    async fn fetch_user(&self, token: &str) -> Option<Principal> {
        let resp = match self
            .http
            .get(&self.user_url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "identity provider unreachable; treating request as anonymous");
                return None;
            }
        };

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            tracing::debug!(status = status.as_u16(), "session rejected by identity provider");
            return None;
        }
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "identity provider error; treating request as anonymous");
            return None;
        }

        match resp.json::<UserResponse>().await {
            Ok(user) => Some(user.into_principal()),
            Err(e) => {
                tracing::warn!(error = %e, "malformed identity provider response");
                None
            }
        }
    }
}

#[async_trait]
impl IdentityProvider for SupabaseIdentity {
    async fn current_user(&self, headers: &HeaderMap) -> Result<Option<Principal>> {
        // Custom domains do not match the derived cookie name; fall back to
        // any `sb-*-auth-token` cookie.
        let token = cookie::access_token(headers, self.cookie_name.as_deref())
            .or_else(|| cookie::access_token(headers, None));
        let Some(token) = token else {
            return Ok(None);
        };

        let key = Self::cache_key(&token);
        if let Some(p) = self.cached(&key) {
            return Ok(Some(p));
        }

        let principal = self.fetch_user(&token).await;
        if let Some(p) = &principal {
            tracing::debug!(user_id = %p.id, "session resolved");
            self.remember(key, p.clone());
        }
        Ok(principal)
    }

    fn name(&self) -> &'static str {
        "supabase"
    }
}
