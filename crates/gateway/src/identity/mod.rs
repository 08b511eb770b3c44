//! Identity provider adapter.
//!
//! Resolves the authenticated [`Principal`] behind a request from its
//! headers. The gateway never validates credentials itself: it hands the
//! session token to the identity provider and trusts the answer.

pub mod cookie;
pub mod supabase;

pub use supabase::SupabaseIdentity;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use lt_domain::config::IdentityConfig;
use lt_domain::error::Result;
use lt_domain::principal::Principal;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The principal for this request, or `None` when it carries no valid
    /// session.
    async fn current_user(&self, headers: &HeaderMap) -> Result<Option<Principal>>;

    fn name(&self) -> &'static str;
}

/// Everyone is the same configured principal. Development only.
pub struct StaticIdentity {
    principal: Principal,
}

impl StaticIdentity {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_user(&self, _headers: &HeaderMap) -> Result<Option<Principal>> {
        Ok(Some(self.principal.clone()))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// No identity provider configured: every request is anonymous.
pub struct DenyAll;

#[async_trait]
impl IdentityProvider for DenyAll {
    async fn current_user(&self, _headers: &HeaderMap) -> Result<Option<Principal>> {
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "deny_all"
    }
}

/// Build the identity adapter for `cfg`.
///
/// A configured URL always wins; the dev principal only applies when no
/// identity provider is configured.
pub fn create_identity(cfg: &IdentityConfig) -> Result<Arc<dyn IdentityProvider>> {
    if let Some(url) = cfg.url.as_deref().filter(|u| !u.trim().is_empty()) {
        let identity = SupabaseIdentity::from_config(url, cfg)?;
        tracing::info!(url = %url, cookie = %identity.cookie_name().unwrap_or("sb-*-auth-token"), "supabase identity ready");
        return Ok(Arc::new(identity));
    }
    if let Some(dev) = &cfg.dev_principal {
        tracing::warn!(user_id = %dev.id, "no identity provider; every request runs as the dev principal");
        let mut principal = Principal::new(dev.id.clone());
        principal.display_name = dev.display_name.clone();
        return Ok(Arc::new(StaticIdentity::new(principal)));
    }
    tracing::warn!("no identity provider configured; all protected routes will answer 401");
    Ok(Arc::new(DenyAll))
}
