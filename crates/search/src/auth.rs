//! Google OAuth access tokens for the Discovery Engine API.
//!
//! Three credential shapes are accepted:
//!
//! - a ready-made access token read from an env var,
//! - a `service_account` key (signed RS256 JWT exchanged at the token URI),
//! - an `authorized_user` file as written by `gcloud auth application-default login`
//!   (refresh-token grant).
//!
//! Exchanged tokens are cached until shortly before they expire.

use std::time::Duration;

use chrono::{DateTime, Utc};
use lt_domain::config::GoogleCredentialsConfig;
use lt_domain::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Refresh this long before the reported expiry.
const EXPIRY_SKEW_SECS: i64 = 60;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Credential files
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CredentialFile {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUserKey),
}

#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default)]
    private_key_id: Option<String>,
    #[serde(default = "d_token_uri")]
    token_uri: String,
}

#[derive(Debug, Clone, Deserialize)]
struct AuthorizedUserKey {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    #[serde(default = "d_token_uri")]
    token_uri: String,
}

fn d_token_uri() -> String {
    DEFAULT_TOKEN_URI.into()
}

#[derive(Debug, Clone)]
enum Credential {
    Fixed(String),
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUserKey),
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "d_expires_in")]
    expires_in: i64,
}

fn d_expires_in() -> i64 {
    3600
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Token source
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct GoogleTokenSource {
    credential: Credential,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for GoogleTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.credential {
            Credential::Fixed(_) => "fixed",
            Credential::ServiceAccount(_) => "service_account",
            Credential::AuthorizedUser(_) => "authorized_user",
        };
        f.debug_struct("GoogleTokenSource").field("kind", &kind).finish()
    }
}

impl GoogleTokenSource {
    /// Resolve credentials from config. `Ok(None)` when nothing is
    /// configured; `Err` when something is configured but unusable.
    pub fn from_config(cfg: &GoogleCredentialsConfig) -> Result<Option<Self>> {
        if let Some(env) = &cfg.access_token_env {
            if let Some(token) = std::env::var(env).ok().filter(|t| !t.trim().is_empty()) {
                return Ok(Some(Self::fixed(token)));
            }
            tracing::warn!(env = %env, "access token env var is empty; trying key material");
        }
        if let Some(json) = &cfg.json {
            return Self::from_json(json).map(Some);
        }
        if let Some(path) = &cfg.file {
            let json = std::fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("cannot read Google credentials file {path}: {e}"))
            })?;
            return Self::from_json(&json).map(Some);
        }
        Ok(None)
    }

    /// Parse a `service_account` or `authorized_user` JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let parsed: CredentialFile = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid Google credentials JSON: {e}")))?;
        let credential = match parsed {
            CredentialFile::ServiceAccount(k) => Credential::ServiceAccount(k),
            CredentialFile::AuthorizedUser(k) => Credential::AuthorizedUser(k),
        };
        Ok(Self::with_credential(credential))
    }

    /// A source that always hands out `token`.
    pub fn fixed(token: impl Into<String>) -> Self {
        Self::with_credential(Credential::Fixed(token.into()))
    }

    fn with_credential(credential: Credential) -> Self {
        Self {
            credential,
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            cached: Mutex::new(None),
        }
    }

    /// A valid access token, exchanging credentials when the cache is stale.
    ///
    /// Concurrent callers wait on the same refresh.
    pub async fn token(&self) -> Result<String> {
        if let Credential::Fixed(token) = &self.credential {
            return Ok(token.clone());
        }

        let mut cached = self.cached.lock().await;
        if let Some(tok) = cached.as_ref() {
            if Utc::now() < tok.refresh_at {
                return Ok(tok.value.clone());
            }
        }

        let fresh = self.exchange().await?;
        let refresh_at =
            Utc::now() + chrono::Duration::seconds((fresh.expires_in - EXPIRY_SKEW_SECS).max(0));
        tracing::debug!(expires_in = fresh.expires_in, "google access token refreshed");
        *cached = Some(CachedToken {
            value: fresh.access_token.clone(),
            refresh_at,
        });
        Ok(fresh.access_token)
    }

    async fn exchange(&self) -> Result<TokenResponse> {
        let (token_uri, form): (&str, Vec<(&str, String)>) = match &self.credential {
            Credential::Fixed(token) => {
                return Ok(TokenResponse {
                    access_token: token.clone(),
                    expires_in: d_expires_in(),
                })
            }
            Credential::ServiceAccount(key) => {
                let assertion = sign_assertion(key, Utc::now().timestamp())?;
                (
                    &key.token_uri,
                    vec![("grant_type", JWT_BEARER_GRANT.into()), ("assertion", assertion)],
                )
            }
            Credential::AuthorizedUser(key) => (
                &key.token_uri,
                vec![
                    ("grant_type", "refresh_token".into()),
                    ("client_id", key.client_id.clone()),
                    ("client_secret", key.client_secret.clone()),
                    ("refresh_token", key.refresh_token.clone()),
                ],
            ),
        };

        let resp = self
            .http
            .post(token_uri)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::Auth(format!("token exchange failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Auth(format!(
                "token endpoint returned {}: {body}",
                status.as_u16()
            )));
        }
        resp.json::<TokenResponse>()
            .await
            .map_err(|e| Error::Auth(format!("malformed token response: {e}")))
    }
}

/// RS256-signed JWT bearer assertion for a service account.
fn sign_assertion(key: &ServiceAccountKey, now: i64) -> Result<String> {
    let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
    header.kid = key.private_key_id.clone();
    let claims = JwtClaims {
        iss: &key.client_email,
        scope: CLOUD_PLATFORM_SCOPE,
        aud: &key.token_uri,
        iat: now,
        exp: now + 3600,
    };
    let encoding_key = jsonwebtoken::EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| Error::Config(format!("invalid service account private key: {e}")))?;
    jsonwebtoken::encode(&header, &claims, &encoding_key)
        .map_err(|e| Error::Auth(format!("failed to sign assertion: {e}")))
}
