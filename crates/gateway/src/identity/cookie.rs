//! Access-token extraction from request headers.
//!
//! Supabase's SSR helpers store the session as JSON in a cookie named
//! `sb-<project-ref>-auth-token`. Large sessions are split into numbered
//! chunks (`<name>.0`, `<name>.1`, ...), and newer clients prefix the value
//! with `base64-` and base64url-encode it. Older clients URL-encode a JSON
//! object or a `[access_token, refresh_token, ...]` array.

use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::HeaderMap;
use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use percent_encoding::percent_decode_str;

const BASE64_PREFIX: &str = "base64-";
const MAX_CHUNKS: usize = 16;

/// The session access token: `Authorization: Bearer` first, then the
/// session cookie.
pub fn access_token(headers: &HeaderMap, cookie_name: Option<&str>) -> Option<String> {
    if let Some(token) = bearer_token(headers) {
        return Some(token);
    }
    let jar = cookies(headers);
    let raw = session_cookie(&jar, cookie_name)?;
    decode_session(&raw)
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
}

/// Every `name=value` pair across all `Cookie` headers, in order.
pub fn cookies(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|line| line.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            Some((name.trim().to_owned(), value.trim().to_owned()))
        })
        .collect()
}

fn is_session_cookie(name: &str) -> bool {
    name.starts_with("sb-") && name.ends_with("-auth-token")
}

/// The raw session cookie value, reassembling chunks when needed. With no
/// configured name the first `sb-*-auth-token` cookie is used.
pub fn session_cookie(jar: &[(String, String)], name: Option<&str>) -> Option<String> {
    let base = match name {
        Some(n) => n.to_owned(),
        None => jar
            .iter()
            .map(|(n, _)| n.split_once('.').map_or(n.as_str(), |(b, _)| b))
            .find(|n| is_session_cookie(n))?
            .to_owned(),
    };

    let lookup = |n: &str| jar.iter().find(|(k, _)| k == n).map(|(_, v)| v.clone());

    if let Some(whole) = lookup(&base) {
        return Some(whole);
    }

    let mut joined = String::new();
    for i in 0..MAX_CHUNKS {
        match lookup(&format!("{base}.{i}")) {
            Some(chunk) => joined.push_str(&chunk),
            None => break,
        }
    }
    (!joined.is_empty()).then_some(joined)
}

/// Pull `access_token` out of a session cookie value.
pub fn decode_session(raw: &str) -> Option<String> {
    let text = match raw.strip_prefix(BASE64_PREFIX) {
        Some(encoded) => {
            let bytes = URL_SAFE_NO_PAD
                .decode(encoded)
                .or_else(|_| URL_SAFE.decode(encoded))
                .or_else(|_| STANDARD.decode(encoded))
                .ok()?;
            String::from_utf8(bytes).ok()?
        }
        None => percent_decode_str(raw).decode_utf8().ok()?.into_owned(),
    };
    let text = text.trim();

    if looks_like_jwt(text) {
        return Some(text.to_owned());
    }

    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let token = match &value {
        serde_json::Value::Object(map) => map.get("access_token")?.as_str()?,
        serde_json::Value::Array(items) => items.first()?.as_str()?,
        _ => return None,
    };
    (!token.is_empty()).then(|| token.to_owned())
}

fn looks_like_jwt(s: &str) -> bool {
    let parts: Vec<&str> = s.split('.').collect();
    parts.len() == 3
        && parts.iter().all(|p| {
            !p.is_empty()
                && p.chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '=')
        })
}
