//! Shared helpers for the HTTP adapters.

use lt_domain::error::{Error, Result};
use lt_domain::retry::backoff;
use reqwest::{RequestBuilder, Response, StatusCode};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Keep upstream error bodies out of logs beyond a sane length.
pub(crate) fn truncate_body(body: &str) -> &str {
    const MAX: usize = 512;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// Send a request built by `build`, retrying transport errors, timeouts,
/// 429 and 5xx up to `max_retries` times. Other 4xx fail immediately;
/// 401/403 become [`Error::Auth`].
pub(crate) async fn send_with_retry(
    provider: &str,
    max_retries: u32,
    base_backoff_ms: u64,
    build: impl Fn() -> RequestBuilder,
) -> Result<Response> {
    let mut last_err: Option<Error> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = backoff(base_backoff_ms, attempt);
            tracing::debug!(provider, attempt, delay_ms = delay.as_millis() as u64, "retrying request");
            tokio::time::sleep(delay).await;
        }

        match build().send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    return Ok(resp);
                }
                let body = resp.text().await.unwrap_or_default();
                let err = Error::Provider {
                    provider: provider.to_owned(),
                    message: format!("HTTP {} - {}", status.as_u16(), truncate_body(&body)),
                };
                if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                    tracing::warn!(provider, status = status.as_u16(), attempt, "transient upstream error");
                    last_err = Some(err);
                    continue;
                }
                if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                    return Err(Error::Auth(format!(
                        "{provider} rejected credentials ({})",
                        status.as_u16()
                    )));
                }
                return Err(err);
            }
            Err(e) => {
                tracing::warn!(provider, attempt, error = %e, "request failed");
                last_err = Some(from_reqwest(e));
            }
        }
    }

    Err(last_err.unwrap_or_else(|| Error::Other(format!("{provider}: retries exhausted"))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_body_is_char_safe() {
        let body = "é".repeat(600);
        assert_eq!(truncate_body(&body).chars().count(), 512);
        assert_eq!(truncate_body("short"), "short");
    }
}
