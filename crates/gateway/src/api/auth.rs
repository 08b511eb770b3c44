//! Session authentication middleware.
//!
//! Resolves the [`Principal`] through the configured identity adapter and
//! stores it in the request extensions. Requests without a valid session
//! stop here with 401, before any handler (and so before any write) runs.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use lt_domain::principal::Principal;

use crate::error::ApiError;
use crate::state::AppState;

/// Attach via `axum::middleware::from_fn_with_state`. Handlers read the
/// result with `Extension<Principal>`.
pub async fn require_principal(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let principal: Option<Principal> = match state.identity.current_user(req.headers()).await {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, identity = state.identity.name(), "identity lookup failed");
            None
        }
    };

    match principal {
        Some(p) => {
            req.extensions_mut().insert(p);
            next.run(req).await
        }
        None => ApiError::Unauthorized.into_response(),
    }
}
