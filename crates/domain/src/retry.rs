//! Retry pacing shared by every outbound client.

use std::time::Duration;

/// Longest pause between two attempts.
pub const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Most retries any retry knob may request.
pub const MAX_RETRIES: u32 = 10;

/// Delay before retry `attempt` (1-based): `base`, `2*base`, `4*base`, …
/// capped at [`MAX_BACKOFF`].
pub fn backoff(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(base_ms.saturating_mul(factor)).min(MAX_BACKOFF)
}
