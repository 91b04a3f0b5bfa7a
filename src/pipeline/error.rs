//! Upstream failure taxonomy.
//!
//! The retry policy hangs off these variants: timeouts and transport
//! failures are transient and retried; credential, admission, and
//! protocol-shape failures are not.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("completion request timed out after {0}s")]
    Timeout(u64),

    #[error("completion service rejected credentials")]
    AuthFailure,

    #[error("completion service rate limit exceeded")]
    RateLimited,

    #[error("completion service unreachable: {0}")]
    Unreachable(String),

    #[error("malformed completion response: {0}")]
    MalformedResponse(String),
}

impl UpstreamError {
    /// Whether a retry could plausibly succeed.
    ///
    /// A malformed response is a protocol-shape problem, not a transient
    /// fault; auth and rate-limit rejections will not clear within the
    /// retry budget either.
    pub fn is_transient(&self) -> bool {
        matches!(self, UpstreamError::Timeout(_) | UpstreamError::Unreachable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_and_unreachable_are_transient() {
        assert!(UpstreamError::Timeout(30).is_transient());
        assert!(UpstreamError::Unreachable("connection refused".into()).is_transient());
    }

    #[test]
    fn auth_rate_limit_and_shape_failures_are_not() {
        assert!(!UpstreamError::AuthFailure.is_transient());
        assert!(!UpstreamError::RateLimited.is_transient());
        assert!(!UpstreamError::MalformedResponse("empty generations".into()).is_transient());
    }
}
