// =============================================================================
// Exchange errors: classified failures of a single exchange request
// =============================================================================
//
// Retryable classes are backed off from; fatal ones count toward the
// ingestion halt.
// =============================================================================

use std::time::Duration;

use thiserror::Error;

/// Failure of a single exchange request.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Connection reset, DNS failure, 5xx and similar.
    #[error("transient network error on {endpoint}: {reason}")]
    TransientNetwork {
        endpoint: String,
        reason: String,
    },

    /// The call did not complete within its bounded timeout.
    #[error("request to {endpoint} timed out after {timeout_ms}ms")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// The exchange signalled throttling (HTTP 429/418) or the local
    /// server-weight ceiling was reached.
    #[error("rate limit exceeded on {endpoint}")]
    RateLimitExceeded {
        endpoint: String,
        retry_after: Option<Duration>,
    },

    /// Credentials or access rejected. Never retried.
    #[error("access rejected by {endpoint}: {reason}")]
    FatalAuth { endpoint: String, reason: String },

    /// Any other non-success status (bad symbol, bad parameter).
    #[error("{endpoint} returned {status}: {body}")]
    Rejected {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The response body could not be decoded.
    #[error("malformed response from {endpoint}: {reason}")]
    Malformed { endpoint: String, reason: String },
}

impl ExchangeError {
    /// Whether the failure may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransientNetwork { .. } | Self::Timeout { .. } | Self::RateLimitExceeded { .. }
        )
    }

    /// Whether the failure should halt ingestion.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalAuth { .. })
    }

    /// Server-provided minimum wait before retrying, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimitExceeded { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn endpoint(&self) -> &str {
        match self {
            Self::TransientNetwork { endpoint, .. }
            | Self::Timeout { endpoint, .. }
            | Self::RateLimitExceeded { endpoint, .. }
            | Self::FatalAuth { endpoint, .. }
            | Self::Rejected { endpoint, .. }
            | Self::Malformed { endpoint, .. } => endpoint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_flags() {
        let rl = ExchangeError::RateLimitExceeded {
            endpoint: "/fapi/v1/klines".into(),
            retry_after: Some(Duration::from_secs(3)),
        };
        assert!(rl.is_retryable());
        assert!(!rl.is_fatal());
        assert_eq!(rl.retry_after(), Some(Duration::from_secs(3)));

        let auth = ExchangeError::FatalAuth {
            endpoint: "/fapi/v1/exchangeInfo".into(),
            reason: "403".into(),
        };
        assert!(!auth.is_retryable());
        assert!(auth.is_fatal());

        let rejected = ExchangeError::Rejected {
            endpoint: "/fapi/v1/klines".into(),
            status: 400,
            body: "{}".into(),
        };
        assert!(!rejected.is_retryable());
        assert!(!rejected.is_fatal());
        assert_eq!(rejected.endpoint(), "/fapi/v1/klines");
    }
}
